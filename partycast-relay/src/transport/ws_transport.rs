use crate::error::RelayError;
use crate::protocol::{ClientFrame, ServerFrame};
use crate::transport::relay_link::{RelayLink, RelayTransport};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, warn};

/// Link to a relay served over WebSocket, e.g. `ws://127.0.0.1:8080/relay`.
#[derive(Debug, Clone)]
pub struct WsRelayTransport {
    url: String,
}

impl WsRelayTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl RelayTransport for WsRelayTransport {
    async fn open(&self) -> Result<RelayLink, RelayError> {
        let (ws_stream, _) = connect_async(self.url.as_str()).await?;
        let (mut write, mut read) = ws_stream.split();

        let (client_tx, mut client_rx) = mpsc::unbounded_channel::<ClientFrame>();
        let (server_tx, server_rx) = mpsc::unbounded_channel::<ServerFrame>();

        tokio::spawn(async move {
            while let Some(frame) = client_rx.recv().await {
                let json = match serde_json::to_string(&frame) {
                    Ok(json) => json,
                    Err(e) => {
                        error!("Failed to serialize relay frame: {}", e);
                        continue;
                    }
                };
                if write.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
            let _ = write.close().await;
        });

        tokio::spawn(async move {
            while let Some(msg) = read.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        match serde_json::from_str::<ServerFrame>(text.as_str()) {
                            Ok(frame) => {
                                if server_tx.send(frame).is_err() {
                                    break;
                                }
                            }
                            Err(e) => warn!("Invalid relay frame: {}", e),
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        debug!("Relay socket error: {}", e);
                        break;
                    }
                }
            }
        });

        Ok(RelayLink {
            outbound: client_tx,
            inbound: server_rx,
        })
    }
}

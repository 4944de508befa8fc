use crate::hub::RelayHub;
use crate::protocol::{ClientFrame, ServerFrame};
use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

pub const RELAY_PATH: &str = "/relay";

pub fn relay_router(hub: RelayHub) -> Router {
    Router::new()
        .route(RELAY_PATH, get(ws_handler))
        .with_state(hub)
}

/// Serves the relay on `listener` until the server fails.
pub async fn serve(listener: TcpListener, hub: RelayHub) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Relay listening on ws://{}{}", addr, RELAY_PATH);
    }
    axum::serve(listener, relay_router(hub)).await
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(hub): State<RelayHub>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

async fn handle_socket(socket: WebSocket, hub: RelayHub) {
    let (mut sender, mut receiver) = socket.split();
    let (frame_tx, frame_rx) = mpsc::unbounded_channel::<ClientFrame>();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ServerFrame>();

    let peer_task = tokio::spawn(hub.serve_peer(frame_rx, out_tx));

    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            let json = match serde_json::to_string(&frame) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize relay frame: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<ClientFrame>(&text) {
                    Ok(frame) => {
                        if frame_tx.send(frame).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("Invalid client frame: {:?}", e),
                },
                Message::Close(_) => break,
                _ => {}
            }
        }
        // Dropping frame_tx ends serve_peer, which announces the leave.
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    let _ = peer_task.await;
    info!("Relay socket closed");
}

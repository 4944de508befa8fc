use crate::client::relay_event::{RelayEvent, route_frame};
use crate::error::RelayError;
use crate::protocol::ClientFrame;
use crate::transport::{RelayLink, RelayTransport};
use partycast_core::{PeerId, RoomId, SignalData, SignalEnvelope};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info};

const EVENT_BUFFER: usize = 256;

struct Subscription {
    room: RoomId,
    outbound: mpsc::UnboundedSender<ClientFrame>,
    pump: JoinHandle<()>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let _ = self.outbound.send(ClientFrame::Leave);
        self.pump.abort();
    }
}

/// A peer's handle on the relay: at most one room subscription at a time.
pub struct RelayClient {
    local_id: PeerId,
    transport: Arc<dyn RelayTransport>,
    subscription: Mutex<Option<Subscription>>,
}

impl RelayClient {
    pub fn new(local_id: PeerId, transport: Arc<dyn RelayTransport>) -> Self {
        Self {
            local_id,
            transport,
            subscription: Mutex::new(None),
        }
    }

    pub fn local_id(&self) -> &PeerId {
        &self.local_id
    }

    /// Fresh room id. The room itself comes into being on the first subscribe.
    pub fn create_room(&self) -> RoomId {
        RoomId::generate()
    }

    pub async fn room(&self) -> Option<RoomId> {
        self.subscription.lock().await.as_ref().map(|s| s.room.clone())
    }

    /// Joins `room`, leaving the current one first. Events stop when the link drops
    /// or on the next subscribe or leave.
    pub async fn subscribe(&self, room: RoomId) -> Result<mpsc::Receiver<RelayEvent>, RelayError> {
        let mut guard = self.subscription.lock().await;
        guard.take();

        let RelayLink {
            outbound,
            mut inbound,
        } = self.transport.open().await?;
        outbound
            .send(ClientFrame::Join {
                room: room.clone(),
                peer_id: self.local_id.clone(),
            })
            .map_err(|_| RelayError::Closed)?;

        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let local = self.local_id.clone();
        let pump = tokio::spawn(async move {
            while let Some(frame) = inbound.recv().await {
                for event in route_frame(frame, &local) {
                    if event_tx.send(event).await.is_err() {
                        return;
                    }
                }
            }
            debug!("Relay link for {} closed", local);
        });

        info!("{} subscribed to room {}", self.local_id, room);
        *guard = Some(Subscription {
            room,
            outbound,
            pump,
        });

        Ok(event_rx)
    }

    /// Broadcasts `data` to the room, addressed to `to`.
    pub async fn send_signal(&self, to: &PeerId, data: SignalData) -> Result<(), RelayError> {
        let guard = self.subscription.lock().await;
        let subscription = guard.as_ref().ok_or(RelayError::NotSubscribed)?;

        let envelope = SignalEnvelope::directed(self.local_id.clone(), to.clone(), data);
        subscription
            .outbound
            .send(ClientFrame::Broadcast { payload: envelope })
            .map_err(|_| RelayError::Closed)
    }

    pub async fn leave(&self) {
        if let Some(subscription) = self.subscription.lock().await.take() {
            info!("{} left room {}", self.local_id, subscription.room);
        }
    }
}

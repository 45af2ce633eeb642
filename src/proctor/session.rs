use std::sync::Arc;

use super::hub::ProctorHub;
use super::registry::{ConnectionId, Role};
use super::signaling::ClientEvent;

/// Per-connection message handler. Dropped when the socket closes.
pub struct ProctorSession {
    hub: Arc<ProctorHub>,
    connection_id: ConnectionId,
}

impl ProctorSession {
    pub(super) fn new(hub: Arc<ProctorHub>, connection_id: ConnectionId) -> Self {
        Self { hub, connection_id }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    pub async fn handle_message(&self, event: ClientEvent) {
        match event {
            ClientEvent::RegisterRole { role } => {
                let role = self
                    .hub
                    .pipeline()
                    .register_role(&self.connection_id, &role)
                    .await;
                if role == Role::Unknown {
                    tracing::debug!(connection_id = %self.connection_id, "Connection remains unregistered");
                }
            }
            ClientEvent::ExamTabSwitch(tab_switch) => {
                let dispatch = self.hub.pipeline().handle_tab_switch(tab_switch).await;
                tracing::debug!(
                    connection_id = %self.connection_id,
                    persisted = dispatch.persisted.is_ok(),
                    recipients = dispatch.delivered.len(),
                    queued = dispatch.queued,
                    "Tab switch handled"
                );
            }
        }
    }

    /// Transport close: forget the connection
    pub async fn close(self) {
        self.hub.registry().unregister(&self.connection_id).await;
        tracing::info!(connection_id = %self.connection_id, "Client disconnected");
    }
}

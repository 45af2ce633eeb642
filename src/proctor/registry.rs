use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use super::signaling::ServerEvent;

/// Outbound half of a live connection
pub type ClientSender = mpsc::UnboundedSender<ServerEvent>;

/// Opaque id, unique per live socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Teacher,
    Student,
    Unknown,
}

impl Role {
    /// Only the exact wire values register a role; anything else stays unknown
    pub fn from_registration(raw: &str) -> Role {
        match raw {
            "TEACHER" => Role::Teacher,
            "STUDENT" => Role::Student,
            _ => Role::Unknown,
        }
    }
}

struct Connection {
    role: Role,
    sender: ClientSender,
}

/// Live connections and their role tags.
///
/// This is the only owner of the connection-to-role mapping. State is
/// process-local: a restart forgets every registration.
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, Connection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Tracks a freshly opened connection with an unknown role
    pub async fn connect(&self, sender: ClientSender) -> ConnectionId {
        let id = ConnectionId::new();
        self.connections.write().await.insert(
            id,
            Connection {
                role: Role::Unknown,
                sender,
            },
        );
        tracing::debug!(connection_id = %id, "Connection tracked");
        id
    }

    /// Sets or overwrites the role of a live connection and returns the role
    /// now in effect. Unrecognised values demote the connection to unknown.
    pub async fn register(&self, id: &ConnectionId, raw_role: &str) -> Role {
        let role = Role::from_registration(raw_role);
        let mut connections = self.connections.write().await;

        match connections.get_mut(id) {
            Some(connection) => {
                connection.role = role;
                match role {
                    Role::Teacher => tracing::info!(connection_id = %id, "Teacher registered"),
                    Role::Student => tracing::info!(connection_id = %id, "Student registered"),
                    Role::Unknown => tracing::warn!(
                        connection_id = %id,
                        role = %raw_role,
                        "Unrecognised role, connection left unregistered"
                    ),
                }
                role
            }
            None => {
                tracing::warn!(connection_id = %id, "Role registration for unknown connection ignored");
                Role::Unknown
            }
        }
    }

    /// Forgets a connection. Unknown ids are a no-op.
    pub async fn unregister(&self, id: &ConnectionId) -> Option<Role> {
        let removed = self.connections.write().await.remove(id);
        if let Some(ref connection) = removed {
            tracing::debug!(connection_id = %id, role = ?connection.role, "Connection untracked");
        }
        removed.map(|c| c.role)
    }

    /// Point-in-time snapshot of connections tagged TEACHER
    pub async fn teacher_connections(&self) -> Vec<ConnectionId> {
        self.connections
            .read()
            .await
            .iter()
            .filter(|(_, c)| c.role == Role::Teacher)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Snapshot of every live connection regardless of role
    pub async fn all_connections(&self) -> Vec<ConnectionId> {
        self.connections.read().await.keys().copied().collect()
    }

    pub async fn role_of(&self, id: &ConnectionId) -> Option<Role> {
        self.connections.read().await.get(id).map(|c| c.role)
    }

    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Fire-and-forget send. Returns false when the connection is gone or
    /// its outbound channel has closed.
    pub async fn deliver(&self, id: &ConnectionId, event: ServerEvent) -> bool {
        let connections = self.connections.read().await;
        match connections.get(id) {
            Some(connection) => connection.sender.send(event).is_ok(),
            None => false,
        }
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

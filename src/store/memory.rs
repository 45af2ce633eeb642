use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{Alert, AlertId, AlertStore, NewAlert};
use crate::error::Result;

/// Process-local alert log. Contents are lost on restart.
pub struct MemoryAlertStore {
    alerts: RwLock<Vec<Alert>>,
}

impl MemoryAlertStore {
    pub fn new() -> Self {
        Self {
            alerts: RwLock::new(Vec::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.alerts.read().await.len()
    }
}

impl Default for MemoryAlertStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AlertStore for MemoryAlertStore {
    async fn append(&self, alert: NewAlert) -> Result<Alert> {
        let mut alerts = self.alerts.write().await;
        // Ids are 1-based and follow insertion order
        let id = AlertId(alerts.len() as u64 + 1);
        let alert = alert.with_id(id);
        alerts.push(alert.clone());
        Ok(alert)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<Alert>> {
        let alerts = self.alerts.read().await;
        let mut ordered: Vec<&Alert> = alerts.iter().collect();
        ordered.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        Ok(ordered.into_iter().take(limit).cloned().collect())
    }

    async fn count_since(&self, since: DateTime<Utc>) -> Result<u64> {
        let alerts = self.alerts.read().await;
        Ok(alerts.iter().filter(|a| a.timestamp >= since).count() as u64)
    }
}

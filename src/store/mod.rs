//! Append-only log of proctoring incidents.
//!
//! The store exposes no update or delete: recorded incidents form an audit
//! trail. Two backends exist, an in-process one for tests and ephemeral
//! deployments and a SQLite one for durable storage.

mod memory;
mod sqlite;

pub use memory::MemoryAlertStore;
pub use sqlite::SqliteAlertStore;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ProctorError, Result};

/// Store-assigned alert identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertId(pub u64);

impl fmt::Display for AlertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why an alert was raised. Tab switching is the only detector today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertReason {
    #[serde(rename = "Tab switching detected")]
    TabSwitch,
}

impl AlertReason {
    /// Human-readable text, as persisted and shown on the dashboard
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertReason::TabSwitch => "Tab switching detected",
        }
    }

    /// Wire tag used in live broadcasts
    pub fn kind(&self) -> &'static str {
        match self {
            AlertReason::TabSwitch => "TAB_SWITCH",
        }
    }
}

impl fmt::Display for AlertReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertReason {
    type Err = ProctorError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Tab switching detected" | "TAB_SWITCH" => Ok(AlertReason::TabSwitch),
            other => Err(ProctorError::store(format!("Unknown alert reason '{}'", other))),
        }
    }
}

/// A persisted proctoring incident. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    pub student: String,
    pub exam: String,
    pub reason: AlertReason,
    pub timestamp: DateTime<Utc>,
}

/// An incident that has not been assigned an id yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewAlert {
    pub student: String,
    pub exam: String,
    pub reason: AlertReason,
    pub timestamp: DateTime<Utc>,
}

impl NewAlert {
    pub fn tab_switch(student: impl Into<String>, exam: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            student: student.into(),
            exam: exam.into(),
            reason: AlertReason::TabSwitch,
            timestamp,
        }
    }

    fn with_id(self, id: AlertId) -> Alert {
        Alert {
            id,
            student: self.student,
            exam: self.exam,
            reason: self.reason,
            timestamp: self.timestamp,
        }
    }
}

#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Persists an incident and returns it with its assigned id.
    /// Fails with `StoreUnavailable` when the backend cannot be reached.
    async fn append(&self, alert: NewAlert) -> Result<Alert>;

    /// The `limit` most recent alerts, newest first. Equal timestamps are
    /// ordered by insertion, most recently inserted first.
    async fn recent(&self, limit: usize) -> Result<Vec<Alert>>;

    /// Number of alerts with `timestamp >= since`
    async fn count_since(&self, since: DateTime<Utc>) -> Result<u64>;

    /// Cheap reachability probe used by the health endpoint
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

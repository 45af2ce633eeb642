use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::params;

use super::{Alert, AlertId, AlertReason, AlertStore, NewAlert};
use crate::db::Database;
use crate::error::{ProctorError, Result};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS alerts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        student TEXT NOT NULL,
        exam TEXT NOT NULL,
        reason TEXT NOT NULL,
        timestamp_us INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_alerts_timestamp ON alerts (timestamp_us);
";

/// Durable alert log backed by SQLite
pub struct SqliteAlertStore {
    db: Database,
}

impl SqliteAlertStore {
    pub fn new(db: Database) -> Result<Self> {
        db.call_blocking(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })?;
        Ok(Self { db })
    }
}

fn row_to_alert(row: &rusqlite::Row<'_>) -> rusqlite::Result<(i64, String, String, String, i64)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn decode(raw: (i64, String, String, String, i64)) -> Result<Alert> {
    let (id, student, exam, reason, timestamp_us) = raw;
    let timestamp = DateTime::<Utc>::from_timestamp_micros(timestamp_us).ok_or_else(|| {
        ProctorError::store(format!("Alert {} has an out of range timestamp", id))
    })?;

    Ok(Alert {
        id: AlertId(id as u64),
        student,
        exam,
        reason: reason.parse::<AlertReason>()?,
        timestamp,
    })
}

#[async_trait]
impl AlertStore for SqliteAlertStore {
    async fn append(&self, alert: NewAlert) -> Result<Alert> {
        self.db
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO alerts (student, exam, reason, timestamp_us) VALUES (?1, ?2, ?3, ?4)",
                    params![
                        alert.student,
                        alert.exam,
                        alert.reason.as_str(),
                        alert.timestamp.timestamp_micros()
                    ],
                )?;
                let id = AlertId(conn.last_insert_rowid() as u64);
                Ok(alert.with_id(id))
            })
            .await
    }

    async fn recent(&self, limit: usize) -> Result<Vec<Alert>> {
        self.db
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, student, exam, reason, timestamp_us FROM alerts \
                     ORDER BY timestamp_us DESC, id DESC LIMIT ?1",
                )?;
                let rows = stmt.query_map(params![limit as i64], row_to_alert)?;

                let mut alerts = Vec::new();
                for row in rows {
                    alerts.push(decode(row?)?);
                }
                Ok(alerts)
            })
            .await
    }

    async fn count_since(&self, since: DateTime<Utc>) -> Result<u64> {
        self.db
            .call(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM alerts WHERE timestamp_us >= ?1",
                    params![since.timestamp_micros()],
                    |row| row.get(0),
                )?;
                Ok(count as u64)
            })
            .await
    }

    async fn ping(&self) -> Result<()> {
        self.db
            .call(|conn| {
                conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
                Ok(())
            })
            .await
    }
}

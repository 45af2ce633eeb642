//! Read-only snapshot behind the teacher dashboard's first render.

use std::sync::Arc;

use chrono::{DateTime, NaiveTime, Utc};
use serde::Serialize;

use crate::catalog::{Exam, ExamCatalog};
use crate::error::{ProctorError, Result};
use crate::store::{Alert, AlertId, AlertReason, AlertStore};

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSnapshot {
    pub total_students: u64,
    pub active_exam_count: u64,
    pub alerts_today: u64,
    pub average_score: f64,
    /// Newest first, bounded by the aggregator's limit
    pub recent_alerts: Vec<Alert>,
    pub exam_list: Vec<Exam>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_students: u64,
    pub active_exams: u64,
    pub alerts_today: u64,
    pub avg_score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlertRow {
    pub id: AlertId,
    pub student: String,
    pub exam: String,
    pub reason: AlertReason,
    pub time: DateTime<Utc>,
}

/// Body of `GET /api/teacher/dashboard`
#[derive(Debug, Clone, Serialize)]
pub struct DashboardResponse {
    pub stats: DashboardStats,
    pub alerts: Vec<AlertRow>,
    pub exams: Vec<Exam>,
}

impl From<DashboardSnapshot> for DashboardResponse {
    fn from(snapshot: DashboardSnapshot) -> Self {
        Self {
            stats: DashboardStats {
                total_students: snapshot.total_students,
                active_exams: snapshot.active_exam_count,
                alerts_today: snapshot.alerts_today,
                avg_score: snapshot.average_score,
            },
            alerts: snapshot
                .recent_alerts
                .into_iter()
                .map(|a| AlertRow {
                    id: a.id,
                    student: a.student,
                    exam: a.exam,
                    reason: a.reason,
                    time: a.timestamp,
                })
                .collect(),
            exams: snapshot.exam_list,
        }
    }
}

/// Midnight UTC of the day containing `now`
pub fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}

pub struct DashboardAggregator {
    store: Arc<dyn AlertStore>,
    catalog: Arc<dyn ExamCatalog>,
    recent_limit: usize,
}

impl DashboardAggregator {
    pub fn new(store: Arc<dyn AlertStore>, catalog: Arc<dyn ExamCatalog>, recent_limit: usize) -> Self {
        Self {
            store,
            catalog,
            recent_limit,
        }
    }

    pub async fn snapshot(&self) -> Result<DashboardSnapshot> {
        self.snapshot_at(Utc::now()).await
    }

    /// Composes the snapshot as of `now`. Any failed read fails the whole
    /// snapshot; partial data is never returned.
    pub async fn snapshot_at(&self, now: DateTime<Utc>) -> Result<DashboardSnapshot> {
        let since = start_of_day(now);

        let (active_exam_count, exam_list, recent_alerts, alerts_today, cohort) = tokio::try_join!(
            self.catalog.count_exams(),
            self.catalog.list_exams(),
            self.store.recent(self.recent_limit),
            self.store.count_since(since),
            self.catalog.cohort(),
        )
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to aggregate dashboard snapshot");
            ProctorError::aggregation(e)
        })?;

        Ok(DashboardSnapshot {
            total_students: cohort.total_students,
            active_exam_count,
            alerts_today,
            average_score: cohort.average_score,
            recent_alerts,
            exam_list,
        })
    }
}

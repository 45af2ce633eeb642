use std::sync::Arc;

use super::pipeline::AlertPipeline;
use super::registry::{ClientSender, ConnectionRegistry};
use super::session::ProctorSession;
use super::signaling::ServerEvent;
use crate::catalog::{CohortStats, Exam, ExamCatalog, MemoryExamCatalog, NewExam, SqliteExamCatalog};
use crate::config::{AlertConfig, Config, StoreBackend};
use crate::dashboard::{DashboardAggregator, DashboardSnapshot};
use crate::db::Database;
use crate::error::Result;
use crate::store::{AlertStore, MemoryAlertStore, SqliteAlertStore};

/// Owns the registry and wires it into the pipeline and dashboard for the
/// lifetime of the server process.
pub struct ProctorHub {
    registry: Arc<ConnectionRegistry>,
    pipeline: AlertPipeline,
    dashboard: DashboardAggregator,
    store: Arc<dyn AlertStore>,
    catalog: Arc<dyn ExamCatalog>,
}

impl ProctorHub {
    pub fn new(
        store: Arc<dyn AlertStore>,
        catalog: Arc<dyn ExamCatalog>,
        alerts: &AlertConfig,
    ) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());

        Self {
            pipeline: AlertPipeline::new(store.clone(), registry.clone(), alerts),
            dashboard: DashboardAggregator::new(store.clone(), catalog.clone(), alerts.recent_limit),
            registry,
            store,
            catalog,
        }
    }

    /// Opens the configured backends. Failing here is fatal for the process.
    pub fn from_config(config: &Config) -> Result<Self> {
        let cohort = CohortStats::from(&config.dashboard);

        let (store, catalog): (Arc<dyn AlertStore>, Arc<dyn ExamCatalog>) = match config.store.backend {
            StoreBackend::Memory => {
                tracing::warn!("Using in-memory alert store, alerts are lost on restart");
                (
                    Arc::new(MemoryAlertStore::new()),
                    Arc::new(MemoryExamCatalog::new(cohort)),
                )
            }
            StoreBackend::Sqlite => {
                let db = Database::open(&config.store.db_path)?;
                (
                    Arc::new(SqliteAlertStore::new(db.clone())?),
                    Arc::new(SqliteExamCatalog::new(db, cohort)?),
                )
            }
        };

        tracing::info!(
            backend = ?config.store.backend,
            queue_when_no_teacher = config.alerts.queue_when_no_teacher,
            "Proctor hub initialized"
        );
        Ok(Self::new(store, catalog, &config.alerts))
    }

    /// Tracks a new connection and returns its session handle
    pub async fn open_session(self: &Arc<Self>, sender: ClientSender) -> ProctorSession {
        let connection_id = self.registry.connect(sender).await;
        tracing::info!(connection_id = %connection_id, "Client connected");
        ProctorSession::new(self.clone(), connection_id)
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn pipeline(&self) -> &AlertPipeline {
        &self.pipeline
    }

    pub async fn dashboard(&self) -> Result<DashboardSnapshot> {
        self.dashboard.snapshot().await
    }

    /// Persists an exam and announces it to every live connection
    pub async fn publish_exam(&self, exam: NewExam) -> Result<Exam> {
        let exam = self.catalog.persist_exam(exam).await?;

        let connections = self.registry.all_connections().await;
        let mut announced = 0usize;
        for id in connections {
            if self.registry.deliver(&id, ServerEvent::NewExam(exam.clone())).await {
                announced += 1;
            }
        }

        tracing::info!(exam_id = %exam.id, title = %exam.title, announced, "Exam published");
        Ok(exam)
    }

    pub async fn store_reachable(&self) -> bool {
        match self.store.ping().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Alert store health probe failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn hub() -> Arc<ProctorHub> {
        Arc::new(ProctorHub::new(
            Arc::new(MemoryAlertStore::new()),
            Arc::new(MemoryExamCatalog::new(CohortStats {
                total_students: 10,
                average_score: 70.0,
            })),
            &AlertConfig::default(),
        ))
    }

    #[tokio::test]
    async fn test_publish_exam_announces_to_every_connection() {
        let hub = hub();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        let _a = hub.open_session(tx_a).await;
        let _b = hub.open_session(tx_b).await;

        let exam = hub
            .publish_exam(NewExam {
                title: "Geometry".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(rx_a.try_recv().unwrap(), ServerEvent::NewExam(exam.clone()));
        assert_eq!(rx_b.try_recv().unwrap(), ServerEvent::NewExam(exam));
        assert_eq!(hub.dashboard().await.unwrap().active_exam_count, 1);
    }

    #[tokio::test]
    async fn test_memory_backend_is_reachable() {
        assert!(hub().store_reachable().await);
    }

    #[tokio::test]
    async fn test_from_config_with_memory_backend() {
        let config = Config {
            server: crate::config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            store: crate::config::StoreConfig {
                backend: StoreBackend::Memory,
                db_path: "unused.db".into(),
            },
            alerts: AlertConfig::default(),
            dashboard: crate::config::DashboardConfig::default(),
        };

        let hub = ProctorHub::from_config(&config).unwrap();
        let snapshot = hub.dashboard().await.unwrap();
        assert_eq!(snapshot.total_students, 120);
        assert!(snapshot.recent_alerts.is_empty());
    }
}

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::registry::{ConnectionId, ConnectionRegistry, Role};
use super::signaling::{AlertKind, ServerEvent, TabSwitchEvent, TeacherAlert};
use crate::config::AlertConfig;
use crate::error::Result;
use crate::store::{Alert, AlertReason, AlertStore, NewAlert};

/// Outcome of one tab-switch event.
///
/// Persistence failures are carried here instead of being raised: the
/// broadcast has already happened by the time the caller sees this.
#[derive(Debug)]
pub struct Dispatch {
    pub payload: TeacherAlert,
    pub persisted: Result<Alert>,
    pub delivered: Vec<ConnectionId>,
    pub queued: bool,
}

/// Alerts raised while no teacher was registered
struct Backlog {
    enabled: bool,
    capacity: usize,
    pending: VecDeque<TeacherAlert>,
}

impl Backlog {
    /// Returns false when the alert could not be kept
    fn push(&mut self, alert: TeacherAlert) -> bool {
        if self.capacity == 0 {
            return false;
        }
        if self.pending.len() >= self.capacity {
            if let Some(dropped) = self.pending.pop_front() {
                tracing::warn!(
                    student = %dropped.student,
                    exam_id = %dropped.exam_id,
                    capacity = self.capacity,
                    "Alert backlog full, dropping oldest alert"
                );
            }
        }
        self.pending.push_back(alert);
        true
    }
}

/// Sole entry point for detected tab-switch events: persist, then fan out to
/// every registered teacher.
pub struct AlertPipeline {
    store: Arc<dyn AlertStore>,
    registry: Arc<ConnectionRegistry>,
    backlog: Mutex<Backlog>,
}

impl AlertPipeline {
    pub fn new(store: Arc<dyn AlertStore>, registry: Arc<ConnectionRegistry>, config: &AlertConfig) -> Self {
        Self {
            store,
            registry,
            backlog: Mutex::new(Backlog {
                enabled: config.queue_when_no_teacher,
                capacity: config.queue_capacity,
                pending: VecDeque::new(),
            }),
        }
    }

    pub async fn handle_tab_switch(&self, event: TabSwitchEvent) -> Dispatch {
        self.handle_tab_switch_at(event, Utc::now()).await
    }

    pub async fn handle_tab_switch_at(&self, event: TabSwitchEvent, detected_at: DateTime<Utc>) -> Dispatch {
        let (student, exam) = event.normalized();
        tracing::warn!(student = %student, exam_id = %exam, "Tab switch detected");

        let persisted = self
            .store
            .append(NewAlert::tab_switch(student.clone(), exam.clone(), detected_at))
            .await;

        match &persisted {
            Ok(alert) => tracing::info!(alert_id = %alert.id, "Alert persisted"),
            Err(e) => tracing::error!(
                student = %student,
                exam_id = %exam,
                error = %e,
                "Failed to persist alert, broadcasting anyway"
            ),
        }

        let payload = TeacherAlert {
            kind: AlertKind::from(AlertReason::TabSwitch),
            student,
            exam_id: exam,
            timestamp: detected_at,
        };

        let (delivered, queued) = self.fan_out(&payload).await;

        Dispatch {
            payload,
            persisted,
            delivered,
            queued,
        }
    }

    async fn fan_out(&self, payload: &TeacherAlert) -> (Vec<ConnectionId>, bool) {
        // Held through delivery: register_role takes the same lock
        let mut backlog = self.backlog.lock().await;
        let teachers = self.registry.teacher_connections().await;

        let mut delivered = Vec::with_capacity(teachers.len());
        for id in teachers {
            if self
                .registry
                .deliver(&id, ServerEvent::TeacherAlert(payload.clone()))
                .await
            {
                delivered.push(id);
            } else {
                tracing::debug!(connection_id = %id, "Teacher gone before delivery, skipped");
            }
        }

        if !delivered.is_empty() {
            tracing::info!(recipients = delivered.len(), "Alert broadcast to teachers");
            return (delivered, false);
        }

        if !backlog.enabled {
            tracing::info!("No teacher reachable, alert not delivered live");
            return (delivered, false);
        }

        let queued = backlog.push(payload.clone());
        if queued {
            tracing::info!(pending = backlog.pending.len(), "No teacher reachable, alert queued");
        } else {
            tracing::warn!("Alert backlog has zero capacity, alert not queued");
        }
        (delivered, queued)
    }

    /// Registers a role for a connection. A new teacher receives any queued
    /// alerts, oldest first. Alerts the teacher could not take stay queued.
    pub async fn register_role(&self, id: &ConnectionId, raw_role: &str) -> Role {
        let mut backlog = self.backlog.lock().await;
        let role = self.registry.register(id, raw_role).await;

        if role == Role::Teacher && !backlog.pending.is_empty() {
            let mut flushed = 0usize;
            while let Some(alert) = backlog.pending.front().cloned() {
                if !self.registry.deliver(id, ServerEvent::TeacherAlert(alert)).await {
                    tracing::warn!(
                        connection_id = %id,
                        remaining = backlog.pending.len(),
                        "Teacher channel closed during backlog flush, keeping remaining alerts"
                    );
                    break;
                }
                backlog.pending.pop_front();
                flushed += 1;
            }
            if flushed > 0 {
                tracing::info!(connection_id = %id, flushed, "Delivered queued alerts to teacher");
            }
        }

        role
    }

    pub async fn pending_alerts(&self) -> usize {
        self.backlog.lock().await.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProctorError;
    use crate::store::MemoryAlertStore;
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    struct UnavailableStore;

    #[async_trait]
    impl AlertStore for UnavailableStore {
        async fn append(&self, _alert: NewAlert) -> Result<Alert> {
            Err(ProctorError::store("connection refused"))
        }

        async fn recent(&self, _limit: usize) -> Result<Vec<Alert>> {
            Err(ProctorError::store("connection refused"))
        }

        async fn count_since(&self, _since: DateTime<Utc>) -> Result<u64> {
            Err(ProctorError::store("connection refused"))
        }
    }

    fn pipeline_with(store: Arc<dyn AlertStore>, config: AlertConfig) -> (AlertPipeline, Arc<ConnectionRegistry>) {
        let registry = Arc::new(ConnectionRegistry::new());
        (AlertPipeline::new(store, registry.clone(), &config), registry)
    }

    fn queueing(capacity: usize) -> AlertConfig {
        AlertConfig {
            queue_when_no_teacher: true,
            queue_capacity: capacity,
            ..AlertConfig::default()
        }
    }

    fn alert_of(event: ServerEvent) -> TeacherAlert {
        match event {
            ServerEvent::TeacherAlert(alert) => alert,
            other => panic!("expected teacher alert, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_teacher_receives_student_does_not() {
        let store = Arc::new(MemoryAlertStore::new());
        let (pipeline, registry) = pipeline_with(store.clone(), AlertConfig::default());

        let (teacher_tx, mut teacher_rx) = mpsc::unbounded_channel();
        let (student_tx, mut student_rx) = mpsc::unbounded_channel();
        let teacher = registry.connect(teacher_tx).await;
        let student = registry.connect(student_tx).await;
        pipeline.register_role(&teacher, "TEACHER").await;
        pipeline.register_role(&student, "STUDENT").await;

        let dispatch = pipeline
            .handle_tab_switch(TabSwitchEvent::new("alice", "exam-1"))
            .await;

        assert_eq!(dispatch.delivered, vec![teacher]);
        let stored = dispatch.persisted.unwrap();
        assert_eq!(stored.reason.as_str(), "Tab switching detected");
        assert_eq!(store.len().await, 1);

        let alert = alert_of(teacher_rx.try_recv().unwrap());
        assert_eq!(alert.student, "alice");
        assert_eq!(alert.exam_id, "exam-1");
        assert_eq!(alert.kind, AlertKind::TabSwitch);
        assert_eq!(alert.timestamp, stored.timestamp);
        assert!(teacher_rx.try_recv().is_err());
        assert!(student_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unregistered_connection_gets_nothing() {
        let (pipeline, registry) = pipeline_with(Arc::new(MemoryAlertStore::new()), AlertConfig::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.connect(tx).await;

        let dispatch = pipeline.handle_tab_switch(TabSwitchEvent::new("bob", "exam-2")).await;
        assert!(dispatch.delivered.is_empty());
        assert!(!dispatch.queued);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_empty_fields_are_normalized() {
        let store = Arc::new(MemoryAlertStore::new());
        let (pipeline, registry) = pipeline_with(store.clone(), AlertConfig::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let teacher = registry.connect(tx).await;
        pipeline.register_role(&teacher, "TEACHER").await;

        let dispatch = pipeline.handle_tab_switch(TabSwitchEvent::new("", "")).await;

        let stored = dispatch.persisted.unwrap();
        assert_eq!(stored.student, "Unknown");
        assert_eq!(stored.exam, "N/A");
        assert_eq!(store.len().await, 1);

        let alert = alert_of(rx.try_recv().unwrap());
        assert_eq!(alert.student, "Unknown");
        assert_eq!(alert.exam_id, "N/A");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_broadcast_survives_store_failure() {
        let (pipeline, registry) = pipeline_with(Arc::new(UnavailableStore), AlertConfig::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let teacher = registry.connect(tx).await;
        pipeline.register_role(&teacher, "TEACHER").await;

        let detected_at = Utc::now();
        let dispatch = pipeline
            .handle_tab_switch_at(TabSwitchEvent::new("carol", "exam-3"), detected_at)
            .await;

        assert!(matches!(dispatch.persisted, Err(ProctorError::StoreUnavailable(_))));
        assert_eq!(dispatch.delivered, vec![teacher]);

        let alert = alert_of(rx.try_recv().unwrap());
        assert_eq!(
            alert,
            TeacherAlert {
                kind: AlertKind::TabSwitch,
                student: "carol".to_string(),
                exam_id: "exam-3".to_string(),
                timestamp: detected_at,
            }
        );
    }

    #[tokio::test]
    async fn test_disconnected_teacher_is_skipped() {
        let (pipeline, registry) = pipeline_with(Arc::new(MemoryAlertStore::new()), AlertConfig::default());
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, rx_b) = mpsc::unbounded_channel();
        let a = registry.connect(tx_a).await;
        let b = registry.connect(tx_b).await;
        pipeline.register_role(&a, "TEACHER").await;
        pipeline.register_role(&b, "TEACHER").await;

        registry.unregister(&b).await;
        drop(rx_b);

        let dispatch = pipeline.handle_tab_switch(TabSwitchEvent::new("dave", "exam-4")).await;
        assert_eq!(dispatch.delivered, vec![a]);
        assert!(rx_a.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_closed_channel_without_unregister_is_not_an_error() {
        let (pipeline, registry) = pipeline_with(Arc::new(MemoryAlertStore::new()), AlertConfig::default());
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, rx_b) = mpsc::unbounded_channel();
        let a = registry.connect(tx_a).await;
        let b = registry.connect(tx_b).await;
        pipeline.register_role(&a, "TEACHER").await;
        pipeline.register_role(&b, "TEACHER").await;
        drop(rx_b);

        let dispatch = pipeline.handle_tab_switch(TabSwitchEvent::new("erin", "exam-5")).await;
        assert_eq!(dispatch.delivered, vec![a]);
        assert!(dispatch.persisted.is_ok());
        assert!(rx_a.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_alerts_without_teacher_are_lost_by_default() {
        let (pipeline, registry) = pipeline_with(Arc::new(MemoryAlertStore::new()), AlertConfig::default());

        let dispatch = pipeline.handle_tab_switch(TabSwitchEvent::new("frank", "exam-6")).await;
        assert!(!dispatch.queued);
        assert!(dispatch.persisted.is_ok());

        let (tx, mut rx) = mpsc::unbounded_channel();
        let teacher = registry.connect(tx).await;
        pipeline.register_role(&teacher, "TEACHER").await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_backlog_flushes_to_first_teacher() {
        let (pipeline, registry) = pipeline_with(Arc::new(MemoryAlertStore::new()), queueing(10));

        for student in ["s1", "s2"] {
            let dispatch = pipeline.handle_tab_switch(TabSwitchEvent::new(student, "exam-7")).await;
            assert!(dispatch.queued);
        }
        assert_eq!(pipeline.pending_alerts().await, 2);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let teacher = registry.connect(tx).await;
        assert_eq!(pipeline.register_role(&teacher, "TEACHER").await, Role::Teacher);

        assert_eq!(alert_of(rx.try_recv().unwrap()).student, "s1");
        assert_eq!(alert_of(rx.try_recv().unwrap()).student, "s2");
        assert!(rx.try_recv().is_err());
        assert_eq!(pipeline.pending_alerts().await, 0);

        // A second teacher does not get the already flushed backlog
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let second = registry.connect(tx2).await;
        pipeline.register_role(&second, "TEACHER").await;
        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_backlog_drops_oldest_on_overflow() {
        let (pipeline, registry) = pipeline_with(Arc::new(MemoryAlertStore::new()), queueing(2));

        for student in ["s1", "s2", "s3"] {
            pipeline.handle_tab_switch(TabSwitchEvent::new(student, "exam-8")).await;
        }
        assert_eq!(pipeline.pending_alerts().await, 2);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let teacher = registry.connect(tx).await;
        pipeline.register_role(&teacher, "TEACHER").await;

        assert_eq!(alert_of(rx.try_recv().unwrap()).student, "s2");
        assert_eq!(alert_of(rx.try_recv().unwrap()).student, "s3");
    }

    #[tokio::test]
    async fn test_student_registration_keeps_backlog() {
        let (pipeline, registry) = pipeline_with(Arc::new(MemoryAlertStore::new()), queueing(5));
        pipeline.handle_tab_switch(TabSwitchEvent::new("s1", "exam-9")).await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let student = registry.connect(tx).await;
        pipeline.register_role(&student, "STUDENT").await;

        assert!(rx.try_recv().is_err());
        assert_eq!(pipeline.pending_alerts().await, 1);
    }

    #[tokio::test]
    async fn test_unreachable_teacher_queues_alert() {
        let (pipeline, registry) = pipeline_with(Arc::new(MemoryAlertStore::new()), queueing(10));
        let (tx, rx) = mpsc::unbounded_channel();
        let stale = registry.connect(tx).await;
        pipeline.register_role(&stale, "TEACHER").await;
        drop(rx);

        let dispatch = pipeline.handle_tab_switch(TabSwitchEvent::new("gina", "exam-10")).await;
        assert!(dispatch.delivered.is_empty());
        assert!(dispatch.queued);
        assert_eq!(pipeline.pending_alerts().await, 1);

        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let teacher = registry.connect(tx2).await;
        pipeline.register_role(&teacher, "TEACHER").await;
        assert_eq!(alert_of(rx2.try_recv().unwrap()).student, "gina");
    }

    #[tokio::test]
    async fn test_flush_to_closed_teacher_keeps_backlog() {
        let (pipeline, registry) = pipeline_with(Arc::new(MemoryAlertStore::new()), queueing(10));
        pipeline.handle_tab_switch(TabSwitchEvent::new("hank", "exam-11")).await;

        let (tx, rx) = mpsc::unbounded_channel();
        let closed = registry.connect(tx).await;
        drop(rx);
        assert_eq!(pipeline.register_role(&closed, "TEACHER").await, Role::Teacher);
        assert_eq!(pipeline.pending_alerts().await, 1);

        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let teacher = registry.connect(tx2).await;
        pipeline.register_role(&teacher, "TEACHER").await;
        assert_eq!(alert_of(rx2.try_recv().unwrap()).student, "hank");
        assert_eq!(pipeline.pending_alerts().await, 0);
    }

    #[tokio::test]
    async fn test_zero_capacity_backlog_reports_not_queued() {
        let (pipeline, _registry) = pipeline_with(Arc::new(MemoryAlertStore::new()), queueing(0));

        let dispatch = pipeline.handle_tab_switch(TabSwitchEvent::new("ivy", "exam-12")).await;
        assert!(!dispatch.queued);
        assert!(dispatch.delivered.is_empty());
        assert_eq!(pipeline.pending_alerts().await, 0);
    }
}

//! Alert channel wire format.
//!
//! Every text frame carries one envelope `{ "event": <name>, "data": <payload> }`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::Exam;
use crate::store::AlertReason;

pub const UNKNOWN_STUDENT: &str = "Unknown";
pub const UNKNOWN_EXAM: &str = "N/A";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    RegisterRole {
        role: String,
    },

    ExamTabSwitch(TabSwitchEvent),
}

/// Raw tab-switch report from a student client. Both fields are optional on
/// the wire and are normalised rather than rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TabSwitchEvent {
    #[serde(default)]
    pub student: Option<String>,
    #[serde(default, rename = "examId")]
    pub exam_id: Option<String>,
}

impl TabSwitchEvent {
    pub fn new(student: impl Into<String>, exam_id: impl Into<String>) -> Self {
        Self {
            student: Some(student.into()),
            exam_id: Some(exam_id.into()),
        }
    }

    /// `(student, exam)` with missing or blank values replaced by sentinels
    pub fn normalized(&self) -> (String, String) {
        (
            non_blank(self.student.as_deref()).unwrap_or(UNKNOWN_STUDENT).to_string(),
            non_blank(self.exam_id.as_deref()).unwrap_or(UNKNOWN_EXAM).to_string(),
        )
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertKind {
    #[serde(rename = "TAB_SWITCH")]
    TabSwitch,
}

impl From<AlertReason> for AlertKind {
    fn from(reason: AlertReason) -> Self {
        match reason {
            AlertReason::TabSwitch => AlertKind::TabSwitch,
        }
    }
}

/// Live alert pushed to teacher connections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeacherAlert {
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub student: String,
    #[serde(rename = "examId")]
    pub exam_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    TeacherAlert(TeacherAlert),

    NewExam(Exam),
}

#[cfg(test)]
impl ServerEvent {
    pub(crate) fn teacher_alert_fixture() -> Self {
        ServerEvent::TeacherAlert(TeacherAlert {
            kind: AlertKind::TabSwitch,
            student: "alice".to_string(),
            exam_id: "exam-1".to_string(),
            timestamp: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_register_role() {
        let event: ClientEvent =
            serde_json::from_str(r#"{"event":"register_role","data":{"role":"TEACHER"}}"#).unwrap();
        assert_eq!(
            event,
            ClientEvent::RegisterRole {
                role: "TEACHER".to_string()
            }
        );
    }

    #[test]
    fn test_parse_tab_switch_with_missing_fields() {
        let event: ClientEvent =
            serde_json::from_str(r#"{"event":"exam_tab_switch","data":{"student":null}}"#).unwrap();
        match event {
            ClientEvent::ExamTabSwitch(tab) => {
                assert_eq!(tab.normalized(), ("Unknown".to_string(), "N/A".to_string()));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_normalize_blank_strings() {
        let tab = TabSwitchEvent::new("  ", "");
        assert_eq!(tab.normalized(), ("Unknown".to_string(), "N/A".to_string()));

        let tab = TabSwitchEvent::new("alice", "exam-1");
        assert_eq!(tab.normalized(), ("alice".to_string(), "exam-1".to_string()));
    }

    #[test]
    fn test_unknown_event_is_rejected() {
        let result = serde_json::from_str::<ClientEvent>(r#"{"event":"chat","data":{}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_teacher_alert_wire_shape() {
        let event = ServerEvent::TeacherAlert(TeacherAlert {
            kind: AlertKind::TabSwitch,
            student: "alice".to_string(),
            exam_id: "exam-1".to_string(),
            timestamp: Utc.with_ymd_and_hms(2026, 10, 18, 9, 30, 0).unwrap(),
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "teacher_alert");
        assert_eq!(json["data"]["type"], "TAB_SWITCH");
        assert_eq!(json["data"]["student"], "alice");
        assert_eq!(json["data"]["examId"], "exam-1");
        assert_eq!(json["data"]["timestamp"], "2026-10-18T09:30:00Z");
    }
}

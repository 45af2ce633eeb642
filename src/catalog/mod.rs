//! Exam storage as seen by the proctoring core.
//!
//! The dashboard only needs to list and count exams; announcements need to
//! persist one. Everything else about exams lives outside this service.

mod memory;
mod sqlite;

pub use memory::MemoryExamCatalog;
pub use sqlite::SqliteExamCatalog;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::DashboardConfig;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub correct_answer: String,
    #[serde(default = "default_points")]
    pub points: u32,
}

fn default_points() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exam {
    pub id: Uuid,
    pub title: String,
    pub subject: String,
    pub duration_minutes: u32,
    pub total_questions: u32,
    pub description: String,
    pub questions: Vec<Question>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub scheduled_for: Option<DateTime<Utc>>,
}

/// Exam as submitted by a client, before it is stored
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewExam {
    pub title: String,
    pub subject: String,
    pub duration_minutes: u32,
    pub total_questions: Option<u32>,
    pub description: String,
    pub questions: Vec<Question>,
    pub created_by: String,
    pub scheduled_for: Option<DateTime<Utc>>,
}

impl NewExam {
    /// Assigns identity and creation time. `total_questions` falls back to
    /// the number of questions supplied.
    pub fn into_exam(self, created_at: DateTime<Utc>) -> Exam {
        let total_questions = self
            .total_questions
            .unwrap_or(self.questions.len() as u32);

        Exam {
            id: Uuid::new_v4(),
            title: self.title,
            subject: self.subject,
            duration_minutes: self.duration_minutes,
            total_questions,
            description: self.description,
            questions: self.questions,
            created_by: self.created_by,
            created_at,
            scheduled_for: self.scheduled_for,
        }
    }
}

/// Figures the dashboard reports but this service does not derive
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CohortStats {
    pub total_students: u64,
    pub average_score: f64,
}

impl From<&DashboardConfig> for CohortStats {
    fn from(config: &DashboardConfig) -> Self {
        Self {
            total_students: config.total_students,
            average_score: config.average_score,
        }
    }
}

#[async_trait]
pub trait ExamCatalog: Send + Sync {
    /// All exams, oldest first
    async fn list_exams(&self) -> Result<Vec<Exam>>;

    async fn count_exams(&self) -> Result<u64>;

    async fn persist_exam(&self, exam: NewExam) -> Result<Exam>;

    async fn cohort(&self) -> Result<CohortStats>;
}

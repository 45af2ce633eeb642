use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use super::{CohortStats, Exam, ExamCatalog, NewExam, Question};
use crate::db::Database;
use crate::error::{ProctorError, Result};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS exams (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        subject TEXT NOT NULL,
        duration_minutes INTEGER NOT NULL,
        total_questions INTEGER NOT NULL,
        description TEXT NOT NULL,
        questions TEXT NOT NULL,
        created_by TEXT NOT NULL,
        created_at TEXT NOT NULL,
        scheduled_for TEXT
    );
";

pub struct SqliteExamCatalog {
    db: Database,
    cohort: CohortStats,
}

impl SqliteExamCatalog {
    pub fn new(db: Database, cohort: CohortStats) -> Result<Self> {
        db.call_blocking(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })?;
        Ok(Self { db, cohort })
    }
}

struct ExamRow {
    id: String,
    title: String,
    subject: String,
    duration_minutes: u32,
    total_questions: u32,
    description: String,
    questions: String,
    created_by: String,
    created_at: String,
    scheduled_for: Option<String>,
}

fn parse_time(field: &str, raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| ProctorError::catalog(format!("Bad {} '{}': {}", field, raw, e)))
}

impl ExamRow {
    fn into_exam(self) -> Result<Exam> {
        let questions: Vec<Question> = serde_json::from_str(&self.questions)
            .map_err(|e| ProctorError::catalog(format!("Bad questions for exam {}: {}", self.id, e)))?;

        Ok(Exam {
            id: Uuid::parse_str(&self.id)
                .map_err(|e| ProctorError::catalog(format!("Bad exam id '{}': {}", self.id, e)))?,
            title: self.title,
            subject: self.subject,
            duration_minutes: self.duration_minutes,
            total_questions: self.total_questions,
            description: self.description,
            questions,
            created_by: self.created_by,
            created_at: parse_time("created_at", &self.created_at)?,
            scheduled_for: self
                .scheduled_for
                .as_deref()
                .map(|raw| parse_time("scheduled_for", raw))
                .transpose()?,
        })
    }
}

#[async_trait]
impl ExamCatalog for SqliteExamCatalog {
    async fn list_exams(&self) -> Result<Vec<Exam>> {
        let rows = self
            .db
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, title, subject, duration_minutes, total_questions, description, \
                     questions, created_by, created_at, scheduled_for \
                     FROM exams ORDER BY created_at ASC, rowid ASC",
                )?;
                let rows = stmt.query_map([], |row| {
                    Ok(ExamRow {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        subject: row.get(2)?,
                        duration_minutes: row.get(3)?,
                        total_questions: row.get(4)?,
                        description: row.get(5)?,
                        questions: row.get(6)?,
                        created_by: row.get(7)?,
                        created_at: row.get(8)?,
                        scheduled_for: row.get(9)?,
                    })
                })?;
                Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
            })
            .await
            .map_err(|e| ProctorError::catalog(e.to_string()))?;

        rows.into_iter().map(ExamRow::into_exam).collect()
    }

    async fn count_exams(&self) -> Result<u64> {
        self.db
            .call(|conn| {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM exams", [], |row| row.get(0))?;
                Ok(count as u64)
            })
            .await
            .map_err(|e| ProctorError::catalog(e.to_string()))
    }

    async fn persist_exam(&self, exam: NewExam) -> Result<Exam> {
        let exam = exam.into_exam(Utc::now());
        let questions = serde_json::to_string(&exam.questions)?;
        let stored = exam.clone();

        self.db
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO exams (id, title, subject, duration_minutes, total_questions, \
                     description, questions, created_by, created_at, scheduled_for) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                    params![
                        exam.id.to_string(),
                        exam.title,
                        exam.subject,
                        exam.duration_minutes,
                        exam.total_questions,
                        exam.description,
                        questions,
                        exam.created_by,
                        exam.created_at.to_rfc3339(),
                        exam.scheduled_for.map(|t| t.to_rfc3339()),
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(|e| ProctorError::catalog(e.to_string()))?;

        Ok(stored)
    }

    async fn cohort(&self) -> Result<CohortStats> {
        Ok(self.cohort)
    }
}

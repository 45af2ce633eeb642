use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{CohortStats, Exam, ExamCatalog, NewExam};
use crate::error::Result;

pub struct MemoryExamCatalog {
    exams: RwLock<Vec<Exam>>,
    cohort: CohortStats,
}

impl MemoryExamCatalog {
    pub fn new(cohort: CohortStats) -> Self {
        Self {
            exams: RwLock::new(Vec::new()),
            cohort,
        }
    }
}

#[async_trait]
impl ExamCatalog for MemoryExamCatalog {
    async fn list_exams(&self) -> Result<Vec<Exam>> {
        Ok(self.exams.read().await.clone())
    }

    async fn count_exams(&self) -> Result<u64> {
        Ok(self.exams.read().await.len() as u64)
    }

    async fn persist_exam(&self, exam: NewExam) -> Result<Exam> {
        let exam = exam.into_exam(Utc::now());
        self.exams.write().await.push(exam.clone());
        Ok(exam)
    }

    async fn cohort(&self) -> Result<CohortStats> {
        Ok(self.cohort)
    }
}

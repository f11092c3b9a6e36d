//! Sync job records and their aggregated results

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::document::{DocumentKind, TransactionType};
use crate::impl_domain_status_conversions;

/// Lifecycle of a job row. Transitions run pending → running → completed or
/// failed, each exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl_domain_status_conversions!(JobStatus {
    Pending => "pending",
    Running => "running",
    Completed => "completed",
    Failed => "failed",
});

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Which document families a job pulls from the source system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    Sales,
    Purchases,
    Bills,
    Full,
}

impl_domain_status_conversions!(JobType {
    Sales => "sales",
    Purchases => "purchases",
    Bills => "bills",
    Full => "full",
});

impl JobType {
    /// Document kinds to fetch, in processing order.
    pub fn document_kinds(self) -> &'static [DocumentKind] {
        match self {
            Self::Sales => &[DocumentKind::Sales],
            Self::Purchases | Self::Bills => &[DocumentKind::Purchase],
            Self::Full => &[DocumentKind::Sales, DocumentKind::Purchase],
        }
    }
}

/// A persisted sync job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub company_id: i64,
    pub job_type: JobType,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub status: JobStatus,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub error_message: Option<String>,
    pub results: Option<SyncResults>,
    pub created_at: i64,
}

/// Intake shape used by collaborators that enqueue jobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewJob {
    pub company_id: i64,
    pub job_type: JobType,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
}

/// One failed document inside an otherwise completed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentError {
    pub document_id: String,
    pub error_message: String,
}

/// Counters written to the job row when a job completes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResults {
    pub total: u32,
    pub invoices_created: u32,
    pub bills_created: u32,
    pub skipped: u32,
    pub errors: u32,
    #[serde(default)]
    pub error_details: Vec<DocumentError>,
    #[serde(default)]
    pub attachments_uploaded: u32,
    /// Documents whose date fell back to the processing day.
    #[serde(default)]
    pub degraded_dates: u32,
}

impl SyncResults {
    pub fn created(&self) -> u32 {
        self.invoices_created + self.bills_created
    }

    pub fn record_created(&mut self, transaction_type: TransactionType) {
        match transaction_type {
            TransactionType::Invoice => self.invoices_created += 1,
            TransactionType::Bill => self.bills_created += 1,
        }
    }

    pub fn record_skipped(&mut self) {
        self.skipped += 1;
    }

    /// Note a created record whose mapping could not be stored. It still
    /// counts as created; the detail carries the target id for reconciliation.
    pub fn record_unrecorded(&mut self, document_id: impl Into<String>, message: impl Into<String>) {
        self.error_details.push(DocumentError {
            document_id: document_id.into(),
            error_message: message.into(),
        });
    }

    pub fn record_error(&mut self, document_id: impl Into<String>, message: impl Into<String>) {
        self.errors += 1;
        self.error_details.push(DocumentError {
            document_id: document_id.into(),
            error_message: message.into(),
        });
    }
}

/// Outcome handed back to whoever asked for a job to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub job_id: i64,
    pub status: JobStatus,
    pub results: Option<SyncResults>,
    pub error_message: Option<String>,
}

impl JobResult {
    pub fn completed(job_id: i64, results: SyncResults) -> Self {
        Self { job_id, status: JobStatus::Completed, results: Some(results), error_message: None }
    }

    pub fn failed(job_id: i64, message: impl Into<String>) -> Self {
        Self {
            job_id,
            status: JobStatus::Failed,
            results: None,
            error_message: Some(message.into()),
        }
    }
}

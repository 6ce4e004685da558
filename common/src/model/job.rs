use crate::model::log_entry::MigrationLogEntry;
use crate::model::mapping::MigrationMapping;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a migration job.
///
/// A job is created as `Pending` when a backup is uploaded. If the upload is a
/// recognized archive it is extracted and analyzed (`Analyzing`), after which
/// the job settles in `Mapping` so the operator can review the proposed field
/// mappings. Running the import moves it to `Importing` and finally to
/// `Completed` (partial record-level failures included) or `Failed` (only on
/// an unrecoverable job-level error).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Analyzing,
    Mapping,
    Importing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Analyzing => "analyzing",
            JobStatus::Mapping => "mapping",
            JobStatus::Importing => "importing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<JobStatus> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "analyzing" => Some(JobStatus::Analyzing),
            "mapping" => Some(JobStatus::Mapping),
            "importing" => Some(JobStatus::Importing),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }
}

/// Where the extracted backup lives on disk. Stored on the job as a JSON blob
/// so the import and preview endpoints can find the dump files again without
/// re-uploading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    pub extract_path: String,
}

/// A single data-migration job: one uploaded backup, its analysis, and the
/// running totals of the import pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationJob {
    pub id: i64,
    pub name: String,
    /// Detected kind of the uploaded payload: `mongodb`, `json`, `csv` or `unknown`.
    pub source_type: String,
    /// Operator-supplied label of the system the backup came from.
    pub source_system: String,
    pub status: JobStatus,
    pub file_name: String,
    pub file_size: i64,
    /// MD5 of the uploaded file, computed while streaming the upload to disk.
    pub checksum: Option<String>,
    pub tenant_id: Option<i64>,
    pub store_id: Option<i64>,
    pub total_records: i64,
    pub imported_records: i64,
    pub failed_records: i64,
    pub analysis_result: Option<crate::model::analysis::AnalysisResult>,
    pub import_config: Option<ImportConfig>,
    pub error_log: Option<String>,
    pub created_by: String,
    pub created_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

/// Response shape of `GET /api/migration/jobs/{id}`: the job itself plus its
/// mappings and the most recent log entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDetail {
    #[serde(flatten)]
    pub job: MigrationJob,
    pub mappings: Vec<MigrationMapping>,
    pub logs: Vec<MigrationLogEntry>,
}

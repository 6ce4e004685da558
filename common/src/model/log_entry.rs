use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
    Success,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::Success => "success",
        }
    }

    pub fn parse(s: &str) -> Option<LogLevel> {
        match s {
            "info" => Some(LogLevel::Info),
            "warning" => Some(LogLevel::Warning),
            "error" => Some(LogLevel::Error),
            "success" => Some(LogLevel::Success),
            _ => None,
        }
    }
}

/// Append-only audit record of the migration pipeline.
///
/// Entries belong to a job and optionally to one of its mappings. Per-record
/// import failures carry the record's original identifier in `source_id` and
/// the offending payload in `details`, which is enough to fix a mapping and
/// reimport without re-uploading the backup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationLogEntry {
    pub id: i64,
    pub job_id: i64,
    pub mapping_id: Option<i64>,
    pub level: LogLevel,
    pub message: String,
    pub source_id: Option<String>,
    pub details: Option<serde_json::Value>,
    pub created_at: String,
}

use serde::{Deserialize, Serialize};

/// Outcome of one import pass over a single mapping.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportResult {
    /// Rows actually inserted into the destination store. Duplicate-skipped
    /// rows are not counted, so a reimport over unchanged data reports 0.
    pub imported: i64,
    pub failed: i64,
    pub errors: Vec<String>,
}

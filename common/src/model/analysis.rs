use serde::{Deserialize, Serialize};

/// What the analyzer learned about one collection of the backup: its name,
/// how many documents it holds, the union of field names observed in the
/// first 50 documents, and one representative sample document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionSummary {
    pub name: String,
    pub count: i64,
    pub fields: Vec<String>,
    pub sample_data: Option<serde_json::Value>,
}

/// Result of analyzing an extracted backup directory. Persisted on the job
/// as `analysis_result` and returned by `GET /jobs/{id}/analysis`.
/// Collections are ordered by descending record count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub source_type: String,
    pub source_system: String,
    pub total_collections: i64,
    pub total_records: i64,
    pub collections: Vec<CollectionSummary>,
}

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-collection import configuration for one job.
///
/// A mapping ties a source collection (`source_entity`) to a destination
/// entity identifier (`target_entity`) and carries the field-rename
/// dictionary applied to every document during import. Default mappings are
/// seeded from the registry after analysis; the operator can edit or add
/// mappings freely while the job is in the `mapping` state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationMapping {
    pub id: i64,
    pub job_id: i64,
    pub source_entity: String,
    pub target_entity: String,
    /// Source field name -> destination field name.
    pub field_mappings: HashMap<String, String>,
    /// Free-form operator notes/overrides; opaque to the importer.
    pub transformations: Option<serde_json::Value>,
    pub is_enabled: bool,
    /// Record count of the source collection, taken from the analysis.
    pub record_count: i64,
    /// Updated after each import or reimport pass. Informational;
    /// `imported_count <= record_count` is expected but not enforced.
    pub imported_count: i64,
    pub priority: i64,
}

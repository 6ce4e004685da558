use serde::{Deserialize, Serialize};

/// A saved, reusable mapping configuration. Templates let an operator apply
/// the mapping set of a previous migration to a new job instead of editing
/// every field rename again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationTemplate {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub source_system: Option<String>,
    pub mappings: serde_json::Value,
    pub usage_count: i64,
    pub created_at: String,
}

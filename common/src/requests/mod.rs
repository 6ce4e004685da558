use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Metadata part of the multipart upload request. Sent as a `json` field
/// alongside the backup `file` field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadMeta {
    pub name: Option<String>,
    pub source_system: Option<String>,
    pub tenant_id: Option<i64>,
    pub store_id: Option<i64>,
}

/// One mapping edit inside `PUT /jobs/{id}/mappings`. With an `id` the
/// existing mapping is updated; without one a new mapping is created for the
/// given `source_entity`.
#[derive(Debug, Clone, Deserialize)]
pub struct MappingEdit {
    pub id: Option<i64>,
    pub source_entity: Option<String>,
    pub target_entity: String,
    pub field_mappings: HashMap<String, String>,
    pub transformations: Option<serde_json::Value>,
    pub is_enabled: Option<bool>,
    pub record_count: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateMappingsRequest {
    pub mappings: Vec<MappingEdit>,
}

/// Payload for `POST /templates`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTemplate {
    pub name: String,
    pub description: Option<String>,
    pub source_system: Option<String>,
    pub mappings: serde_json::Value,
}

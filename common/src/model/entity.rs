use serde::{Deserialize, Serialize};

/// One entry of the static catalog of importable destination entities,
/// grouped by business module. Used to populate the mapping editor choices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportableEntity {
    pub id: String,
    pub name: String,
    pub description: String,
    pub module: String,
}

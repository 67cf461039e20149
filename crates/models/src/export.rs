use serde::{Deserialize, Serialize};

use super::{ActionDefinition, FullTrigger, InvalidEnum};

/// The import/export envelope: every definition a tenant owns.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Definitions {
    #[serde(default)]
    pub triggers: Vec<FullTrigger>,
    #[serde(default)]
    pub actions: Vec<ActionDefinition>,
}

/// Strategy for importing definitions into a tenant.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportType {
    /// Remove all existing definitions, then import.
    Delete,
    /// Upsert everything in the envelope, keeping unrelated definitions.
    All,
    /// Import only definitions whose ids are not yet known.
    New,
    /// Overwrite only definitions whose ids already exist.
    Old,
}

impl std::str::FromStr for ImportType {
    type Err = InvalidEnum;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DELETE" => Ok(ImportType::Delete),
            "ALL" => Ok(ImportType::All),
            "NEW" => Ok(ImportType::New),
            "OLD" => Ok(ImportType::Old),
            _ => Err(InvalidEnum::new(s, "import strategy")),
        }
    }
}

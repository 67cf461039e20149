use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A definition binding an action id to a plugin and its configuration.
/// Plugin dispatch itself is the action subsystem's concern; the core only
/// manages definitions.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActionDefinition {
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub action_plugin: String,
    #[serde(default)]
    pub action_id: String,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

/// A record of one action execution, kept as queryable history.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    #[serde(default)]
    pub tenant_id: String,
    pub action_plugin: String,
    pub action_id: String,
    /// Alert or event this execution was fired for.
    pub event_id: String,
    #[serde(default)]
    pub ctime: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Severity, Status};

/// Filter over alerts. Every field is optional; an absent field places no
/// constraint. Built once per request and never mutated afterwards.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AlertsCriteria {
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
    #[serde(default)]
    pub alert_ids: Vec<String>,
    #[serde(default)]
    pub trigger_ids: Vec<String>,
    #[serde(default)]
    pub statuses: Vec<Status>,
    #[serde(default)]
    pub severities: Vec<Severity>,
    /// Unified tag query: either an explicit `tagQuery` expression or the
    /// translation of the `tags` convenience parameter.
    pub tag_query: Option<String>,
    pub start_resolved_time: Option<i64>,
    pub end_resolved_time: Option<i64>,
    pub start_ack_time: Option<i64>,
    pub end_ack_time: Option<i64>,
    pub start_status_time: Option<i64>,
    pub end_status_time: Option<i64>,
    #[serde(default)]
    pub thin: bool,
}

/// Filter over events.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventsCriteria {
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
    #[serde(default)]
    pub event_ids: Vec<String>,
    #[serde(default)]
    pub trigger_ids: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    pub tag_query: Option<String>,
    #[serde(default)]
    pub thin: bool,
}

/// Filter over trigger definitions.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TriggersCriteria {
    #[serde(default)]
    pub trigger_ids: Vec<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub thin: bool,
}

/// Filter over action history.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActionsCriteria {
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
    #[serde(default)]
    pub action_plugins: Vec<String>,
    #[serde(default)]
    pub action_ids: Vec<String>,
    #[serde(default)]
    pub alert_ids: Vec<String>,
    #[serde(default)]
    pub results: Vec<String>,
}

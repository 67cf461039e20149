use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A telemetry datum submitted for evaluation. The core stamps the tenant
/// and forwards datums to the engine; it never inspects the value.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Data {
    #[serde(default)]
    pub tenant_id: String,
    pub id: String,
    /// Collection time, epoch millis.
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, String>,
}

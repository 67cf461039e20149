use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{InvalidEnum, Trigger};

/// Severity assigned by the firing trigger. Ordering is by urgency, so
/// pages can be sorted most- or least-severe first.
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl std::str::FromStr for Severity {
    type Err = InvalidEnum;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LOW" => Ok(Severity::Low),
            "MEDIUM" => Ok(Severity::Medium),
            "HIGH" => Ok(Severity::High),
            "CRITICAL" => Ok(Severity::Critical),
            _ => Err(InvalidEnum::new(s, "severity")),
        }
    }
}

/// Alert lifecycle status.
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    #[default]
    Open,
    Acknowledged,
    Resolved,
}

impl std::str::FromStr for Status {
    type Err = InvalidEnum;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "OPEN" => Ok(Status::Open),
            "ACKNOWLEDGED" => Ok(Status::Acknowledged),
            "RESOLVED" => Ok(Status::Resolved),
            _ => Err(InvalidEnum::new(s, "alert status")),
        }
    }
}

/// A note attached to an alert by an operator.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub user: String,
    pub ctime: i64,
    pub text: String,
}

/// An event: something that happened, produced by a trigger, sent by a
/// tenant directly, or injected through the data pipeline.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub id: String,
    /// Creation time, epoch millis.
    #[serde(default)]
    pub ctime: i64,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_id: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

impl Event {
    /// Strip nested payloads for thin queries. Events carry their context
    /// inline, so thin only drops the free-form context map.
    pub fn thinned(mut self) -> Event {
        self.context.clear();
        self
    }
}

/// An alert: the stateful record produced when a trigger fires, tracked
/// through acknowledgement and resolution.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub ctime: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_id: Option<String>,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<Note>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, String>,
    /// Firing trigger definition, suppressed by thin queries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<Trigger>,
    /// Condition evaluations that fired the alert, suppressed by thin
    /// queries. Opaque to the core.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eval_sets: Option<serde_json::Value>,
}

impl Alert {
    /// Strip the heavy nested payloads for thin queries.
    pub fn thinned(mut self) -> Alert {
        self.trigger = None;
        self.eval_sets = None;
        self
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn severity_orders_by_urgency() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::High < Severity::Critical);
        assert_eq!("critical".parse::<Severity>().unwrap(), Severity::Critical);
        assert!("urgent".parse::<Severity>().is_err());
    }

    #[test]
    fn thin_alert_drops_nested_payloads() {
        let alert = Alert {
            tenant_id: "t0".to_string(),
            id: "a1".to_string(),
            ctime: 1000,
            trigger_id: Some("trigger-1".to_string()),
            severity: Severity::Critical,
            status: Status::Open,
            ack_by: None,
            ack_time: None,
            ack_notes: None,
            resolved_by: None,
            resolved_time: None,
            resolved_notes: None,
            notes: Vec::new(),
            tags: BTreeMap::new(),
            context: BTreeMap::new(),
            trigger: Some(Trigger::new("t0", "trigger-1", "cpu high")),
            eval_sets: Some(serde_json::json!([{"value": 99.0}])),
        };

        let thin = alert.thinned();
        assert!(thin.trigger.is_none());
        assert!(thin.eval_sets.is_none());
        assert_eq!(thin.id, "a1");
    }
}

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Condition, Dampening, InvalidEnum, Severity};

/// Mode scoping a trigger's conditions and dampening. A trigger fires in
/// `Firing` mode; once fired it may switch to `Autoresolve` mode until its
/// auto-resolve conditions are met.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mode {
    Firing,
    Autoresolve,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Firing => "FIRING",
            Mode::Autoresolve => "AUTORESOLVE",
        }
    }
}

impl std::str::FromStr for Mode {
    type Err = InvalidEnum;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "FIRING" => Ok(Mode::Firing),
            "AUTORESOLVE" => Ok(Mode::Autoresolve),
            _ => Err(InvalidEnum::new(s, "trigger mode")),
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a trigger within the group-trigger model.
///
/// `Group` triggers are templates: they never fire themselves, and their
/// conditions and dampenings are propagated to `Member` instances. A member
/// detached from propagation is an `Orphan` and is edited independently
/// until unorphaned.
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerType {
    #[default]
    Standalone,
    Group,
    Member,
    Orphan,
}

/// A trigger definition, scoped to a tenant.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Trigger {
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, rename = "type")]
    pub trigger_type: TriggerType,
    /// Group trigger owning this member, set only for Member/Orphan types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_of: Option<String>,
    /// For member triggers: map of group condition dataId to this member's
    /// concrete dataId, applied when group conditions are propagated.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data_id_map: BTreeMap<String, String>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

impl Trigger {
    pub fn new(tenant_id: &str, id: &str, name: &str) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            id: id.to_string(),
            name: name.to_string(),
            description: None,
            trigger_type: TriggerType::Standalone,
            member_of: None,
            data_id_map: BTreeMap::new(),
            enabled: false,
            severity: Severity::default(),
            context: BTreeMap::new(),
            tags: BTreeMap::new(),
        }
    }

    /// Generate an id for a trigger created without one.
    pub fn generate_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    pub fn is_group(&self) -> bool {
        self.trigger_type == TriggerType::Group
    }

    pub fn is_member(&self) -> bool {
        matches!(self.trigger_type, TriggerType::Member | TriggerType::Orphan)
    }

    pub fn is_orphan(&self) -> bool {
        self.trigger_type == TriggerType::Orphan
    }

    /// Tags must have non-empty keys and values.
    pub fn check_tags(tags: &BTreeMap<String, String>) -> bool {
        tags.iter().all(|(k, v)| !k.is_empty() && !v.is_empty())
    }
}

/// A trigger bundled with its dampenings and conditions, as accepted by the
/// full-trigger create operation and produced by export.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FullTrigger {
    pub trigger: Trigger,
    #[serde(default)]
    pub dampenings: Vec<Dampening>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// Payload instantiating a member trigger from a group template.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GroupMemberInfo {
    #[serde(default)]
    pub group_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_description: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub member_context: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub member_tags: BTreeMap<String, String>,
    /// Map of group condition dataId to this member's concrete dataId.
    #[serde(default)]
    pub data_id_map: BTreeMap<String, String>,
}

/// Payload re-attaching an orphaned member to its group. The member's
/// condition bindings are resolved afresh from the supplied dataIdMap.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UnorphanMemberInfo {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub member_context: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub member_tags: BTreeMap<String, String>,
    #[serde(default)]
    pub data_id_map: BTreeMap<String, String>,
}

/// Payload replacing a group trigger's conditions. `data_id_member_map`
/// supplies, for each condition dataId not already bound by a member's
/// dataIdMap, the concrete dataId to use per member.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GroupConditionsInfo {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data_id_member_map: BTreeMap<String, BTreeMap<String, String>>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn mode_round_trip() {
        for (s, mode) in [
            ("FIRING", Mode::Firing),
            ("firing", Mode::Firing),
            ("AutoResolve", Mode::Autoresolve),
        ] {
            assert_eq!(s.parse::<Mode>().unwrap(), mode);
        }
        assert!("RESOLVED".parse::<Mode>().is_err());
    }

    #[test]
    fn trigger_wire_shape() {
        let trigger: Trigger = serde_json::from_value(serde_json::json!({
            "id": "t1",
            "name": "cpu high",
            "type": "MEMBER",
            "memberOf": "group-1",
            "dataIdMap": {"data-id": "member-data-id"},
            "enabled": true,
            "severity": "CRITICAL",
            "tags": {"env": "prod"},
        }))
        .unwrap();

        assert_eq!(trigger.trigger_type, TriggerType::Member);
        assert_eq!(trigger.member_of.as_deref(), Some("group-1"));
        assert_eq!(trigger.data_id_map["data-id"], "member-data-id");
        assert!(trigger.tenant_id.is_empty()); // Stamped by the handler.
    }
}

use serde::{Deserialize, Serialize};

use super::Mode;

/// Comparison operator of a threshold condition.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    LT,
    GT,
    LTE,
    GTE,
}

/// The expression payload of a condition. The core never evaluates these;
/// they are modeled so definitions round-trip faithfully through create,
/// propagation, and export.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConditionExpr {
    #[serde(rename_all = "camelCase")]
    Threshold { operator: CompareOp, threshold: f64 },
    #[serde(rename_all = "camelCase")]
    Range {
        threshold_low: f64,
        threshold_high: f64,
        #[serde(default)]
        in_range: bool,
    },
    #[serde(rename_all = "camelCase")]
    Event {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expression: Option<String>,
    },
}

/// A condition of a trigger, scoped to a mode. Conditions for one
/// (trigger, mode) form an ordered set; `set_size`/`set_index` record the
/// position, and the condition id is derived from them.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub trigger_id: String,
    /// Absent on the wire means `Firing`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_mode: Option<Mode>,
    pub data_id: String,
    #[serde(flatten)]
    pub expr: ConditionExpr,
    #[serde(default)]
    pub condition_set_size: usize,
    #[serde(default)]
    pub condition_set_index: usize,
}

impl Condition {
    pub fn mode(&self) -> Mode {
        self.trigger_mode.unwrap_or(Mode::Firing)
    }

    /// Derived identity: `{triggerId}-{MODE}-{setSize}-{setIndex}`.
    pub fn condition_id(&self) -> String {
        format!(
            "{}-{}-{}-{}",
            self.trigger_id,
            self.mode(),
            self.condition_set_size,
            self.condition_set_index
        )
    }

    /// Stamp identity and set position onto a replacement condition set.
    pub fn number_set(conditions: &mut [Condition], tenant_id: &str, trigger_id: &str, mode: Mode) {
        let size = conditions.len();
        for (index, condition) in conditions.iter_mut().enumerate() {
            condition.tenant_id = tenant_id.to_string();
            condition.trigger_id = trigger_id.to_string();
            condition.trigger_mode = Some(mode);
            condition.condition_set_size = size;
            condition.condition_set_index = index;
        }
    }
}

use serde::{Deserialize, Serialize};

use super::Mode;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DampeningType {
    /// Fire when every one of the last N evaluations was true.
    Strict,
    /// Fire when N of the last M evaluations were true.
    RelaxedCount,
    /// Fire when N evaluations were true within a time window.
    RelaxedTime,
    /// Fire when evaluations were continuously true for a time window.
    StrictTime,
}

/// A dampening policy, scoped to (trigger, mode). At most one dampening
/// exists per scope, so the id is derived as `{triggerId}-{MODE}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Dampening {
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub trigger_id: String,
    #[serde(default)]
    pub dampening_id: String,
    pub trigger_mode: Mode,
    #[serde(rename = "type")]
    pub dampening_type: DampeningType,
    #[serde(default)]
    pub eval_true_setting: u32,
    #[serde(default)]
    pub eval_total_setting: u32,
    /// Milliseconds, for the time-based types.
    #[serde(default)]
    pub eval_time_setting: i64,
}

#[derive(thiserror::Error, Debug, PartialEq)]
#[error("invalid dampening: {0}")]
pub struct InvalidDampening(String);

impl Dampening {
    pub fn derive_id(trigger_id: &str, mode: Mode) -> String {
        format!("{trigger_id}-{mode}")
    }

    /// Validate the settings against the dampening type and return a
    /// normalized copy with the derived id stamped on.
    pub fn clean(mut self) -> Result<Dampening, InvalidDampening> {
        match self.dampening_type {
            DampeningType::Strict => {
                if self.eval_true_setting == 0 {
                    return Err(InvalidDampening(
                        "STRICT requires evalTrueSetting > 0".to_string(),
                    ));
                }
                self.eval_total_setting = self.eval_true_setting;
                self.eval_time_setting = 0;
            }
            DampeningType::RelaxedCount => {
                if self.eval_true_setting == 0 || self.eval_total_setting <= self.eval_true_setting
                {
                    return Err(InvalidDampening(
                        "RELAXED_COUNT requires evalTotalSetting > evalTrueSetting > 0".to_string(),
                    ));
                }
                self.eval_time_setting = 0;
            }
            DampeningType::RelaxedTime => {
                if self.eval_true_setting == 0 || self.eval_time_setting <= 0 {
                    return Err(InvalidDampening(
                        "RELAXED_TIME requires evalTrueSetting > 0 and evalTimeSetting > 0"
                            .to_string(),
                    ));
                }
                self.eval_total_setting = 0;
            }
            DampeningType::StrictTime => {
                if self.eval_time_setting <= 0 {
                    return Err(InvalidDampening(
                        "STRICT_TIME requires evalTimeSetting > 0".to_string(),
                    ));
                }
                self.eval_true_setting = 0;
                self.eval_total_setting = 0;
            }
        }
        self.dampening_id = Self::derive_id(&self.trigger_id, self.trigger_mode);
        Ok(self)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn clean_normalizes_by_type() {
        let dampening = Dampening {
            tenant_id: "t0".to_string(),
            trigger_id: "trigger-1".to_string(),
            dampening_id: String::new(),
            trigger_mode: Mode::Firing,
            dampening_type: DampeningType::Strict,
            eval_true_setting: 3,
            eval_total_setting: 7, // Overridden for STRICT.
            eval_time_setting: 100,
        };
        let cleaned = dampening.clean().unwrap();
        assert_eq!(cleaned.dampening_id, "trigger-1-FIRING");
        assert_eq!(cleaned.eval_total_setting, 3);
        assert_eq!(cleaned.eval_time_setting, 0);
    }

    #[test]
    fn clean_rejects_inconsistent_settings() {
        let dampening = Dampening {
            tenant_id: "t0".to_string(),
            trigger_id: "trigger-1".to_string(),
            dampening_id: String::new(),
            trigger_mode: Mode::Firing,
            dampening_type: DampeningType::RelaxedCount,
            eval_true_setting: 5,
            eval_total_setting: 3,
            eval_time_setting: 0,
        };
        assert!(dampening.clean().is_err());
    }
}

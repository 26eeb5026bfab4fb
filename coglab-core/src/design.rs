use crate::keys::KeySet;
use log::warn;
use serde::{Deserialize, Serialize};

/// Block/trial structure of a session.
///
/// Blank number fields reach storage as `null`; on load they take the
/// default value instead of failing the whole document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "DesignRecord")]
pub struct DesignParameters {
    pub trials_per_block: u32,
    pub blocks_per_session: u32,
    #[serde(rename = "interTrialInterval")]
    pub inter_trial_interval_ms: u64,
    #[serde(rename = "blockMessage")]
    pub block_break_message: String,
    /// Expected response keys recorded with the design; the runner does not gate on them.
    #[serde(rename = "responseKey")]
    pub response_keys: KeySet,
    #[serde(rename = "breakResponseKey")]
    pub break_response_keys: KeySet,
    #[serde(rename = "breakDuration")]
    pub break_duration_ms: Option<u64>,
}

impl Default for DesignParameters {
    fn default() -> Self {
        Self {
            trials_per_block: 10,
            blocks_per_session: 3,
            inter_trial_interval_ms: 1000,
            block_break_message: "Take a short break!".to_string(),
            response_keys: KeySet::new(),
            break_response_keys: KeySet::new(),
            break_duration_ms: None,
        }
    }
}

/// Stored form of [`DesignParameters`] with every number optional.
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct DesignRecord {
    trials_per_block: Option<i64>,
    blocks_per_session: Option<i64>,
    inter_trial_interval: Option<i64>,
    block_message: Option<String>,
    response_key: KeySet,
    break_response_key: KeySet,
    break_duration: Option<i64>,
}

fn count<T: TryFrom<i64>>(field: &str, value: Option<i64>, default: T) -> T {
    match value {
        None => default,
        Some(v) => T::try_from(v).unwrap_or_else(|_| {
            warn!("{field} = {v} is out of range, using the default");
            default
        }),
    }
}

impl From<DesignRecord> for DesignParameters {
    fn from(record: DesignRecord) -> Self {
        let defaults = DesignParameters::default();
        Self {
            trials_per_block: count("trialsPerBlock", record.trials_per_block, defaults.trials_per_block),
            blocks_per_session: count("blocksPerSession", record.blocks_per_session, defaults.blocks_per_session),
            inter_trial_interval_ms: count(
                "interTrialInterval",
                record.inter_trial_interval,
                defaults.inter_trial_interval_ms,
            ),
            block_break_message: record.block_message.unwrap_or(defaults.block_break_message),
            response_keys: record.response_key,
            break_response_keys: record.break_response_key,
            break_duration_ms: record.break_duration.and_then(|ms| u64::try_from(ms).ok()),
        }
    }
}

/// What ends the break between two blocks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BreakGate<'a> {
    Key(&'a KeySet),
    Duration(u64),
    Immediate,
}

impl DesignParameters {
    /// Break keys win over a break duration when both are configured.
    pub fn break_gate(&self) -> BreakGate<'_> {
        if !self.break_response_keys.is_empty() {
            BreakGate::Key(&self.break_response_keys)
        } else {
            match self.break_duration_ms {
                Some(ms) if ms > 0 => BreakGate::Duration(ms),
                _ => BreakGate::Immediate,
            }
        }
    }

    pub fn total_trials(&self) -> u64 {
        u64::from(self.trials_per_block) * u64::from(self.blocks_per_session)
    }

    /// One-paragraph summary shown next to the design form.
    pub fn summary(&self) -> String {
        let message = if self.block_break_message.is_empty() {
            "N/A"
        } else {
            &self.block_break_message
        };
        let control = match self.break_gate() {
            BreakGate::Key(keys) => format!("Break ends on key: \"{keys}\""),
            BreakGate::Duration(ms) => format!("Break duration: {ms} ms"),
            BreakGate::Immediate => "Break duration: N/A ms".to_string(),
        };
        format!(
            "Experiment: {} blocks × {} trials ({} trials total)\n\
             Inter-trial interval: {} ms\n\
             Break message: \"{}\"\n\
             {}",
            self.blocks_per_session,
            self.trials_per_block,
            self.total_trials(),
            self.inter_trial_interval_ms,
            message,
            control
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn break_key_takes_precedence() {
        let mut design = DesignParameters {
            break_duration_ms: Some(2000),
            ..DesignParameters::default()
        };
        assert_eq!(design.break_gate(), BreakGate::Duration(2000));

        design.break_response_keys = KeySet::parse(" ");
        assert!(matches!(design.break_gate(), BreakGate::Key(keys) if keys.contains("space")));

        design.break_response_keys = KeySet::new();
        design.break_duration_ms = Some(0);
        assert_eq!(design.break_gate(), BreakGate::Immediate);
    }

    #[test]
    fn partial_records_fill_defaults() {
        let design: DesignParameters =
            serde_json::from_str(r#"{"trialsPerBlock": 4, "breakResponseKey": " "}"#).unwrap();
        assert_eq!(design.trials_per_block, 4);
        assert_eq!(design.blocks_per_session, 3);
        assert_eq!(design.inter_trial_interval_ms, 1000);
        assert_eq!(design.total_trials(), 12);
        assert!(design.summary().contains("Break ends on key: \"Space\""));
    }

    #[test]
    fn blank_numbers_load_as_defaults() {
        let design: DesignParameters = serde_json::from_str(
            r#"{"trialsPerBlock": null, "blocksPerSession": 2, "interTrialInterval": null,
                "blockMessage": "Rest", "breakDuration": null}"#,
        )
        .unwrap();
        assert_eq!(design.trials_per_block, 10);
        assert_eq!(design.blocks_per_session, 2);
        assert_eq!(design.inter_trial_interval_ms, 1000);
        assert_eq!(design.block_break_message, "Rest");
        assert_eq!(design.break_gate(), BreakGate::Immediate);

        let negative: DesignParameters = serde_json::from_str(r#"{"trialsPerBlock": -4}"#).unwrap();
        assert_eq!(negative.trials_per_block, 10);
    }
}

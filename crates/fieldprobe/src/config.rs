//! Probe collection configuration.

use serde::{Deserialize, Serialize};

use crate::error::ProbeError;

/// What `eval` does when the field cannot be evaluated at an owned probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvalErrorPolicy {
    /// Fail the whole call and leave every history untouched.
    #[default]
    Abort,
    /// Append a NaN sentinel for the failing probe, log a warning and
    /// report the probe in the [`EvalReport`](crate::EvalReport).
    SkipAndWarn,
}

/// Configuration for a [`ProbeCollection`](crate::ProbeCollection).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Policy for evaluation failures at owned points.
    pub on_eval_error: EvalErrorPolicy,
    /// Minimum number of local probes to evaluate in parallel.
    /// Below this threshold probes are evaluated sequentially.
    pub parallel_threshold: usize,
    /// History capacity reserved per probe at construction.
    pub history_capacity: usize,
}

impl ProbeConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ProbeError> {
        if self.parallel_threshold == 0 {
            return Err(ProbeError::InvalidConfig(
                "parallel_threshold must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            on_eval_error: EvalErrorPolicy::Abort,
            parallel_threshold: 256,
            history_capacity: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        ProbeConfig::default().validate().expect("default valid");
    }

    #[test]
    fn zero_parallel_threshold_is_rejected() {
        let config = ProbeConfig {
            parallel_threshold: 0,
            ..ProbeConfig::default()
        };
        match config.validate() {
            Err(ProbeError::InvalidConfig(msg)) => assert!(msg.contains("parallel_threshold")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: ProbeConfig =
            serde_json::from_str(r#"{ "on_eval_error": "skip_and_warn" }"#).expect("parses");
        assert_eq!(config.on_eval_error, EvalErrorPolicy::SkipAndWarn);
        assert_eq!(config.parallel_threshold, 256);
        assert_eq!(config.history_capacity, 0);
    }
}

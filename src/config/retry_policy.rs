//! Reconnection policy

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::utils::Error;

fn default_max_reconnection_attempts() -> u32 {
    6
}

fn default_max_delay_between_reconnections() -> f64 {
    5.0
}

fn check_timeout_secs(secs: f64) -> Result<f64, String> {
    if secs.is_finite() && secs > 0.0 {
        Ok(secs)
    } else {
        Err(format!(
            "maxDelayBetweenReconnections must be a positive number of seconds, got {}",
            secs
        ))
    }
}

fn deserialize_timeout_secs<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = f64::deserialize(deserializer)?;
    check_timeout_secs(secs).map_err(serde::de::Error::custom)
}

/// Bounded-retry policy for establishing a connection
///
/// Immutable once a retry sequence begins; it is passed by value into
/// each connect operation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt
    #[serde(default = "default_max_reconnection_attempts")]
    pub max_reconnection_attempts: u32,
    /// Per-attempt timeout, in seconds
    #[serde(
        default = "default_max_delay_between_reconnections",
        deserialize_with = "deserialize_timeout_secs"
    )]
    pub max_delay_between_reconnections: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_reconnection_attempts: default_max_reconnection_attempts(),
            max_delay_between_reconnections: default_max_delay_between_reconnections(),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_reconnection_attempts: u32, per_attempt_timeout: Duration) -> Self {
        Self {
            max_reconnection_attempts,
            max_delay_between_reconnections: per_attempt_timeout.as_secs_f64(),
        }
    }

    /// Reject a non-positive or non-finite per-attempt timeout
    pub fn validate(&self) -> Result<(), Error> {
        check_timeout_secs(self.max_delay_between_reconnections)
            .map(|_| ())
            .map_err(Error::Config)
    }

    /// Per-attempt timeout as a `Duration`
    ///
    /// Timeouts too large for a `Duration` saturate. Invalid values that
    /// bypassed `validate` give a zero timeout, so every attempt fails.
    pub fn attempt_timeout(&self) -> Duration {
        let secs = self.max_delay_between_reconnections;
        match Duration::try_from_secs_f64(secs) {
            Ok(timeout) => timeout,
            Err(_) if secs > 0.0 => Duration::MAX,
            Err(_) => Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_reconnection_attempts, 6);
        assert_eq!(policy.attempt_timeout(), Duration::from_secs(5));
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_partial_deserialize() {
        let policy: RetryPolicy =
            serde_json::from_str(r#"{"maxReconnectionAttempts": 2}"#).unwrap();
        assert_eq!(policy.max_reconnection_attempts, 2);
        assert_eq!(policy.attempt_timeout(), Duration::from_secs(5));

        let policy: RetryPolicy =
            serde_json::from_str(r#"{"maxDelayBetweenReconnections": 0.25}"#).unwrap();
        assert_eq!(policy.max_reconnection_attempts, 6);
        assert_eq!(policy.attempt_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_huge_timeout_saturates() {
        let policy: RetryPolicy =
            serde_json::from_str(r#"{"maxDelayBetweenReconnections": 1e20}"#).unwrap();
        assert!(policy.validate().is_ok());
        assert_eq!(policy.attempt_timeout(), Duration::MAX);
    }

    #[test]
    fn test_non_positive_timeout_rejected() {
        for raw in ["0", "-1.5"] {
            let json = format!(r#"{{"maxDelayBetweenReconnections": {}}}"#, raw);
            let err = serde_json::from_str::<RetryPolicy>(&json).unwrap_err();
            assert!(err.to_string().contains("positive"), "{}", err);
        }

        for secs in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let policy = RetryPolicy {
                max_reconnection_attempts: 1,
                max_delay_between_reconnections: secs,
            };
            assert!(matches!(policy.validate(), Err(Error::Config(_))));
        }
    }

    #[test]
    fn test_unvalidated_timeout_is_not_substituted() {
        let policy = RetryPolicy {
            max_reconnection_attempts: 1,
            max_delay_between_reconnections: -3.0,
        };
        assert_eq!(policy.attempt_timeout(), Duration::ZERO);
    }
}

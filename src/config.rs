use std::time::Duration;

use crate::error::{BudgetAdvisorError, Result};

/// Read-only engine configuration, initialized once at startup.
///
/// Two independent retry budgets live here: `max_attempts` bounds the
/// content-level repair loop in the pipeline, while `transport_retries`
/// bounds the client adapter's transparent retries for transient transport
/// faults. Both must be exhausted before a caller sees a failure.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum pipeline attempts (initial draft plus repair re-prompts).
    pub max_attempts: u32,

    /// Timeout applied to a single generation call.
    pub generation_timeout: Duration,

    /// Relative tolerance for the 50/30/20 split vs. monthly income.
    pub sum_tolerance: f64,

    /// Additional client-level retries for transient transport faults.
    pub transport_retries: u32,

    /// Initial backoff before the first transport retry; doubles per retry.
    pub transport_backoff: Duration,

    /// Deadline for one caller request across all attempts and retries.
    pub request_deadline: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            generation_timeout: Duration::from_secs(30),
            sum_tolerance: 0.01,
            transport_retries: 2,
            transport_backoff: Duration::from_millis(500),
            request_deadline: Duration::from_secs(120),
        }
    }
}

impl EngineConfig {
    /// Check value ranges before the configuration is shared read-only.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(BudgetAdvisorError::InvalidConfig(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if !(self.sum_tolerance > 0.0 && self.sum_tolerance < 1.0) {
            return Err(BudgetAdvisorError::InvalidConfig(format!(
                "sum_tolerance {} must be between 0.0 and 1.0 exclusive",
                self.sum_tolerance
            )));
        }
        if self.generation_timeout.is_zero() {
            return Err(BudgetAdvisorError::InvalidConfig(
                "generation_timeout must be non-zero".to_string(),
            ));
        }
        if self.request_deadline < self.generation_timeout {
            return Err(BudgetAdvisorError::InvalidConfig(format!(
                "request_deadline {:?} is shorter than a single generation_timeout {:?}",
                self.request_deadline, self.generation_timeout
            )));
        }
        Ok(())
    }

    /// Backoff before transport retry `attempt` (0-based), doubling each time.
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let multiplier = 2u32.saturating_pow(attempt);
        self.transport_backoff.saturating_mul(multiplier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_attempts_rejected() {
        let config = EngineConfig {
            max_attempts: 0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn tolerance_bounds_rejected() {
        for tolerance in [0.0, 1.0, -0.5] {
            let config = EngineConfig {
                sum_tolerance: tolerance,
                ..EngineConfig::default()
            };
            assert!(config.validate().is_err(), "tolerance {} accepted", tolerance);
        }
    }

    #[test]
    fn deadline_shorter_than_timeout_rejected() {
        let config = EngineConfig {
            generation_timeout: Duration::from_secs(30),
            request_deadline: Duration::from_secs(10),
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn backoff_doubles() {
        let config = EngineConfig::default();
        assert_eq!(config.backoff_for_attempt(0), Duration::from_millis(500));
        assert_eq!(config.backoff_for_attempt(1), Duration::from_millis(1000));
        assert_eq!(config.backoff_for_attempt(2), Duration::from_millis(2000));
    }
}

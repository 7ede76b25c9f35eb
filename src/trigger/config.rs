use std::time::Duration;

use crate::config::ConfigError;

pub const DEFAULT_THRESHOLD: f64 = 4_000.0;
pub const DEFAULT_PULLED_BACK_RATIO: f64 = 0.5;
// Minimum spacing between two engage edges; releases are never gated.
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;

/// Immutable trigger tuning, validated once at startup.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TriggerConfig {
    threshold: f64,
    pulled_back_ratio: Option<f64>,
    debounce_ms: u64,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            pulled_back_ratio: Some(DEFAULT_PULLED_BACK_RATIO),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }
}

impl TriggerConfig {
    pub fn new(
        threshold: f64,
        pulled_back_ratio: Option<f64>,
        debounce: Duration,
    ) -> Result<Self, ConfigError> {
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "trigger threshold must be a positive number, got {threshold}"
            )));
        }
        if let Some(ratio) = pulled_back_ratio {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(ConfigError::Invalid(format!(
                    "pulled_back_ratio must be within (0, 1], got {ratio}"
                )));
            }
        }
        let debounce_ms = u64::try_from(debounce.as_millis()).map_err(|_| {
            ConfigError::Invalid(format!("debounce of {debounce:?} is out of range"))
        })?;

        Ok(Self {
            threshold,
            pulled_back_ratio,
            debounce_ms,
        })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn pulled_back_ratio(&self) -> Option<f64> {
        self.pulled_back_ratio
    }

    /// Intensity above which an idle bow is shown as pulled back.
    pub fn pulled_back_level(&self) -> Option<f64> {
        self.pulled_back_ratio.map(|ratio| self.threshold * ratio)
    }

    pub fn debounce_ms(&self) -> u64 {
        self.debounce_ms
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_rig_tuning() {
        let config = TriggerConfig::default();
        assert_eq!(config.threshold(), 4_000.0);
        assert_eq!(config.pulled_back_level(), Some(2_000.0));
        assert_eq!(config.debounce(), Duration::from_millis(500));
    }

    #[test]
    fn rejects_non_positive_threshold() {
        assert!(TriggerConfig::new(0.0, None, Duration::ZERO).is_err());
        assert!(TriggerConfig::new(-10.0, None, Duration::ZERO).is_err());
        assert!(TriggerConfig::new(f64::NAN, None, Duration::ZERO).is_err());
    }

    #[test]
    fn rejects_ratio_outside_unit_interval() {
        for ratio in [0.0, -0.5, 1.01, f64::NAN] {
            assert!(
                TriggerConfig::new(100.0, Some(ratio), Duration::ZERO).is_err(),
                "ratio {ratio} should be rejected"
            );
        }
        assert!(TriggerConfig::new(100.0, Some(1.0), Duration::ZERO).is_ok());
    }

    #[test]
    fn disabled_ratio_has_no_pulled_back_level() {
        let config =
            TriggerConfig::new(100.0, None, Duration::from_millis(20)).expect("valid config");
        assert_eq!(config.pulled_back_level(), None);
        assert_eq!(config.debounce_ms(), 20);
    }
}

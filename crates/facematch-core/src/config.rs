use serde::Deserialize;
use thiserror::Error;

const DEFAULT_DIMENSION: usize = 128;
const DEFAULT_TOLERANCE: f32 = 0.6;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("embedding dimension must be at least 1")]
    ZeroDimension,
    #[error("tolerance must be a finite, non-negative distance (got {0})")]
    InvalidTolerance(f32),
}

/// Matching parameters fixed at startup and shared by reference.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Number of components every embedding must have.
    pub dimension: usize,
    /// Maximum Euclidean distance still counted as a match.
    pub tolerance: f32,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            dimension: DEFAULT_DIMENSION,
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

impl MatchConfig {
    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.dimension == 0 {
            return Err(ConfigError::ZeroDimension);
        }
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(ConfigError::InvalidTolerance(self.tolerance));
        }
        Ok(self)
    }

    /// `requested` if it is a usable tolerance, otherwise the configured one.
    pub fn tolerance_or_default(&self, requested: f32) -> f32 {
        if requested.is_finite() && requested > 0.0 {
            requested
        } else {
            self.tolerance
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = MatchConfig::default().validate().unwrap();
        assert_eq!(config.dimension, 128);
        assert!((config.tolerance - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero = MatchConfig { dimension: 0, tolerance: 0.6 };
        assert_eq!(zero.validate(), Err(ConfigError::ZeroDimension));

        let negative = MatchConfig { dimension: 128, tolerance: -0.1 };
        assert!(matches!(negative.validate(), Err(ConfigError::InvalidTolerance(_))));

        let nan = MatchConfig { dimension: 128, tolerance: f32::NAN };
        assert!(matches!(nan.validate(), Err(ConfigError::InvalidTolerance(_))));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: MatchConfig = serde_json::from_str(r#"{"dimension": 512}"#).unwrap();
        assert_eq!(config.dimension, 512);
        assert!((config.tolerance - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_tolerance_or_default() {
        let config = MatchConfig::default();
        assert_eq!(config.tolerance_or_default(1.5), 1.5);
        assert_eq!(config.tolerance_or_default(0.0), config.tolerance);
        assert_eq!(config.tolerance_or_default(-2.0), config.tolerance);
    }
}

/// Engine configuration — every tunable of the sampling models, the
/// predictor and the generator in one place, loadable from RON.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Defaults and thresholds used by the duration and level samplers and
/// by the timecode formatter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Minimum number of duration samples before kernel density estimation
    /// is used instead of the Normal fallback. A smoothing heuristic.
    pub kde_min_samples: usize,
    /// Duration sample list used for elements with no observations.
    pub default_duration: f64,
    /// Lower clamp for every sampled duration, in seconds.
    pub min_duration: f64,
    /// Floor for the standard deviation (and KDE bandwidth).
    pub std_floor: f64,
    /// Level returned for elements with no level counts.
    pub default_level: String,
    /// Frames per second of the emitted timecodes.
    pub frame_rate: u32,
    /// Sample duration/level for repeats from the base element's statistics
    /// instead of the repeat-marked identity.
    pub repeat_uses_base_statistics: bool,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            kde_min_samples: 5,
            default_duration: 3.0,
            min_duration: 1.0,
            std_floor: 0.1,
            default_level: "NV1".to_string(),
            frame_rate: 24,
            repeat_uses_base_statistics: false,
        }
    }
}

/// Shape and training budget of the neural transition predictor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    pub embedding_dim: usize,
    pub hidden_dim: usize,
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f32,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            embedding_dim: 10,
            hidden_dim: 64,
            epochs: 200,
            batch_size: 32,
            learning_rate: 0.01,
        }
    }
}

/// Where the next base element comes from on a non-repeat step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransitionSource {
    /// Sample from the neural predictor's output distribution.
    #[default]
    Neural,
    /// Sample from the element→element transition counts.
    Markov,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub sampling: SamplingConfig,
    pub predictor: PredictorConfig,
    pub transition_source: TransitionSource,
}

impl EngineConfig {
    /// Parse a configuration from a RON string. Missing fields keep their
    /// defaults.
    pub fn parse_ron(input: &str) -> Result<EngineConfig, ConfigError> {
        let config: EngineConfig = ron::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a RON file.
    pub fn load_from_ron(path: &Path) -> Result<EngineConfig, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.sampling;
        if s.frame_rate == 0 {
            return Err(ConfigError::Invalid("frame_rate must be positive".into()));
        }
        if !(s.min_duration.is_finite() && s.min_duration > 0.0) {
            return Err(ConfigError::Invalid("min_duration must be positive".into()));
        }
        if !(s.default_duration.is_finite() && s.default_duration > 0.0) {
            return Err(ConfigError::Invalid(
                "default_duration must be positive".into(),
            ));
        }
        if !(s.std_floor.is_finite() && s.std_floor > 0.0) {
            return Err(ConfigError::Invalid("std_floor must be positive".into()));
        }
        if s.kde_min_samples < 2 {
            return Err(ConfigError::Invalid(
                "kde_min_samples must be at least 2".into(),
            ));
        }
        let p = &self.predictor;
        if p.embedding_dim == 0 || p.hidden_dim == 0 || p.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "predictor dimensions and batch size must be positive".into(),
            ));
        }
        if p.epochs == 0 {
            return Err(ConfigError::Invalid("epochs must be positive".into()));
        }
        if !(p.learning_rate.is_finite() && p.learning_rate > 0.0) {
            return Err(ConfigError::Invalid("learning_rate must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.sampling.kde_min_samples, 5);
        assert_eq!(config.sampling.default_duration, 3.0);
        assert_eq!(config.sampling.default_level, "NV1");
        assert_eq!(config.sampling.frame_rate, 24);
        assert_eq!(config.transition_source, TransitionSource::Neural);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_partial_ron() {
        let config = EngineConfig::parse_ron(
            "(sampling: (kde_min_samples: 8), predictor: (epochs: 10), transition_source: Markov)",
        )
        .unwrap();
        assert_eq!(config.sampling.kde_min_samples, 8);
        assert_eq!(config.sampling.std_floor, 0.1);
        assert_eq!(config.predictor.epochs, 10);
        assert_eq!(config.predictor.hidden_dim, 64);
        assert_eq!(config.transition_source, TransitionSource::Markov);
    }

    #[test]
    fn rejects_zero_frame_rate() {
        let result = EngineConfig::parse_ron("(sampling: (frame_rate: 0))");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_zero_epochs() {
        let result = EngineConfig::parse_ron("(predictor: (epochs: 0))");
        assert!(matches!(result, Err(ConfigError::Invalid(msg)) if msg.contains("epochs")));

        let mut config = EngineConfig::default();
        config.predictor.epochs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn ron_round_trip() {
        let config = EngineConfig::default();
        let serialized = ron::to_string(&config).unwrap();
        let parsed = EngineConfig::parse_ron(&serialized).unwrap();
        assert_eq!(parsed, config);
    }
}

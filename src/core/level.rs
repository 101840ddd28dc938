/// Discrete-level (NV) sampler.

use rand::Rng;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::core::config::SamplingConfig;
use crate::core::transitions::Categorical;

#[derive(Debug, Error)]
pub enum LevelError {
    #[error("level counts for known element '{0}' sum to zero")]
    ZeroCounts(String),
}

/// Per-element categorical distributions over level labels.
#[derive(Debug, Clone)]
pub struct LevelSampler {
    distributions: FxHashMap<String, Option<Categorical<String>>>,
    default_level: String,
}

impl LevelSampler {
    pub fn fit(
        levels: &FxHashMap<String, FxHashMap<String, u32>>,
        config: &SamplingConfig,
    ) -> LevelSampler {
        let distributions = levels
            .iter()
            .map(|(element, counts)| {
                let dist = Categorical::from_counts(counts.iter().map(|(l, c)| (l.clone(), *c)));
                (element.clone(), dist)
            })
            .collect();
        LevelSampler {
            distributions,
            default_level: config.default_level.clone(),
        }
    }

    /// Sample a level for `element`. Unknown elements always yield the
    /// default level.
    pub fn sample<R: Rng + ?Sized>(&self, element: &str, rng: &mut R) -> Result<String, LevelError> {
        match self.distributions.get(element) {
            None => Ok(self.default_level.clone()),
            Some(Some(dist)) => dist
                .sample(rng)
                .ok_or_else(|| LevelError::ZeroCounts(element.to_string())),
            Some(None) => Err(LevelError::ZeroCounts(element.to_string())),
        }
    }
}

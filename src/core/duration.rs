/// Duration model — per-element sampling of scene durations.
///
/// Elements with few observations draw from a Normal fitted to the sample
/// mean and standard deviation; elements with at least
/// `SamplingConfig::kde_min_samples` observations draw from a Gaussian
/// kernel density estimate. Every draw is clamped to
/// `SamplingConfig::min_duration`.

use rand::Rng;
use rand_distr::{Distribution, Normal};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::core::config::SamplingConfig;

/// A fitted sampler for one element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DurationSampler {
    /// Parametric fallback for sparse data.
    Normal { mean: f64, std_dev: f64 },
    /// Gaussian KDE: pick an observation uniformly, add kernel noise.
    Kde { samples: Vec<f64>, bandwidth: f64 },
}

impl DurationSampler {
    /// Fit a sampler to a set of observations.
    pub fn fit(samples: &[f64], config: &SamplingConfig) -> DurationSampler {
        let samples: Vec<f64> = samples.iter().copied().filter(|d| d.is_finite()).collect();
        if samples.is_empty() {
            return Self::fit(&[config.default_duration], config);
        }

        if samples.len() < config.kde_min_samples {
            let mean = mean(&samples);
            let std_dev = population_std(&samples, mean).max(config.std_floor);
            return DurationSampler::Normal { mean, std_dev };
        }

        // Scott's rule: sample std (ddof = 1) scaled by n^(-1/5).
        let n = samples.len() as f64;
        let m = mean(&samples);
        let sample_std = (samples.iter().map(|d| (d - m).powi(2)).sum::<f64>() / (n - 1.0)).sqrt();
        let bandwidth = sample_std * n.powf(-0.2);
        let bandwidth = if bandwidth.is_finite() && bandwidth > 0.0 {
            bandwidth
        } else {
            config.std_floor
        };
        DurationSampler::Kde { samples, bandwidth }
    }

    pub fn is_kde(&self) -> bool {
        matches!(self, DurationSampler::Kde { .. })
    }

    /// Draw one duration, clamped to `min_duration`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R, min_duration: f64) -> f64 {
        let raw = match self {
            DurationSampler::Normal { mean, std_dev } => draw_normal(*mean, *std_dev, rng),
            DurationSampler::Kde { samples, bandwidth } => {
                let center = samples[rng.gen_range(0..samples.len())];
                draw_normal(center, *bandwidth, rng)
            }
        };
        if raw.is_finite() {
            raw.max(min_duration)
        } else {
            min_duration
        }
    }
}

fn draw_normal<R: Rng + ?Sized>(mean: f64, std_dev: f64, rng: &mut R) -> f64 {
    match Normal::new(mean, std_dev) {
        Ok(normal) => normal.sample(rng),
        Err(_) => mean,
    }
}

fn mean(samples: &[f64]) -> f64 {
    samples.iter().sum::<f64>() / samples.len() as f64
}

fn population_std(samples: &[f64], mean: f64) -> f64 {
    let var = samples.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / samples.len() as f64;
    var.sqrt()
}

/// Fitted duration samplers for every known element.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DurationModel {
    samplers: FxHashMap<String, DurationSampler>,
    fallback: DurationSampler,
    min_duration: f64,
}

impl DurationModel {
    pub fn fit(durations: &FxHashMap<String, Vec<f64>>, config: &SamplingConfig) -> DurationModel {
        let samplers = durations
            .iter()
            .map(|(element, samples)| (element.clone(), DurationSampler::fit(samples, config)))
            .collect();
        DurationModel {
            samplers,
            fallback: DurationSampler::fit(&[config.default_duration], config),
            min_duration: config.min_duration,
        }
    }

    /// The sampler used for `element`; unknown elements get the default.
    pub fn sampler(&self, element: &str) -> &DurationSampler {
        self.samplers.get(element).unwrap_or(&self.fallback)
    }

    pub fn is_known(&self, element: &str) -> bool {
        self.samplers.contains_key(element)
    }

    /// Sample a duration in seconds for `element`. Always ≥ `min_duration`.
    pub fn sample<R: Rng + ?Sized>(&self, element: &str, rng: &mut R) -> f64 {
        self.sampler(element).sample(rng, self.min_duration)
    }
}

/// Corpus statistics — a single forward pass over every trailer producing
/// the count tables, samples and distributions the generator draws from.

use rand::Rng;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::transitions::{Categorical, TransitionTable};
use crate::schema::scene::{Context, Corpus};

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("corpus contains no trailers with scenes")]
    EmptyCorpus,
}

/// A repeat-marked scene whose base does not match the preceding scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepeatInconsistency {
    pub trailer: usize,
    pub position: usize,
    pub element: String,
    /// Base element of the preceding scene, `None` for a first scene.
    pub previous: Option<String>,
}

/// Everything the statistics pass learns from a corpus.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorpusStatistics {
    pub context_transitions: TransitionTable<Context>,
    pub element_transitions: TransitionTable<String>,
    /// Observed durations per base element.
    pub durations: FxHashMap<String, Vec<f64>>,
    /// Level label counts per base element.
    pub levels: FxHashMap<String, FxHashMap<String, u32>>,
    /// Probability that a transition away from the element is a valid
    /// repeat. Absent for elements never followed by another scene.
    pub repeat_probability: FxHashMap<String, f64>,
    /// First-scene context distribution; `None` when no trailer had scenes.
    pub initial_contexts: Option<Categorical<Context>>,
    /// First-scene element distribution.
    pub initial_elements: Option<Categorical<String>>,
    /// Element selected from `initial_elements` when the pass finished.
    pub initial_element: Option<String>,
    pub inconsistencies: Vec<RepeatInconsistency>,
}

impl CorpusStatistics {
    /// Run the statistics pass. `rng` is used only to select the initial
    /// element from the first-scene distribution.
    pub fn build<R: Rng + ?Sized>(
        corpus: &Corpus,
        rng: &mut R,
    ) -> Result<CorpusStatistics, StatsError> {
        let mut stats = CorpusStatistics::default();
        let mut initial_context_counts: FxHashMap<Context, u32> = FxHashMap::default();
        let mut initial_element_counts: FxHashMap<String, u32> = FxHashMap::default();
        let mut repeat_labels: FxHashMap<String, (u32, u32)> = FxHashMap::default();

        for (t, trailer) in corpus.trailers.iter().enumerate() {
            let Some(first) = trailer.scenes.first() else {
                continue;
            };
            *initial_context_counts.entry(first.context).or_insert(0) += 1;
            *initial_element_counts
                .entry(first.base_element().to_string())
                .or_insert(0) += 1;
            if first.is_repeat_marked() {
                stats.flag_inconsistency(t, 0, &first.element, None);
            }

            for (i, pair) in trailer.scenes.windows(2).enumerate() {
                let (prev, scene) = (&pair[0], &pair[1]);
                let position = i + 1;
                let prev_base = prev.base_element();
                let base = scene.base_element();

                stats.context_transitions.record(prev.context, scene.context);
                stats.record_observation(base, scene.duration, &scene.level);
                stats
                    .element_transitions
                    .record(prev_base.to_string(), base.to_string());

                if scene.is_repeat_marked() && prev_base != base {
                    stats.flag_inconsistency(t, position, &scene.element, Some(prev_base));
                }

                // (repeats, transitions) per previous element
                let entry = repeat_labels.entry(prev_base.to_string()).or_insert((0, 0));
                if prev_base == base && scene.is_repeat_marked() {
                    entry.0 += 1;
                }
                entry.1 += 1;
            }
        }

        if initial_element_counts.is_empty() {
            return Err(StatsError::EmptyCorpus);
        }

        stats.repeat_probability = repeat_labels
            .into_iter()
            .map(|(element, (repeats, total))| (element, repeats as f64 / total as f64))
            .collect();
        stats.initial_contexts = Categorical::from_counts(initial_context_counts);
        stats.initial_elements = Categorical::from_counts(initial_element_counts);
        stats.initial_element = stats.initial_elements.as_ref().and_then(|d| d.sample(rng));

        debug!(
            elements = stats.durations.len(),
            inconsistencies = stats.inconsistencies.len(),
            initial_element = ?stats.initial_element,
            "corpus statistics built"
        );
        Ok(stats)
    }

    /// Repetition probability with the 0.0 default for unseen elements.
    pub fn repeat_probability_or_default(&self, element: &str) -> f64 {
        self.repeat_probability.get(element).copied().unwrap_or(0.0)
    }

    /// Level distribution for an element, `None` if unknown or zero-total.
    pub fn level_distribution(&self, element: &str) -> Option<Categorical<String>> {
        let counts = self.levels.get(element)?;
        Categorical::from_counts(counts.iter().map(|(l, c)| (l.clone(), *c)))
    }

    fn record_observation(&mut self, base: &str, duration: f64, level: &str) {
        self.durations
            .entry(base.to_string())
            .or_default()
            .push(duration);
        *self
            .levels
            .entry(base.to_string())
            .or_default()
            .entry(level.to_string())
            .or_insert(0) += 1;
    }

    fn flag_inconsistency(
        &mut self,
        trailer: usize,
        position: usize,
        element: &str,
        previous: Option<&str>,
    ) {
        warn!(
            trailer,
            position,
            element,
            previous = previous.unwrap_or("<none>"),
            "repeat marker does not match the preceding element; using the base element as recorded"
        );
        self.inconsistencies.push(RepeatInconsistency {
            trailer,
            position,
            element: element.to_string(),
            previous: previous.map(str::to_string),
        });
    }
}

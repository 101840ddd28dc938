/// Sparse transition counts and categorical distributions derived from them.

use rand::distributions::WeightedIndex;
use rand::prelude::Distribution;
use rand::Rng;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::hash::Hash;

/// A normalized probability table over a finite set of outcomes.
///
/// The constructors never build an empty table: a zero-total count table
/// has no `Categorical` at all. A deserialized table may still be empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Categorical<S> {
    outcomes: Vec<(S, f64)>,
}

impl<S: Clone + Ord> Categorical<S> {
    /// Normalize `(outcome, count)` pairs. Returns `None` when the total
    /// is zero. Outcomes are sorted so sampling is reproducible.
    pub fn from_counts<I>(counts: I) -> Option<Categorical<S>>
    where
        I: IntoIterator<Item = (S, u32)>,
    {
        let mut pairs: Vec<(S, u32)> = counts.into_iter().filter(|(_, c)| *c > 0).collect();
        let total: u64 = pairs.iter().map(|(_, c)| *c as u64).sum();
        if total == 0 {
            return None;
        }
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        let outcomes = pairs
            .into_iter()
            .map(|(s, c)| (s, c as f64 / total as f64))
            .collect();
        Some(Categorical { outcomes })
    }

    /// Build from explicit probabilities (e.g., a softmax output).
    /// Non-finite and negative weights are dropped; returns `None` when no
    /// positive mass remains.
    pub fn from_weights<I>(weights: I) -> Option<Categorical<S>>
    where
        I: IntoIterator<Item = (S, f64)>,
    {
        let pairs: Vec<(S, f64)> = weights
            .into_iter()
            .filter(|(_, w)| w.is_finite() && *w > 0.0)
            .collect();
        let total: f64 = pairs.iter().map(|(_, w)| w).sum();
        if total <= 0.0 {
            return None;
        }
        let outcomes = pairs.into_iter().map(|(s, w)| (s, w / total)).collect();
        Some(Categorical { outcomes })
    }

    pub fn probability(&self, outcome: &S) -> f64 {
        self.outcomes
            .iter()
            .find(|(s, _)| s == outcome)
            .map(|(_, p)| *p)
            .unwrap_or(0.0)
    }

    pub fn outcomes(&self) -> &[(S, f64)] {
        &self.outcomes
    }

    pub fn total(&self) -> f64 {
        self.outcomes.iter().map(|(_, p)| p).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Draw one outcome according to the table. `None` if the table has
    /// no usable mass.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<S> {
        let weights: Vec<f64> = self.outcomes.iter().map(|(_, p)| *p).collect();
        let dist = WeightedIndex::new(&weights).ok()?;
        self.outcomes.get(dist.sample(rng)).map(|(s, _)| s.clone())
    }
}

/// Source state → (destination state → count).
///
/// Absent keys read as zero. A row with zero total mass has no
/// distribution; callers choose the fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionTable<S: Eq + Hash> {
    rows: FxHashMap<S, FxHashMap<S, u32>>,
}

impl<S: Eq + Hash> Default for TransitionTable<S> {
    fn default() -> Self {
        Self {
            rows: FxHashMap::default(),
        }
    }
}

impl<S: Clone + Eq + Hash + Ord> TransitionTable<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment the count of `from → to`.
    pub fn record(&mut self, from: S, to: S) {
        *self.rows.entry(from).or_default().entry(to).or_insert(0) += 1;
    }

    pub fn count(&self, from: &S, to: &S) -> u32 {
        self.rows
            .get(from)
            .and_then(|row| row.get(to))
            .copied()
            .unwrap_or(0)
    }

    pub fn row_total(&self, from: &S) -> u64 {
        self.rows
            .get(from)
            .map(|row| row.values().map(|&c| c as u64).sum())
            .unwrap_or(0)
    }

    /// Normalized distribution over destinations of `from`, or `None` if
    /// the row is absent or has zero total.
    pub fn distribution(&self, from: &S) -> Option<Categorical<S>> {
        let row = self.rows.get(from)?;
        Categorical::from_counts(row.iter().map(|(s, c)| (s.clone(), *c)))
    }

    /// Sample a destination from `from`'s row.
    pub fn sample<R: Rng + ?Sized>(&self, from: &S, rng: &mut R) -> Option<S> {
        self.distribution(from).and_then(|d| d.sample(rng))
    }

    /// Source states with at least one recorded transition.
    pub fn sources(&self) -> impl Iterator<Item = &S> {
        self.rows.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

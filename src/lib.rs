//! Trailer Engine — scene-sequence generation for trailers.
//!
//! Learns context and element transition statistics, per-element duration
//! densities and level frequencies from a corpus of trailers, trains a small
//! neural transition predictor, and samples new scene sequences with
//! repetition handling and frame-based timecodes.

pub mod core;
pub mod schema;

pub use crate::core::config::EngineConfig;
pub use crate::core::pipeline::{EngineError, TrailerEngine, TrailerModel};
pub use crate::schema::generated::{GeneratedScene, GeneratedTrailer};
pub use crate::schema::scene::{Context, Corpus, SceneRecord, Trailer};

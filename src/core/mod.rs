//! Training and generation: statistics, samplers, predictor and the
//! generation pipeline.

pub mod config;
pub mod duration;
pub mod level;
pub mod pipeline;
pub mod predictor;
pub mod repetition;
pub mod stats;
pub mod timecode;
pub mod transitions;
pub mod vocabulary;

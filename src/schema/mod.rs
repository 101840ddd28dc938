//! Input records, corpus documents and generated output.

pub mod generated;
pub mod scene;

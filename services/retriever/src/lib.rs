//! Methane plume retrieval service.
//!
//! Wires the imagery source, the MBSP signal and the column inversion into a
//! single run driven by [`RetrieverConfig`], and writes the resulting rasters
//! for downstream visualisation.

pub mod config;
pub mod output;
pub mod pipeline;

pub use config::{ConfigOverrides, RetrieverConfig};
pub use output::{write_outputs, OutputFiles};
pub use pipeline::{PassSignal, Pipeline, RetrievalRun};

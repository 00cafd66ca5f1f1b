//! Core pipeline logic: normalization, alignment, panel assembly and correlation

pub mod align;
pub mod config;
pub mod correlation;
pub mod error;
pub mod forecast;
pub mod log;
pub mod normalize;
pub mod panel;
pub mod pipeline;
pub mod series;
pub mod source;
pub mod store;

// Re-export main types for cleaner imports
pub use error::{PipelineError, Result};
pub use series::{DataSource, RawObservation, SeriesTable};
pub use source::{RawExtract, SourceFetcher};
pub use store::SeriesStore;

//! Run analysis and file export

pub mod logger;
pub mod metrics;

pub use logger::{format_summary, print_summary, SimulationLogger};
pub use metrics::{AnalysisReport, ResultsAggregator};

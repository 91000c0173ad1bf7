pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod logging;
pub mod outlet;
pub mod pipeline;
pub mod rag;
pub mod region;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use error::{PipelineError, PipelineResult};
pub use pipeline::{QueryInput, QueryOutcome, QueryPipeline};

pub mod types;
pub mod envelope;
pub mod repair;
pub mod decoder;
pub mod partial;
pub mod classify;
pub mod mapper;
pub mod orchestrator;

#[cfg(test)]
mod pipeline_tests;

pub use types::*;
pub use envelope::*;
pub use repair::*;
pub use decoder::*;
pub use partial::*;
pub use classify::*;
pub use mapper::*;
pub use orchestrator::*;

use thiserror::Error;

/// Terminal decode failures. Every other anomaly degrades to a fallback tier.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Provider reported an error: {message}")]
    Upstream { message: String },

    #[error("Unrecognized response format: {0}")]
    UnrecognizedFormat(String),
}

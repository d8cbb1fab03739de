pub mod config;
pub mod error;
pub mod types;

pub use config::FvltConfig;
pub use error::{FvltError, FvltResult};
pub use types::{VerificationResult, VerificationSummary};

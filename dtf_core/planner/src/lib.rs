pub mod analyzer;
pub mod error;

pub use analyzer::Analyzer;
pub use error::{ClauseRole, PlanError};

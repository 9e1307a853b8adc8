/// Core Module for querylog
///
/// Shared infrastructure for the query context: the error type, the error
/// chain it accumulates, and the database layer itself.

pub mod chain;
pub mod db;
pub mod error;

// Re-export commonly used types for convenience
pub use chain::{ErrorChain, ErrorLink};
pub use error::{QueryError, Result};

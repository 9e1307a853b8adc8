// Core infrastructure modules
pub mod core;

// Configuration and output
pub mod config;
pub mod sink;

pub use crate::config::QueryConfig;
pub use crate::core::db::{Cursor, Diagnostic, ExecResult, FromRow, LogRecord, QueryContext};
pub use crate::core::{ErrorChain, ErrorLink, QueryError, Result};
pub use crate::sink::{LogSink, MemorySink, TracingSink, WriterSink};

#[cfg(test)]
mod test_utils;

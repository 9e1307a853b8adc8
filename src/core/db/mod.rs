/// Database Module
///
/// The query context and the pieces it is built from.
///
/// ## Architecture
///
/// - **Cursor** (`cursor.rs`): owned forward-only row cursor and row decoding
/// - **Context** (`context.rs`): transaction lifecycle, statement execution,
///   cursor consumption and the step log
/// - **Report** (`report.rs`): rendering and flushing of accumulated diagnostics
///
/// ## Error Handling
///
/// Steps never return errors directly. Failures are pushed onto the context's
/// `ErrorChain` and surfaced through `ok`, `log_now`, `error_string` and
/// friends.
pub mod context;
pub mod cursor;
pub mod report;

pub use context::*;
pub use cursor::*;
pub use report::*;

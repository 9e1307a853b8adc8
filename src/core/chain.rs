/// Error Chain Module
///
/// An `ErrorChain` keeps every failure a query context ran into. Links live in
/// an index arena; each new link becomes the head and points at the previous
/// head as its cause, so walking `cause` from the head ends at the first
/// failure.
use crate::core::QueryError;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt;

/// One failure record in an `ErrorChain`.
#[derive(Debug)]
pub struct ErrorLink {
    context: String,
    error: QueryError,
    cause: Option<usize>,
    trace: Option<Backtrace>,
}

impl ErrorLink {
    /// Context fragment supplied with the push (method name, arguments)
    pub fn context(&self) -> &str {
        &self.context
    }

    /// The concrete error carried by this link
    pub fn error(&self) -> &QueryError {
        &self.error
    }

    /// Arena index of the link this one wraps
    pub fn cause(&self) -> Option<usize> {
        self.cause
    }

    /// Backtrace captured at push time, when `RUST_BACKTRACE` enabled capture
    pub fn trace(&self) -> Option<&Backtrace> {
        self.trace.as_ref()
    }

    /// Renders `context: error`, or just the error for an empty context
    pub fn message(&self) -> String {
        if self.context.is_empty() {
            self.error.to_string()
        } else {
            format!("{}: {}", self.context, self.error)
        }
    }
}

/// Ordered chain of wrapped failures. Empty means no error has occurred.
#[derive(Debug, Default)]
pub struct ErrorChain {
    links: Vec<ErrorLink>,
}

impl ErrorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Wraps the current chain in a new head link.
    ///
    /// A `None` error is recorded as `QueryError::Nil` so the chain never has a
    /// link without a cause value.
    pub fn push(&mut self, err: impl Into<Option<QueryError>>, context: impl Into<String>) {
        let trace = Backtrace::capture();
        let trace = match trace.status() {
            BacktraceStatus::Captured => Some(trace),
            _ => None,
        };
        self.push_link(err.into(), context.into(), trace);
    }

    /// `push` with an explicit trace, independent of `RUST_BACKTRACE`
    #[cfg(test)]
    pub(crate) fn push_with_trace(
        &mut self,
        err: QueryError,
        context: &str,
        trace: Option<Backtrace>,
    ) {
        self.push_link(Some(err), context.to_string(), trace);
    }

    fn push_link(&mut self, err: Option<QueryError>, context: String, trace: Option<Backtrace>) {
        let link = ErrorLink {
            context,
            error: err.unwrap_or(QueryError::Nil),
            cause: self.head_index(),
            trace,
        };
        self.links.push(link);
    }

    /// The most recent link
    pub fn head(&self) -> Option<&ErrorLink> {
        self.head_index().map(|i| &self.links[i])
    }

    /// The link with no further cause, i.e. the first failure
    pub fn root(&self) -> Option<&ErrorLink> {
        self.iter().last()
    }

    /// Concrete error of the first failure
    pub fn root_cause(&self) -> Option<&QueryError> {
        self.root().map(ErrorLink::error)
    }

    /// Walks the chain newest first by following cause links
    pub fn iter(&self) -> Links<'_> {
        Links {
            chain: self,
            next: self.head_index(),
        }
    }

    pub fn clear(&mut self) {
        self.links.clear();
    }

    fn head_index(&self) -> Option<usize> {
        self.links.len().checked_sub(1)
    }
}

/// Iterator over an `ErrorChain`, newest link first.
pub struct Links<'a> {
    chain: &'a ErrorChain,
    next: Option<usize>,
}

impl<'a> Iterator for Links<'a> {
    type Item = &'a ErrorLink;

    fn next(&mut self) -> Option<Self::Item> {
        let link = self.chain.links.get(self.next?)?;
        self.next = link.cause;
        Some(link)
    }
}

impl fmt::Display for ErrorChain {
    /// One line per link, newest first; every line after the first is marked
    /// as the cause of the line above it.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (depth, link) in self.iter().enumerate() {
            writeln!(f, "{}", chain_line(depth, &link.message()))?;
        }
        Ok(())
    }
}

/// `#0 <message>` for the head, `#n caused by <message>` below it
pub(crate) fn chain_line(depth: usize, message: &str) -> String {
    if depth == 0 {
        format!("#{} {}", depth, message)
    } else {
        format!("#{} caused by {}", depth, message)
    }
}

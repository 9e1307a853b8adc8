/// Diagnostics Module
///
/// Renders what a `QueryContext` accumulated (SQL text, step log, error chain
/// and the trace of the first failure) for humans and for alerting hooks,
/// and flushes it to the context's log sink.

use crate::core::chain::{chain_line, ErrorLink};
use crate::core::db::context::{LogRecord, QueryContext};
use crate::core::{QueryError, Result};
use chrono::Utc;
use serde::Serialize;
use std::fmt::Write;
use tracing::info;

/// Appended inside a fence right before it closes so embedded backticks
/// cannot end the block early.
pub const FENCE_SENTINEL: char = '\u{200B}';

/// Snapshot of a context's diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub context_id: String,
    /// RFC 3339 time the snapshot was taken
    pub captured_at: String,
    pub sql: String,
    pub log: Vec<String>,
    /// Link messages, newest first; the last one is the root cause
    pub errors: Vec<String>,
    /// Message of the root cause's concrete error
    pub cause: Option<String>,
    /// Backtrace of the first failure, when one was captured
    pub trace: Option<String>,
}

impl Diagnostic {
    fn capture(ctx: &QueryContext<'_>) -> Self {
        let root = ctx.errors.root();
        Diagnostic {
            context_id: ctx.id().to_string(),
            captured_at: Utc::now().to_rfc3339(),
            sql: ctx.sql().to_string(),
            log: ctx.log.iter().map(LogRecord::to_string).collect(),
            errors: ctx.errors.iter().map(ErrorLink::message).collect(),
            cause: root.map(|link| link.error().to_string()),
            trace: root.and_then(ErrorLink::trace).map(|trace| trace.to_string()),
        }
    }

    /// Plain text block with `=== NAME ===` / `... NAME ...` delimited
    /// sections. Empty sections are left out.
    pub fn render_text(&self) -> String {
        let errors: Vec<String> = self
            .errors
            .iter()
            .enumerate()
            .map(|(depth, message)| chain_line(depth, message))
            .collect();

        let mut out = String::new();
        push_section(&mut out, "SQL", &self.sql);
        push_section(&mut out, "LOG", &self.log.join("\n"));
        push_section(&mut out, "ERRORS", &errors.join("\n"));
        if let Some(trace) = &self.trace {
            push_section(&mut out, "TRACE", trace);
        }
        out
    }

    /// Chat-flavoured rendering: SQL fence, summary line, log fence and a
    /// trailing quoted root-cause line.
    pub fn render_chat(&self) -> String {
        let mut out = String::new();
        push_fence(&mut out, "sql", &self.sql);
        if let Some(head) = self.errors.first() {
            let _ = writeln!(out, "**Query failed** ({} error(s)): {}", self.errors.len(), head);
        }
        push_fence(&mut out, "", &self.log.join("\n"));
        if let Some(cause) = &self.cause {
            let _ = write!(out, "> error: \"{}\"", cause);
        }
        out
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn push_section(out: &mut String, name: &str, body: &str) {
    let body = body.trim_end_matches('\n');
    if body.is_empty() {
        return;
    }
    let _ = writeln!(out, "=== {} ===\n{}\n... {} ...", name, body, name);
}

fn push_fence(out: &mut String, lang: &str, body: &str) {
    let _ = writeln!(out, "```{}\n{}{}\n```", lang, body, FENCE_SENTINEL);
}

impl QueryContext<'_> {
    /// Snapshot of the diagnostics, `None` while the context is healthy
    pub fn diagnostic(&self) -> Option<Diagnostic> {
        if self.ok() {
            None
        } else {
            Some(Diagnostic::capture(self))
        }
    }

    /// SQL text, step log, error chain (newest first) and the trace of the
    /// first failure as one printable block.
    pub fn error_stack(&self) -> String {
        Diagnostic::capture(self).render_text()
    }

    /// `error_stack`, or an empty string while the context is healthy
    pub fn error_string(&self) -> String {
        self.diagnostic()
            .map(|diagnostic| diagnostic.render_text())
            .unwrap_or_default()
    }

    /// Chat-message rendering, or an empty string while the context is healthy
    pub fn error_chat_message(&self) -> String {
        self.diagnostic()
            .map(|diagnostic| diagnostic.render_chat())
            .unwrap_or_default()
    }

    /// Writes the diagnostics to the log sink if anything failed.
    ///
    /// Returns `QueryError::Failed` carrying the newest link's message so the
    /// caller can propagate it with `?`.
    pub fn log_now(&self) -> Result<()> {
        let Some(head) = self.errors.head() else {
            return Ok(());
        };
        info!(context = %self.id(), errors = self.errors.len(), "flushing query diagnostics");
        self.sink().write_text(&self.error_stack());
        Err(QueryError::Failed(head.message()))
    }

    /// `log_now`, then panics if anything failed.
    pub fn panic_errors(&self) {
        if let Err(err) = self.log_now() {
            panic!("{}", err);
        }
    }
}

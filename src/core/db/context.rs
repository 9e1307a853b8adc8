/// Query Context Module
///
/// `QueryContext` wraps a borrowed SQLite connection and drives one unit of
/// work through begin → prepare → exec/query → scan → close →
/// commit-or-rollback. Each step is logged and every failure is pushed onto
/// the context's `ErrorChain`. After the first failure every data-access step
/// becomes a no-op; `close` and the rollback path still run.

use crate::config::QueryConfig;
use crate::core::chain::ErrorChain;
use crate::core::db::cursor::{Cursor, FromRow};
use crate::core::QueryError;
use crate::sink::LogSink;
use rusqlite::{Connection, Params, Statement, Transaction, TransactionBehavior};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Outcome of a successful `Stmt.Exec` step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecResult {
    /// Rows changed by the statement
    pub rows_affected: usize,
    /// `last_insert_rowid()` of the connection right after the statement ran
    pub last_insert_id: i64,
}

/// One entry of the step log
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecord {
    /// SQL text logged before a prepare
    Sql(String),
    /// Outcome line of a step, e.g. `Stmt.Exec // ok`
    Step(String),
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogRecord::Sql(sql) => write!(f, "-- SQL code:\n{}", sql),
            LogRecord::Step(line) => f.write_str(line),
        }
    }
}

/// Stateful helper around one unit of work on a borrowed connection.
///
/// Not meant to be shared between threads; create one per unit of work.
pub struct QueryContext<'conn> {
    id: Uuid,
    conn: &'conn Connection,
    // Field order matters for drop: statement and cursor go before the transaction.
    stmt: Option<Statement<'conn>>,
    cursor: Option<Cursor>,
    tx: Option<Transaction<'conn>>,
    sql: String,
    result: Option<ExecResult>,
    is_open: bool,
    ready_to_commit: bool,
    pub(crate) log: Vec<LogRecord>,
    pub(crate) errors: ErrorChain,
    logger: Option<Arc<dyn LogSink>>,
    verbose: bool,
    config: QueryConfig,
}

impl<'conn> QueryContext<'conn> {
    /// Creates a context using the process-wide default configuration
    pub fn new(conn: &'conn Connection) -> Self {
        Self::with_config(conn, QueryConfig::global_or_default())
    }

    /// Creates a context with an explicit configuration
    pub fn with_config(conn: &'conn Connection, config: QueryConfig) -> Self {
        QueryContext {
            id: Uuid::new_v4(),
            conn,
            stmt: None,
            cursor: None,
            tx: None,
            sql: String::new(),
            result: None,
            is_open: false,
            ready_to_commit: false,
            log: Vec::new(),
            errors: ErrorChain::new(),
            logger: None,
            verbose: false,
            config,
        }
    }

    /// Identifier attached to every tracing event this context emits
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Sets the SQL text used by the next `prepare`
    pub fn set_sql(&mut self, sql: impl Into<String>) {
        self.sql = sql.into();
    }

    /// Result of the last successful exec
    pub fn result(&self) -> Option<ExecResult> {
        self.result
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }

    /// Per-instance verbosity; successful steps are logged when this or the
    /// configured flag is set
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose || self.config.verbose
    }

    /// Per-instance sink, taking precedence over the configured one
    pub fn set_logger(&mut self, logger: Arc<dyn LogSink>) {
        self.logger = Some(logger);
    }

    pub(crate) fn sink(&self) -> Arc<dyn LogSink> {
        match &self.logger {
            Some(logger) => Arc::clone(logger),
            None => self.config.sink(),
        }
    }

    /// Allows `commit_or_rollback` to commit
    pub fn ready_to_commit(&mut self) {
        self.ready_to_commit = true;
    }

    pub fn set_ready_to_commit(&mut self, ready: bool) {
        self.ready_to_commit = ready;
    }

    /// Opens a deferred transaction on the connection.
    ///
    /// Call at most once per unit of work: SQLite refuses to nest
    /// transactions, so a second call fails the context.
    pub fn begin(&mut self) {
        if self.ok() {
            let outcome = Transaction::new_unchecked(self.conn, TransactionBehavior::Deferred);
            if let Some(tx) = self.log_step("DB.Begin", outcome) {
                self.tx = Some(tx);
            }
        }
    }

    /// Commits when the context is healthy and flagged ready; rolls back
    /// otherwise.
    ///
    /// Returns true only for a successful commit. A healthy context that was
    /// never flagged ready is rolled back just like a failed one, and the
    /// call returns false.
    pub fn commit_or_rollback(&mut self) -> bool {
        if self.ok() && self.ready_to_commit {
            match self.tx.take() {
                Some(tx) => self.log_step("Tx.Commit", tx.commit()).is_some(),
                None => {
                    let outcome: Result<(), QueryError> = Err(QueryError::Transaction(
                        "No transaction in progress".to_string(),
                    ));
                    self.log_step("Tx.Commit", outcome);
                    false
                }
            }
        } else {
            if let Some(tx) = self.tx.take() {
                self.log_step("Tx.Rollback", tx.rollback());
            }
            false
        }
    }

    /// Prepares the current SQL text, logging it first.
    pub fn prepare(&mut self) {
        if self.ok() {
            self.log.push(LogRecord::Sql(self.sql.clone()));
            // A rusqlite transaction lives on the same connection, so a
            // statement prepared here runs inside it.
            let method = if self.tx.is_some() { "Tx.Prepare" } else { "DB.Prepare" };
            self.stmt = None;
            let conn = self.conn;
            let outcome = conn.prepare(&self.sql);
            self.stmt = self.log_step(method, outcome);
        }
    }

    /// `prepare` followed by `exec_prepared`
    pub fn exec<P: Params>(&mut self, params: P) -> Option<ExecResult> {
        if !self.ok() {
            return None;
        }
        self.prepare();
        self.exec_prepared(params)
    }

    /// Runs the prepared statement with positional parameters.
    pub fn exec_prepared<P: Params>(&mut self, params: P) -> Option<ExecResult> {
        if !self.ok() {
            return None;
        }
        let conn = self.conn;
        let outcome = match self.stmt.as_mut() {
            Some(stmt) => stmt
                .execute(params)
                .map(|rows_affected| ExecResult {
                    rows_affected,
                    last_insert_id: conn.last_insert_rowid(),
                })
                .map_err(QueryError::from),
            None => Err(QueryError::Usage(
                "Exec called without a prepared statement".to_string(),
            )),
        };
        self.result = self.log_step("Stmt.Exec", outcome);
        self.result
    }

    /// `prepare` followed by `query_prepared`
    pub fn query<P: Params>(&mut self, params: P) -> bool {
        if !self.ok() {
            return false;
        }
        self.prepare();
        self.query_prepared(params)
    }

    /// Runs the prepared statement and opens a cursor over its rows.
    ///
    /// Returns whether the cursor is open. A cursor left open by an earlier
    /// query is closed first.
    pub fn query_prepared<P: Params>(&mut self, params: P) -> bool {
        if !self.ok() {
            return false;
        }
        self.close();
        let outcome = match self.stmt.as_mut() {
            Some(stmt) => Cursor::fetch(stmt, params).map_err(QueryError::from),
            None => Err(QueryError::Usage(
                "Query called without a prepared statement".to_string(),
            )),
        };
        self.cursor = self.log_step("Stmt.Query", outcome);
        self.is_open = self.cursor.is_some();
        self.is_open
    }

    /// Column names of the open cursor
    pub fn columns(&self) -> &[String] {
        match &self.cursor {
            Some(cursor) if self.is_open => cursor.columns(),
            _ => &[],
        }
    }

    /// Advances the cursor; never closes it.
    pub fn next_keep_open(&mut self) -> bool {
        if !self.ok() || !self.is_open {
            return false;
        }
        self.cursor.as_mut().map_or(false, Cursor::advance)
    }

    /// Advances the cursor, closing it as soon as there is no next row.
    pub fn next_or_close(&mut self) -> bool {
        let has_next = self.next_keep_open();
        if !has_next {
            self.close();
        }
        has_next
    }

    /// Decodes the current row; the cursor stays open.
    pub fn scan_keep_open<T: FromRow>(&mut self) -> Option<T> {
        if !self.ok() {
            return None;
        }
        let row = match &self.cursor {
            Some(cursor) if self.is_open => cursor.current(),
            _ => None,
        };
        let outcome = match row {
            Some(row) => T::from_row(row),
            None => Err(QueryError::Cursor("Scan called without a current row".to_string())),
        };
        self.log_step("Rows.Scan", outcome)
    }

    /// Decodes the current row, then closes the cursor whatever the outcome.
    pub fn scan_close<T: FromRow>(&mut self) -> Option<T> {
        let value = self.scan_keep_open();
        self.close();
        value
    }

    /// Closes the cursor if one is open. Safe to call any number of times.
    pub fn close(&mut self) {
        if self.is_open {
            self.is_open = false;
            self.cursor = None;
            self.log_step("Rows.Close", Ok::<(), QueryError>(()));
        }
    }

    /// Whether no error has occurred
    pub fn ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Wraps the error chain in a new link. `None` is recorded as `(nil error)`.
    pub fn error_push(&mut self, err: impl Into<Option<QueryError>>, context: impl Into<String>) {
        self.errors.push(err, context);
    }

    /// The concrete error of the first failure
    pub fn error_cause(&self) -> Option<&QueryError> {
        self.errors.root_cause()
    }

    pub fn errors(&self) -> &ErrorChain {
        &self.errors
    }

    /// Empties the error chain and the step log so the context can be reused
    pub fn error_clear(&mut self) {
        self.errors.clear();
        self.log.clear();
    }

    pub fn log(&self) -> &[LogRecord] {
        &self.log
    }

    /// The step log, one record per line
    pub fn log_text(&self) -> String {
        self.log
            .iter()
            .map(LogRecord::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Records the outcome of one step.
    ///
    /// Failures, and successes when verbose, append a line to the step log.
    /// Failures are also pushed onto the error chain with `method` as
    /// context. Returns the success value.
    pub fn log_step<T, E>(&mut self, method: &str, outcome: Result<T, E>) -> Option<T>
    where
        E: Into<QueryError>,
    {
        match outcome {
            Ok(value) => {
                debug!(context = %self.id, step = method, "ok");
                if self.is_verbose() {
                    self.log.push(LogRecord::Step(format!("{} // ok", method)));
                }
                Some(value)
            }
            Err(err) => {
                let err = err.into();
                warn!(context = %self.id, step = method, error = %err, "query step failed");
                let marker = if self.ok() { "stored" } else { "chained" };
                self.log.push(LogRecord::Step(format!(
                    "{} // error: {:?} // {}",
                    method,
                    err.to_string(),
                    marker
                )));
                self.errors.push(err, method);
                None
            }
        }
    }
}

impl fmt::Debug for QueryContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryContext")
            .field("id", &self.id)
            .field("sql", &self.sql)
            .field("in_transaction", &self.tx.is_some())
            .field("is_open", &self.is_open)
            .field("errors", &self.errors.len())
            .finish()
    }
}

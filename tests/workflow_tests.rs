//! Workflow tests against an on-disk database
//!
//! Exercises the public API the way an application would: configuration
//! loaded from a TOML file, one context per unit of work, diagnostics flushed
//! to the configured sink.

use querylog::config::{load_config, parse_config};
use querylog::{Diagnostic, MemorySink, QueryConfig, QueryContext, QueryError};
use rusqlite::{params, Connection};
use std::fs;
use std::sync::Arc;
use tempfile::{NamedTempFile, TempDir};

fn open_ledger(dir: &TempDir) -> Connection {
    let conn = Connection::open(dir.path().join("ledger.db")).unwrap();
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS accounts (
            id INTEGER PRIMARY KEY,
            owner TEXT NOT NULL,
            balance INTEGER NOT NULL CHECK (balance >= 0)
        );
        DELETE FROM accounts;
        INSERT INTO accounts (id, owner, balance) VALUES (1, 'ada', 100), (2, 'grace', 50);
    ",
    )
    .unwrap();
    conn
}

/// Moves `amount` from account `from` to `to` as one unit of work
fn transfer(ctx: &mut QueryContext<'_>, from: i64, to: i64, amount: i64) -> bool {
    ctx.begin();
    ctx.set_sql("UPDATE accounts SET balance = balance - ? WHERE id = ?");
    ctx.exec(params![amount, from]);
    ctx.set_sql("UPDATE accounts SET balance = balance + ? WHERE id = ?");
    ctx.exec(params![amount, to]);
    ctx.ready_to_commit();
    ctx.commit_or_rollback()
}

fn balances(conn: &Connection) -> Vec<(String, i64)> {
    let mut ctx = QueryContext::new(conn);
    ctx.set_sql("SELECT owner, balance FROM accounts ORDER BY id");
    ctx.query([]);
    let mut rows = Vec::new();
    while ctx.next_or_close() {
        if let Some(row) = ctx.scan_keep_open::<(String, i64)>() {
            rows.push(row);
        }
    }
    assert!(ctx.log_now().is_ok());
    rows
}

#[test]
fn test_successful_transfer_commits() {
    let dir = TempDir::new().unwrap();
    let conn = open_ledger(&dir);

    let mut ctx = QueryContext::new(&conn);
    assert!(transfer(&mut ctx, 1, 2, 30));
    assert!(ctx.ok());

    assert_eq!(
        balances(&conn),
        vec![("ada".to_string(), 70), ("grace".to_string(), 80)]
    );
}

#[test]
fn test_failed_transfer_rolls_back_and_reports() {
    let dir = TempDir::new().unwrap();
    let conn = open_ledger(&dir);
    let sink = Arc::new(MemorySink::new());
    let config = QueryConfig::new().with_logger(sink.clone());

    let mut ctx = QueryContext::with_config(&conn, config);
    // Overdraws account 2 and trips the CHECK constraint
    assert!(!transfer(&mut ctx, 2, 1, 80));
    assert!(!ctx.ok());
    assert!(matches!(ctx.error_cause(), Some(QueryError::Database(_))));

    assert_eq!(
        balances(&conn),
        vec![("ada".to_string(), 100), ("grace".to_string(), 50)]
    );

    let err = ctx.log_now().unwrap_err();
    assert!(err.to_string().starts_with("Query failed: Stmt.Exec: "));
    let flushed = sink.entries();
    assert_eq!(flushed.len(), 1);
    assert!(flushed[0].contains("=== SQL ==="));
    assert!(flushed[0].contains("CHECK constraint failed"));
    assert!(flushed[0].contains("Stmt.Exec // error: "));
}

#[test]
fn test_config_file_drives_verbosity_and_sink() {
    let dir = TempDir::new().unwrap();
    let conn = open_ledger(&dir);
    let log_path = dir.path().join("sql.log");

    let config_file = NamedTempFile::new().unwrap();
    fs::write(
        config_file.path(),
        format!("[query]\nverbose = true\nlog_file = {:?}\n", log_path.to_string_lossy()),
    )
    .unwrap();
    let config = load_config(config_file.path()).unwrap();
    assert!(config.verbose);

    let mut ctx = QueryContext::with_config(&conn, config);
    ctx.set_sql("SELECT owner FROM accounts WHERE id = ?");
    ctx.query([1]);
    assert!(ctx.log_text().contains("Stmt.Query // ok"));

    ctx.next_keep_open();
    ctx.scan_close::<(i64,)>();
    assert!(ctx.log_now().is_err());

    let written = fs::read_to_string(&log_path).unwrap();
    assert!(written.contains("SELECT owner FROM accounts WHERE id = ?"));
    assert!(written.contains("Rows.Scan // error: "));
    assert!(written.contains("Rows.Close // ok"));
}

#[test]
fn test_bad_config_is_reported() {
    let result = parse_config("[query]\nverbose = \"loud\"\n");
    assert!(matches!(result, Err(QueryError::Toml(_))));
}

#[test]
fn test_diagnostic_snapshot() {
    let dir = TempDir::new().unwrap();
    let conn = open_ledger(&dir);

    let mut ctx = QueryContext::new(&conn);
    ctx.set_sql("INSERT INTO accounts (id, owner, balance) VALUES (?, ?, ?)");
    ctx.exec(params![1, "duplicate", 0]);

    let diagnostic: Diagnostic = ctx.diagnostic().expect("context should have failed");
    assert_eq!(diagnostic.context_id, ctx.id().to_string());
    assert_eq!(diagnostic.errors.len(), 1);
    assert!(diagnostic.errors[0].starts_with("Stmt.Exec: Database error: UNIQUE constraint failed"));
    assert!(diagnostic.render_text().contains("=== ERRORS ==="));
    assert!(diagnostic.render_chat().contains("```sql\n"));
}

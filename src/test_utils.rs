/// # Test Utilities Module
///
/// Fixtures shared by the unit and integration tests: isolated in-memory
/// databases with a small inventory schema, a recording sink configuration
/// and tracing setup.

use crate::config::QueryConfig;
use crate::core::Result;
use crate::sink::MemorySink;
use rusqlite::Connection;
use std::sync::Arc;

/// Isolated database test fixture
pub struct DatabaseFixture {
    pub name: String,
    pub connection: Connection,
}

impl DatabaseFixture {
    /// Create a new, empty in-memory database with the standard schema
    pub fn new(name: &str) -> Result<Self> {
        let connection = Connection::open_in_memory()?;

        connection.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = MEMORY;
        ",
        )?;

        let fixture = DatabaseFixture {
            name: name.to_string(),
            connection,
        };
        fixture.setup_standard_schema()?;
        Ok(fixture)
    }

    /// Create fixture with sample rows
    pub fn with_sample_data(name: &str) -> Result<Self> {
        let fixture = Self::new(name)?;
        fixture.populate_sample_data()?;
        Ok(fixture)
    }

    /// Set up standard test schema.
    ///
    /// `orders.item_id` is a deferred foreign key, so a dangling reference is
    /// only rejected at COMMIT.
    fn setup_standard_schema(&self) -> Result<()> {
        self.connection.execute_batch(
            "
            CREATE TABLE items (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                qty INTEGER NOT NULL
            );

            CREATE TABLE orders (
                id INTEGER PRIMARY KEY,
                item_id INTEGER NOT NULL
                    REFERENCES items (id) DEFERRABLE INITIALLY DEFERRED,
                amount INTEGER NOT NULL
            );
        ",
        )?;
        Ok(())
    }

    /// Insert three items: bolt (10), nut (25), gear (3)
    fn populate_sample_data(&self) -> Result<()> {
        let items = vec![("bolt", 10), ("nut", 25), ("gear", 3)];

        for (name, qty) in items {
            self.connection.execute(
                "INSERT INTO items (name, qty) VALUES (?1, ?2)",
                rusqlite::params![name, qty],
            )?;
        }
        Ok(())
    }

    /// Row count of `table`
    pub fn count(&self, table: &str) -> i64 {
        self.connection
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
            .expect("Failed to count rows")
    }
}

/// A config whose sink records every flushed block
pub fn recording_config() -> (QueryConfig, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    (QueryConfig::new().with_logger(sink.clone()), sink)
}

/// Route tracing output through the test harness' captured writer
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_fixture_creation() {
        let fixture = DatabaseFixture::new("test_create").unwrap();
        assert_eq!(fixture.name, "test_create");
        assert_eq!(fixture.count("items"), 0);
    }

    #[test]
    fn test_sample_data_fixture() {
        let fixture = DatabaseFixture::with_sample_data("test_sample").unwrap();
        assert_eq!(fixture.count("items"), 3);
        assert_eq!(fixture.count("orders"), 0);

        let fk_enabled: i64 = fixture
            .connection
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fk_enabled, 1);
    }
}

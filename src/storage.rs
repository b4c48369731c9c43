use crate::error::{PipelineError, Result};
use crate::types::CityRecord;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

static TABLE_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Destination for the cleaned city table.
#[async_trait]
pub trait CityTableStore: Send + Sync {
    /// Drop `table` if it exists, recreate it and insert `records`.
    /// Returns the number of rows written.
    async fn replace_table(&self, table: &str, records: &[CityRecord]) -> Result<usize>;

    /// Human-readable target, password masked.
    fn describe(&self) -> String;
}

/// Table names are spliced into DDL, so only plain identifiers are allowed.
pub fn validate_table_name(table: &str) -> Result<()> {
    if TABLE_NAME.is_match(table) {
        Ok(())
    } else {
        Err(PipelineError::persistence(format!(
            "invalid table name '{table}': use letters, digits and underscores"
        )))
    }
}

/// In-memory store for dry runs and tests.
pub struct InMemoryTableStore {
    tables: Arc<Mutex<HashMap<String, Vec<CityRecord>>>>,
    writes: Arc<Mutex<usize>>,
    failure: Option<String>,
}

impl Default for InMemoryTableStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTableStore {
    pub fn new() -> Self {
        Self {
            tables: Arc::new(Mutex::new(HashMap::new())),
            writes: Arc::new(Mutex::new(0)),
            failure: None,
        }
    }

    /// A store whose every write fails with `message`, like an unreachable server.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::new()
        }
    }

    pub fn table(&self, name: &str) -> Option<Vec<CityRecord>> {
        self.tables.lock().unwrap().get(name).cloned()
    }

    /// Number of `replace_table` calls, successful or not.
    pub fn write_attempts(&self) -> usize {
        *self.writes.lock().unwrap()
    }
}

#[async_trait]
impl CityTableStore for InMemoryTableStore {
    async fn replace_table(&self, table: &str, records: &[CityRecord]) -> Result<usize> {
        *self.writes.lock().unwrap() += 1;
        validate_table_name(table)?;

        if let Some(message) = &self.failure {
            return Err(PipelineError::persistence(message));
        }

        let mut tables = self.tables.lock().unwrap();
        tables.insert(table.to_string(), records.to_vec());

        debug!("Replaced in-memory table {} with {} rows", table, records.len());
        Ok(records.len())
    }

    fn describe(&self) -> String {
        "memory://".to_string()
    }
}

use crate::config::{Backend, DatabaseConfig};
use crate::constants::TABLE_COLUMNS;
use crate::error::{PipelineError, Result};
use crate::storage::{validate_table_name, CityTableStore, InMemoryTableStore};
use crate::types::CityRecord;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::info;

/// Build the store selected by `config.backend`. No connection is opened here;
/// backends connect on their first write.
pub fn open_store(config: &DatabaseConfig) -> Result<Box<dyn CityTableStore>> {
    validate_table_name(&config.table)?;
    match config.backend {
        #[cfg(feature = "mysql")]
        Backend::Mysql => Ok(Box::new(mysql::MySqlTableStore::new(config))),
        #[cfg(not(feature = "mysql"))]
        Backend::Mysql => Err(PipelineError::Config(
            "this build has no MySQL support; enable the `mysql` feature or use the sqlite backend"
                .to_string(),
        )),
        Backend::Sqlite => Ok(Box::new(SqliteTableStore::new(&config.database))),
        Backend::Memory => Ok(Box::new(InMemoryTableStore::new())),
    }
}

/// SQLite-backed table, opened lazily at `path`.
pub struct SqliteTableStore {
    path: PathBuf,
    conn: Mutex<Option<Connection>>,
}

impl SqliteTableStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            conn: Mutex::new(None),
        }
    }
}

#[async_trait]
impl CityTableStore for SqliteTableStore {
    async fn replace_table(&self, table: &str, records: &[CityRecord]) -> Result<usize> {
        validate_table_name(table)?;

        let mut guard = self
            .conn
            .lock()
            .map_err(|_| PipelineError::persistence("sqlite connection lock poisoned"))?;

        if guard.is_none() {
            info!("Opening SQLite database at {}", self.path.display());
            let conn = Connection::open(&self.path).map_err(|e| {
                PipelineError::persistence(format!(
                    "failed to open '{}': {e}",
                    self.path.display()
                ))
            })?;
            *guard = Some(conn);
        }
        let conn = guard
            .as_mut()
            .ok_or_else(|| PipelineError::persistence("sqlite connection unavailable"))?;

        let written = write_sqlite_table(conn, table, records).map_err(PipelineError::persistence)?;
        info!("Wrote {} rows to sqlite table {}", written, table);
        Ok(written)
    }

    fn describe(&self) -> String {
        format!("sqlite://{}", self.path.display())
    }
}

fn write_sqlite_table(
    conn: &mut Connection,
    table: &str,
    records: &[CityRecord],
) -> rusqlite::Result<usize> {
    let tx = conn.transaction()?;
    tx.execute_batch(&format!(
        "DROP TABLE IF EXISTS \"{table}\";
         CREATE TABLE \"{table}\" (
             city                 TEXT NOT NULL,
             state                TEXT,
             estimated_population INTEGER,
             confirmed_cases      INTEGER,
             deaths               INTEGER
         );"
    ))?;
    {
        let mut stmt = tx.prepare(&format!(
            "INSERT INTO \"{table}\" ({}) VALUES (?1, ?2, ?3, ?4, ?5)",
            TABLE_COLUMNS.join(", ")
        ))?;
        for record in records {
            stmt.execute(params![
                record.city,
                record.state,
                sql_int(record.estimated_population)?,
                sql_int(record.confirmed_cases)?,
                sql_int(record.deaths)?,
            ])?;
        }
    }
    tx.commit()?;
    Ok(records.len())
}

// SQLite integers are signed 64-bit.
fn sql_int(value: Option<u64>) -> rusqlite::Result<Option<i64>> {
    value
        .map(i64::try_from)
        .transpose()
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

#[cfg(feature = "mysql")]
pub mod mysql {
    use super::*;
    use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
    use sqlx::{Connection as _, MySql, QueryBuilder};

    /// Rows per multi-row INSERT; keeps bind parameters well under MySQL's limit.
    const INSERT_BATCH: usize = 1000;

    /// MySQL-backed table. Connects once per write and closes afterwards.
    pub struct MySqlTableStore {
        options: MySqlConnectOptions,
        target: String,
    }

    impl MySqlTableStore {
        pub fn new(config: &DatabaseConfig) -> Self {
            let options = MySqlConnectOptions::new()
                .host(&config.host)
                .port(config.port)
                .username(&config.user)
                .password(&config.password)
                .database(&config.database);
            Self {
                options,
                target: config.redacted_url(),
            }
        }
    }

    #[async_trait]
    impl CityTableStore for MySqlTableStore {
        async fn replace_table(&self, table: &str, records: &[CityRecord]) -> Result<usize> {
            validate_table_name(table)?;

            info!("Connecting to {}", self.target);
            let mut conn = MySqlConnection::connect_with(&self.options)
                .await
                .map_err(PipelineError::persistence)?;

            // DDL commits implicitly in MySQL, so only the inserts share a transaction.
            sqlx::query(&format!("DROP TABLE IF EXISTS `{table}`"))
                .execute(&mut conn)
                .await
                .map_err(PipelineError::persistence)?;
            sqlx::query(&format!(
                "CREATE TABLE `{table}` (
                     city                 TEXT NOT NULL,
                     state                TEXT NULL,
                     estimated_population BIGINT UNSIGNED NULL,
                     confirmed_cases      BIGINT UNSIGNED NULL,
                     deaths               BIGINT UNSIGNED NULL
                 )"
            ))
            .execute(&mut conn)
            .await
            .map_err(PipelineError::persistence)?;

            let mut tx = conn.begin().await.map_err(PipelineError::persistence)?;
            for chunk in records.chunks(INSERT_BATCH) {
                let mut builder: QueryBuilder<MySql> = QueryBuilder::new(format!(
                    "INSERT INTO `{table}` ({}) ",
                    TABLE_COLUMNS.join(", ")
                ));
                builder.push_values(chunk, |mut row, record| {
                    row.push_bind(record.city.clone())
                        .push_bind(record.state.clone())
                        .push_bind(record.estimated_population)
                        .push_bind(record.confirmed_cases)
                        .push_bind(record.deaths);
                });
                builder
                    .build()
                    .execute(&mut *tx)
                    .await
                    .map_err(PipelineError::persistence)?;
            }
            tx.commit().await.map_err(PipelineError::persistence)?;
            conn.close().await.map_err(PipelineError::persistence)?;

            info!("Wrote {} rows to MySQL table {}", records.len(), table);
            Ok(records.len())
        }

        fn describe(&self) -> String {
            self.target.clone()
        }
    }
}

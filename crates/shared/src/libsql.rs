use std::collections::BTreeMap;
use std::ops::Deref;
use std::path::Path;

use libsql::params::IntoParams;
use libsql::{BatchRows, Database, Rows};
use tracing::info;

use crate::error::CommonError;

/// Migration set: filename -> SQL contents. Filenames sort in application
/// order and carry an `.up.` or `.down.` marker.
pub type Migrations = BTreeMap<&'static str, &'static str>;

#[derive(Debug, Clone)]
pub struct Connection(pub libsql::Connection);

impl Connection {
    pub fn new(connection: libsql::Connection) -> Self {
        Self(connection)
    }
}

impl Deref for Connection {
    type Target = libsql::Connection;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[macro_export]
macro_rules! execute_with_retry {
    ($operation:expr) => {
        execute_with_retry!($operation, 10)
    };
    ($operation:expr, $max_retries:expr) => {{
        async {
            let mut _retries = 0u32;
            let _max_retries: u32 = $max_retries;

            loop {
                match $operation.await {
                    Ok(result) => break Ok(result),
                    Err(err) => {
                        let err_str = err.to_string();
                        if err_str.contains("database is locked") || err_str.contains("SQLITE_BUSY")
                        {
                            tracing::warn!("Database is locked, retrying... {:?}", err);
                            if _retries >= _max_retries {
                                break Err(err);
                            }

                            _retries += 1;

                            // Very low delay with exponential backoff
                            let delay_us = 10_000 * (1 << _retries.min(6));
                            tokio::time::sleep(std::time::Duration::from_micros(delay_us)).await;
                        } else {
                            tracing::error!("Error executing with retry: {:?}", err);
                            break Err(err);
                        }
                    }
                }
            }
        }
        .await
    }};
}

impl Connection {
    /// Execute sql query provided some type that implements [`IntoParams`] returning
    /// on success the number of rows that were changed.
    pub async fn execute(&self, sql: &str, params: impl IntoParams) -> libsql::Result<u64> {
        tracing::trace!("executing `{}`", sql);
        let params = params.into_params()?;
        execute_with_retry!(self.0.execute(sql, params.clone()), 10)
    }

    /// Execute a batch set of statements.
    pub async fn execute_batch(&self, sql: &str) -> libsql::Result<BatchRows> {
        tracing::trace!("executing batch `{}`", sql);
        execute_with_retry!(self.0.execute_batch(sql), 10)
    }

    /// Execute a batch set of statements atomically in a transaction.
    pub async fn execute_transactional_batch(&self, sql: &str) -> libsql::Result<BatchRows> {
        tracing::trace!("executing batch transactional `{}`", sql);
        execute_with_retry!(self.0.execute_transactional_batch(sql), 10)
    }

    /// Execute sql query provided some type that implements [`IntoParams`] returning
    /// on success the [`Rows`].
    pub async fn query(&self, sql: &str, params: impl IntoParams) -> libsql::Result<Rows> {
        let stmt = self.prepare(sql).await?;
        let params = params.into_params()?;
        execute_with_retry!(stmt.query(params.clone()), 10)
    }
}

/// Open a database file on local disk, creating parent directories as needed.
pub async fn establish_local_connection(
    path_to_db_file: &Path,
) -> Result<(Database, Connection), CommonError> {
    info!("establishing local connection");
    if let Some(parent) = path_to_db_file.parent() {
        if !std::fs::exists(parent)? {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db = libsql::Builder::new_local(path_to_db_file).build().await?;
    let conn = db.connect()?;
    Ok((db, Connection(conn)))
}

/// Open a fresh `:memory:` database.
pub async fn establish_in_memory_connection() -> Result<(Database, Connection), CommonError> {
    let db = libsql::Builder::new_local(":memory:").build().await?;
    let conn = db.connect()?;
    Ok((db, Connection(conn)))
}

/// Apply the `.up.` migrations of a migration set in filename order.
pub async fn run_migrations(
    conn: &Connection,
    migrations: &Migrations,
) -> Result<(), CommonError> {
    for (filename, contents) in migrations.iter().filter(|(k, _)| k.contains(".up.")) {
        tracing::debug!(migration = filename, "applying migration");
        conn.execute_transactional_batch(contents).await?;
    }
    Ok(())
}

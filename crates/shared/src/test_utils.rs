use crate::error::CommonError;
use crate::libsql::{Connection, Migrations, run_migrations};

/// Open a fresh `:memory:` database with foreign keys on and the given
/// migration set applied. Each call returns an isolated database.
pub async fn setup_in_memory_database(
    migrations: &Migrations,
) -> Result<(libsql::Database, Connection), CommonError> {
    let db = libsql::Builder::new_local(":memory:").build().await?;
    let conn = Connection(db.connect()?);

    // Enable foreign key constraints
    conn.execute("PRAGMA foreign_keys = ON", ()).await?;

    run_migrations(&conn, migrations).await?;

    Ok((db, conn))
}

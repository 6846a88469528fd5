use anyhow::{ensure, Context, Result};
use rusqlite::Connection;

/// Schema steps in order; entry `n` brings the archive to version `n + 1`.
const MIGRATIONS: &[(&str, &str)] = &[("schema_v1.sql", include_str!("schemas/schema_v1.sql"))];

const CURRENT_SCHEMA_VERSION: i32 = MIGRATIONS.len() as i32;

fn schema_version(conn: &Connection) -> Result<i32> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
        .context("failed to read archive schema version")
}

/// Applies every pending step in one transaction and stamps `user_version`.
pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    let version = schema_version(conn)?;
    ensure!(
        version <= CURRENT_SCHEMA_VERSION,
        "archive schema v{version} is newer than this build (v{CURRENT_SCHEMA_VERSION})"
    );

    let pending = &MIGRATIONS[version.max(0) as usize..];
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for (name, sql) in pending {
        tx.execute_batch(sql)
            .with_context(|| format!("archive migration {name} failed"))?;
    }
    tx.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION)?;
    tx.commit().context("failed to commit archive migrations")
}

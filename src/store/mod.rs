// src/store/mod.rs
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use duckdb::{appender_params_from_iter, Connection};
use tracing::info;

pub mod questions;

/// Null sentinel used by the upstream export: the literal field `NULL`
/// loads as SQL NULL.
const NULL_SENTINEL: &str = "NULL";

const CREATE_MARKETING: &str = "
CREATE TABLE IF NOT EXISTS marketing (
    event_id VARCHAR(50),
    phone_id VARCHAR(50),
    ad_id VARCHAR(25),
    provider VARCHAR(25),
    placement VARCHAR(25),
    length VARCHAR(25),
    event_ts VARCHAR(50)
)";

const CREATE_USERS: &str = "
CREATE TABLE IF NOT EXISTS users (
    event_id VARCHAR(50),
    user_id VARCHAR(50),
    phone_id VARCHAR(50),
    property VARCHAR(25),
    value VARCHAR(25),
    event_ts VARCHAR(50)
)";

/// Open a DuckDB database on disk at `path`, creating the file if it
/// doesn't exist.
pub fn open_db(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("opening database {}", path.display()))?;
    Ok(conn)
}

/// Open a DuckDB in-memory database.
pub fn open_mem_db() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    Ok(conn)
}

/// Create the two destination tables if they are not already present.
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute(CREATE_MARKETING, [])
        .context("creating the marketing table")?;
    info!("created the marketing table");

    conn.execute(CREATE_USERS, [])
        .context("creating the users table")?;
    info!("created the users table");
    Ok(())
}

/// Bulk-load a repaired CSV file into `table`, skipping the header line
/// and mapping the `NULL` sentinel to SQL NULL. Returns the number of
/// rows appended.
pub fn load_file(conn: &Connection, path: &Path, table: &str) -> Result<u64> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(BufReader::new(
            File::open(path).with_context(|| format!("opening {}", path.display()))?,
        ));

    let mut appender = conn
        .appender(table)
        .with_context(|| format!("opening appender for table {table}"))?;

    let mut rows: u64 = 0;
    for record in reader.records() {
        let record = record.with_context(|| format!("reading {}", path.display()))?;
        let values = record.iter().map(|field| {
            if field == NULL_SENTINEL {
                None
            } else {
                Some(field.to_string())
            }
        });
        appender
            .append_row(appender_params_from_iter(values))
            .with_context(|| format!("appending row {} into {table}", rows + 2))?;
        rows += 1;
    }
    appender.flush()?;

    info!(file = %path.display(), table, rows, "loaded file");
    Ok(rows)
}

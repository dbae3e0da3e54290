use crate::config::{db_file_name, SourcePaths};
use crate::loader::{load_cities, LoadStats};
use crate::schema;
use crate::source::CityReader;
use crate::store::{table_counts, Store};
use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub struct BuildConfig {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub use_foreign_names: bool,
}

#[derive(Debug)]
pub struct BuildReport {
    pub db_path: PathBuf,
    pub stats: LoadStats,
    pub tables: Vec<(&'static str, u64)>,
}

/// Builds the database and publishes it into the output directory.
///
/// Sources are opened before anything is written. The database is staged in a
/// temporary file next to the target and renamed into place only after the load
/// has committed, so a failed run never leaves a file under the final name.
pub fn run_build(config: &BuildConfig) -> Result<BuildReport> {
    let paths = SourcePaths::in_dir(&config.data_dir, config.use_foreign_names);
    let cities = CityReader::open(&paths)?;

    fs::create_dir_all(&config.output_dir).with_context(|| {
        format!(
            "Failed to create output directory: {}",
            config.output_dir.display()
        )
    })?;
    let db_path = config
        .output_dir
        .join(db_file_name(config.use_foreign_names));

    let staged = tempfile::Builder::new()
        .prefix(".citydb-")
        .suffix(".sqlite3.tmp")
        .tempfile_in(&config.output_dir)
        .context("Failed to create staging file")?;
    info!(path = ?staged.path(), "Staging database");

    let mut conn = Connection::open(staged.path()).context("Failed to open staged database")?;
    schema::create(&conn)?;

    let tx = conn.transaction().context("Failed to begin transaction")?;
    let stats = load_cities(&Store::new(&tx), cities)?;
    tx.commit().context("Failed to commit load")?;

    let tables = table_counts(&conn)?;
    conn.close()
        .map_err(|(_, e)| e)
        .context("Failed to close staged database")?;

    staged
        .persist(&db_path)
        .with_context(|| format!("Failed to publish database to {}", db_path.display()))?;
    info!(path = ?db_path, "Database published");

    Ok(BuildReport {
        db_path,
        stats,
        tables,
    })
}

fn open_read_only(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open_with_flags(db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .with_context(|| format!("Failed to open database: {}", db_path.display()))?;
    schema::enable_foreign_keys(&conn)?;
    Ok(conn)
}

/// Row counts per table of a published database.
pub fn read_stats(db_path: &Path) -> Result<Vec<(&'static str, u64)>> {
    table_counts(&open_read_only(db_path)?)
}

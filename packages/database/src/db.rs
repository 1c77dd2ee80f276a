//! Snapshot loading utilities.

use std::path::{Path, PathBuf};

use crate::{ProviderError, Snapshot};

/// Environment variable naming the JSON snapshot file.
pub const SNAPSHOT_ENV: &str = "CRIME_INTEL_SNAPSHOT";

/// Snapshot path used when [`SNAPSHOT_ENV`] is not set.
pub const DEFAULT_SNAPSHOT_PATH: &str = "data/snapshot.json";

/// Resolves the snapshot path from the `CRIME_INTEL_SNAPSHOT` environment
/// variable, falling back to `data/snapshot.json`.
#[must_use]
pub fn snapshot_path_from_env() -> PathBuf {
    std::env::var(SNAPSHOT_ENV)
        .map_or_else(|_| PathBuf::from(DEFAULT_SNAPSHOT_PATH), PathBuf::from)
}

/// Loads the JSON snapshot named by the `CRIME_INTEL_SNAPSHOT`
/// environment variable.
///
/// # Errors
///
/// Returns [`ProviderError`] if the file cannot be read, parsed, or
/// validated.
pub fn open_from_env() -> Result<Snapshot, ProviderError> {
    open_path(&snapshot_path_from_env())
}

/// Opens the snapshot at `path`.
///
/// With the `duckdb` feature, files ending in `.duckdb` are read through
/// a read-only `DuckDB` connection. Everything else is parsed as JSON.
///
/// # Errors
///
/// Returns [`ProviderError`] if the file cannot be read, parsed, or
/// validated.
pub fn open_path(path: &Path) -> Result<Snapshot, ProviderError> {
    #[cfg(feature = "duckdb")]
    if path.extension().is_some_and(|ext| ext == "duckdb") {
        log::info!("Opening DuckDB snapshot {}", path.display());
        let conn = duckdb::Connection::open_with_flags(
            path,
            duckdb::Config::default().access_mode(duckdb::AccessMode::ReadOnly)?,
        )?;
        return Snapshot::load_duckdb(&conn);
    }
    Snapshot::load_json(path)
}

//! CSV output of flattened rows and aggregated prices

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::info;

/// Errors that can occur when writing an output table
#[derive(Debug, Error)]
pub enum ReportError {
    /// The output directory could not be created
    #[error("Failed to create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing the table failed
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Writes `records` as a headed CSV table at `path`, creating parent directories.
///
/// An empty slice still produces a file, without a header row.
pub fn write_table<T: Serialize>(path: &Path, records: &[T]) -> Result<(), ReportError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| ReportError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let write_err = |source| ReportError::Write {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(write_err)?;
    for record in records {
        writer.serialize(record).map_err(write_err)?;
    }
    writer
        .flush()
        .map_err(|e| write_err(csv::Error::from(e)))?;

    info!(path = %path.display(), rows = records.len(), "wrote table");
    Ok(())
}

/// Path of an output table: `{dir}/{stem}{suffix}.csv`
pub fn table_path(dir: &Path, stem: &str, suffix: &str) -> PathBuf {
    dir.join(format!("{}{}.csv", stem, suffix))
}

//! Dataset-level import and rollback entry points.
//!
//! `run_import` validates the mapping before touching anything else, then
//! resolves the attachment, loads its rows, executes the import, and only
//! after a successful write appends a provenance entry to the dataset's
//! import log.

use std::path::{Path, PathBuf};

use log::info;

use crate::{
    config::ForgeConfig,
    error::ImportError,
    executor::{self, ImportResult, MergeStrategy},
    import_log::{ImportLog, ImportLogEntry, RollbackReport},
    mapping::MappingSpec,
    source,
    target::{SqliteStore, StoreHandle},
};

#[derive(Debug, Clone)]
pub struct ImportRequest<'a> {
    pub dataset: &'a str,
    pub map_path: &'a Path,
    /// Target store; defaults to `<dataset>/<dataset>.db`.
    pub db: Option<&'a str>,
    pub strategy: MergeStrategy,
}

/// Default store co-located with the dataset.
pub fn default_store_handle(dataset_dir: &Path, dataset: &str) -> StoreHandle {
    StoreHandle::SqliteFile(dataset_dir.join(format!("{dataset}.db")))
}

pub fn run_import(config: &ForgeConfig, request: &ImportRequest<'_>) -> Result<ImportResult, ImportError> {
    let spec = MappingSpec::load(request.map_path, &config.transforms)?;
    let datasets = config.datasets();
    let dataset_dir = datasets.existing_dataset_dir(request.dataset)?;
    let source_path = datasets.resolve_attachment(request.dataset, &spec.source_file_key)?;
    info!(
        "Importing attachment '{}' ({:?}) into table '{}' with strategy '{}'",
        spec.source_file_key, source_path, spec.target_table, request.strategy
    );

    let rows = source::load(&source_path, spec.format, spec.encoding)?;
    let handle = match request.db {
        Some(raw) => StoreHandle::parse(raw),
        None => default_store_handle(&dataset_dir, request.dataset),
    };
    let mut store = SqliteStore::open(&handle)?;
    let result = executor::execute(&spec, &rows, &mut store, request.strategy)?;

    let log = ImportLog::for_dataset(&dataset_dir);
    let entry = ImportLogEntry::new(
        absolute(request.map_path),
        absolute(&source_path),
        result.rows_processed,
    );
    log.append(&entry).map_err(|source| ImportError::Log {
        path: log.path().to_path_buf(),
        source,
    })?;
    Ok(result)
}

/// Forgets the last `last` import log entries of `dataset`. Imported rows stay.
pub fn rollback(config: &ForgeConfig, dataset: &str, last: usize) -> Result<RollbackReport, ImportError> {
    let log = ImportLog::for_dataset(&config.datasets().dataset_dir(dataset));
    log.rollback(last).map_err(|source| ImportError::Log {
        path: log.path().to_path_buf(),
        source,
    })
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

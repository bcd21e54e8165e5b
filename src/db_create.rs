//! Bulk-load every CSV of a dataset into a fresh SQLite database as-is.
//!
//! Each `<dataset>/<table>.csv` becomes table `<table>` with one `TEXT` column
//! per header field. No mapping or transforms are involved.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use encoding_rs::UTF_8;
use log::info;
use rusqlite::params_from_iter;

use crate::{
    config::ForgeConfig,
    io_utils,
    target::{SqliteStore, TableLayout, create_table_if_absent, insert_sql},
};

/// Returns the number of tables loaded.
pub fn create_database(config: &ForgeConfig, dataset: &str, out: &Path) -> Result<usize> {
    let dataset_dir = config.datasets().existing_dataset_dir(dataset)?;
    let csv_files = dataset_csv_files(&dataset_dir)?;
    if csv_files.is_empty() {
        return Err(anyhow!("No csv files found in dataset folder {:?}", dataset_dir));
    }

    let mut store = SqliteStore::open_path(out)?;
    let tx = store
        .connection_mut()
        .transaction()
        .context("Starting transaction")?;
    for path in &csv_files {
        let table = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| anyhow!("Cannot derive a table name from {:?}", path))?
            .to_string();
        let mut reader = io_utils::open_csv_reader_from_path(path, io_utils::DEFAULT_CSV_DELIMITER)
            .with_context(|| format!("Opening {path:?}"))?;
        let headers = io_utils::reader_headers(&mut reader, UTF_8)
            .map_err(|reason| anyhow!("Reading headers of {path:?}: {reason}"))?;
        let layout = TableLayout {
            name: table,
            columns: headers,
        };
        create_table_if_absent(&tx, &layout)
            .with_context(|| format!("Creating table '{}'", layout.name))?;

        let mut insert = tx.prepare(&insert_sql(&layout))?;
        let mut rows = 0usize;
        for (idx, record) in reader.byte_records().enumerate() {
            let record = record.with_context(|| format!("Reading row {} in {path:?}", idx + 2))?;
            if record.len() > layout.columns.len() {
                return Err(anyhow!(
                    "Row {} in {path:?} has {} fields but the header has {}",
                    idx + 2,
                    record.len(),
                    layout.columns.len()
                ));
            }
            let mut decoded = io_utils::decode_record(&record, UTF_8)
                .map_err(|reason| anyhow!("Row {} in {path:?}: {reason}", idx + 2))?
                .into_iter()
                .map(Some)
                .collect::<Vec<_>>();
            decoded.resize(layout.columns.len(), None);
            insert
                .execute(params_from_iter(decoded.iter()))
                .with_context(|| format!("Inserting row {} into '{}'", idx + 2, layout.name))?;
            rows += 1;
        }
        info!("Loaded {} row(s) into '{}'", rows, layout.name);
    }
    tx.commit().context("Committing database")?;
    info!("SQLite database created at {:?}", out);
    Ok(csv_files.len())
}

fn dataset_csv_files(dataset_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = fs::read_dir(dataset_dir)
        .with_context(|| format!("Listing {dataset_dir:?}"))?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| {
            path.is_file() && io_utils::extension_token(path).as_deref() == Some("csv")
        })
        .collect::<Vec<_>>();
    files.sort();
    Ok(files)
}

//! The import executor: mapped, transformed rows written under a merge strategy.
//!
//! For every source row, in order, each column mapping fetches its source
//! value (null when absent) and runs it through the transform chain. The
//! resulting rows are buffered and handed to the target store as one batch,
//! so a storage failure leaves nothing behind.
//!
//! Strategy dispatch:
//!
//! | strategy    | with primary key                       | without primary key |
//! |-------------|----------------------------------------|---------------------|
//! | `append`    | plain insert                           | plain insert        |
//! | `overwrite` | replace non-key columns of a match     | plain insert        |
//! | `skip`      | keep the existing row, drop the new one| plain insert        |
//! | `merge`     | plain insert                           | plain insert        |
//!
//! `merge` does not merge columns; it is kept as an alias of `append` so
//! existing invocations keep their behaviour. Every row counts towards
//! `rows_processed`, whether it was inserted, updated or skipped.

use std::fmt;

use clap::ValueEnum;
use log::{debug, info, warn};

use crate::{
    data::Value,
    error::ImportError,
    mapping::MappingSpec,
    source::SourceRow,
    target::{TableLayout, TargetStore, WriteMode},
    transform::apply_chain,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
#[value(rename_all = "lowercase")]
pub enum MergeStrategy {
    Append,
    Overwrite,
    Skip,
    #[default]
    Merge,
}

impl MergeStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            MergeStrategy::Append => "append",
            MergeStrategy::Overwrite => "overwrite",
            MergeStrategy::Skip => "skip",
            MergeStrategy::Merge => "merge",
        }
    }

    /// Resolves the strategy against the mapping's key column.
    ///
    /// `overwrite` and `skip` need a key to detect conflicts; without one they
    /// fall back to plain inserts.
    pub fn write_mode(self, key: Option<usize>) -> WriteMode {
        match (self, key) {
            (MergeStrategy::Overwrite, Some(key)) => WriteMode::Overwrite { key },
            (MergeStrategy::Skip, Some(key)) => WriteMode::Skip { key },
            _ => WriteMode::Insert,
        }
    }
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportResult {
    pub rows_processed: usize,
    pub target_table: String,
    pub target_handle: String,
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
}

/// Applies the column mappings of `spec` to one source row.
pub fn map_row(spec: &MappingSpec, row: &SourceRow) -> Vec<Value> {
    spec.column_mappings
        .iter()
        .map(|mapping| {
            let raw = row.get(&mapping.source_column).clone();
            apply_chain(&mapping.transforms, raw)
        })
        .collect()
}

pub fn execute(
    spec: &MappingSpec,
    rows: &[SourceRow],
    store: &mut dyn TargetStore,
    strategy: MergeStrategy,
) -> Result<ImportResult, ImportError> {
    let layout = TableLayout {
        name: spec.target_table.clone(),
        columns: spec.target_columns(),
    };
    let mode = strategy.write_mode(spec.primary_key_index());
    if mode == WriteMode::Insert
        && matches!(strategy, MergeStrategy::Overwrite | MergeStrategy::Skip)
    {
        warn!(
            "Strategy '{}' requires a primary key; mapping for '{}' defines none, appending instead",
            strategy, spec.target_table
        );
    }
    for mapping in &spec.column_mappings {
        debug!(
            "'{}' <- '{}' via {:?}",
            mapping.target_column,
            mapping.source_column,
            mapping.transform_names()
        );
        if let Some(first) = rows.first()
            && !first.contains(&mapping.source_column)
        {
            warn!(
                "Source column '{}' is absent; '{}' will be null",
                mapping.source_column, mapping.target_column
            );
        }
    }
    debug!(
        "Writing {} row(s) into '{}' with {:?}",
        rows.len(),
        layout.name,
        mode
    );

    let mapped = rows
        .iter()
        .map(|row| map_row(spec, row))
        .collect::<Vec<_>>();
    let summary = store.write_batch(&layout, mode, &mapped)?;

    let result = ImportResult {
        rows_processed: mapped.len(),
        target_table: layout.name,
        target_handle: store.handle(),
        inserted: summary.inserted,
        updated: summary.updated,
        skipped: summary.skipped,
    };
    info!(
        "Processed {} row(s) into '{}' ({} inserted, {} updated, {} skipped)",
        result.rows_processed, result.target_table, result.inserted, result.updated, result.skipped
    );
    Ok(result)
}

//! Target stores: where imported rows end up.
//!
//! The executor hands a complete batch to [`TargetStore::write_batch`]; an
//! implementation must apply it all-or-nothing. [`SqliteStore`] does so inside
//! a single transaction.

use std::path::{Path, PathBuf};

use itertools::Itertools;
use log::debug;
use rusqlite::{
    Connection, Transaction, params_from_iter,
    types::{ToSql, ToSqlOutput, Value as SqlValue},
};

use crate::{data::Value, error::StorageError};

/// Where a store lives, as given on the command line (`sqlite:path`, a bare
/// path, or `sqlite::memory:`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreHandle {
    SqliteFile(PathBuf),
    SqliteMemory,
}

impl StoreHandle {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let path = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
        if path == ":memory:" {
            StoreHandle::SqliteMemory
        } else {
            StoreHandle::SqliteFile(PathBuf::from(path))
        }
    }

    pub fn describe(&self) -> String {
        match self {
            StoreHandle::SqliteFile(path) => path.display().to_string(),
            StoreHandle::SqliteMemory => ":memory:".to_string(),
        }
    }
}

/// Column layout of a target table, in creation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableLayout {
    pub name: String,
    pub columns: Vec<String>,
}

/// How each row of a batch is written. Key indexes point into the layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Insert,
    Overwrite { key: usize },
    Skip { key: usize },
}

/// What happened to the rows of one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
}

pub trait TargetStore {
    /// Human-readable handle reported back to the caller.
    fn handle(&self) -> String;

    /// Creates the table if absent, then writes every row. Either every row
    /// is applied or none is.
    fn write_batch(
        &mut self,
        layout: &TableLayout,
        mode: WriteMode,
        rows: &[Vec<Value>],
    ) -> Result<WriteSummary, StorageError>;
}

pub struct SqliteStore {
    conn: Connection,
    handle: StoreHandle,
}

impl SqliteStore {
    pub fn open(handle: &StoreHandle) -> Result<Self, StorageError> {
        let conn = match handle {
            StoreHandle::SqliteFile(path) => Connection::open(path),
            StoreHandle::SqliteMemory => Connection::open_in_memory(),
        }
        .map_err(|source| StorageError::Open {
            handle: handle.describe(),
            source,
        })?;
        Ok(Self {
            conn,
            handle: handle.clone(),
        })
    }

    pub fn open_path(path: &Path) -> Result<Self, StorageError> {
        Self::open(&StoreHandle::SqliteFile(path.to_path_buf()))
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::open(&StoreHandle::SqliteMemory)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}

impl TargetStore for SqliteStore {
    fn handle(&self) -> String {
        self.handle.describe()
    }

    fn write_batch(
        &mut self,
        layout: &TableLayout,
        mode: WriteMode,
        rows: &[Vec<Value>],
    ) -> Result<WriteSummary, StorageError> {
        let write_err = |source: rusqlite::Error| StorageError::Write {
            table: layout.name.clone(),
            source,
        };
        let tx = self.conn.transaction().map_err(write_err)?;
        create_table_if_absent(&tx, layout).map_err(write_err)?;
        let summary = write_rows(&tx, layout, mode, rows).map_err(write_err)?;
        tx.commit().map_err(write_err)?;
        debug!(
            "Committed {} inserted, {} updated, {} skipped row(s) into '{}'",
            summary.inserted, summary.updated, summary.skipped, layout.name
        );
        Ok(summary)
    }
}

/// Double-quotes an identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Every column is declared `TEXT`; values are stored as given.
pub fn create_table_sql(layout: &TableLayout) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote_ident(&layout.name),
        layout
            .columns
            .iter()
            .map(|column| format!("{} TEXT", quote_ident(column)))
            .join(", ")
    )
}

pub(crate) fn create_table_if_absent(tx: &Transaction<'_>, layout: &TableLayout) -> rusqlite::Result<()> {
    tx.execute(&create_table_sql(layout), [])?;
    Ok(())
}

pub(crate) fn insert_sql(layout: &TableLayout) -> String {
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(&layout.name),
        layout.columns.iter().map(|c| quote_ident(c)).join(", "),
        std::iter::repeat_n("?", layout.columns.len()).join(", ")
    )
}

fn write_rows(
    tx: &Transaction<'_>,
    layout: &TableLayout,
    mode: WriteMode,
    rows: &[Vec<Value>],
) -> rusqlite::Result<WriteSummary> {
    let table = quote_ident(&layout.name);
    let mut insert = tx.prepare(&insert_sql(layout))?;
    let mut summary = WriteSummary::default();

    let key = match mode {
        WriteMode::Insert => {
            for row in rows {
                insert.execute(params_from_iter(row.iter()))?;
                summary.inserted += 1;
            }
            return Ok(summary);
        }
        WriteMode::Overwrite { key } | WriteMode::Skip { key } => key,
    };

    let key_column = quote_ident(&layout.columns[key]);
    let mut exists = tx.prepare(&format!(
        "SELECT 1 FROM {table} WHERE {key_column} = ?1 LIMIT 1"
    ))?;
    let non_key: Vec<usize> = (0..layout.columns.len()).filter(|idx| *idx != key).collect();
    let mut update = if non_key.is_empty() {
        None
    } else {
        Some(tx.prepare(&format!(
            "UPDATE {table} SET {} WHERE {key_column} = ?",
            non_key
                .iter()
                .map(|idx| format!("{} = ?", quote_ident(&layout.columns[*idx])))
                .join(", ")
        ))?)
    };

    for row in rows {
        let key_value = &row[key];
        if !exists.exists(params_from_iter(std::iter::once(key_value)))? {
            insert.execute(params_from_iter(row.iter()))?;
            summary.inserted += 1;
            continue;
        }
        match (mode, update.as_mut()) {
            (WriteMode::Overwrite { .. }, Some(update)) => {
                let params = non_key.iter().map(|idx| &row[*idx]).chain(std::iter::once(key_value));
                update.execute(params_from_iter(params))?;
                summary.updated += 1;
            }
            _ => summary.skipped += 1,
        }
    }
    Ok(summary)
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Boolean(b) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*b))),
            Value::Integer(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            Value::Float(f) => ToSqlOutput::Owned(SqlValue::Real(*f)),
            Value::String(s) => ToSqlOutput::from(s.as_str()),
        })
    }
}

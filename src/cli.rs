use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::{config::DEFAULT_BASE_DIR, executor::MergeStrategy};

#[derive(Debug, Parser)]
#[command(author, version, about = "Attach files to datasets and import them through column mappings", long_about = None)]
pub struct Cli {
    /// Directory holding one sub-directory per dataset
    #[arg(long = "base-dir", global = true, default_value = DEFAULT_BASE_DIR)]
    pub base_dir: PathBuf,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create a dataset directory and write its meta.yml
    Register(RegisterArgs),
    /// Import an attached file into a target table using a mapping document
    Import(ImportArgs),
    /// Forget the most recent import log entries (imported rows are kept)
    #[command(name = "import-rollback")]
    ImportRollback(RollbackArgs),
    /// Attach an external file to a dataset under a short name
    #[command(name = "attach-file")]
    AttachFile(AttachArgs),
    /// List datasets and their attachments
    Files(FilesArgs),
    /// Database utilities
    Db(DbArgs),
}

#[derive(Debug, Args)]
pub struct RegisterArgs {
    /// Dataset name (a single directory name under the base directory)
    #[arg(long)]
    pub dataset: String,
    /// Free-form description stored in meta.yml
    #[arg(long)]
    pub description: Option<String>,
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    /// Dataset owning the attachment and the import log
    #[arg(long)]
    pub dataset: String,
    /// YAML mapping document
    #[arg(long = "map")]
    pub map: PathBuf,
    /// Target database (`sqlite:path`, a bare path, or `sqlite::memory:`)
    #[arg(long)]
    pub db: Option<String>,
    /// Conflict-resolution strategy applied to every row
    #[arg(long, value_enum, default_value_t = MergeStrategy::Merge)]
    pub strategy: MergeStrategy,
}

#[derive(Debug, Args)]
pub struct RollbackArgs {
    /// Dataset whose import log is trimmed
    #[arg(long)]
    pub dataset: String,
    /// Number of entries to remove from the end of the log
    #[arg(long, default_value_t = 1)]
    pub last: usize,
}

#[derive(Debug, Args)]
pub struct AttachArgs {
    /// Dataset receiving the file
    #[arg(long)]
    pub dataset: String,
    /// File to copy into the dataset
    #[arg(long)]
    pub file: PathBuf,
    /// Attachment name referenced by mapping documents
    #[arg(long)]
    pub name: String,
}

#[derive(Debug, Args)]
pub struct FilesArgs {
    #[arg(value_enum, default_value_t = FilesAction::List)]
    pub action: FilesAction,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum FilesAction {
    List,
}

#[derive(Debug, Args)]
pub struct DbArgs {
    #[command(subcommand)]
    pub command: DbCommands,
}

#[derive(Debug, Subcommand)]
pub enum DbCommands {
    /// Create a database holding every CSV of a dataset as a table
    Create(DbCreateArgs),
}

#[derive(Debug, Args)]
pub struct DbCreateArgs {
    /// Dataset whose CSV files are loaded
    #[arg(long)]
    pub dataset: String,
    /// Destination database file
    #[arg(long)]
    pub out: PathBuf,
    /// Database engine
    #[arg(long = "type", value_enum, default_value_t = DbKind::Sqlite)]
    pub kind: DbKind,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum DbKind {
    Sqlite,
}

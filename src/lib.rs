pub mod cli;
pub mod config;
pub mod data;
pub mod db_create;
pub mod error;
pub mod executor;
pub mod import_log;
pub mod importer;
pub mod io_utils;
pub mod mapping;
pub mod source;
pub mod store;
pub mod target;
pub mod transform;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, info, warn};

use crate::{
    cli::{Cli, Commands, DbCommands, DbKind, FilesAction},
    config::ForgeConfig,
    import_log::RollbackWarning,
    importer::ImportRequest,
    store::DatasetMeta,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("dataforge", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = ForgeConfig::new(&cli.base_dir);
    match cli.command {
        Commands::Register(args) => handle_register(&config, &args),
        Commands::Import(args) => handle_import(&config, &args),
        Commands::ImportRollback(args) => handle_rollback(&config, &args),
        Commands::AttachFile(args) => handle_attach(&config, &args),
        Commands::Files(args) => match args.action {
            FilesAction::List => handle_files(&config),
        },
        Commands::Db(args) => match args.command {
            DbCommands::Create(args) => handle_db_create(&config, &args),
        },
    }
}

fn handle_register(config: &ForgeConfig, args: &cli::RegisterArgs) -> Result<()> {
    let meta = DatasetMeta::new(&args.dataset, args.description.clone());
    let dir = config
        .datasets()
        .register_dataset(&args.dataset, &meta)
        .with_context(|| format!("Registering dataset '{}'", args.dataset))?;
    println!("[ok] dataset '{}' registered at {}", args.dataset, dir.display());
    Ok(())
}

fn handle_import(config: &ForgeConfig, args: &cli::ImportArgs) -> Result<()> {
    let request = ImportRequest {
        dataset: &args.dataset,
        map_path: &args.map,
        db: args.db.as_deref(),
        strategy: args.strategy,
    };
    let result = importer::run_import(config, &request)
        .with_context(|| format!("Importing {:?} into dataset '{}'", args.map, args.dataset))?;
    println!(
        "[ok] imported {} rows into {} (db={})",
        result.rows_processed, result.target_table, result.target_handle
    );
    Ok(())
}

fn handle_rollback(config: &ForgeConfig, args: &cli::RollbackArgs) -> Result<()> {
    let report = importer::rollback(config, &args.dataset, args.last)
        .with_context(|| format!("Rolling back imports of dataset '{}'", args.dataset))?;
    match report.warning {
        Some(RollbackWarning::LogMissing) => println!("[warn] no import logs found"),
        Some(RollbackWarning::LogEmpty) => println!("[warn] no imports found"),
        Some(RollbackWarning::Clamped { .. }) | None => println!(
            "[ok] rolled back last {} import log entries, {} remaining (note: this simple rollback only removes the log, imported rows are kept)",
            report.removed, report.remaining
        ),
    }
    Ok(())
}

fn handle_attach(config: &ForgeConfig, args: &cli::AttachArgs) -> Result<()> {
    let destination = config
        .datasets()
        .attach_file(&args.dataset, &args.file, &args.name)
        .with_context(|| format!("Attaching {:?} to dataset '{}'", args.file, args.dataset))?;
    println!(
        "[ok] attached {} as {} into dataset {} ({})",
        args.file.display(),
        args.name,
        args.dataset,
        destination.display()
    );
    Ok(())
}

fn handle_files(config: &ForgeConfig) -> Result<()> {
    let store = config.datasets();
    let datasets = store
        .list()
        .with_context(|| format!("Listing datasets under {:?}", config.base_dir()))?;
    if datasets.is_empty() {
        warn!("No datasets found under {:?}", config.base_dir());
    }
    for (name, registry) in &datasets {
        let description = store
            .meta(name)
            .with_context(|| format!("Reading metadata of dataset '{name}'"))?
            .and_then(|meta| meta.description);
        match description {
            Some(description) => println!("Dataset: {name} ({description})"),
            None => println!("Dataset: {name}"),
        }
        for (key, attachment) in &registry.attachments {
            println!("   {key} -> {}", attachment.path.display());
        }
    }
    info!("Listed {} dataset(s)", datasets.len());
    Ok(())
}

fn handle_db_create(config: &ForgeConfig, args: &cli::DbCreateArgs) -> Result<()> {
    let tables = match args.kind {
        DbKind::Sqlite => db_create::create_database(config, &args.dataset, &args.out)
            .with_context(|| format!("Creating database {:?} from dataset '{}'", args.out, args.dataset))?,
    };
    println!(
        "[ok] sqlite DB created at {} ({} table(s))",
        args.out.display(),
        tables
    );
    Ok(())
}

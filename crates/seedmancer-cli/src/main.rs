//! seedmancer CLI - database snapshots for PostgreSQL and MySQL.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use seedmancer::config::CONFIG_FILE_NAME;
use seedmancer::snapshot::{list_local, read_schema_file, snapshot_dir};
use seedmancer::{
    connect_source, connect_target, generate_snapshot, Config, DirectoryTransport, Exporter,
    GenerateOptions, LoadedConfig, RestoreOptions, RestoreOrchestrator, SnapshotError,
    SnapshotReader, SnapshotTransport,
};
use serde::Serialize;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

/// Connections opened by the export reader pool.
const EXPORT_CONNECTIONS: usize = 4;

#[derive(Parser)]
#[command(name = "seedmancer")]
#[command(about = "Portable schema and data snapshots for PostgreSQL and MySQL")]
#[command(version)]
struct Cli {
    /// Path to seedmancer.yaml (default: search the working directory and its parents)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: trace, debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write seedmancer.yaml and create the storage directory
    Init {
        /// Snapshot storage directory, relative to the project root
        #[arg(long)]
        storage_path: Option<String>,

        /// Overwrite an existing configuration file
        #[arg(long, short)]
        force: bool,
    },

    /// Snapshot a database's schema and rows
    Export {
        /// Name to store the snapshot under
        #[arg(long)]
        database_name: String,

        /// Version name (default: unversioned)
        #[arg(long)]
        version: Option<String>,

        /// Connection URL (default: database_url from config)
        #[arg(long, env = "SEEDMANCER_DATABASE_URL")]
        db_url: Option<String>,
    },

    /// Write only the schema model of a database
    ExportSchema {
        /// Connection URL (default: database_url from config)
        #[arg(long, env = "SEEDMANCER_DATABASE_URL")]
        db_url: Option<String>,

        /// Output file
        #[arg(long, short)]
        output: PathBuf,
    },

    /// Restore a snapshot into a database
    #[command(alias = "restore")]
    Seed {
        /// Stored snapshot to restore
        #[arg(long, required_unless_present = "dir", conflicts_with = "dir")]
        database_name: Option<String>,

        /// Version of the stored snapshot (default: unversioned)
        #[arg(long)]
        version_name: Option<String>,

        /// Restore a snapshot directory directly
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Connection URL (default: database_url from config)
        #[arg(long, env = "SEEDMANCER_DATABASE_URL")]
        db_url: Option<String>,
    },

    /// Generate synthetic rows that satisfy keys and foreign keys
    Generate {
        /// Directory to write the generated snapshot to
        #[arg(long)]
        output_dir: PathBuf,

        /// Rows per table (default: generate.rows from config)
        #[arg(long)]
        rows: Option<usize>,

        /// RNG seed for reproducible output
        #[arg(long)]
        seed: Option<u64>,

        /// Schema file to generate from
        #[arg(long, required_unless_present = "db_url", conflicts_with = "db_url")]
        schema_file: Option<PathBuf>,

        /// Introspect this database instead of reading a schema file
        #[arg(long)]
        db_url: Option<String>,
    },

    /// List local snapshots
    List,

    /// Copy a local snapshot to a remote directory
    Publish {
        #[arg(long)]
        database_name: String,

        #[arg(long)]
        version_name: Option<String>,

        /// Remote snapshot store
        #[arg(long)]
        remote_dir: PathBuf,
    },

    /// Copy a snapshot from a remote directory into local storage
    Fetch {
        #[arg(long)]
        database_name: String,

        #[arg(long)]
        version_name: Option<String>,

        /// Remote snapshot store
        #[arg(long)]
        remote_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => match e.downcast_ref::<SnapshotError>() {
            Some(err) => {
                eprintln!("{}", err.format_detailed());
                ExitCode::from(err.exit_code())
            }
            None => {
                eprintln!("Error: {:#}", e);
                ExitCode::FAILURE
            }
        },
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.verbosity, &cli.log_format)?;

    match cli.command {
        Commands::Init {
            ref storage_path,
            force,
        } => {
            let path = match &cli.config {
                Some(path) => path.clone(),
                None => std::env::current_dir()?.join(CONFIG_FILE_NAME),
            };
            init(&path, storage_path.clone(), force, cli.output_json)?;
        }

        Commands::Export {
            ref database_name,
            ref version,
            ref db_url,
        } => {
            let loaded = load_config(cli.config.as_deref())?;
            let url = loaded.config.resolve_database_url(db_url.as_deref())?;
            let dir = snapshot_dir(&loaded.storage_dir(), database_name, version.as_deref())?;

            let reader = connect_source(&url, EXPORT_CONNECTIONS).await?;
            let result = Exporter::new(reader.as_ref(), loaded.config.export.batch_size)
                .run(&dir)
                .await;
            reader.close().await;
            let report = result?;

            print_result(cli.output_json, &report, || {
                println!("\nExport completed!");
                println!("  Snapshot: {}", report.output_dir.display());
                println!("  Duration: {:.2}s", report.duration_seconds);
                println!("  Tables: {}", report.tables.len());
                println!("  Rows: {}", report.rows_exported);
            })?;
        }

        Commands::ExportSchema {
            ref db_url,
            ref output,
        } => {
            let url = resolve_url(optional_config(cli.config.as_deref())?.as_ref(), db_url)?;
            let reader = connect_source(&url, 1).await?;
            let result = Exporter::new(reader.as_ref(), 1).export_schema(output).await;
            reader.close().await;
            let schema = result?;

            print_result(cli.output_json, &schema, || {
                println!(
                    "Wrote schema ({} tables, {} enums) to {}",
                    schema.tables.len(),
                    schema.enums.len(),
                    output.display()
                );
            })?;
        }

        Commands::Seed {
            ref database_name,
            ref version_name,
            ref dir,
            ref db_url,
        } => {
            let (loaded, dir) = match (dir, database_name) {
                (Some(dir), _) => (optional_config(cli.config.as_deref())?, dir.clone()),
                (None, Some(name)) => {
                    let loaded = load_config(cli.config.as_deref())?;
                    let dir = snapshot_dir(&loaded.storage_dir(), name, version_name.as_deref())?;
                    (Some(loaded), dir)
                }
                (None, None) => anyhow::bail!("either --database-name or --dir is required"),
            };
            let url = resolve_url(loaded.as_ref(), db_url)?;
            let options = loaded
                .as_ref()
                .map(|l| RestoreOptions::from(&l.config.restore))
                .unwrap_or_default();

            let snapshot = SnapshotReader::open(&dir)?;
            let mut writer = connect_target(&url).await?;
            let result = RestoreOrchestrator::new(writer.as_mut(), options)
                .run(&snapshot)
                .await;
            writer.close().await;
            let report = result?;

            print_result(cli.output_json, &report, || {
                println!("\nRestore {}!", report.status);
                println!("  Snapshot: {}", dir.display());
                println!("  Duration: {:.2}s", report.duration_seconds);
                println!("  Tables loaded: {}", report.tables.len());
                println!("  Rows: {}", report.rows_loaded);
                for skipped in &report.skipped_constraints {
                    println!(
                        "  Skipped constraint {}.{} -> {}: {}",
                        skipped.table, skipped.column, skipped.references, skipped.reason
                    );
                }
                for skipped in &report.skipped_rows {
                    println!(
                        "  Skipped row {} of {}: {}",
                        skipped.row, skipped.table, skipped.reason
                    );
                }
                for failed in &report.failed_tables {
                    println!("  Failed table {}: {}", failed.table, failed.error);
                }
            })?;

            if report.has_failures() {
                let names: Vec<&str> = report
                    .failed_tables
                    .iter()
                    .map(|f| f.table.as_str())
                    .collect();
                return Err(SnapshotError::load(names.join(", "), "rolled back").into());
            }
        }

        Commands::Generate {
            ref output_dir,
            rows,
            seed,
            ref schema_file,
            ref db_url,
        } => {
            let loaded = optional_config(cli.config.as_deref())?;
            let mut options = loaded
                .as_ref()
                .map(|l| GenerateOptions::from(&l.config.generate))
                .unwrap_or_default();
            if let Some(rows) = rows {
                options.rows = rows;
            }
            if seed.is_some() {
                options.seed = seed;
            }

            let schema = match (schema_file, db_url) {
                (Some(path), _) => read_schema_file(path)?,
                (None, url) => {
                    let url = resolve_url(loaded.as_ref(), url)?;
                    let reader = connect_source(&url, 1).await?;
                    let result = reader.extract_schema().await;
                    reader.close().await;
                    result?
                }
            };

            let report = generate_snapshot(&schema, options, output_dir)?;
            print_result(cli.output_json, &report, || {
                println!("\nGenerated snapshot in {}", report.output_dir.display());
                for table in &report.tables {
                    println!("  {}: {} rows", table.table, table.rows);
                }
                if let Some(seed) = report.seed {
                    println!("  Seed: {}", seed);
                }
            })?;
        }

        Commands::List => {
            let loaded = load_config(cli.config.as_deref())?;
            let snapshots = list_local(&loaded.storage_dir())?;
            print_result(cli.output_json, &snapshots, || {
                if snapshots.is_empty() {
                    println!("No snapshots in {}", loaded.storage_dir().display());
                }
                for s in &snapshots {
                    println!("{}/{} ({} tables)", s.database, s.version, s.table_files);
                }
            })?;
        }

        Commands::Publish {
            ref database_name,
            ref version_name,
            ref remote_dir,
        } => {
            let loaded = load_config(cli.config.as_deref())?;
            let version = version_name.as_deref().unwrap_or(seedmancer::snapshot::UNVERSIONED);
            let local = snapshot_dir(&loaded.storage_dir(), database_name, Some(version))?;
            DirectoryTransport::new(remote_dir)
                .publish(database_name, version, &local)
                .await?;
            println!("Published {}/{} to {}", database_name, version, remote_dir.display());
        }

        Commands::Fetch {
            ref database_name,
            ref version_name,
            ref remote_dir,
        } => {
            let loaded = load_config(cli.config.as_deref())?;
            let version = version_name.as_deref().unwrap_or(seedmancer::snapshot::UNVERSIONED);
            let local = snapshot_dir(&loaded.storage_dir(), database_name, Some(version))?;
            let files = DirectoryTransport::new(remote_dir)
                .fetch(database_name, version, &local)
                .await?;
            println!(
                "Fetched {}/{} ({} files) into {}",
                database_name,
                version,
                files.len(),
                local.display()
            );
        }
    }

    Ok(())
}

fn init(path: &Path, storage_path: Option<String>, force: bool, json: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        return Err(SnapshotError::Config(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        ))
        .into());
    }

    let mut config = Config::default();
    if let Some(storage_path) = storage_path {
        config.storage_path = storage_path;
    }
    config.validate()?;
    std::fs::write(path, config.to_yaml()?)
        .with_context(|| format!("writing {}", path.display()))?;

    let loaded = Config::load_at(path)?;
    let storage = loaded.storage_dir();
    std::fs::create_dir_all(&storage)
        .with_context(|| format!("creating {}", storage.display()))?;
    info!("Initialized {}", path.display());

    #[derive(Serialize)]
    struct InitResult<'a> {
        config_file: &'a Path,
        storage_dir: &'a Path,
    }
    print_result(
        json,
        &InitResult {
            config_file: path,
            storage_dir: &storage,
        },
        || {
            println!("Wrote {}", path.display());
            println!("  Storage: {}", storage.display());
        },
    )
}

/// Explicit `-c` file, or discovery from the working directory.
fn load_config(path: Option<&Path>) -> Result<LoadedConfig, SnapshotError> {
    match path {
        Some(path) => Config::load_at(path),
        None => Config::discover(&std::env::current_dir()?),
    }
}

/// Like [`load_config`], but a missing discovered config is not an error.
fn optional_config(path: Option<&Path>) -> Result<Option<LoadedConfig>, SnapshotError> {
    match load_config(path) {
        Ok(loaded) => Ok(Some(loaded)),
        Err(SnapshotError::Config(_)) if path.is_none() => Ok(None),
        Err(e) => Err(e),
    }
}

fn resolve_url(loaded: Option<&LoadedConfig>, explicit: &Option<String>) -> Result<String, SnapshotError> {
    match loaded {
        Some(loaded) => loaded.config.resolve_database_url(explicit.as_deref()),
        None => Config::default().resolve_database_url(explicit.as_deref()),
    }
}

fn print_result<T: Serialize>(json: bool, value: &T, text: impl FnOnce()) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        text();
    }
    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) -> anyhow::Result<()> {
    let level = match verbosity.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        other => anyhow::bail!("unknown verbosity '{}' (trace|debug|info|warn|error)", other),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        "json" => subscriber.json().init(),
        "text" => subscriber.init(),
        other => anyhow::bail!("unknown log format '{}' (text|json)", other),
    }

    Ok(())
}

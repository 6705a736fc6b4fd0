use chrono::Utc;
use clap::{Parser, Subcommand};
use geochunk_store::{
    config::StoreConfig,
    ids::ObjectId,
    meta::IndexMeta,
    storage::{indexed::IndexedStore, sqlite_store::SqliteBackend},
};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

/// A CLI tool to interact with the geochunk chunk store.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Connection string, overrides the configuration file
    #[arg(long)]
    connection_string: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the database tables
    Init,
    /// Store a file as a new chunk
    Add {
        /// File to store
        file: PathBuf,
        /// Folder to store the chunk in
        #[arg(short, long, default_value = "/")]
        folder: String,
        /// Import id (generated if omitted)
        #[arg(long)]
        import_id: Option<String>,
        /// Tags to attach to the chunk
        #[arg(short, long)]
        tag: Vec<String>,
        /// CRS to use if the chunk does not specify one
        #[arg(long)]
        crs: Option<String>,
        /// Output format
        #[arg(long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Write a chunk's content to stdout
    Get {
        /// Chunk path
        path: String,
    },
    /// Show the total size of all chunks
    Size,
    /// Delete chunks
    Delete {
        /// Chunk paths
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum OutputFormat {
    Summary,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "summary" => Ok(OutputFormat::Summary),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid format: {s}")),
        }
    }
}

#[derive(Serialize)]
struct AddOutput<'a> {
    path: String,
    bytes: usize,
    meta: &'a IndexMeta,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => StoreConfig::from_file(path)?,
        None => StoreConfig::default(),
    };
    if let Some(cs) = args.connection_string {
        config.connection_string = Some(cs);
    }

    let backend = SqliteBackend::new(config.clone())?;
    let store = IndexedStore::new(backend, config.retry_policy());

    match args.command {
        Commands::Init => {
            store.backend().connect().await?;
            println!(
                "Initialized chunk store at {}",
                store.backend().connection_string()
            );
        }
        Commands::Add {
            file,
            folder,
            import_id,
            tag,
            crs,
            format,
        } => {
            let content = tokio::fs::read(&file).await?;
            let from_file = file
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let import_id = import_id.unwrap_or_else(|| ObjectId::new().to_string());

            let mut meta = IndexMeta::new(import_id, from_file, Utc::now());
            if !tag.is_empty() {
                meta = meta.with_tags(tag);
            }
            if let Some(crs) = crs {
                meta = meta.with_fallback_crs(crs);
            }
            let meta = Arc::new(meta);

            let path = store.add_chunk(&content, &folder, meta.clone()).await?;
            match format {
                OutputFormat::Json => {
                    let output = AddOutput {
                        path,
                        bytes: content.len(),
                        meta: &meta,
                    };
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                OutputFormat::Summary => {
                    println!("Stored {} bytes as {}", content.len(), path);
                }
            }
        }
        Commands::Get { path } => {
            let content = store.get_one(&path).await?.read_to_end().await?;
            std::io::stdout().write_all(&content)?;
        }
        Commands::Size => {
            println!("{}", store.get_size().await?);
        }
        Commands::Delete { paths } => {
            store.delete_chunks(&paths).await?;
            println!("Deleted {} chunks", paths.len());
        }
    }

    Ok(())
}

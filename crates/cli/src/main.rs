use api_shared::UploadRes;
use clap::{Parser, Subcommand};
use filing_core::{DEFAULT_UPLOAD_DIR, ENV_SIDECARS, ENV_STAGING_DIR, ENV_UPLOAD_DIR};
use filing_files::{sha256_bytes, sha256_file, FileRecord, Filestore, RelativePath};
use std::error::Error;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "filing")]
#[command(about = "Filing service CLI: store, unpack and delete files in an upload directory")]
struct Cli {
    /// Upload directory the paths are relative to
    #[arg(long, env = ENV_UPLOAD_DIR, default_value = DEFAULT_UPLOAD_DIR)]
    base_dir: PathBuf,
    /// Directory for staging uploads (defaults to the system temp directory)
    #[arg(long, env = ENV_STAGING_DIR)]
    staging_dir: Option<PathBuf>,
    /// Write a `<file>.sha256` sidecar next to every stored file
    #[arg(long, env = ENV_SIDECARS)]
    sidecars: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a local file at PATH
    Put {
        /// Destination relative to the upload directory
        path: String,
        /// Local file to upload
        file: PathBuf,
        /// Expected SHA-256 (computed from the file when omitted)
        #[arg(long)]
        sha256: Option<String>,
    },
    /// Unpack a local zip archive into the directory of PATH
    Unpack {
        /// Archive path relative to the upload directory; must end in .zip
        path: String,
        /// Local archive to upload
        file: PathBuf,
        /// Expected SHA-256 (computed from the file when omitted)
        #[arg(long)]
        sha256: Option<String>,
    },
    /// Delete the file at PATH
    Delete {
        /// File relative to the upload directory
        path: String,
    },
    /// Print the SHA-256 of a local file
    Hash {
        /// Local file
        file: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("filing=warn".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    if let Some(output) = run(cli)? {
        println!("{}", output);
    }
    Ok(())
}

fn run(cli: Cli) -> Result<Option<String>, Box<dyn Error>> {
    if let Commands::Hash { file } = &cli.command {
        return Ok(Some(sha256_file(file)?.to_string()));
    }

    let mut store = Filestore::new(&cli.base_dir)?.with_sidecars(cli.sidecars);
    if let Some(staging_dir) = cli.staging_dir {
        store = store.with_staging_root(staging_dir);
    }

    match cli.command {
        Commands::Put { path, file, sha256 } => {
            let path = RelativePath::parse(&path)?;
            let data = std::fs::read(&file)?;
            let sha256 = sha256.unwrap_or_else(|| sha256_bytes(&data).to_string());
            let record = store.put(&path, &data, &sha256)?;
            Ok(Some(render(vec![record])?))
        }
        Commands::Unpack { path, file, sha256 } => {
            let path = RelativePath::parse(&path)?;
            let data = std::fs::read(&file)?;
            let sha256 = sha256.unwrap_or_else(|| sha256_bytes(&data).to_string());
            let records = store.unpack(&path, &data, &sha256)?;
            Ok(Some(render(records)?))
        }
        Commands::Delete { path } => {
            let path = RelativePath::parse(&path)?;
            store.delete(&path)?;
            Ok(None)
        }
        Commands::Hash { .. } => Ok(None),
    }
}

/// Renders records the same way the REST API does: `{ "<path>": [size, sha256] }`.
fn render(records: Vec<FileRecord>) -> Result<String, serde_json::Error> {
    let res: UploadRes = records
        .into_iter()
        .map(|record| (record.path.to_string(), record.size, record.sha256.to_string()))
        .collect();
    serde_json::to_string_pretty(&res)
}

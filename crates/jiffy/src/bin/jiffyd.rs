//! `jiffyd` — the reference storage-server process.
//!
//! ```bash
//! # scaffold a data directory and jiffy.toml
//! jiffyd init ./data
//!
//! # start a singleton-chain storage server hosting one hashtable block
//! jiffyd start ./data
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use jiffy::{default_partition_registry, BlockSlotTable, ChainRole, ClientRegistry, Handler, JiffyConfig, NullSink, StorageServer};
use jiffy_types::BlockId;
use tracing::info;

#[derive(Parser)]
#[command(name = "jiffyd")]
#[command(author, version, about = "Jiffy storage-server daemon", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scaffold a data directory and a default `jiffy.toml`.
    Init {
        /// Path to the data directory to create.
        path: PathBuf,
    },
    /// Start the storage-server process.
    Start {
        /// Path to the data directory (must contain `jiffy.toml`, or
        /// defaults are used).
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Init { path } => init(&path),
        Commands::Start { path } => start(&path),
    }
}

fn init(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).with_context(|| format!("creating data directory {}", path.display()))?;
    let config_path = path.join("jiffy.toml");
    if config_path.exists() {
        bail!("{} already exists", config_path.display());
    }
    let config = JiffyConfig::default();
    let toml = toml::to_string_pretty(&config).context("serializing default config")?;
    std::fs::write(&config_path, toml).with_context(|| format!("writing {}", config_path.display()))?;
    println!("Wrote {}", config_path.display());
    Ok(())
}

fn start(path: &Path) -> Result<()> {
    if !path.exists() {
        bail!("data directory '{}' does not exist. Run 'jiffyd init {}' first.", path.display(), path.display());
    }
    let mut config = JiffyConfig::load_from_dir(path).context("loading configuration")?;
    config.resolve_paths(path);
    std::fs::create_dir_all(&config.server.data_dir)
        .with_context(|| format!("creating data dir {}", config.server.data_dir.display()))?;

    info!(
        host = %config.server.bind_host,
        service_port = config.server.service_port,
        block_slots = config.server.block_slots,
        "starting jiffy storage server"
    );

    let registry = default_partition_registry();
    let blocks = Arc::new(BlockSlotTable::new(config.server.block_slots, registry));

    // A freshly-initialized data directory starts with block 0 hosting
    // the whole hash-slot universe as a singleton chain; the directory
    // service (out of scope, spec.md §1) drives any further setup_block
    // calls to split, merge, or add replicas.
    blocks
        .setup_block(BlockId::new(0), "hashtable", "0_65536", "regular", vec![], ChainRole::Singleton)
        .context("setting up block 0")?;

    let clients = Arc::new(ClientRegistry::new());
    let self_addr = (
        config.server.bind_host.clone(),
        config.server.service_port,
        config.server.mgmt_port,
        config.server.notif_port,
        config.server.chain_port,
    );
    let handler = Arc::new(Handler::new(blocks, clients, Arc::new(NullSink), self_addr));
    let server = StorageServer::new(config.server, handler);

    let runtime = tokio::runtime::Runtime::new().context("building tokio runtime")?;
    runtime.block_on(server.run()).context("storage server exited")?;
    Ok(())
}

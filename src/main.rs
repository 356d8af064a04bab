use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use qscatalog::cli::{Commands, init_store, run_init, run_status, run_sync};
use qscatalog::config::{AppConfig, DEFAULT_CONFIG_FILE};
use qscatalog::remote::{QlikClient, RemoteInventory};
use qscatalog::server::{AppState, create_router};
use qscatalog::snapshot::FsSnapshotWriter;
use qscatalog::store::Catalog;

#[derive(Parser)]
#[command(name = "qscatalog")]
#[command(about = "Keeps a local data catalog in step with a Qlik Sense site", long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

fn run_serve(config_path: &Path, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let mut config = AppConfig::load(config_path)?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let store = init_store(&config)?;
    store.initialize()?;

    // Built outside the runtime: the blocking client must not be created on an
    // async worker.
    let remote: Option<Arc<dyn RemoteInventory>> = match QlikClient::new(&config.remote) {
        Ok(client) => {
            info!("Remote inventory at {}", client.base_url());
            Some(Arc::new(client) as Arc<dyn RemoteInventory>)
        }
        Err(e) => {
            tracing::warn!("Sync endpoints disabled: {}", e);
            None
        }
    };

    let addr = config.server.socket_addr()?;
    let state = Arc::new(AppState {
        store: Arc::new(store),
        remote,
        snapshots: Arc::new(FsSnapshotWriter::new(&config)),
        config,
    });

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let app = create_router(state);

        info!("Starting server on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;
        Ok::<(), anyhow::Error>(())
    })
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("qscatalog=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { force } => run_init(&cli.config, force)?,
        Commands::Sync {
            stream,
            model,
            json,
        } => run_sync(&cli.config, stream, model, json)?,
        Commands::Status { json } => run_status(&cli.config, json)?,
        Commands::Serve { host, port } => run_serve(&cli.config, host, port)?,
    }

    Ok(())
}

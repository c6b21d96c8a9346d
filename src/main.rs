use clap::Parser;
use neurohome::{build_router, AppState, ServerConfig, SessionManager};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// NeuroHome - streams a motor imagery recording and drives smart home devices
#[derive(Parser)]
#[command(name = "neurohome")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Recording to stream (overrides NEUROHOME_RECORDING)
    #[arg(long)]
    recording: Option<PathBuf>,

    /// Bind address (overrides NEUROHOME_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides NEUROHOME_PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Sample index to start streaming from
    #[arg(long)]
    start_sample: Option<usize>,

    /// Do not start streaming when the first viewer connects
    #[arg(long)]
    no_auto_start: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "neurohome=info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration; CLI flags win over environment
    let mut config = ServerConfig::from_env()?;
    if let Some(host) = cli.host {
        config.bind_addr = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(recording) = cli.recording {
        config.recording = Some(recording);
    }
    if let Some(start_sample) = cli.start_sample {
        config.stream.start_sample = Some(start_sample);
    }
    if cli.no_auto_start {
        config.auto_start = false;
    }

    info!("🚀 Starting NeuroHome Server v{}", VERSION);
    info!("📋 Configuration loaded:");
    info!("   Port: {}", config.port);
    info!("   Bind address: {}", config.bind_addr);
    match &config.recording {
        Some(path) => info!("   Recording: {}", path.display()),
        None => info!("   Recording: none configured"),
    }
    info!("   Auto start: {}", config.auto_start);
    info!("   Tick interval: {:?}", config.stream.tick_interval);
    info!("   Channel limit: {}", config.stream.channel_limit);

    // Create the session manager
    let sessions = Arc::new(SessionManager::new(config.stream.clone()));

    // Build router
    let state = AppState {
        sessions,
        config: Arc::new(config.clone()),
    };
    let app = build_router(state);

    // Start server
    let addr: SocketAddr = config.bind_address().parse()?;
    info!("🎧 Listening on {}", addr);
    info!("📡 WebSocket endpoint: ws://{}/ws", addr);
    info!("🔑 Health endpoint: http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

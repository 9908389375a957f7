use clap::Parser;
use log::{error, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use server::config::ServerConfig;
use server::network::{Server, ServerMessage};
use server::round::RoundStateMachine;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// TOML settings file; missing fields use built-in defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Server IP address to bind to
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Server port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Tick rate (updates per second)
    #[arg(short, long)]
    tick_rate: Option<u32>,

    /// Maximum number of connected clients
    #[arg(short, long)]
    max_clients: Option<usize>,

    /// Seed for role assignment, for reproducible sessions
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(tick_rate) = args.tick_rate {
        config.server.tick_rate = tick_rate;
    }
    if let Some(max_clients) = args.max_clients {
        config.server.max_clients = max_clients;
    }
    config.validate()?;

    let rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    info!(
        "Starting server on {}:{} at {}Hz",
        config.server.host, config.server.port, config.server.tick_rate
    );

    let round = RoundStateMachine::new(config.game.clone(), &config.map, rng);
    let mut server = Server::new(&config.server, round).await?;

    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down");
            let _ = shutdown.send(ServerMessage::Shutdown);
        }
    });

    if let Err(e) = server.run().await {
        error!("Server error: {}", e);
        return Err(e);
    }

    Ok(())
}

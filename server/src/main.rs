use clap::Parser;
use log::{error, info};
use server::network::BoxError;
use server::{Server, ServerConfig};
use shared::{
    DEFAULT_COLLECTIBLES, DEFAULT_HAZARDS, DEFAULT_MAX_PLAYERS, DEFAULT_PORT, GROWTH_INCREMENT,
};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Host address to bind to
    #[arg(short = 'H', long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Maximum number of concurrent players
    #[arg(short, long, env = "MAX_PLAYERS", default_value_t = DEFAULT_MAX_PLAYERS)]
    max_players: usize,

    /// Collectibles generated per round
    #[arg(long, env = "COLLECTIBLES", default_value_t = DEFAULT_COLLECTIBLES)]
    collectibles: usize,

    /// Hazards generated at startup
    #[arg(long, env = "HAZARDS", default_value_t = DEFAULT_HAZARDS)]
    hazards: usize,

    /// Size gained per consumed collectible
    #[arg(long, env = "GROWTH_INCREMENT", default_value_t = GROWTH_INCREMENT)]
    growth: f32,

    /// Disconnect clients silent for this many seconds (0 disables)
    #[arg(long, env = "IDLE_TIMEOUT_SECS", default_value_t = 0)]
    idle_timeout_secs: u64,

    /// Reject consumption of objects farther than this from the player
    #[arg(long, env = "MAX_CONSUME_DISTANCE")]
    max_consume_distance: Option<f32>,

    /// Regenerate collectibles once they have all been consumed
    #[arg(long, env = "NEW_ROUND_WHEN_EMPTY")]
    new_round_when_empty: bool,

    /// Let clients grow by reporting a larger size
    #[arg(long, env = "ACCEPT_SIZE_REPORTS")]
    accept_size_reports: bool,

    /// Seed for world placement
    #[arg(long, env = "ARENA_SEED")]
    seed: Option<u64>,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        ServerConfig {
            bind_addr: format!("{}:{}", self.host, self.port),
            max_players: self.max_players,
            collectibles: self.collectibles,
            hazards: self.hazards,
            growth_increment: self.growth,
            idle_timeout: (self.idle_timeout_secs > 0)
                .then(|| Duration::from_secs(self.idle_timeout_secs)),
            max_consume_distance: self.max_consume_distance,
            new_round_when_empty: self.new_round_when_empty,
            accept_size_reports: self.accept_size_reports,
            seed: self.seed,
            ..ServerConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Args::parse().into_config();

    let server = match Server::bind(config).await {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to start server: {}", e);
            return Err(e);
        }
    };

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped: {}", e);
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}

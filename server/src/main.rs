use clap::Parser;
use log::{error, info};
use server::{GameConfig, Server, ServerConfig};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, env = "ARENA_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, env = "ARENA_PORT", default_value_t = shared::SERVER_PORT)]
    port: u16,

    /// Tick rate (updates per second)
    #[arg(short, long, env = "ARENA_TICK_RATE", default_value_t = shared::UPDATE_RATE)]
    tick_rate: u32,

    /// Players needed to start a match
    #[arg(long, env = "ARENA_MAX_PLAYERS", default_value_t = shared::MAX_PLAYERS)]
    max_players: usize,

    /// Open sockets accepted at once
    #[arg(long, env = "ARENA_MAX_CONNECTIONS", default_value_t = 8)]
    max_connections: usize,

    /// Arena width
    #[arg(long, default_value_t = shared::WORLD_WIDTH, value_parser = parse_dimension)]
    width: f32,

    /// Arena height (no short flag to avoid conflict with --help)
    #[arg(long, default_value_t = shared::WORLD_HEIGHT, value_parser = parse_dimension)]
    height: f32,

    /// Drop connections silent for this long; 0 disables
    #[arg(long, env = "ARENA_IDLE_TIMEOUT_SECS", default_value_t = 10)]
    idle_timeout_secs: u64,

    /// Let player attacks hit other players
    #[arg(long)]
    friendly_fire: bool,

    /// Keep a match running when a player leaves
    #[arg(long)]
    keep_playing_on_leave: bool,
}

fn parse_dimension(value: &str) -> Result<f32, String> {
    let size: f32 = value.parse().map_err(|e| format!("{}", e))?;
    if size.is_finite() && size > 0.0 {
        Ok(size)
    } else {
        Err(format!("arena size must be a positive number, got {}", value))
    }
}

impl Args {
    fn into_config(self) -> ServerConfig {
        ServerConfig {
            address: format!("{}:{}", self.host, self.port),
            tick_rate: self.tick_rate.max(1),
            max_connections: self.max_connections.max(self.max_players),
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            game: GameConfig {
                arena_width: self.width,
                arena_height: self.height,
                max_players: self.max_players.max(1),
                friendly_fire: self.friendly_fire,
                end_on_leave: !self.keep_playing_on_leave,
                ..GameConfig::default()
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Args::parse().into_config();
    info!("Starting arena server on {}", config.address);

    let server = Server::bind(config).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped: {}", e);
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}

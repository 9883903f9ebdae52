//! # Arena Server Library
//!
//! Authoritative server for a two-player arena survival match. Clients connect
//! over WebSocket, join the room and stream input; the server runs the whole
//! simulation and broadcasts a full snapshot every tick.
//!
//! ## Architecture
//!
//! ### Single owner loop
//! [`network::Server`] owns the connection registry and the room. Socket tasks
//! only forward frames to it over a channel, so routing an inbound message and
//! running a tick are never concurrent and the room needs no lock.
//!
//! ### Tick order
//! Each tick applies the coalesced input of every player, then advances buff
//! timers, enemy AI, pickups and wave progression, and finally broadcasts a
//! `GAME_STATE_UPDATE` built from the finished state.
//!
//! ## Modules
//!
//! - [`config`]: balance table and startup settings
//! - [`client_manager`]: connection registry and input coalescing
//! - [`combat`]: distance-based attack, damage and pickup resolution
//! - [`waves`]: wave composition, scaling and enemy AI
//! - [`room`]: the match state machine
//! - [`network`]: WebSocket front end and tick scheduler
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind(ServerConfig::default()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod combat;
pub mod config;
pub mod error;
pub mod network;
pub mod room;
pub mod utils;
pub mod waves;

pub use config::{GameConfig, ServerConfig};
pub use error::ServerError;
pub use network::Server;
pub use room::Room;

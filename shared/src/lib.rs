//! Wire model shared by the arena server, its bot client and any other client.
//!
//! - [`entity`]: players, enemies, collectibles and the per-tick snapshot
//! - [`protocol`]: the `{type, data, timestamp?}` envelope and message payloads
//! - [`codec`]: MessagePack encoding of envelopes

pub mod codec;
pub mod entity;
pub mod protocol;

pub use codec::{decode, encode, CodecError};
pub use entity::{
    AnimationState, Collectible, CollectibleType, Enemy, EnemyType, Player, PlayerState,
    RoomState, Snapshot, Vector2,
};
pub use protocol::{
    ClientMessage, Envelope, FinalScore, GameEndPayload, GameStartPayload,
    GameStateUpdatePayload, JoinGamePayload, LeaveGamePayload, PlayerAction,
    PlayerDiedPayload, PlayerInputPayload, PlayerJoinedPayload, PlayerLeftPayload,
    ServerMessage, YouJoinedPayload,
};

pub const WORLD_WIDTH: f32 = 800.0;
pub const WORLD_HEIGHT: f32 = 600.0;
pub const SERVER_PORT: u16 = 8080;
/// Simulation and snapshot rate in Hz
pub const UPDATE_RATE: u32 = 20;
pub const MAX_PLAYERS: usize = 2;

pub const PLAYER_HEALTH: f32 = 100.0;
/// Distance moved per applied input sample
pub const PLAYER_SPEED: f32 = 5.0;
pub const PLAYER_DAMAGE: f32 = 20.0;
/// Milliseconds between two player attacks
pub const ATTACK_COOLDOWN: u64 = 500;

//! Startup settings and the canonical balance table.

use shared::{CollectibleType, EnemyType};
use std::time::Duration;

/// Base stats of one enemy type before wave scaling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnemyStats {
    pub health: f32,
    /// Units per second
    pub speed: f32,
    pub damage: f32,
    /// Points awarded to the killer
    pub score: u32,
}

pub fn enemy_stats(enemy_type: EnemyType) -> EnemyStats {
    match enemy_type {
        EnemyType::Slime => EnemyStats {
            health: 30.0,
            speed: 50.0,
            damage: 10.0,
            score: 10,
        },
        EnemyType::Goblin => EnemyStats {
            health: 50.0,
            speed: 70.0,
            damage: 15.0,
            score: 20,
        },
        EnemyType::Orc => EnemyStats {
            health: 100.0,
            speed: 40.0,
            damage: 25.0,
            score: 50,
        },
    }
}

/// One row of the drop table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DropEntry {
    pub collectible_type: CollectibleType,
    pub weight: u32,
    pub value: f32,
}

pub const DROP_TABLE: [DropEntry; 5] = [
    DropEntry {
        collectible_type: CollectibleType::Health,
        weight: 35,
        value: 20.0,
    },
    DropEntry {
        collectible_type: CollectibleType::Coin,
        weight: 20,
        value: 25.0,
    },
    DropEntry {
        collectible_type: CollectibleType::Shield,
        weight: 15,
        value: 5.0,
    },
    DropEntry {
        collectible_type: CollectibleType::DamageBoost,
        weight: 15,
        value: 10.0,
    },
    DropEntry {
        collectible_type: CollectibleType::SpeedBoost,
        weight: 15,
        value: 10.0,
    },
];

/// Balance and rule settings for one room.
#[derive(Debug, Clone, PartialEq)]
pub struct GameConfig {
    pub arena_width: f32,
    pub arena_height: f32,
    /// Players needed to start; joins beyond this are rejected
    pub max_players: usize,

    pub player_health: f32,
    /// Distance per applied input
    pub player_speed: f32,
    pub player_damage: f32,
    pub attack_cooldown_ms: u64,
    pub attack_duration_ms: u64,
    pub attack_radius: f32,
    pub damage_boost_multiplier: f32,
    pub speed_boost_multiplier: f32,
    pub pickup_radius: f32,
    /// Collectibles land this far (at most) from the dead enemy
    pub drop_offset: f32,

    pub enemy_attack_range: f32,
    pub enemy_attack_duration_ms: u64,
    /// How long a dead enemy stays in snapshots
    pub enemy_removal_delay_ms: u64,
    pub spawn_margin: f32,

    pub base_enemy_count: u32,
    pub wave_delay_ms: u64,
    pub wave_scaling: f32,
    pub max_speed_scale: f32,

    pub friendly_fire: bool,
    /// End a running match as soon as any player leaves
    pub end_on_leave: bool,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            arena_width: shared::WORLD_WIDTH,
            arena_height: shared::WORLD_HEIGHT,
            max_players: shared::MAX_PLAYERS,
            player_health: shared::PLAYER_HEALTH,
            player_speed: shared::PLAYER_SPEED,
            player_damage: shared::PLAYER_DAMAGE,
            attack_cooldown_ms: shared::ATTACK_COOLDOWN,
            attack_duration_ms: 300,
            attack_radius: 50.0,
            damage_boost_multiplier: 1.5,
            speed_boost_multiplier: 1.5,
            pickup_radius: 24.0,
            drop_offset: 40.0,
            enemy_attack_range: 30.0,
            enemy_attack_duration_ms: 1000,
            enemy_removal_delay_ms: 1000,
            spawn_margin: 20.0,
            base_enemy_count: 5,
            wave_delay_ms: 3000,
            wave_scaling: 0.1,
            max_speed_scale: 2.0,
            friendly_fire: false,
            end_on_leave: true,
        }
    }
}

impl GameConfig {
    /// Clamps a point into the arena rectangle.
    pub fn clamp_to_arena(&self, x: f32, y: f32) -> (f32, f32) {
        let x = if x.is_finite() { x } else { 0.0 };
        let y = if y.is_finite() { y } else { 0.0 };
        (x.clamp(0.0, self.arena_width.max(0.0)), y.clamp(0.0, self.arena_height.max(0.0)))
    }
}

/// Process-level settings resolved from the command line.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub address: String,
    pub tick_rate: u32,
    /// Open sockets accepted at once, players and spectators together
    pub max_connections: usize,
    /// Connections silent for longer than this are dropped; zero disables the check
    pub idle_timeout: Duration,
    pub game: GameConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: format!("127.0.0.1:{}", shared::SERVER_PORT),
            tick_rate: shared::UPDATE_RATE,
            max_connections: 8,
            idle_timeout: Duration::from_secs(10),
            game: GameConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f32(1.0 / self.tick_rate.max(1) as f32)
    }
}

//! Entity records shared between the authoritative server and its clients.
//!
//! Every type here is plain data. The server mutates them inside a room and
//! clients only ever see them as part of a snapshot, so field names follow the
//! camelCase convention of the wire format.

use serde::{Deserialize, Serialize};

///Represents a vector in 2D arena space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Vector2 {
    ///Value along the x-axis.
    /// Positive direction is to the right.
    pub x: f32,
    ///Value along the y-axis.
    /// Positive direction is down, matching screen coordinates.
    pub y: f32,
}

impl Vector2 {
    pub const ZERO: Vector2 = Vector2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    ///Returns the magnitude of the vector.
    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    ///Returns the normalized vector, or zero for a zero vector.
    pub fn normalize(&self) -> Vector2 {
        let mag = self.magnitude();
        if mag == 0.0 {
            Vector2::ZERO
        } else {
            Vector2 {
                x: self.x / mag,
                y: self.y / mag,
            }
        }
    }

    ///Returns the scaled vector.
    pub fn scale(&self, scalar: f32) -> Vector2 {
        Vector2 {
            x: self.x * scalar,
            y: self.y * scalar,
        }
    }

    ///Returns the sum of two vectors.
    pub fn add(&self, other: &Vector2) -> Vector2 {
        Vector2 {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }

    ///Returns the Euclidean distance between two points.
    pub fn distance(&self, other: &Vector2) -> f32 {
        Vector2::new(other.x - self.x, other.y - self.y).magnitude()
    }

    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }

    /// Non-finite components are treated as zero so a bad input cannot poison positions.
    pub fn sanitized(&self) -> Vector2 {
        let fix = |v: f32| if v.is_finite() { v } else { 0.0 };
        Vector2::new(fix(self.x), fix(self.y))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayerState {
    Alive,
    Dead,
}

/// Rendering hint for the client; carries no simulation meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AnimationState {
    #[default]
    Idle,
    Walking,
    Attacking,
}

/// Authoritative state of one connected player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub x: f32,
    pub y: f32,
    pub health: f32,
    pub max_health: f32,
    pub speed: f32,
    pub damage: f32,
    pub state: PlayerState,
    /// Last direction received from input, zero when standing still
    pub direction: Vector2,
    /// Last nonzero input direction
    pub facing_direction: Vector2,
    pub last_attack_time: u64,
    pub score: u32,
    pub is_attacking: bool,
    pub attack_end_time: u64,
    /// Remaining milliseconds of each buff
    pub invulnerable_timer: f32,
    pub damage_boost_timer: f32,
    pub speed_boost_timer: f32,
    pub current_state: AnimationState,
}

impl Player {
    pub fn new(id: impl Into<String>, x: f32, y: f32, max_health: f32, speed: f32, damage: f32) -> Self {
        Self {
            id: id.into(),
            name: None,
            x,
            y,
            health: max_health,
            max_health,
            speed,
            damage,
            state: PlayerState::Alive,
            direction: Vector2::ZERO,
            facing_direction: Vector2::new(1.0, 0.0),
            last_attack_time: 0,
            score: 0,
            is_attacking: false,
            attack_end_time: 0,
            invulnerable_timer: 0.0,
            damage_boost_timer: 0.0,
            speed_boost_timer: 0.0,
            current_state: AnimationState::Idle,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.state == PlayerState::Alive
    }

    pub fn position(&self) -> Vector2 {
        Vector2::new(self.x, self.y)
    }

    pub fn is_invulnerable(&self) -> bool {
        self.invulnerable_timer > 0.0
    }

    /// Idle or walking, depending on the last received direction.
    pub fn movement_state(&self) -> AnimationState {
        if self.direction.is_zero() {
            AnimationState::Idle
        } else {
            AnimationState::Walking
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnemyType {
    Slime,
    Goblin,
    Orc,
}

/// Server-spawned hostile entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enemy {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub health: f32,
    pub max_health: f32,
    pub speed: f32,
    pub damage: f32,
    #[serde(rename = "type")]
    pub enemy_type: EnemyType,
    pub is_alive: bool,
    pub facing_direction: Vector2,
    pub is_attacking: bool,
    pub attack_end_time: u64,
}

impl Enemy {
    pub fn new(
        id: impl Into<String>,
        enemy_type: EnemyType,
        x: f32,
        y: f32,
        health: f32,
        speed: f32,
        damage: f32,
    ) -> Self {
        Self {
            id: id.into(),
            x,
            y,
            health,
            max_health: health,
            speed,
            damage,
            enemy_type,
            is_alive: true,
            facing_direction: Vector2::new(1.0, 0.0),
            is_attacking: false,
            attack_end_time: 0,
        }
    }

    pub fn position(&self) -> Vector2 {
        Vector2::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectibleType {
    Health,
    Coin,
    Shield,
    DamageBoost,
    SpeedBoost,
}

/// Pickup lying in the arena.
///
/// `value` is HP for health, points for coins and buff seconds for the rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collectible {
    pub id: String,
    pub x: f32,
    pub y: f32,
    #[serde(rename = "type")]
    pub collectible_type: CollectibleType,
    pub value: f32,
}

impl Collectible {
    pub fn position(&self) -> Vector2 {
        Vector2::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomState {
    Waiting,
    Playing,
    Finished,
}

/// Complete room state sent to clients once per tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub players: Vec<Player>,
    pub enemies: Vec<Enemy>,
    pub collectibles: Vec<Collectible>,
    pub state: RoomState,
    pub wave: u32,
    pub game_time: f32,
}

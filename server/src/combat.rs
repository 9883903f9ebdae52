//! Combat and collision resolution.
//!
//! All checks are plain distance tests against entity positions, run at the
//! moment an attack or tick happens. Nothing here keeps state of its own; the
//! room passes in the maps it owns.

use crate::config::{enemy_stats, GameConfig, DROP_TABLE};
use rand::Rng;
use shared::{
    AnimationState, Collectible, CollectibleType, Enemy, EnemyType, Player, PlayerState, Vector2,
};
use std::collections::HashMap;

/// Result of one player attack.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct AttackOutcome {
    /// Entities that took damage
    pub hits: usize,
    /// Enemies brought to zero health by this attack, with their death position
    pub killed_enemies: Vec<(String, EnemyType, Vector2)>,
    /// Players killed by this attack (friendly fire only)
    pub killed_players: Vec<String>,
}

/// A collectible consumed during a pickup pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Pickup {
    pub player_id: String,
    pub collectible: Collectible,
}

pub fn within_range(a: Vector2, b: Vector2, radius: f32) -> bool {
    a.distance(&b) <= radius
}

/// Damage a player's attack deals, including an active damage boost.
pub fn attack_damage(player: &Player, config: &GameConfig) -> f32 {
    if player.damage_boost_timer > 0.0 {
        player.damage * config.damage_boost_multiplier
    } else {
        player.damage
    }
}

/// Movement distance per input, including an active speed boost.
pub fn movement_speed(player: &Player, config: &GameConfig) -> f32 {
    if player.speed_boost_timer > 0.0 {
        player.speed * config.speed_boost_multiplier
    } else {
        player.speed
    }
}

/// Zero means the player has never attacked.
pub fn attack_ready(player: &Player, now: u64, config: &GameConfig) -> bool {
    player.last_attack_time == 0 || now.saturating_sub(player.last_attack_time) > config.attack_cooldown_ms
}

/// Applies damage to a player. Returns true if this hit killed them.
///
/// Dead and invulnerable players are untouched.
pub fn damage_player(player: &mut Player, amount: f32) -> bool {
    if !player.is_alive() || player.is_invulnerable() {
        return false;
    }

    player.health = (player.health - amount.max(0.0)).min(player.max_health);
    if player.health <= 0.0 {
        player.health = 0.0;
        player.state = PlayerState::Dead;
        player.is_attacking = false;
        player.direction = Vector2::ZERO;
        player.current_state = AnimationState::Idle;
        return true;
    }
    false
}

/// Applies damage to an enemy. Returns true if this hit killed it.
pub fn damage_enemy(enemy: &mut Enemy, amount: f32) -> bool {
    if !enemy.is_alive {
        return false;
    }

    enemy.health -= amount.max(0.0);
    if enemy.health <= 0.0 {
        enemy.health = 0.0;
        enemy.is_alive = false;
        enemy.is_attacking = false;
        return true;
    }
    false
}

/// Resolves an attack by `attacker_id` against everything in range.
///
/// Kill score is credited to the attacker. Marking the attack window and
/// cooldown on the attacker is left to the caller.
pub fn resolve_player_attack(
    attacker_id: &str,
    players: &mut HashMap<String, Player>,
    enemies: &mut HashMap<String, Enemy>,
    config: &GameConfig,
) -> AttackOutcome {
    let mut outcome = AttackOutcome::default();
    let Some(attacker) = players.get(attacker_id) else {
        return outcome;
    };
    if !attacker.is_alive() {
        return outcome;
    }

    let origin = attacker.position();
    let damage = attack_damage(attacker, config);

    for enemy in enemies.values_mut() {
        if !enemy.is_alive || !within_range(origin, enemy.position(), config.attack_radius) {
            continue;
        }
        outcome.hits += 1;
        if damage_enemy(enemy, damage) {
            outcome
                .killed_enemies
                .push((enemy.id.clone(), enemy.enemy_type, enemy.position()));
        }
    }

    if config.friendly_fire {
        for (id, other) in players.iter_mut() {
            if id == attacker_id
                || !other.is_alive()
                || !within_range(origin, other.position(), config.attack_radius)
            {
                continue;
            }
            outcome.hits += 1;
            if damage_player(other, damage) {
                outcome.killed_players.push(id.clone());
            }
        }
    }

    let earned: u32 = outcome
        .killed_enemies
        .iter()
        .map(|(_, enemy_type, _)| enemy_stats(*enemy_type).score)
        .sum();
    if let Some(attacker) = players.get_mut(attacker_id) {
        attacker.score += earned;
    }

    outcome
}

const DROP_PLACEMENT_ATTEMPTS: usize = 8;

/// Picks a drop from the weighted table and places it near `origin`, on the
/// side facing away from `killer` and outside the killer's pickup radius.
pub fn roll_drop<R: Rng>(
    rng: &mut R,
    id: String,
    origin: Vector2,
    killer: Vector2,
    config: &GameConfig,
) -> Collectible {
    let total: u32 = DROP_TABLE.iter().map(|entry| entry.weight).sum();
    let mut roll = rng.gen_range(0..total.max(1));
    let mut chosen = DROP_TABLE[0];
    for entry in DROP_TABLE {
        if roll < entry.weight {
            chosen = entry;
            break;
        }
        roll -= entry.weight;
    }

    let (x, y) = drop_position(rng, origin, killer, config);

    Collectible {
        id,
        x,
        y,
        collectible_type: chosen.collectible_type,
        value: chosen.value,
    }
}

fn drop_position<R: Rng>(rng: &mut R, origin: Vector2, killer: Vector2, config: &GameConfig) -> (f32, f32) {
    let away = Vector2::new(origin.x - killer.x, origin.y - killer.y).normalize();
    let clearance = config.pickup_radius + 1.0;

    for attempt in 0..DROP_PLACEMENT_ATTEMPTS {
        // Killer standing on the corpse, or boxed in by a wall: any direction
        let heading = if away.is_zero() || attempt >= DROP_PLACEMENT_ATTEMPTS / 2 {
            rng.gen_range(0.0..std::f32::consts::TAU)
        } else {
            away.y.atan2(away.x) + rng.gen_range(-std::f32::consts::FRAC_PI_4..=std::f32::consts::FRAC_PI_4)
        };
        let radius = rng.gen_range(config.drop_offset * 0.5..=config.drop_offset);
        let mut spot = origin.add(&Vector2::new(heading.cos(), heading.sin()).scale(radius));

        let from_killer = Vector2::new(spot.x - killer.x, spot.y - killer.y);
        if from_killer.magnitude() < clearance && !from_killer.is_zero() {
            spot = killer.add(&from_killer.normalize().scale(clearance));
        }

        let (x, y) = config.clamp_to_arena(spot.x, spot.y);
        if killer.distance(&Vector2::new(x, y)) > config.pickup_radius {
            return (x, y);
        }
    }

    // Step off the killer towards the middle of the arena
    let center = Vector2::new(config.arena_width / 2.0, config.arena_height / 2.0);
    let inward = Vector2::new(center.x - killer.x, center.y - killer.y).normalize();
    let inward = if inward.is_zero() { Vector2::new(1.0, 0.0) } else { inward };
    let spot = killer.add(&inward.scale(clearance));
    config.clamp_to_arena(spot.x, spot.y)
}

/// Applies a collectible's effect to a player.
pub fn apply_collectible(player: &mut Player, collectible: &Collectible) {
    let value = collectible.value.max(0.0);
    match collectible.collectible_type {
        CollectibleType::Health => {
            player.health = (player.health + value).min(player.max_health);
        }
        CollectibleType::Coin => {
            player.score += value as u32;
        }
        CollectibleType::Shield => {
            player.invulnerable_timer = player.invulnerable_timer.max(value * 1000.0);
        }
        CollectibleType::DamageBoost => {
            player.damage_boost_timer = player.damage_boost_timer.max(value * 1000.0);
        }
        CollectibleType::SpeedBoost => {
            player.speed_boost_timer = player.speed_boost_timer.max(value * 1000.0);
        }
    }
}

/// Hands every collectible to the first alive player in range.
///
/// Ties between players in range go to whichever the map yields first.
pub fn collect_pickups(
    players: &mut HashMap<String, Player>,
    collectibles: &mut HashMap<String, Collectible>,
    config: &GameConfig,
) -> Vec<Pickup> {
    let mut taken = Vec::new();

    for collectible in collectibles.values() {
        let collector = players.values_mut().find(|player| {
            player.is_alive() && within_range(player.position(), collectible.position(), config.pickup_radius)
        });
        if let Some(player) = collector {
            apply_collectible(player, collectible);
            taken.push(Pickup {
                player_id: player.id.clone(),
                collectible: collectible.clone(),
            });
        }
    }

    for pickup in &taken {
        collectibles.remove(&pickup.collectible.id);
    }
    taken
}

/// Advances buff countdowns and closes an expired attack window.
pub fn tick_player_timers(player: &mut Player, dt_ms: f32, now: u64) {
    player.invulnerable_timer = (player.invulnerable_timer - dt_ms).max(0.0);
    player.damage_boost_timer = (player.damage_boost_timer - dt_ms).max(0.0);
    player.speed_boost_timer = (player.speed_boost_timer - dt_ms).max(0.0);

    if player.is_attacking && now >= player.attack_end_time {
        player.is_attacking = false;
        player.current_state = player.movement_state();
    }
}

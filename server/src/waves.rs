//! Wave composition and enemy behaviour.

use crate::combat::{damage_player, within_range};
use crate::config::{enemy_stats, GameConfig};
use rand::Rng;
use shared::{Enemy, EnemyType, Player};
use std::collections::HashMap;

/// Enemy types rotated through while spawning a wave.
pub fn enemy_types_for_wave(wave: u32) -> &'static [EnemyType] {
    match wave {
        0 | 1 => &[EnemyType::Slime],
        2 | 3 => &[EnemyType::Slime, EnemyType::Goblin],
        _ => &[EnemyType::Slime, EnemyType::Goblin, EnemyType::Orc],
    }
}

pub fn enemy_count_for_wave(wave: u32, config: &GameConfig) -> u32 {
    config.base_enemy_count + wave.saturating_sub(1) / 2
}

/// Health and damage multiplier for a wave.
pub fn stat_scale(wave: u32, config: &GameConfig) -> f32 {
    1.0 + wave.saturating_sub(1) as f32 * config.wave_scaling
}

/// Speed multiplier for a wave, capped.
pub fn speed_scale(wave: u32, config: &GameConfig) -> f32 {
    stat_scale(wave, config).min(config.max_speed_scale)
}

/// Spawns enemies and hands out their ids.
#[derive(Debug, Default)]
pub struct WaveDirector {
    next_enemy_id: u64,
}

impl WaveDirector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the enemies of `wave` at random in-bounds positions.
    pub fn start_wave<R: Rng>(&mut self, wave: u32, config: &GameConfig, rng: &mut R) -> Vec<Enemy> {
        let types = enemy_types_for_wave(wave);
        let count = enemy_count_for_wave(wave, config);
        let scale = stat_scale(wave, config);
        let speed = speed_scale(wave, config);

        (0..count as usize)
            .map(|i| {
                let enemy_type = types[i % types.len()];
                let stats = enemy_stats(enemy_type);
                let (x, y) = self.spawn_position(config, rng);
                self.next_enemy_id += 1;
                Enemy::new(
                    format!("enemy_{}", self.next_enemy_id),
                    enemy_type,
                    x,
                    y,
                    stats.health * scale,
                    stats.speed * speed,
                    stats.damage * scale,
                )
            })
            .collect()
    }

    fn spawn_position<R: Rng>(&self, config: &GameConfig, rng: &mut R) -> (f32, f32) {
        let width = config.arena_width.max(0.0);
        let height = config.arena_height.max(0.0);
        let margin_x = config.spawn_margin.min(width / 2.0).max(0.0);
        let margin_y = config.spawn_margin.min(height / 2.0).max(0.0);
        let x = rng.gen_range(margin_x..=width - margin_x);
        let y = rng.gen_range(margin_y..=height - margin_y);
        (x, y)
    }
}

/// What an enemy did during its AI step.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EnemyStep {
    pub attacked: Option<String>,
    pub killed: Option<String>,
}

/// Runs one AI step: face and chase the nearest alive player, attack when in range.
///
/// `dt` is in seconds, `now` is the room clock in milliseconds.
pub fn update_enemy(
    enemy: &mut Enemy,
    players: &mut HashMap<String, Player>,
    dt: f32,
    now: u64,
    config: &GameConfig,
) -> EnemyStep {
    let mut step = EnemyStep::default();
    if !enemy.is_alive {
        return step;
    }

    if enemy.is_attacking && now >= enemy.attack_end_time {
        enemy.is_attacking = false;
    }

    let origin = enemy.position();
    let nearest = players
        .values()
        .filter(|player| player.is_alive())
        .map(|player| (player.id.clone(), player.position(), origin.distance(&player.position())))
        .min_by(|a, b| a.2.total_cmp(&b.2));

    let Some((target_id, target_pos, distance)) = nearest else {
        return step;
    };

    let heading = shared::Vector2::new(target_pos.x - origin.x, target_pos.y - origin.y).normalize();
    if !heading.is_zero() {
        enemy.facing_direction = heading;
    }

    if !enemy.is_attacking && distance > config.enemy_attack_range {
        let travel = (enemy.speed * dt.max(0.0)).min(distance);
        let (x, y) = config.clamp_to_arena(enemy.x + heading.x * travel, enemy.y + heading.y * travel);
        enemy.x = x;
        enemy.y = y;
    }

    if !enemy.is_attacking && within_range(enemy.position(), target_pos, config.enemy_attack_range) {
        enemy.is_attacking = true;
        enemy.attack_end_time = now + config.enemy_attack_duration_ms;
        step.attacked = Some(target_id.clone());
        if let Some(target) = players.get_mut(&target_id) {
            if damage_player(target, enemy.damage) {
                step.killed = Some(target_id);
            }
        }
    }

    step
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn players_with(list: Vec<Player>) -> HashMap<String, Player> {
        list.into_iter().map(|p| (p.id.clone(), p)).collect()
    }

    #[test]
    fn test_enemy_count_progression() {
        let config = GameConfig::default();
        assert_eq!(enemy_count_for_wave(1, &config), 5);
        assert_eq!(enemy_count_for_wave(2, &config), 5);
        assert_eq!(enemy_count_for_wave(3, &config), 6);
        assert_eq!(enemy_count_for_wave(6, &config), 7);
    }

    #[test]
    fn test_scaling_and_speed_cap() {
        let config = GameConfig::default();
        assert_approx_eq!(stat_scale(1, &config), 1.0);
        assert_approx_eq!(stat_scale(3, &config), 1.2);
        assert_approx_eq!(speed_scale(3, &config), 1.2);
        assert_approx_eq!(stat_scale(21, &config), 3.0);
        assert_approx_eq!(speed_scale(21, &config), 2.0);
    }

    #[test]
    fn test_type_rotation() {
        assert_eq!(enemy_types_for_wave(1), &[EnemyType::Slime]);
        assert_eq!(enemy_types_for_wave(3).len(), 2);
        assert!(enemy_types_for_wave(4).contains(&EnemyType::Orc));
    }

    #[test]
    fn test_start_wave_spawns_in_bounds() {
        let config = GameConfig::default();
        let mut director = WaveDirector::new();
        let mut rng = StdRng::seed_from_u64(1);

        let wave = director.start_wave(4, &config, &mut rng);
        assert_eq!(wave.len() as u32, enemy_count_for_wave(4, &config));
        for enemy in &wave {
            assert!(enemy.is_alive);
            assert!(enemy.x >= 0.0 && enemy.x <= config.arena_width);
            assert!(enemy.y >= 0.0 && enemy.y <= config.arena_height);
        }
        assert_eq!(wave[0].enemy_type, EnemyType::Slime);
        assert_eq!(wave[1].enemy_type, EnemyType::Goblin);
        assert_eq!(wave[2].enemy_type, EnemyType::Orc);
        assert_approx_eq!(wave[0].max_health, 30.0 * 1.3, 1e-4);
    }

    #[test]
    fn test_degenerate_arena_spawns_at_origin() {
        let config = GameConfig {
            arena_width: 0.0,
            arena_height: f32::NAN,
            ..GameConfig::default()
        };
        let mut director = WaveDirector::new();
        let mut rng = StdRng::seed_from_u64(9);

        for enemy in director.start_wave(1, &config, &mut rng) {
            assert_eq!((enemy.x, enemy.y), (0.0, 0.0));
        }
    }

    #[test]
    fn test_enemy_ids_unique_across_waves() {
        let config = GameConfig::default();
        let mut director = WaveDirector::new();
        let mut rng = StdRng::seed_from_u64(2);

        let mut ids: Vec<String> = director
            .start_wave(1, &config, &mut rng)
            .into_iter()
            .chain(director.start_wave(2, &config, &mut rng))
            .map(|e| e.id)
            .collect();
        let total = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), total);
    }

    #[test]
    fn test_enemy_chases_nearest_player() {
        let config = GameConfig::default();
        let mut enemy = Enemy::new("e1", EnemyType::Slime, 100.0, 100.0, 30.0, 50.0, 10.0);
        let mut players = players_with(vec![
            Player::new("near", 200.0, 100.0, 100.0, 5.0, 20.0),
            Player::new("far", 100.0, 500.0, 100.0, 5.0, 20.0),
        ]);

        let step = update_enemy(&mut enemy, &mut players, 0.1, 100, &config);
        assert!(step.attacked.is_none());
        assert_approx_eq!(enemy.x, 105.0, 1e-4);
        assert_approx_eq!(enemy.y, 100.0, 1e-4);
        assert_approx_eq!(enemy.facing_direction.x, 1.0, 1e-6);
    }

    #[test]
    fn test_enemy_idles_without_alive_players() {
        let config = GameConfig::default();
        let mut enemy = Enemy::new("e1", EnemyType::Slime, 100.0, 100.0, 30.0, 50.0, 10.0);
        let mut dead = Player::new("p1", 110.0, 100.0, 100.0, 5.0, 20.0);
        dead.state = shared::PlayerState::Dead;
        dead.health = 0.0;
        let mut players = players_with(vec![dead]);

        let step = update_enemy(&mut enemy, &mut players, 0.1, 100, &config);
        assert_eq!(step, EnemyStep::default());
        assert_eq!(enemy.position(), shared::Vector2::new(100.0, 100.0));
    }

    #[test]
    fn test_enemy_attack_window() {
        let config = GameConfig::default();
        let mut enemy = Enemy::new("e1", EnemyType::Slime, 100.0, 100.0, 30.0, 50.0, 10.0);
        let mut players = players_with(vec![Player::new("p1", 110.0, 100.0, 100.0, 5.0, 20.0)]);

        let step = update_enemy(&mut enemy, &mut players, 0.05, 1000, &config);
        assert_eq!(step.attacked.as_deref(), Some("p1"));
        assert_eq!(players["p1"].health, 90.0);
        assert!(enemy.is_attacking);

        update_enemy(&mut enemy, &mut players, 0.05, 1500, &config);
        assert_eq!(players["p1"].health, 90.0);

        update_enemy(&mut enemy, &mut players, 0.05, 2000, &config);
        assert_eq!(players["p1"].health, 80.0);
    }

    #[test]
    fn test_enemy_attack_blocked_by_invulnerability() {
        let config = GameConfig::default();
        let mut enemy = Enemy::new("e1", EnemyType::Orc, 100.0, 100.0, 100.0, 40.0, 25.0);
        let mut player = Player::new("p1", 100.0, 110.0, 100.0, 5.0, 20.0);
        player.invulnerable_timer = 5000.0;
        let mut players = players_with(vec![player]);

        let step = update_enemy(&mut enemy, &mut players, 0.05, 50, &config);
        assert_eq!(step.attacked.as_deref(), Some("p1"));
        assert!(step.killed.is_none());
        assert_eq!(players["p1"].health, 100.0);
        assert_eq!(players["p1"].invulnerable_timer, 5000.0);
    }

    #[test]
    fn test_enemy_kill_reported() {
        let config = GameConfig::default();
        let mut enemy = Enemy::new("e1", EnemyType::Orc, 100.0, 100.0, 100.0, 40.0, 25.0);
        let mut player = Player::new("p1", 100.0, 110.0, 100.0, 5.0, 20.0);
        player.health = 20.0;
        let mut players = players_with(vec![player]);

        let step = update_enemy(&mut enemy, &mut players, 0.05, 50, &config);
        assert_eq!(step.killed.as_deref(), Some("p1"));
        assert!(!players["p1"].is_alive());
    }
}

//! One authoritative match.
//!
//! The room owns every entity of its match and is only ever touched from the
//! server loop, either when a client message is routed to it or when a tick
//! fires. Notifications it produces are queued in an outbox as
//! [`Outgoing`] entries addressed by player id; the network layer drains them
//! after every call and resolves them to connections.

use crate::combat;
use crate::config::GameConfig;
use crate::waves::{self, WaveDirector};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{
    AnimationState, Collectible, Enemy, FinalScore, GameEndPayload, GameStartPayload, Player,
    PlayerDiedPayload, PlayerInputPayload, PlayerJoinedPayload, PlayerLeftPayload, RoomState,
    ServerMessage, Snapshot, YouJoinedPayload,
};
use std::collections::HashMap;

/// Who a queued notification is for.
#[derive(Debug, Clone, PartialEq)]
pub enum Recipient {
    Player(String),
    All,
    AllExcept(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outgoing {
    pub recipient: Recipient,
    pub message: ServerMessage,
}

pub struct Room {
    config: GameConfig,
    players: HashMap<String, Player>,
    enemies: HashMap<String, Enemy>,
    collectibles: HashMap<String, Collectible>,
    /// Dead enemies waiting for removal, by room clock deadline
    corpses: HashMap<String, u64>,
    state: RoomState,
    /// Seconds of simulated play
    game_time: f32,
    /// Milliseconds of simulated play; drives cooldowns and timers
    clock_ms: u64,
    wave: u32,
    wave_cleared: bool,
    next_wave_at: Option<u64>,
    director: WaveDirector,
    next_collectible_id: u64,
    rng: StdRng,
    outbox: Vec<Outgoing>,
}

impl Room {
    pub fn new(config: GameConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Room with a deterministic random source.
    pub fn with_seed(config: GameConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: GameConfig, rng: StdRng) -> Self {
        Self {
            config,
            players: HashMap::new(),
            enemies: HashMap::new(),
            collectibles: HashMap::new(),
            corpses: HashMap::new(),
            state: RoomState::Waiting,
            game_time: 0.0,
            clock_ms: 0,
            wave: 1,
            wave_cleared: false,
            next_wave_at: None,
            director: WaveDirector::new(),
            next_collectible_id: 0,
            rng,
            outbox: Vec::new(),
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn state(&self) -> RoomState {
        self.state
    }

    pub fn wave(&self) -> u32 {
        self.wave
    }

    pub fn game_time(&self) -> f32 {
        self.game_time
    }

    pub fn clock_ms(&self) -> u64 {
        self.clock_ms
    }

    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn has_player(&self, id: &str) -> bool {
        self.players.contains_key(id)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn alive_player_count(&self) -> usize {
        self.players.values().filter(|p| p.is_alive()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn alive_enemy_count(&self) -> usize {
        self.enemies.values().filter(|e| e.is_alive).count()
    }

    pub fn collectibles(&self) -> impl Iterator<Item = &Collectible> {
        self.collectibles.values()
    }

    /// True while a cleared wave is waiting for its successor to spawn.
    pub fn next_wave_pending(&self) -> bool {
        self.next_wave_at.is_some()
    }

    pub fn can_join(&self) -> bool {
        self.state == RoomState::Waiting && self.players.len() < self.config.max_players
    }

    /// Takes every notification queued since the last drain.
    pub fn drain_outbox(&mut self) -> Vec<Outgoing> {
        std::mem::take(&mut self.outbox)
    }

    fn push(&mut self, recipient: Recipient, message: ServerMessage) {
        self.outbox.push(Outgoing { recipient, message });
    }

    /// Adds a player while the room is waiting. Returns false if the join is rejected.
    pub fn add_player(&mut self, id: &str, name: Option<String>) -> bool {
        if !self.can_join() || self.players.contains_key(id) {
            debug!("Rejected join from {} (state {:?}, {} players)", id, self.state, self.players.len());
            return false;
        }

        let slot = self.players.len();
        let fraction = if self.config.max_players > 1 {
            0.25 + 0.5 * slot as f32 / (self.config.max_players - 1) as f32
        } else {
            0.5
        };
        let mut player = Player::new(
            id,
            self.config.arena_width * fraction,
            self.config.arena_height / 2.0,
            self.config.player_health,
            self.config.player_speed,
            self.config.player_damage,
        );
        player.name = name;

        info!("Added player {} at ({}, {})", id, player.x, player.y);
        self.players.insert(id.to_string(), player.clone());

        self.push(
            Recipient::Player(id.to_string()),
            ServerMessage::YouJoined(YouJoinedPayload {
                player_id: id.to_string(),
                player: player.clone(),
            }),
        );
        self.push(
            Recipient::AllExcept(id.to_string()),
            ServerMessage::PlayerJoined(PlayerJoinedPayload { player }),
        );

        if self.players.len() >= self.config.max_players {
            self.start_game();
        }
        true
    }

    /// Removes a player. Calling it again for the same id does nothing.
    pub fn remove_player(&mut self, id: &str) -> bool {
        if self.players.remove(id).is_none() {
            return false;
        }
        info!("Removed player {}", id);

        self.push(
            Recipient::All,
            ServerMessage::PlayerLeft(PlayerLeftPayload {
                player_id: id.to_string(),
            }),
        );

        if self.state == RoomState::Playing && (self.config.end_on_leave || self.alive_player_count() == 0) {
            self.end_game();
        }
        true
    }

    /// Applies one input sample to a player.
    ///
    /// Movement is one step of `speed` per sample; the client sends one sample
    /// per tick. Unknown and dead players are ignored.
    pub fn handle_input(&mut self, player_id: &str, input: &PlayerInputPayload) {
        if self.state == RoomState::Finished {
            return;
        }
        let now = self.clock_ms;
        let config = &self.config;
        let Some(player) = self.players.get_mut(player_id) else {
            return;
        };
        if !player.is_alive() {
            return;
        }

        let mut direction = input.direction.sanitized();
        if direction.magnitude() > 1.0 {
            direction = direction.normalize();
        }
        player.direction = direction;
        if !direction.is_zero() {
            player.facing_direction = direction;
        }

        let step = combat::movement_speed(player, config);
        let (x, y) = config.clamp_to_arena(player.x + direction.x * step, player.y + direction.y * step);
        player.x = x;
        player.y = y;

        let attacking = input.wants_attack()
            && self.state == RoomState::Playing
            && combat::attack_ready(player, now, config);

        if attacking {
            player.last_attack_time = now.max(1);
            player.is_attacking = true;
            player.attack_end_time = now + config.attack_duration_ms;
            player.current_state = AnimationState::Attacking;
            self.resolve_attack(player_id);
        } else if !player.is_attacking {
            player.current_state = player.movement_state();
        }
    }

    fn resolve_attack(&mut self, attacker_id: &str) {
        let Some(killer) = self.players.get(attacker_id).map(|p| p.position()) else {
            return;
        };
        let outcome = combat::resolve_player_attack(attacker_id, &mut self.players, &mut self.enemies, &self.config);

        for (enemy_id, enemy_type, position) in outcome.killed_enemies {
            debug!("{} killed {} ({:?})", attacker_id, enemy_id, enemy_type);
            self.next_collectible_id += 1;
            let drop = combat::roll_drop(
                &mut self.rng,
                format!("collectible_{}", self.next_collectible_id),
                position,
                killer,
                &self.config,
            );
            self.collectibles.insert(drop.id.clone(), drop);
            self.corpses
                .insert(enemy_id, self.clock_ms + self.config.enemy_removal_delay_ms);
        }

        for player_id in outcome.killed_players {
            self.on_player_died(&player_id);
        }
    }

    fn on_player_died(&mut self, player_id: &str) {
        info!("Player {} died", player_id);
        self.push(
            Recipient::All,
            ServerMessage::PlayerDied(PlayerDiedPayload {
                player_id: player_id.to_string(),
            }),
        );
        if self.state == RoomState::Playing && self.alive_player_count() == 0 {
            self.end_game();
        }
    }

    fn start_game(&mut self) {
        self.state = RoomState::Playing;
        self.game_time = 0.0;
        self.wave = 1;
        self.wave_cleared = false;
        self.next_wave_at = None;
        self.start_wave();

        info!("Game started with {} players", self.players.len());
        let game_state = self.snapshot();
        self.push(Recipient::All, ServerMessage::GameStart(GameStartPayload { game_state }));
    }

    fn start_wave(&mut self) {
        let spawned = self.director.start_wave(self.wave, &self.config, &mut self.rng);
        info!("Wave {} started with {} enemies", self.wave, spawned.len());
        for enemy in spawned {
            self.enemies.insert(enemy.id.clone(), enemy);
        }
        self.wave_cleared = false;
    }

    fn end_game(&mut self) {
        if self.state == RoomState::Finished {
            return;
        }
        self.state = RoomState::Finished;

        let final_scores = self.final_scores();
        let winner = self.winner();
        info!("Game finished at wave {}, winner {:?}", self.wave, winner);
        self.push(
            Recipient::All,
            ServerMessage::GameEnd(GameEndPayload { winner, final_scores }),
        );
    }

    /// Scores of every player still in the room, ordered by id.
    pub fn final_scores(&self) -> Vec<FinalScore> {
        let mut scores: Vec<FinalScore> = self
            .players
            .values()
            .map(|p| FinalScore {
                player_id: p.id.clone(),
                score: p.score,
            })
            .collect();
        scores.sort_by(|a, b| a.player_id.cmp(&b.player_id));
        scores
    }

    /// Player with the strictly highest score, if any.
    pub fn winner(&self) -> Option<String> {
        let best = self.players.values().map(|p| p.score).max()?;
        let mut leaders = self.players.values().filter(|p| p.score == best);
        let leader = leaders.next()?;
        if leaders.next().is_some() {
            None
        } else {
            Some(leader.id.clone())
        }
    }

    /// Advances the simulation by `dt` seconds. Only a playing room moves.
    pub fn update(&mut self, dt: f32) {
        if self.state != RoomState::Playing {
            return;
        }

        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        let dt_ms = dt * 1000.0;
        self.clock_ms += dt_ms.round() as u64;
        self.game_time += dt;
        let now = self.clock_ms;

        for player in self.players.values_mut() {
            combat::tick_player_timers(player, dt_ms, now);
        }

        let mut deaths = Vec::new();
        for enemy in self.enemies.values_mut() {
            let step = waves::update_enemy(enemy, &mut self.players, dt, now, &self.config);
            if let Some(killed) = step.killed {
                deaths.push(killed);
            }
        }
        for player_id in deaths {
            self.on_player_died(&player_id);
        }
        if self.state != RoomState::Playing {
            return;
        }

        for pickup in combat::collect_pickups(&mut self.players, &mut self.collectibles, &self.config) {
            debug!(
                "{} picked up {:?} ({})",
                pickup.player_id, pickup.collectible.collectible_type, pickup.collectible.value
            );
        }

        let expired: Vec<String> = self
            .corpses
            .iter()
            .filter(|(_, deadline)| now >= **deadline)
            .map(|(id, _)| id.clone())
            .collect();
        for id in expired {
            self.corpses.remove(&id);
            self.enemies.remove(&id);
        }

        if self.alive_enemy_count() == 0 && !self.wave_cleared {
            self.wave_cleared = true;
            self.wave += 1;
            self.next_wave_at = Some(now + self.config.wave_delay_ms);
            info!("Wave cleared, wave {} in {}ms", self.wave, self.config.wave_delay_ms);
        }

        if let Some(at) = self.next_wave_at {
            if now >= at {
                self.next_wave_at = None;
                self.start_wave();
            }
        }

        if self.alive_player_count() == 0 {
            self.end_game();
        }
    }

    /// Full state of the room with entities ordered by id.
    pub fn snapshot(&self) -> Snapshot {
        let mut players: Vec<Player> = self.players.values().cloned().collect();
        players.sort_by(|a, b| a.id.cmp(&b.id));
        let mut enemies: Vec<Enemy> = self.enemies.values().cloned().collect();
        enemies.sort_by(|a, b| a.id.cmp(&b.id));
        let mut collectibles: Vec<Collectible> = self.collectibles.values().cloned().collect();
        collectibles.sort_by(|a, b| a.id.cmp(&b.id));

        Snapshot {
            players,
            enemies,
            collectibles,
            state: self.state,
            wave: self.wave,
            game_time: self.game_time,
        }
    }
}

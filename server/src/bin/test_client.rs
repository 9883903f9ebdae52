//! Headless bot for smoke testing a running server.
//!
//! Joins the room, wanders in random directions and swings at a fixed rhythm
//! until the match ends or the time limit runs out.

use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use rand::Rng;
use server::ServerError;
use shared::{
    ClientMessage, Envelope, JoinGamePayload, LeaveGamePayload, PlayerAction, PlayerInputPayload,
    ServerMessage, Vector2,
};
use std::time::{Duration, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server URL to connect to
    #[arg(short = 's', long, default_value = "ws://127.0.0.1:8080")]
    server: String,

    /// Name sent with JOIN_GAME
    #[arg(short, long)]
    name: Option<String>,

    /// Inputs sent per second
    #[arg(short, long, default_value_t = shared::UPDATE_RATE)]
    rate: u32,

    /// Attack every N inputs; 0 never attacks
    #[arg(short, long, default_value_t = 10)]
    attack_every: u32,

    /// Leave after this many seconds; 0 plays until the match ends
    #[arg(short, long, default_value_t = 0)]
    duration: u64,
}

fn frame(message: ClientMessage) -> Result<Message, ServerError> {
    Ok(Message::Binary(shared::encode(&Envelope::new(message))?))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    info!("Connecting to {}", args.server);
    let (ws_stream, _) = connect_async(args.server.as_str()).await?;
    let (mut sender, mut receiver) = ws_stream.split();

    sender
        .send(frame(ClientMessage::JoinGame(JoinGamePayload {
            player_name: args.name.clone(),
        }))?)
        .await?;

    let mut rng = rand::thread_rng();
    let mut input_interval = tokio::time::interval(Duration::from_secs_f32(1.0 / args.rate.max(1) as f32));
    let started = Instant::now();
    let mut sent: u32 = 0;
    let mut direction = Vector2::ZERO;
    let mut player_id: Option<String> = None;
    let mut updates: u64 = 0;

    loop {
        tokio::select! {
            _ = input_interval.tick() => {
                if args.duration > 0 && started.elapsed() >= Duration::from_secs(args.duration) {
                    info!("Time limit reached, leaving");
                    sender.send(frame(ClientMessage::LeaveGame(LeaveGamePayload {}))?).await?;
                    break;
                }
                if player_id.is_none() {
                    continue;
                }

                if sent % 20 == 0 {
                    let angle = rng.gen_range(0.0..std::f32::consts::TAU);
                    direction = Vector2::new(angle.cos(), angle.sin());
                }
                sent += 1;
                let action = (args.attack_every > 0 && sent % args.attack_every == 0).then_some(PlayerAction::Attack);
                let input = PlayerInputPayload { direction, action };
                sender.send(frame(ClientMessage::PlayerInput(input))?).await?;
            }

            message = receiver.next() => {
                let bytes = match message {
                    Some(Ok(Message::Binary(bytes))) => bytes,
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Server closed the connection");
                        break;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return Err(e.into()),
                };

                let envelope: Envelope<ServerMessage> = match shared::decode(&bytes) {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        warn!("Failed to decode server frame: {}", e);
                        continue;
                    }
                };

                match envelope.message {
                    ServerMessage::YouJoined(payload) => {
                        info!("Joined as {} at ({:.0}, {:.0})", payload.player_id, payload.player.x, payload.player.y);
                        player_id = Some(payload.player_id);
                    }
                    ServerMessage::PlayerJoined(payload) => info!("{} joined", payload.player.id),
                    ServerMessage::PlayerLeft(payload) => info!("{} left", payload.player_id),
                    ServerMessage::PlayerDied(payload) => info!("{} died", payload.player_id),
                    ServerMessage::GameStart(payload) => {
                        info!("Game started with {} enemies", payload.game_state.enemies.len());
                    }
                    ServerMessage::GameEnd(payload) => {
                        for score in &payload.final_scores {
                            info!("{}: {} points", score.player_id, score.score);
                        }
                        info!("Game over, winner: {}", payload.winner.as_deref().unwrap_or("none"));
                        break;
                    }
                    ServerMessage::GameStateUpdate(payload) => {
                        updates += 1;
                        if updates % 100 == 0 {
                            let me = player_id
                                .as_deref()
                                .and_then(|id| payload.game_state.players.iter().find(|p| p.id == id));
                            debug!(
                                "Wave {}, {} enemies, health {:?}",
                                payload.game_state.wave,
                                payload.game_state.enemies.iter().filter(|e| e.is_alive).count(),
                                me.map(|p| p.health)
                            );
                        }
                    }
                }
            }
        }
    }

    let _ = sender.send(Message::Close(None)).await;
    info!("Received {} state updates", updates);
    Ok(())
}

//! WebSocket front end and the fixed-rate tick loop.
//!
//! One task accepts sockets and spawns a task per connection. Connection
//! tasks never touch game state: they forward raw frames to the server loop as
//! [`ServerEvent`]s and write whatever the loop queues for them.
//! The loop owns the [`ClientManager`] and the [`Room`], so message handling
//! and ticks can never overlap.

use crate::client_manager::{ClientManager, ConnectionId, Outbound};
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::room::{Outgoing, Recipient, Room};
use crate::utils::get_timestamp;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{ClientMessage, Envelope, GameStateUpdatePayload, RoomState, ServerMessage};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};
use tokio_tungstenite::{accept_async, tungstenite::Message};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

/// Messages sent from connection tasks to the server loop
#[derive(Debug)]
pub enum ServerEvent {
    Connected {
        addr: SocketAddr,
        outbound: mpsc::UnboundedSender<Outbound>,
        /// None means the server is full
        reply: oneshot::Sender<Option<ConnectionId>>,
    },
    Frame {
        id: ConnectionId,
        bytes: Vec<u8>,
    },
    /// Ping or Pong received
    Activity {
        id: ConnectionId,
    },
    Disconnected {
        id: ConnectionId,
    },
}

/// Bound listener, ready to run.
pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
}

impl Server {
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(&config.address)
            .await
            .map_err(|source| ServerError::Bind {
                address: config.address.clone(),
                source,
            })?;
        info!("Server listening on {}", listener.local_addr()?);
        Ok(Self { listener, config })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Runs until the accept loop goes away.
    pub async fn run(self) -> Result<(), ServerError> {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        tokio::spawn(accept_loop(self.listener, events_tx));

        let mut game = GameLoop::new(self.config);

        let mut tick_interval = interval(game.config.tick_duration());
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut heartbeat = interval(HEARTBEAT_INTERVAL);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_tick = Instant::now();

        info!(
            "Server started: {} Hz, {} players per room",
            game.config.tick_rate, game.config.game.max_players
        );

        loop {
            tokio::select! {
                event = events_rx.recv() => {
                    match event {
                        Some(event) => game.handle_event(event),
                        None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let dt = now.duration_since(last_tick).as_secs_f32();
                    last_tick = now;
                    game.run_tick(dt);
                },

                _ = heartbeat.tick() => {
                    game.heartbeat();
                },
            }
        }

        Ok(())
    }
}

async fn accept_loop(listener: TcpListener, events: mpsc::UnboundedSender<ServerEvent>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let events = events.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, addr, events).await {
                        warn!("Connection from {} ended: {}", addr, e);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {}", e);
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }
    }
}

/// Drives one socket from handshake to close.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    events: mpsc::UnboundedSender<ServerEvent>,
) -> Result<(), ServerError> {
    let ws_stream = accept_async(stream)
        .await
        .map_err(|source| ServerError::Handshake { addr, source })?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
    let (reply_tx, reply_rx) = oneshot::channel();
    let connected = ServerEvent::Connected {
        addr,
        outbound: outbound_tx,
        reply: reply_tx,
    };
    if events.send(connected).is_err() {
        return Ok(());
    }

    let Ok(Some(id)) = reply_rx.await else {
        info!("Refusing connection from {}: server full", addr);
        ws_sender.send(Message::Close(None)).await?;
        return Ok(());
    };

    let incoming = {
        let events = events.clone();
        async move {
            while let Some(message) = ws_receiver.next().await {
                let event = match message {
                    Ok(Message::Binary(bytes)) => ServerEvent::Frame { id, bytes },
                    Ok(Message::Text(text)) => ServerEvent::Frame {
                        id,
                        bytes: text.into_bytes(),
                    },
                    Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => ServerEvent::Activity { id },
                    Ok(Message::Close(_)) => {
                        debug!("Connection {} requested close", id);
                        break;
                    }
                    Ok(Message::Frame(_)) => continue,
                    Err(e) => {
                        debug!("WebSocket error on connection {}: {}", id, e);
                        break;
                    }
                };
                if events.send(event).is_err() {
                    break;
                }
            }
        }
    };

    let outgoing = async move {
        while let Some(outbound) = outbound_rx.recv().await {
            match outbound {
                Outbound::Frame(bytes) => ws_sender.send(Message::Binary(bytes)).await?,
                Outbound::Ping => ws_sender.send(Message::Ping(Vec::new())).await?,
                Outbound::Close => {
                    ws_sender.send(Message::Close(None)).await?;
                    break;
                }
            }
        }
        Ok::<(), ServerError>(())
    };

    let result = tokio::select! {
        _ = incoming => Ok(()),
        result = outgoing => result,
    };

    let _ = events.send(ServerEvent::Disconnected { id });
    result
}

/// State owned by the server loop.
struct GameLoop {
    config: ServerConfig,
    clients: ClientManager,
    room: Room,
    tick: u64,
}

impl GameLoop {
    fn new(config: ServerConfig) -> Self {
        Self {
            clients: ClientManager::new(config.max_connections),
            room: Room::new(config.game.clone()),
            config,
            tick: 0,
        }
    }

    fn handle_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::Connected { addr, outbound, reply } => {
                let id = self.clients.register(addr, outbound);
                if id.is_none() {
                    warn!("Rejected connection from {}: {} connections open", addr, self.clients.len());
                }
                if reply.send(id).is_err() {
                    if let Some(id) = id {
                        self.clients.unregister(id);
                    }
                }
            }
            ServerEvent::Frame { id, bytes } => {
                self.clients.touch(id);
                match shared::decode::<ClientMessage>(&bytes) {
                    Ok(envelope) => self.handle_message(id, envelope.message),
                    Err(e) => warn!("Dropped malformed frame from connection {}: {}", id, e),
                }
            }
            ServerEvent::Activity { id } => self.clients.touch(id),
            ServerEvent::Disconnected { id } => {
                if let Some(connection) = self.clients.unregister(id) {
                    self.room.remove_player(&connection.player_id);
                    self.flush_outbox();
                    self.reset_abandoned_room();
                }
            }
        }
    }

    fn handle_message(&mut self, id: ConnectionId, message: ClientMessage) {
        let Some(player_id) = self.clients.player_id(id).map(str::to_string) else {
            return;
        };

        match message {
            ClientMessage::JoinGame(payload) => {
                if self.room.has_player(&player_id) {
                    debug!("{} is already in the room", player_id);
                } else if !self.room.add_player(&player_id, payload.player_name) {
                    info!("{} could not join (room {:?})", player_id, self.room.state());
                }
                self.flush_outbox();
            }
            ClientMessage::LeaveGame(_) => {
                self.room.remove_player(&player_id);
                self.flush_outbox();
                self.reset_abandoned_room();
            }
            ClientMessage::PlayerInput(input) => {
                if self.room.has_player(&player_id) {
                    self.clients.set_input(id, input);
                }
            }
        }
    }

    /// Applies coalesced input, steps the room and broadcasts the snapshot.
    fn run_tick(&mut self, dt: f32) {
        let max_dt = self.config.tick_duration().as_secs_f32() * 2.0;
        let dt = if dt > max_dt {
            warn!("Large delta time detected ({:.3}s), capping to {:.3}s", dt, max_dt);
            max_dt
        } else {
            dt
        };

        for (player_id, input) in self.clients.take_inputs() {
            self.room.handle_input(&player_id, &input);
        }
        self.room.update(dt);
        self.flush_outbox();
        self.tick += 1;

        if self.clients.is_empty() {
            return;
        }

        let timestamp = get_timestamp();
        let update = ServerMessage::GameStateUpdate(GameStateUpdatePayload {
            game_state: self.room.snapshot(),
            timestamp,
        });
        self.clients.broadcast(&Envelope::stamped(update, timestamp), None);

        if self.tick % (self.config.tick_rate.max(1) as u64 * 5) == 0 {
            debug!(
                "Tick {}: {} connections, room {:?}, wave {}, {} enemies alive",
                self.tick,
                self.clients.len(),
                self.room.state(),
                self.room.wave(),
                self.room.alive_enemy_count()
            );
        }
    }

    /// Drops silent connections and pings the rest.
    fn heartbeat(&mut self) {
        let timed_out = self.clients.check_timeouts(self.config.idle_timeout);
        if !timed_out.is_empty() {
            for connection in &timed_out {
                self.room.remove_player(&connection.player_id);
            }
            self.flush_outbox();
            self.reset_abandoned_room();
        }
        self.clients.ping_all();
    }

    fn flush_outbox(&mut self) {
        for Outgoing { recipient, message } in self.room.drain_outbox() {
            let envelope = Envelope::stamped(message, get_timestamp());
            match recipient {
                Recipient::Player(player_id) => match self.clients.find_by_player(&player_id) {
                    Some(id) => self.clients.send(id, &envelope),
                    None => debug!("No connection for {}, dropping {}", player_id, envelope.message.tag()),
                },
                Recipient::All => {
                    self.clients.broadcast(&envelope, None);
                }
                Recipient::AllExcept(player_id) => {
                    let exclude = self.clients.find_by_player(&player_id);
                    self.clients.broadcast(&envelope, exclude);
                }
            }
        }
    }

    /// Starts over with a fresh room once every player has left a started match.
    fn reset_abandoned_room(&mut self) {
        if self.room.is_empty() && self.room.state() != RoomState::Waiting {
            info!("All players left, resetting room");
            self.room = Room::new(self.config.game.clone());
        }
    }
}

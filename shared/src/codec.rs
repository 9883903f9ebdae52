//! Binary wire codec.
//!
//! Envelopes are MessagePack maps keyed by field name, so any client with a
//! MessagePack library can read them without sharing Rust struct layouts.

use crate::protocol::Envelope;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to encode envelope: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    #[error("failed to decode envelope: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

pub fn encode<M: Serialize>(envelope: &Envelope<M>) -> Result<Vec<u8>, CodecError> {
    Ok(rmp_serde::to_vec_named(envelope)?)
}

pub fn decode<M: DeserializeOwned>(bytes: &[u8]) -> Result<Envelope<M>, CodecError> {
    Ok(rmp_serde::from_slice(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::*;
    use crate::protocol::*;

    fn sample_player(id: &str) -> Player {
        let mut player = Player::new(id, 200.0, 300.0, 100.0, 5.0, 20.0);
        player.name = Some("ana".to_string());
        player.score = 40;
        player.damage_boost_timer = 2500.0;
        player.facing_direction = Vector2::new(-0.5, 0.5);
        player
    }

    fn sample_snapshot() -> Snapshot {
        Snapshot {
            players: vec![sample_player("player_1"), sample_player("player_2")],
            enemies: vec![Enemy::new("enemy_1", EnemyType::Orc, 10.0, 20.0, 110.0, 44.0, 27.5)],
            collectibles: vec![Collectible {
                id: "collectible_1".to_string(),
                x: 50.5,
                y: 60.25,
                collectible_type: CollectibleType::DamageBoost,
                value: 10.0,
            }],
            state: RoomState::Playing,
            wave: 3,
            game_time: 12.5,
        }
    }

    fn roundtrip<M>(envelope: Envelope<M>)
    where
        M: Serialize + DeserializeOwned + PartialEq + std::fmt::Debug,
    {
        let bytes = encode(&envelope).unwrap();
        let decoded: Envelope<M> = decode(&bytes).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn test_client_messages_roundtrip() {
        roundtrip(Envelope::new(ClientMessage::JoinGame(JoinGamePayload {
            player_name: Some("ana".to_string()),
        })));
        roundtrip(Envelope::new(ClientMessage::JoinGame(JoinGamePayload::default())));
        roundtrip(Envelope::new(ClientMessage::LeaveGame(LeaveGamePayload {})));
        roundtrip(Envelope::new(ClientMessage::PlayerInput(PlayerInputPayload {
            direction: Vector2::new(0.7071, -0.7071),
            action: Some(PlayerAction::Attack),
        })));
        roundtrip(Envelope::stamped(
            ClientMessage::PlayerInput(PlayerInputPayload {
                direction: Vector2::ZERO,
                action: None,
            }),
            1_700_000_000_123,
        ));
    }

    #[test]
    fn test_server_messages_roundtrip() {
        let messages = vec![
            ServerMessage::YouJoined(YouJoinedPayload {
                player_id: "player_1".to_string(),
                player: sample_player("player_1"),
            }),
            ServerMessage::PlayerJoined(PlayerJoinedPayload {
                player: sample_player("player_2"),
            }),
            ServerMessage::PlayerLeft(PlayerLeftPayload {
                player_id: "player_2".to_string(),
            }),
            ServerMessage::PlayerDied(PlayerDiedPayload {
                player_id: "player_1".to_string(),
            }),
            ServerMessage::GameStart(GameStartPayload {
                game_state: sample_snapshot(),
            }),
            ServerMessage::GameEnd(GameEndPayload {
                winner: Some("player_1".to_string()),
                final_scores: vec![FinalScore {
                    player_id: "player_1".to_string(),
                    score: 40,
                }],
            }),
            ServerMessage::GameEnd(GameEndPayload {
                winner: None,
                final_scores: vec![],
            }),
            ServerMessage::GameStateUpdate(GameStateUpdatePayload {
                game_state: sample_snapshot(),
                timestamp: 1_700_000_000_000,
            }),
        ];

        for message in messages {
            roundtrip(Envelope::stamped(message, 42));
        }
    }

    #[test]
    fn test_encoding_is_keyed_by_field_name() {
        let envelope = Envelope::new(ClientMessage::PlayerInput(PlayerInputPayload {
            direction: Vector2::new(1.0, 0.0),
            action: Some(PlayerAction::Attack),
        }));
        let bytes = encode(&envelope).unwrap();
        let contains = |needle: &[u8]| bytes.windows(needle.len()).any(|w| w == needle);

        assert!(contains(b"type"));
        assert!(contains(b"PLAYER_INPUT"));
        assert!(contains(b"direction"));
        assert!(contains(b"attack"));
        assert!(!contains(b"timestamp"));
    }

    #[test]
    fn test_decode_garbage_fails() {
        let result: Result<Envelope<ClientMessage>, _> = decode(&[0xc1, 0xff, 0x00]);
        assert!(matches!(result, Err(CodecError::Decode(_))));

        let empty: Result<Envelope<ClientMessage>, _> = decode(&[]);
        assert!(empty.is_err());
    }

    #[test]
    fn test_server_tag_rejected_as_client_message() {
        let bytes = encode(&Envelope::new(ServerMessage::PlayerLeft(PlayerLeftPayload {
            player_id: "player_1".to_string(),
        })))
        .unwrap();
        let result: Result<Envelope<ClientMessage>, _> = decode(&bytes);
        assert!(result.is_err());
    }
}

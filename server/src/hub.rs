//! Websocket fan-out of lobby hints.
//!
//! Clients never receive game state over the socket. They get short text
//! hints and re-fetch whatever they display:
//!
//! * `reload`: rebuild the whole page (game started or reset)
//! * `refresh`: re-fetch the parts that change during play
//! * `result:{player}:{correct|incorrect}:{message}`: show a placement outcome

use axum::extract::ws::{Message, WebSocket};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use types::{FinishReason, GameEvent, LobbyId};
use uuid::Uuid;

use crate::notifier::Notifier;

/// Buffer size for per-connection message channel.
const CONNECTION_CHANNEL_BUFFER: usize = 256;

pub const RELOAD: &str = "reload";
pub const REFRESH: &str = "refresh";

struct Subscriber {
    lobby_id: LobbyId,
    sender: mpsc::Sender<String>,
}

/// Tracks open sockets per lobby and delivers hints to them.
#[derive(Default)]
pub struct LobbyHub {
    connections: DashMap<Uuid, Subscriber>,
}

impl LobbyHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, connection_id: Uuid, lobby_id: LobbyId, sender: mpsc::Sender<String>) {
        self.connections
            .insert(connection_id, Subscriber { lobby_id, sender });
    }

    pub fn unregister(&self, connection_id: Uuid) {
        self.connections.remove(&connection_id);
    }

    pub fn subscriber_count(&self, lobby_id: LobbyId) -> usize {
        self.connections
            .iter()
            .filter(|entry| entry.value().lobby_id == lobby_id)
            .count()
    }

    /// Sends raw hint lines to every socket watching the lobby.
    pub fn broadcast(&self, lobby_id: LobbyId, messages: &[String]) {
        for entry in self.connections.iter() {
            let subscriber = entry.value();
            if subscriber.lobby_id != lobby_id {
                continue;
            }
            for message in messages {
                if let Err(e) = subscriber.sender.try_send(message.clone()) {
                    tracing::warn!(
                        connection_id = %entry.key(),
                        %lobby_id,
                        error = %e,
                        "Failed to deliver lobby hint"
                    );
                }
            }
        }
    }

    /// Pumps hints to one socket until the client goes away.
    pub async fn serve_socket(&self, socket: WebSocket, lobby_id: LobbyId) {
        let (mut ws_sender, mut ws_receiver) = socket.split();
        let connection_id = Uuid::new_v4();
        let (tx, mut rx) = mpsc::channel::<String>(CONNECTION_CHANNEL_BUFFER);
        self.register(connection_id, lobby_id, tx);
        tracing::info!(%connection_id, %lobby_id, "WebSocket connection established");

        let send_task = tokio::spawn(async move {
            while let Some(text) = rx.recv().await {
                if ws_sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        });

        // inbound frames carry nothing we act on
        while let Some(result) = ws_receiver.next().await {
            match result {
                Ok(Message::Close(_)) => {
                    tracing::info!(%connection_id, "WebSocket closed by client");
                    break;
                }
                Err(e) => {
                    tracing::warn!(%connection_id, error = %e, "WebSocket error");
                    break;
                }
                Ok(_) => {}
            }
        }

        self.unregister(connection_id);
        send_task.abort();
        tracing::info!(%connection_id, %lobby_id, "WebSocket connection closed");
    }
}

impl Notifier for LobbyHub {
    fn publish(&self, lobby_id: LobbyId, events: &[GameEvent]) {
        let messages = wire_messages(events);
        if !messages.is_empty() {
            self.broadcast(lobby_id, &messages);
        }
    }
}

/// Translates one transition's events into the hint lines clients expect.
pub fn wire_messages(events: &[GameEvent]) -> Vec<String> {
    if events.is_empty() {
        return Vec::new();
    }
    if events.iter().any(GameEvent::requires_reload) {
        return vec![RELOAD.to_string()];
    }

    let mut messages = Vec::new();
    let placed = events.iter().find_map(|event| match event {
        GameEvent::CardPlaced {
            player_name,
            correct,
            ..
        } => Some((player_name, *correct)),
        _ => None,
    });
    let finish = events.iter().find_map(|event| match event {
        GameEvent::GameFinished {
            winner_name,
            reason,
            ..
        } => Some((winner_name, *reason)),
        _ => None,
    });

    if let Some((player_name, correct)) = placed {
        match finish {
            Some((winner_name, FinishReason::Winner)) => {
                let name = winner_name.as_deref().unwrap_or(player_name.as_str());
                messages.push(result_message(name, true, "You win!"));
            }
            // a silent refresh, the pile ran out
            Some((_, FinishReason::DrawPileExhausted)) => {}
            _ if correct => messages.push(result_message(player_name, true, "Correct!")),
            _ => messages.push(result_message(player_name, false, "Wrong!")),
        }
    }
    messages.push(REFRESH.to_string());
    messages
}

fn result_message(player_name: &str, correct: bool, message: &str) -> String {
    let outcome = if correct { "correct" } else { "incorrect" };
    format!("result:{player_name}:{outcome}:{message}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::PlayerId;

    fn placed(name: &str, correct: bool) -> GameEvent {
        GameEvent::CardPlaced {
            player_id: PlayerId::new(),
            player_name: name.to_string(),
            year: 1969,
            correct,
        }
    }

    #[test]
    fn test_start_and_reset_only_reload() {
        let started = GameEvent::GameStarted {
            first_player: PlayerId::new(),
        };
        assert_eq!(wire_messages(&[started]), vec![RELOAD]);
        assert_eq!(wire_messages(&[GameEvent::GameReset]), vec![RELOAD]);
        assert!(wire_messages(&[]).is_empty());
    }

    #[test]
    fn test_placement_outcomes() {
        let next = GameEvent::TurnAdvanced {
            player_id: PlayerId::new(),
        };
        assert_eq!(
            wire_messages(&[placed("Ada", true), next.clone()]),
            vec!["result:Ada:correct:Correct!", REFRESH]
        );
        assert_eq!(
            wire_messages(&[placed("Ada", false), next]),
            vec!["result:Ada:incorrect:Wrong!", REFRESH]
        );
    }

    #[test]
    fn test_win_and_exhaustion() {
        let won = GameEvent::GameFinished {
            winner: Some(PlayerId::new()),
            winner_name: Some("Ada".to_string()),
            reason: FinishReason::Winner,
        };
        assert_eq!(
            wire_messages(&[placed("Ada", true), won]),
            vec!["result:Ada:correct:You win!", REFRESH]
        );

        let exhausted = GameEvent::GameFinished {
            winner: None,
            winner_name: None,
            reason: FinishReason::DrawPileExhausted,
        };
        assert_eq!(wire_messages(&[placed("Bo", false), exhausted]), vec![REFRESH]);
    }

    #[test]
    fn test_roster_change_refreshes() {
        assert_eq!(wire_messages(&[GameEvent::RosterChanged]), vec![REFRESH]);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_only_the_lobby() {
        let hub = LobbyHub::new();
        let lobby = LobbyId::new();
        let other = LobbyId::new();
        let (tx, mut rx) = mpsc::channel(8);
        let (other_tx, mut other_rx) = mpsc::channel(8);
        hub.register(Uuid::new_v4(), lobby, tx);
        hub.register(Uuid::new_v4(), other, other_tx);
        assert_eq!(hub.subscriber_count(lobby), 1);

        hub.publish(lobby, &[GameEvent::GameReset]);
        assert_eq!(rx.recv().await.as_deref(), Some(RELOAD));
        assert!(other_rx.try_recv().is_err());
    }
}

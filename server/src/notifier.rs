use std::sync::Mutex;

use types::{GameEvent, LobbyId};

/// Receives the events of each committed lobby transition.
///
/// Called while the lobby is still locked, so implementations must not block.
pub trait Notifier: Send + Sync {
    fn publish(&self, lobby_id: LobbyId, events: &[GameEvent]);
}

/// Discards every event. For simulations that nobody watches.
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn publish(&self, _lobby_id: LobbyId, _events: &[GameEvent]) {}
}

/// Keeps every published event in memory.
#[derive(Default)]
pub struct RecordingNotifier {
    published: Mutex<Vec<(LobbyId, GameEvent)>>,
}

impl RecordingNotifier {
    pub fn events_for(&self, lobby_id: LobbyId) -> Vec<GameEvent> {
        self.published
            .lock()
            .map(|published| {
                published
                    .iter()
                    .filter(|(id, _)| *id == lobby_id)
                    .map(|(_, event)| event.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut published) = self.published.lock() {
            published.clear();
        }
    }
}

impl Notifier for RecordingNotifier {
    fn publish(&self, lobby_id: LobbyId, events: &[GameEvent]) {
        if let Ok(mut published) = self.published.lock() {
            published.extend(events.iter().cloned().map(|event| (lobby_id, event)));
        }
    }
}

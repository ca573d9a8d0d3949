pub mod config;
pub mod engine;
pub mod http;
pub mod hub;
pub mod notifier;
pub mod password;
pub mod simulation;
pub mod views;

pub use config::{ConfigError, ServeArgs, ServerConfig};
pub use engine::{ChronologyEngine, EngineError, EngineResult, EngineSettings, ImportSummary};
pub use http::{router, ApiError, AppState};
pub use hub::LobbyHub;
pub use notifier::{NoopNotifier, Notifier, RecordingNotifier};
pub use simulation::{run_game, setup_lobby, Seat, SimulationOutcome};

//! HTTP routes.

use std::sync::Arc;

use axum::{
    extract::{ws::WebSocketUpgrade, FromRequestParts, Path, Query, State},
    http::{header, request::Parts, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use database::GameStore;
use serde::Deserialize;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use types::{DeckId, ErrorKind, LobbyId, RosterPlayer, UserId};

use crate::{
    engine::{ChronologyEngine, EngineError, EngineSettings},
    hub::LobbyHub,
    views::{
        lobby_path, CurrentCardView, GameStateView, LobbyCreatedView, MessageView, PlayersView,
        SearchView, StartView, TimelinesView, TurnResultView,
    },
};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_NAME_HEADER: &str = "x-user-name";
const HX_REDIRECT: HeaderName = HeaderName::from_static("hx-redirect");

const NO_CACHE: [(HeaderName, &str); 3] = [
    (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
    (header::PRAGMA, "no-cache"),
    (header::EXPIRES, "0"),
];

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg).into_response(),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg).into_response(),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg).into_response(),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
            }
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        let msg = e.to_string();
        match e.kind() {
            Some(ErrorKind::Validation) => ApiError::BadRequest(msg),
            Some(ErrorKind::Authorization) => ApiError::Forbidden(msg),
            Some(ErrorKind::NotFound) => ApiError::NotFound(msg),
            Some(ErrorKind::Conflict | ErrorKind::Exhaustion) => ApiError::Conflict(msg),
            None => ApiError::Internal(msg),
        }
    }
}

/// The acting user, as set by the auth layer in front of this server.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user_id: UserId,
    pub name: Option<String>,
}

impl CurrentUser {
    fn display_name(&self) -> Result<&str, ApiError> {
        self.name
            .as_deref()
            .ok_or_else(|| ApiError::BadRequest(format!("missing {USER_NAME_HEADER} header")))
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::BadRequest(format!("missing {USER_ID_HEADER} header")))?
            .parse::<UserId>()
            .map_err(|_| ApiError::BadRequest(format!("invalid {USER_ID_HEADER} header")))?;
        let name = parts
            .headers
            .get(USER_NAME_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string);
        Ok(CurrentUser { user_id, name })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ChronologyEngine>,
    pub hub: Arc<LobbyHub>,
    pub page_size: u32,
}

impl AppState {
    /// Wires an engine that publishes to a fresh websocket hub.
    pub fn new(store: Arc<dyn GameStore>, settings: EngineSettings, page_size: u32) -> Self {
        let hub = Arc::new(LobbyHub::new());
        let engine = ChronologyEngine::new(store, hub.clone(), settings);
        Self {
            engine: Arc::new(engine),
            hub,
            page_size,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/chronology/create", post(create))
        .route("/chronology/search", get(search))
        .route("/chronology/{lobby_id}/join", post(join))
        .route("/chronology/{lobby_id}/leave", post(leave))
        .route("/chronology/{lobby_id}/start", post(start))
        .route("/chronology/{lobby_id}/reset", post(reset))
        .route("/chronology/{lobby_id}/place", post(place))
        .route("/chronology/{lobby_id}/state", get(game_state))
        .route("/chronology/{lobby_id}/timeline", get(timeline))
        .route("/chronology/{lobby_id}/current-card", get(current_card))
        .route("/chronology/{lobby_id}/draw-pile-count", get(draw_pile_count))
        .route("/chronology/{lobby_id}/players", get(players))
        .route("/chronology/{lobby_id}/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

fn form_value<'a>(fields: &'a [(String, String)], key: &str) -> Option<&'a str> {
    fields
        .iter()
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

fn parse_cards_to_win(value: Option<&str>) -> Result<Option<u32>, ApiError> {
    value
        .map(|value| {
            value
                .parse::<u32>()
                .map_err(|_| ApiError::BadRequest("cardsToWin must be a positive number".to_string()))
        })
        .transpose()
}

/// Repeated `deckId` fields; ids that do not parse are skipped.
fn parse_deck_ids(fields: &[(String, String)]) -> Vec<DeckId> {
    fields
        .iter()
        .filter(|(name, _)| name == "deckId")
        .filter_map(|(_, value)| match value.trim().parse::<DeckId>() {
            Ok(deck_id) => Some(deck_id),
            Err(e) => {
                tracing::warn!(value = %value, error = %e, "Skipping unparsable deck id");
                None
            }
        })
        .collect()
}

async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(fields): Form<Vec<(String, String)>>,
) -> Result<Response, ApiError> {
    let display_name = user.display_name()?;
    let name = form_value(&fields, "name").unwrap_or_default();
    let cards_to_win = parse_cards_to_win(form_value(&fields, "cardsToWin"))?;
    let deck_ids = parse_deck_ids(&fields);
    let password = fields
        .iter()
        .find(|(name, _)| name == "password")
        .map(|(_, value)| value.as_str());

    let lobby = state
        .engine
        .create_lobby_game(name, cards_to_win, &deck_ids, password)
        .await?;
    state
        .engine
        .join_lobby(lobby.id, user.user_id, display_name, password)
        .await?;
    Ok((
        [(HX_REDIRECT, lobby_path(lobby.id))],
        Json(LobbyCreatedView::from(&lobby)),
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    name: Option<String>,
    page: Option<u32>,
}

async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchView>, ApiError> {
    let page = params.page.unwrap_or(1).max(1);
    let (lobbies, total) = state
        .engine
        .search_lobbies(params.name.as_deref(), page, state.page_size)
        .await?;
    Ok(Json(SearchView::new(lobbies, page, state.page_size, total)))
}

#[derive(Debug, Default, Deserialize)]
struct JoinForm {
    password: Option<String>,
}

async fn join(
    State(state): State<AppState>,
    Path(lobby_id): Path<LobbyId>,
    user: CurrentUser,
    Form(form): Form<JoinForm>,
) -> Result<Json<RosterPlayer>, ApiError> {
    let player = state
        .engine
        .join_lobby(lobby_id, user.user_id, user.display_name()?, form.password.as_deref())
        .await?;
    Ok(Json(player))
}

async fn leave(
    State(state): State<AppState>,
    Path(lobby_id): Path<LobbyId>,
    user: CurrentUser,
) -> Result<Json<MessageView>, ApiError> {
    state.engine.leave_lobby(lobby_id, user.user_id).await?;
    Ok(Json(MessageView::new("Left lobby")))
}

async fn start(
    State(state): State<AppState>,
    Path(lobby_id): Path<LobbyId>,
    user: CurrentUser,
) -> Result<Json<StartView>, ApiError> {
    let report = state.engine.start_game(lobby_id, user.user_id).await?;
    Ok(Json(StartView::from(&report)))
}

async fn reset(
    State(state): State<AppState>,
    Path(lobby_id): Path<LobbyId>,
    user: CurrentUser,
) -> Result<Json<MessageView>, ApiError> {
    state.engine.reset_game(lobby_id, user.user_id).await?;
    Ok(Json(MessageView::new("Game reset! Starting new game...")))
}

#[derive(Debug, Deserialize)]
struct PlaceForm {
    position: Option<String>,
}

fn parse_position(value: Option<&str>) -> Result<usize, ApiError> {
    let invalid = || ApiError::BadRequest("invalid position".to_string());
    let position = value.map(str::trim).ok_or_else(invalid)?;
    let position: i64 = position.parse().map_err(|_| invalid())?;
    usize::try_from(position).map_err(|_| invalid())
}

async fn place(
    State(state): State<AppState>,
    Path(lobby_id): Path<LobbyId>,
    user: CurrentUser,
    Form(form): Form<PlaceForm>,
) -> Result<Json<TurnResultView>, ApiError> {
    let position = parse_position(form.position.as_deref())?;
    let report = state
        .engine
        .place_card(lobby_id, user.user_id, position)
        .await?;
    Ok(Json(TurnResultView::from(&report)))
}

async fn game_state(
    State(state): State<AppState>,
    Path(lobby_id): Path<LobbyId>,
    user: CurrentUser,
) -> Result<Json<GameStateView>, ApiError> {
    let (game, viewer) = state.engine.game_for_viewer(lobby_id, user.user_id).await?;
    Ok(Json(GameStateView::new(&game, &viewer)))
}

async fn timeline(
    State(state): State<AppState>,
    Path(lobby_id): Path<LobbyId>,
    user: CurrentUser,
) -> Result<Response, ApiError> {
    let (game, viewer) = state.engine.game_for_viewer(lobby_id, user.user_id).await?;
    Ok((NO_CACHE, Json(TimelinesView::new(&game, &viewer))).into_response())
}

async fn current_card(
    State(state): State<AppState>,
    Path(lobby_id): Path<LobbyId>,
    user: CurrentUser,
) -> Result<Json<Option<CurrentCardView>>, ApiError> {
    let (game, _) = state.engine.game_for_viewer(lobby_id, user.user_id).await?;
    Ok(Json(game.current_card().map(CurrentCardView::from)))
}

async fn draw_pile_count(
    State(state): State<AppState>,
    Path(lobby_id): Path<LobbyId>,
    user: CurrentUser,
) -> Result<String, ApiError> {
    let (game, _) = state.engine.game_for_viewer(lobby_id, user.user_id).await?;
    Ok(game.draw_pile.undrawn_count().to_string())
}

async fn players(
    State(state): State<AppState>,
    Path(lobby_id): Path<LobbyId>,
    user: CurrentUser,
) -> Result<Json<PlayersView>, ApiError> {
    let (game, _) = state.engine.game_for_viewer(lobby_id, user.user_id).await?;
    Ok(Json(PlayersView::new(&game)))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(lobby_id): Path<LobbyId>,
) -> Result<Response, ApiError> {
    state.engine.ensure_game(lobby_id).await?;
    let hub = state.hub.clone();
    Ok(ws.on_upgrade(move |socket| async move { hub.serve_socket(socket, lobby_id).await }))
}

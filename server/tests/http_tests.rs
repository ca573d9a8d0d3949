use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use database::{default_deck_id, MemoryStore};
use serde_json::Value;
use server::{router, AppState, EngineSettings};
use tower::ServiceExt;
use types::{LobbyId, UserId};

struct User {
    id: UserId,
    name: &'static str,
}

impl User {
    fn new(name: &'static str) -> Self {
        Self {
            id: UserId::new(),
            name,
        }
    }
}

fn app() -> Router {
    let settings = EngineSettings {
        rng_seed: Some(5),
        password_cost: 4,
        ..EngineSettings::default()
    };
    router(AppState::new(Arc::new(MemoryStore::new()), settings, 10))
}

fn get(uri: &str, user: &User) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-user-id", user.id.to_string())
        .header("x-user-name", user.name)
        .body(Body::empty())
        .unwrap()
}

fn post(uri: &str, user: &User, form: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("x-user-id", user.id.to_string())
        .header("x-user-name", user.name)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form.to_string()))
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, String) {
    let response = app.clone().oneshot(request).await.expect("infallible");
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    (status, headers, String::from_utf8_lossy(&body).into_owned())
}

async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, _, body) = send(app, request).await;
    let json = serde_json::from_str(&body).unwrap_or(Value::String(body));
    (status, json)
}

/// Creates a lobby as `host` and returns its id.
async fn create_lobby(app: &Router, host: &User, cards_to_win: u32) -> LobbyId {
    let form = format!("name=Friday+night&cardsToWin={cards_to_win}&deckId={}", default_deck_id());
    let (status, headers, body) = send(app, post("/chronology/create", host, &form)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let json: Value = serde_json::from_str(&body).unwrap();
    let lobby_id: LobbyId = json["lobby_id"].as_str().unwrap().parse().unwrap();
    assert_eq!(
        headers.get("hx-redirect").unwrap(),
        format!("/chronology/{lobby_id}").as_str()
    );
    lobby_id
}

#[tokio::test]
async fn test_health() {
    let app = app();
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, _, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "OK");
}

#[tokio::test]
async fn test_identity_headers_are_required() {
    let app = app();
    let request = Request::builder()
        .method("POST")
        .uri("/chronology/create")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("name=x"))
        .unwrap();
    let (status, _, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_validation() {
    let app = app();
    let host = User::new("Host");
    let no_deck = send(&app, post("/chronology/create", &host, "name=Empty")).await;
    assert_eq!(no_deck.0, StatusCode::BAD_REQUEST);

    let form = format!("name=&deckId={}", default_deck_id());
    let no_name = send(&app, post("/chronology/create", &host, &form)).await;
    assert_eq!(no_name.0, StatusCode::BAD_REQUEST);

    let form = format!("name=Bad&cardsToWin=-1&deckId={}", default_deck_id());
    let negative = send(&app, post("/chronology/create", &host, &form)).await;
    assert_eq!(negative.0, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_full_turn_over_http() {
    let app = app();
    let host = User::new("Host");
    let guest = User::new("Guest");
    let lobby_id = create_lobby(&app, &host, 5).await;
    let base = format!("/chronology/{lobby_id}");

    let (status, _) = send_json(&app, post(&format!("{base}/join"), &guest, "")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, start) = send_json(&app, post(&format!("{base}/start"), &host, "")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(start["status"], "active");

    let (status, state) = send_json(&app, get(&format!("{base}/state"), &host)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state["is_my_turn"], true);
    assert_eq!(state["players"].as_array().unwrap().len(), 2);
    assert!(state["current_card"]["text"].is_string());
    assert!(state["current_card"].get("year").is_none());

    let (status, card) = send_json(&app, get(&format!("{base}/current-card"), &guest)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(card.get("year").is_none());

    let (status, _, count) = send(&app, get(&format!("{base}/draw-pile-count"), &guest)).await;
    assert_eq!(status, StatusCode::OK);
    let before: usize = count.parse().unwrap();

    let (status, _) = send_json(&app, post(&format!("{base}/place"), &guest, "position=0")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send_json(&app, post(&format!("{base}/place"), &host, "position=-1")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send_json(&app, post(&format!("{base}/place"), &host, "position=9")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, result) = send_json(&app, post(&format!("{base}/place"), &host, "position=0")).await;
    assert_eq!(status, StatusCode::OK);
    let message = result["message"].as_str().unwrap();
    assert!(message.ends_with("Next player's turn."), "{message}");

    let (_, _, count) = send(&app, get(&format!("{base}/draw-pile-count"), &guest)).await;
    assert_eq!(count.parse::<usize>().unwrap(), before - 1);

    let (status, headers, body) = send(&app, get(&format!("{base}/timeline"), &host)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers.get(header::CACHE_CONTROL).unwrap(),
        "no-cache, no-store, must-revalidate"
    );
    let timelines: Value = serde_json::from_str(&body).unwrap();
    let first = &timelines["timelines"][0];
    assert_eq!(first["name"], "Guest");
    assert_eq!(first["is_me"], false);
    assert_eq!(timelines["timelines"][1]["is_me"], true);

    let (status, players) = send_json(&app, get(&format!("{base}/players"), &guest)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(players["cards_to_win"], 5);

    let (status, _) = send_json(&app, post(&format!("{base}/reset"), &host, "")).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_outsiders_and_missing_lobbies() {
    let app = app();
    let host = User::new("Host");
    let stranger = User::new("Stranger");
    let lobby_id = create_lobby(&app, &host, 5).await;

    let (status, _) = send_json(&app, get(&format!("/chronology/{lobby_id}/state"), &stranger)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send_json(&app, post(&format!("/chronology/{lobby_id}/start"), &stranger, "")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let missing = LobbyId::new();
    let (status, _) = send_json(&app, get(&format!("/chronology/{missing}/state"), &host)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send_json(&app, post(&format!("/chronology/{missing}/join"), &host, "")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_password_protected_lobby_over_http() {
    let app = app();
    let host = User::new("Host");
    let guest = User::new("Guest");
    let form = format!("name=Secret+club&password=swordfish&deckId={}", default_deck_id());
    let (status, _, body) = send(&app, post("/chronology/create", &host, &form)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let json: Value = serde_json::from_str(&body).unwrap();
    let lobby_id = json["lobby_id"].as_str().unwrap();
    assert!(!body.contains("swordfish"));

    let join = format!("/chronology/{lobby_id}/join");
    let (status, _) = send_json(&app, post(&join, &guest, "")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send_json(&app, post(&join, &guest, "password=marlin")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, player) = send_json(&app, post(&join, &guest, "password=swordfish")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(player["join_order"], 2);

    let (_, page) = send_json(&app, get("/chronology/search?name=secret", &host)).await;
    assert_eq!(page["lobbies"][0]["has_password"], true);
    assert!(page["lobbies"][0].get("password_hash").is_none());
    assert_eq!(page["lobbies"][0]["active_players"], 2);
}

#[tokio::test]
async fn test_search_pages_through_lobbies() {
    let app = app();
    let host = User::new("Host");
    for _ in 0..12 {
        create_lobby(&app, &host, 5).await;
    }
    let (status, page) = send_json(&app, get("/chronology/search?name=friday&page=2", &host)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 12);
    assert_eq!(page["total_pages"], 2);
    assert_eq!(page["page"], 2);
    assert_eq!(page["lobbies"].as_array().unwrap().len(), 2);
    assert_eq!(page["lobbies"][0]["active_players"], 1);
    assert_eq!(page["lobbies"][0]["status"], "waiting");
    assert_eq!(page["lobbies"][0]["has_password"], false);

    let (_, none) = send_json(&app, get("/chronology/search?name=trivia", &host)).await;
    assert_eq!(none["total"], 0);
}

//! Route handlers. Every handler converts its inputs, invokes one engine or
//! registry operation, and maps `GameError` onto an HTTP status plus the
//! stable error code the client shows as a toast.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::stream::{self, Stream};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::broadcast::room_channel;
use crate::protocol::{
    ChatChannel, ErrorBody, GameError, PhaseTimers, PlayerAction, RoleConfig, UserId,
};

use super::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/rooms", post(create_room))
        .route("/rooms/{room_id}/join", post(join_room))
        .route("/rooms/{room_id}/leave", post(leave_room))
        .route("/rooms/{room_id}/ready", post(set_ready))
        .route("/rooms/{room_id}/bots", post(add_bots))
        .route("/rooms/{room_id}/role-config", post(update_role_config))
        .route("/rooms/{room_id}/timers", post(update_timers))
        .route("/rooms/{room_id}/start", post(start_game))
        .route("/rooms/{room_id}/actions", post(submit_action))
        .route("/rooms/{room_id}/chat", post(append_chat))
        .route("/rooms/{room_id}/game", get(game_public))
        .route("/rooms/{room_id}/game/private", get(game_private))
        .route("/rooms/{room_id}/wolves", get(wolf_user_ids))
        .route("/rooms/{room_id}/voice-turn", get(voice_turn))
        .route("/rooms/{room_id}/events", get(room_events))
        .route("/games/{game_id}/poll", post(poll_game))
        .route("/users/{user_id}/replays", get(replays))
        .with_state(state)
}

/// `GameError` → HTTP response with the stable error code body.
struct ApiError(GameError);

impl From<GameError> for ApiError {
    fn from(err: GameError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            GameError::RoomNotFound | GameError::GameNotFound => StatusCode::NOT_FOUND,
            GameError::OnlyOwnerMayStart
            | GameError::OnlyOwnerMayConfig
            | GameError::NotWolfChannel
            | GameError::NotYourTurn
            | GameError::PlayerDead => StatusCode::FORBIDDEN,
            GameError::SnapshotUnavailable(_) | GameError::DbUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::BAD_REQUEST,
        };
        (status, Json(ErrorBody::from(&self.0))).into_response()
    }
}

type ApiResult = Result<Response, ApiError>;

async fn healthz(State(state): State<AppState>) -> Response {
    let db_ok = state.db.health_check().await;
    Json(json!({ "ok": db_ok })).into_response()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateRoomBody {
    user_id: UserId,
    nickname: String,
    name: String,
    max_players: u8,
}

async fn create_room(
    State(state): State<AppState>,
    Json(body): Json<CreateRoomBody>,
) -> ApiResult {
    let room = state
        .rooms
        .create_room(body.user_id, body.nickname, body.name, body.max_players)
        .await?;
    Ok(Json(room).into_response())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JoinBody {
    user_id: UserId,
    nickname: String,
}

async fn join_room(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    Json(body): Json<JoinBody>,
) -> ApiResult {
    let room = state
        .rooms
        .join_room(&room_id, body.user_id, body.nickname)
        .await?;
    Ok(Json(room).into_response())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserBody {
    user_id: UserId,
}

async fn leave_room(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    Json(body): Json<UserBody>,
) -> ApiResult {
    let room = state.rooms.leave_room(&room_id, &body.user_id).await?;
    Ok(Json(json!({ "room": room })).into_response())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReadyBody {
    user_id: UserId,
    ready: bool,
}

async fn set_ready(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    Json(body): Json<ReadyBody>,
) -> ApiResult {
    let room = state
        .rooms
        .set_ready(&room_id, &body.user_id, body.ready)
        .await?;
    Ok(Json(room).into_response())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BotsBody {
    user_id: UserId,
    count: u8,
}

async fn add_bots(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    Json(body): Json<BotsBody>,
) -> ApiResult {
    let room = state
        .rooms
        .add_bots(&room_id, &body.user_id, body.count)
        .await?;
    Ok(Json(room).into_response())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoleConfigBody {
    user_id: UserId,
    role_config: RoleConfig,
}

async fn update_role_config(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    Json(body): Json<RoleConfigBody>,
) -> ApiResult {
    let room = state
        .rooms
        .update_role_config(&room_id, &body.user_id, body.role_config)
        .await?;
    Ok(Json(room).into_response())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimersBody {
    user_id: UserId,
    timers: PhaseTimers,
}

async fn update_timers(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    Json(body): Json<TimersBody>,
) -> ApiResult {
    let room = state
        .rooms
        .update_timers(&room_id, &body.user_id, body.timers)
        .await?;
    Ok(Json(room).into_response())
}

async fn start_game(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    Json(body): Json<UserBody>,
) -> ApiResult {
    let (room, game) = state.engine.start_game(&room_id, &body.user_id).await?;
    Ok(Json(json!({ "room": room, "game": game })).into_response())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActionBody {
    user_id: UserId,
    #[serde(flatten)]
    action: PlayerAction,
}

async fn submit_action(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    Json(body): Json<ActionBody>,
) -> ApiResult {
    let outcome = state
        .engine
        .submit_action(&room_id, &body.user_id, body.action)
        .await?;
    Ok(Json(json!({
        "room": outcome.room_state,
        "game": outcome.game_public,
    }))
    .into_response())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatBody {
    user_id: UserId,
    nickname: String,
    text: String,
    channel: ChatChannel,
}

async fn append_chat(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    Json(body): Json<ChatBody>,
) -> ApiResult {
    let message = state
        .engine
        .append_chat(
            &room_id,
            &body.user_id,
            &body.nickname,
            &body.text,
            body.channel,
        )
        .await?;
    Ok(Json(message).into_response())
}

async fn game_public(State(state): State<AppState>, Path(room_id): Path<Uuid>) -> ApiResult {
    let game = state.engine.get_game_public_state(&room_id).await?;
    Ok(Json(game).into_response())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserQuery {
    user_id: UserId,
}

async fn game_private(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    Query(query): Query<UserQuery>,
) -> ApiResult {
    let private = state
        .engine
        .get_game_private_state(&room_id, &query.user_id)
        .await?;
    Ok(Json(private).into_response())
}

/// Wolf roster for the signaling relay's channel authority checks.
async fn wolf_user_ids(State(state): State<AppState>, Path(room_id): Path<Uuid>) -> ApiResult {
    let wolves = state.engine.get_wolf_user_ids(&room_id).await?;
    Ok(Json(wolves).into_response())
}

async fn voice_turn(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    Query(query): Query<UserQuery>,
) -> ApiResult {
    let info = state
        .engine
        .get_voice_turn_info(&room_id, &query.user_id)
        .await?;
    Ok(Json(info).into_response())
}

/// Recovery endpoint: clients that miss broadcasts poll here; the engine
/// advances the game if its deadline passed and returns the fresh state.
async fn poll_game(State(state): State<AppState>, Path(game_id): Path<Uuid>) -> ApiResult {
    let outcome = state.engine.advance_game_on_timeout(&game_id).await?;
    Ok(Json(json!({
        "advanced": outcome.is_some(),
        "game": outcome.map(|o| o.game_public),
    }))
    .into_response())
}

async fn replays(State(state): State<AppState>, Path(user_id): Path<UserId>) -> ApiResult {
    let replays = state
        .db
        .replays_by_owner(&user_id)
        .await
        .map_err(GameError::from)?;
    Ok(Json(replays).into_response())
}

/// Server-sent events feed of a room channel, for clients without a socket.
async fn room_events(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
) -> Sse<impl Stream<Item = Result<Event, std::convert::Infallible>>> {
    let receiver = state.hub.subscribe(&room_channel(&room_id));
    let stream = stream::unfold(receiver, |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(emission) => {
                    let event = Event::default()
                        .event(emission.event)
                        .data(emission.payload.to_string());
                    return Some((Ok(event), receiver));
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => return None,
            }
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

//! Request Adapter: a thin axum surface mapping external calls onto the
//! room registry and game engine. No game logic lives here.

mod routes;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::broadcast::ChannelBroadcaster;
use crate::database::DocumentStore;
use crate::engine::GameEngine;
use crate::rooms::RoomRegistry;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<GameEngine>,
    pub rooms: Arc<RoomRegistry>,
    pub db: Arc<dyn DocumentStore>,
    pub hub: Arc<ChannelBroadcaster>,
}

/// Build the HTTP router.
pub fn build_router(state: AppState) -> Router {
    routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

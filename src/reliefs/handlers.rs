use axum::{
    extract::State,
    middleware,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};

use super::dto::{DeleteAck, InsertAck, UpdateAck, TEASER_LIMIT};
use super::repo_types::{ReliefFields, ReliefItem};
use crate::{
    auth::extractors::require_auth,
    error::AppError,
    extract::{ItemId, JsonBody},
    state::AppState,
};

// --- public routers ---

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/reliefs", get(list_teaser))
        .route("/relief-goods", get(list_all))
        .route("/relief-goods/:id", get(get_one))
}

/// Create, update and delete. Guarded by a bearer token only when
/// `require_auth_for_writes` is set.
pub fn write_routes(state: &AppState) -> Router<AppState> {
    let router = Router::new()
        .route("/relief-goods", post(create))
        .route("/relief-goods/:id", axum::routing::put(update).delete(remove));
    if state.config.require_auth_for_writes {
        router.route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
    } else {
        router
    }
}

// --- handlers ---

#[instrument(skip(state))]
pub async fn list_teaser(State(state): State<AppState>) -> Result<Json<Vec<ReliefItem>>, AppError> {
    Ok(Json(state.reliefs.list(Some(TEASER_LIMIT)).await?))
}

#[instrument(skip(state))]
pub async fn list_all(State(state): State<AppState>) -> Result<Json<Vec<ReliefItem>>, AppError> {
    Ok(Json(state.reliefs.list(None).await?))
}

/// A miss answers `null` rather than 404.
#[instrument(skip(state, id))]
pub async fn get_one(
    State(state): State<AppState>,
    ItemId(id): ItemId,
) -> Result<Json<Option<ReliefItem>>, AppError> {
    Ok(Json(state.reliefs.get(id).await?))
}

#[instrument(skip(state, fields))]
pub async fn create(
    State(state): State<AppState>,
    JsonBody(fields): JsonBody<ReliefFields>,
) -> Result<Json<InsertAck>, AppError> {
    let id = state.reliefs.insert(fields).await?;
    info!(%id, "relief item created");
    Ok(Json(InsertAck {
        acknowledged: true,
        inserted_id: id,
    }))
}

#[instrument(skip(state, id, fields))]
pub async fn update(
    State(state): State<AppState>,
    ItemId(id): ItemId,
    JsonBody(fields): JsonBody<ReliefFields>,
) -> Result<Json<UpdateAck>, AppError> {
    let outcome = state.reliefs.upsert(id, fields).await?;
    info!(%id, upserted = outcome.upserted_id.is_some(), "relief item updated");
    Ok(Json(outcome.into()))
}

#[instrument(skip(state, id))]
pub async fn remove(
    State(state): State<AppState>,
    ItemId(id): ItemId,
) -> Result<Json<DeleteAck>, AppError> {
    let deleted = state.reliefs.delete(id).await?;
    info!(%id, deleted, "relief item deleted");
    Ok(Json(DeleteAck {
        acknowledged: true,
        deleted_count: deleted,
    }))
}

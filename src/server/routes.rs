use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::{Stream, StreamExt};
use crate::events::CHANGE_EVENT;
use crate::server::AppState;
use crate::storage::DbStats;
use crate::{Document, DocumentPatch, Error};

#[derive(Deserialize)]
pub struct EventParams {
    pub store: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(err: Error) -> ApiError {
    let status = match &err {
        Error::InvalidKey(_) | Error::InvalidStoreName(_) | Error::Serialization(_) => {
            StatusCode::BAD_REQUEST
        }
        Error::PermissionDenied(_) => StatusCode::FORBIDDEN,
        Error::QuotaExceeded(_) => StatusCode::INSUFFICIENT_STORAGE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!("request failed: {}", err);
    }
    (status, Json(ErrorResponse { error: err.to_string() }))
}

fn not_found(store: &str, id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: format!("no record '{}' in '{}'", id, store),
        }),
    )
}

pub async fn get_stats(State(state): State<Arc<AppState>>) -> Result<Json<DbStats>, ApiError> {
    let stats = state.db.stats().await.map_err(api_error)?;
    Ok(Json(stats))
}

pub async fn list_records(
    State(state): State<Arc<AppState>>,
    Path(store): Path<String>,
) -> Result<Json<Vec<Document>>, ApiError> {
    let coll = state.collection(&store).await.map_err(api_error)?;
    let records = coll.get_all().await.map_err(api_error)?;
    Ok(Json(records))
}

pub async fn get_record(
    State(state): State<Arc<AppState>>,
    Path((store, id)): Path<(String, String)>,
) -> Result<Json<Document>, ApiError> {
    let coll = state.collection(&store).await.map_err(api_error)?;
    match coll.get(&id).await.map_err(api_error)? {
        Some(doc) => Ok(Json(doc)),
        None => Err(not_found(&store, &id)),
    }
}

/// Store the body as the record under `id`, replacing any previous value
pub async fn put_record(
    State(state): State<Arc<AppState>>,
    Path((store, id)): Path<(String, String)>,
    Json(fields): Json<Map<String, Value>>,
) -> Result<Json<Document>, ApiError> {
    let coll = state.collection(&store).await.map_err(api_error)?;
    let doc = Document::from_object(id, fields);
    coll.save(&doc).await.map_err(api_error)?;
    Ok(Json(doc))
}

pub async fn patch_record(
    State(state): State<Arc<AppState>>,
    Path((store, id)): Path<(String, String)>,
    Json(patch): Json<DocumentPatch>,
) -> Result<Json<Document>, ApiError> {
    if patch.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "patch has no fields".to_string(),
            }),
        ));
    }
    let coll = state.collection(&store).await.map_err(api_error)?;
    if !coll.update(&id, patch).await.map_err(api_error)? {
        return Err(not_found(&store, &id));
    }
    match coll.get(&id).await.map_err(api_error)? {
        Some(doc) => Ok(Json(doc)),
        None => Err(not_found(&store, &id)),
    }
}

pub async fn delete_record(
    State(state): State<Arc<AppState>>,
    Path((store, id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let coll = state.collection(&store).await.map_err(api_error)?;
    coll.delete(&id).await.map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Change notifications as server-sent `db-changed` events
pub async fn stream_events(
    State(state): State<Arc<AppState>>,
    Query(params): Query<EventParams>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut sub = state.db.subscribe();
    if let Some(store) = params.store {
        sub = sub.only(store);
    }
    tracing::debug!("event stream opened ({} listeners)", state.db.bus().listener_count());

    let stream = sub
        .into_stream()
        .filter_map(|event| Event::default().event(CHANGE_EVENT).json_data(&event).ok())
        .map(Ok::<Event, Infallible>);

    Sse::new(stream).keep_alive(KeepAlive::default())
}

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use server_api::{person_route, persons_route};
use shared::{
    domain::PersonId,
    error::{ApiError, ErrorCode},
    protocol::{ListPersonsQuery, PersonRecord},
};
use tracing::{error, warn};

use crate::app_state::AppState;

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

pub(crate) fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(persons_route(), get(http_list_persons).post(http_create_person))
        .route(
            person_route(),
            get(http_get_person)
                .put(http_update_person)
                .delete(http_delete_person),
        )
        .with_state(state)
}

async fn healthz(State(state): State<Arc<AppState>>) -> ApiResult<&'static str> {
    state.api.storage.health_check().await.map_err(|e| {
        error!(error = %e, "storage health check failed");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiError::new(ErrorCode::Internal, e.to_string())),
        )
    })?;
    Ok("ok")
}

async fn http_list_persons(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ListPersonsQuery>,
) -> ApiResult<Json<Vec<PersonRecord>>> {
    server_api::list_persons(&state.api, q.q.as_deref())
        .await
        .map(Json)
        .map_err(into_response)
}

async fn http_get_person(
    State(state): State<Arc<AppState>>,
    Path(person_id): Path<i64>,
) -> ApiResult<Json<PersonRecord>> {
    server_api::get_person(&state.api, PersonId(person_id))
        .await
        .map(Json)
        .map_err(into_response)
}

async fn http_create_person(
    State(state): State<Arc<AppState>>,
    Json(record): Json<PersonRecord>,
) -> ApiResult<Json<PersonRecord>> {
    server_api::create_person(&state.api, record)
        .await
        .map(Json)
        .map_err(into_response)
}

async fn http_update_person(
    State(state): State<Arc<AppState>>,
    Path(person_id): Path<i64>,
    Json(record): Json<PersonRecord>,
) -> ApiResult<Json<PersonRecord>> {
    server_api::update_person(&state.api, PersonId(person_id), record)
        .await
        .map(Json)
        .map_err(into_response)
}

async fn http_delete_person(
    State(state): State<Arc<AppState>>,
    Path(person_id): Path<i64>,
) -> ApiResult<StatusCode> {
    server_api::delete_person(&state.api, PersonId(person_id))
        .await
        .map(|()| StatusCode::NO_CONTENT)
        .map_err(into_response)
}

fn into_response(err: ApiError) -> (StatusCode, Json<ApiError>) {
    let status = match err.code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!(message = %err.message, "person request failed");
    } else {
        warn!(code = ?err.code, message = %err.message, "person request rejected");
    }
    (status, Json(err))
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;

use axum::extract::State;
use axum::response::Response;
use serde::Serialize;

use crate::infra::http::api::error::ApiResponse;
use crate::infra::http::api::state::HttpState;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub cache: &'static str,
}

pub async fn health(State(state): State<HttpState>) -> Response {
    ApiResponse::ok(HealthStatus {
        status: "ok",
        cache: state.services.cache_store.name(),
    })
}

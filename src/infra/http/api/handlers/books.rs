use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::Response;
use uuid::Uuid;

use crate::infra::http::api::error::{ApiError, ApiResponse};
use crate::infra::http::api::models::{BookCreateRequest, BookUpdateRequest};
use crate::infra::http::api::state::HttpState;

pub async fn list_books(State(state): State<HttpState>) -> Result<Response, ApiError> {
    let books = state.services.books.list().await?;
    Ok(ApiResponse::ok(books))
}

pub async fn get_book(
    State(state): State<HttpState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let book = state.services.books.get(id).await?;
    Ok(ApiResponse::ok(book))
}

pub async fn create_book(
    State(state): State<HttpState>,
    payload: Result<Json<BookCreateRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let book = state.services.books.create(request.into()).await?;
    Ok(ApiResponse::created(book))
}

pub async fn update_book(
    State(state): State<HttpState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<BookUpdateRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let book = state.services.books.update(id, request.into()).await?;
    Ok(ApiResponse::ok(book))
}

pub async fn delete_book(
    State(state): State<HttpState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let book = state.services.books.delete(id).await?;
    Ok(ApiResponse::ok(book))
}

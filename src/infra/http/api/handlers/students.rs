use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::Response;
use uuid::Uuid;

use crate::infra::http::api::error::{ApiError, ApiResponse};
use crate::infra::http::api::models::{StudentCreateRequest, StudentUpdateRequest};
use crate::infra::http::api::state::HttpState;

pub async fn list_students(State(state): State<HttpState>) -> Result<Response, ApiError> {
    let students = state.services.students.list().await?;
    Ok(ApiResponse::ok(students))
}

pub async fn get_student(
    State(state): State<HttpState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let student = state.services.students.get(id).await?;
    Ok(ApiResponse::ok(student))
}

pub async fn student_books(
    State(state): State<HttpState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let books = state.services.students.books(id).await?;
    Ok(ApiResponse::ok(books))
}

pub async fn create_student(
    State(state): State<HttpState>,
    payload: Result<Json<StudentCreateRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let student = state.services.students.create(request.into()).await?;
    Ok(ApiResponse::created(student))
}

pub async fn update_student(
    State(state): State<HttpState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<StudentUpdateRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let student = state.services.students.update(id, request.into()).await?;
    Ok(ApiResponse::ok(student))
}

pub async fn delete_student(
    State(state): State<HttpState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let student = state.services.students.delete(id).await?;
    Ok(ApiResponse::ok(student))
}

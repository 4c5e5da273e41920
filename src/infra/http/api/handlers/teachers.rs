use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::Response;
use uuid::Uuid;

use crate::infra::http::api::error::{ApiError, ApiResponse};
use crate::infra::http::api::models::{TeacherCreateRequest, TeacherUpdateRequest};
use crate::infra::http::api::state::HttpState;

pub async fn list_teachers(State(state): State<HttpState>) -> Result<Response, ApiError> {
    let teachers = state.services.teachers.list().await?;
    Ok(ApiResponse::ok(teachers))
}

pub async fn get_teacher(
    State(state): State<HttpState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let teacher = state.services.teachers.get(id).await?;
    Ok(ApiResponse::ok(teacher))
}

pub async fn teacher_roster(
    State(state): State<HttpState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let students = state.services.teachers.roster(id).await?;
    Ok(ApiResponse::ok(students))
}

pub async fn create_teacher(
    State(state): State<HttpState>,
    payload: Result<Json<TeacherCreateRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let teacher = state.services.teachers.create(request.into()).await?;
    Ok(ApiResponse::created(teacher))
}

pub async fn update_teacher(
    State(state): State<HttpState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<TeacherUpdateRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let teacher = state.services.teachers.update(id, request.into()).await?;
    Ok(ApiResponse::ok(teacher))
}

pub async fn delete_teacher(
    State(state): State<HttpState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let teacher = state.services.teachers.delete(id).await?;
    Ok(ApiResponse::ok(teacher))
}

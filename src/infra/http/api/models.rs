use serde::Deserialize;
use uuid::Uuid;

use crate::application::books::{CreateBookCommand, UpdateBookCommand};
use crate::application::students::{CreateStudentCommand, UpdateStudentCommand};
use crate::application::teachers::{CreateTeacherCommand, UpdateTeacherCommand};

#[derive(Debug, Deserialize)]
pub struct TeacherCreateRequest {
    pub name: String,
    pub email: String,
    pub subject: String,
}

impl From<TeacherCreateRequest> for CreateTeacherCommand {
    fn from(request: TeacherCreateRequest) -> Self {
        Self {
            name: request.name,
            email: request.email,
            subject: request.subject,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TeacherUpdateRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub subject: Option<String>,
}

impl From<TeacherUpdateRequest> for UpdateTeacherCommand {
    fn from(request: TeacherUpdateRequest) -> Self {
        Self {
            name: request.name,
            email: request.email,
            subject: request.subject,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentCreateRequest {
    pub name: String,
    pub email: String,
    pub grade: String,
    pub teacher_id: Option<Uuid>,
}

impl From<StudentCreateRequest> for CreateStudentCommand {
    fn from(request: StudentCreateRequest) -> Self {
        Self {
            name: request.name,
            email: request.email,
            grade: request.grade,
            teacher_id: request.teacher_id,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentUpdateRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub grade: Option<String>,
    pub teacher_id: Option<Uuid>,
}

impl From<StudentUpdateRequest> for UpdateStudentCommand {
    fn from(request: StudentUpdateRequest) -> Self {
        Self {
            name: request.name,
            email: request.email,
            grade: request.grade,
            teacher_id: request.teacher_id,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookCreateRequest {
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub published_year: i32,
    pub genre: String,
    pub quantity: Option<i32>,
}

impl From<BookCreateRequest> for CreateBookCommand {
    fn from(request: BookCreateRequest) -> Self {
        Self {
            title: request.title,
            author: request.author,
            isbn: request.isbn,
            published_year: request.published_year,
            genre: request.genre,
            quantity: request.quantity,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookUpdateRequest {
    pub title: Option<String>,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub published_year: Option<i32>,
    pub genre: Option<String>,
    pub quantity: Option<i32>,
}

impl From<BookUpdateRequest> for UpdateBookCommand {
    fn from(request: BookUpdateRequest) -> Self {
        Self {
            title: request.title,
            author: request.author,
            isbn: request.isbn,
            published_year: request.published_year,
            genre: request.genre,
            quantity: request.quantity,
        }
    }
}

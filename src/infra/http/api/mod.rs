pub mod error;
pub mod handlers;
pub mod models;
pub mod state;

pub use state::HttpState;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

use crate::infra::http::middleware::{log_responses, set_request_context};

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route(
            "/api/teachers",
            get(handlers::list_teachers).post(handlers::create_teacher),
        )
        .route(
            "/api/teachers/{id}",
            get(handlers::get_teacher)
                .put(handlers::update_teacher)
                .delete(handlers::delete_teacher),
        )
        .route("/api/teachers/{id}/students", get(handlers::teacher_roster))
        .route(
            "/api/students",
            get(handlers::list_students).post(handlers::create_student),
        )
        .route(
            "/api/students/{id}",
            get(handlers::get_student)
                .put(handlers::update_student)
                .delete(handlers::delete_student),
        )
        .route("/api/students/{id}/books", get(handlers::student_books))
        .route(
            "/api/students/{id}/books/{book_id}",
            post(handlers::borrow_book).delete(handlers::return_book),
        )
        .route(
            "/api/books",
            get(handlers::list_books).post(handlers::create_book),
        )
        .route(
            "/api/books/{id}",
            get(handlers::get_book)
                .put(handlers::update_book)
                .delete(handlers::delete_book),
        )
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}

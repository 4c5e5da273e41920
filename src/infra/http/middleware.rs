use std::time::Instant;

use axum::{
    body::Body,
    http::{Method, Request},
    middleware::Next,
    response::Response,
};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;
use crate::cache::{MutationKind, tally};

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let ctx = RequestContext {
        request_id: request_id.clone(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(ctx);
    response
}

/// Mutation a write route performs, if any.
///
/// `/api/students/{id}/books/{book_id}` is the lending pair; every other
/// `/api/*` write follows its HTTP method.
pub(crate) fn route_mutation(method: &Method, path: &str) -> Option<MutationKind> {
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
    if segments.first() != Some(&"api") {
        return None;
    }
    let lending = matches!(segments.as_slice(), ["api", "students", _, "books", _]);

    if method == Method::POST {
        Some(if lending { MutationKind::Borrow } else { MutationKind::Create })
    } else if method == Method::DELETE {
        Some(if lending { MutationKind::Return } else { MutationKind::Delete })
    } else if method == Method::PUT {
        Some(MutationKind::Update)
    } else {
        None
    }
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();
    let mutation = route_mutation(&method, uri.path());

    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let (mut response, invalidated_keys) = tally::with_tally(next.run(request)).await;
    let status = response.status();
    let elapsed_ms = start.elapsed().as_millis();
    let mutation_kind = mutation.map(MutationKind::as_str).unwrap_or("read");

    if status.is_success() {
        if mutation.is_some() {
            info!(
                target = "rostra::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                elapsed_ms = elapsed_ms,
                mutation = mutation_kind,
                invalidated_keys,
                request_id = request_id,
                "write committed",
            );
        }
        return response;
    }

    let report = response.extensions_mut().remove::<ErrorReport>();
    let (source, messages) = match report {
        Some(report) => (report.source, report.messages),
        None => ("unknown", Vec::new()),
    };
    let detail = messages
        .first()
        .cloned()
        .unwrap_or_else(|| "no diagnostic available".to_string());

    if status.is_server_error() {
        // A failed write may still have invalidated keys on its way out.
        error!(
            target = "rostra::http::response",
            status = status.as_u16(),
            method = %method,
            path = %uri.path(),
            elapsed_ms = elapsed_ms,
            mutation = mutation_kind,
            invalidated_keys,
            source = source,
            detail = %detail,
            chain = ?messages,
            request_id = request_id,
            "request failed",
        );
    } else if status.is_client_error() {
        warn!(
            target = "rostra::http::response",
            status = status.as_u16(),
            method = %method,
            path = %uri.path(),
            elapsed_ms = elapsed_ms,
            mutation = mutation_kind,
            source = source,
            detail = %detail,
            request_id = request_id,
            "client request error",
        );
    }

    response
}

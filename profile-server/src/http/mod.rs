mod handlers;
pub mod upload;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{DefaultBodyLimit, Request},
    http::{header, HeaderValue, Method, StatusCode, Uri},
    middleware::{self, Next},
    response::{IntoResponse, Redirect, Response},
    routing::{get, patch},
    Json, Router,
};
use serde_json::json;

use crate::pages;
use crate::service::{ProfileService, UPLOADS_ROUTE};
use data_error::ProfileError;

pub const API_BASE: &str = "/api/v1";

const CORS_METHODS: &str = "GET,HEAD,PUT,PATCH,POST,DELETE";

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ProfileService>,
    pub uploads_dir: PathBuf,
}

impl AppState {
    pub fn new(service: ProfileService, uploads_dir: impl Into<PathBuf>) -> Self {
        Self {
            service: Arc::new(service),
            uploads_dir: uploads_dir.into(),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route(
            "/users/me",
            get(handlers::get_profile).put(handlers::update_profile),
        )
        .route(
            "/users/me/avatar",
            // Avatar size is not limited.
            patch(handlers::update_avatar).layer(DefaultBodyLimit::disable()),
        )
        .route("/rules", get(handlers::get_rules))
        .fallback(|| async { StatusCode::NOT_FOUND });

    Router::new()
        .nest(API_BASE, api)
        .route(
            &format!("{UPLOADS_ROUTE}/:filename"),
            get(upload::serve_upload),
        )
        .route("/", get(|| async { Redirect::to("/profile") }))
        .route("/profile", get(pages::view_page))
        .route(
            "/profile/edit",
            get(pages::edit_page).post(pages::submit_edit),
        )
        .fallback(unknown_path)
        .layer(middleware::from_fn(allow_any_origin))
        .layer(middleware::from_fn(log_requests))
        .with_state(state)
}

/// Unknown page paths land on the profile view.
async fn unknown_path(uri: Uri) -> Response {
    if uri.path().starts_with(UPLOADS_ROUTE) {
        return StatusCode::NOT_FOUND.into_response();
    }
    Redirect::to("/profile").into_response()
}

/// Any origin may call the server. Preflights are answered here and
/// never reach a route.
async fn allow_any_origin(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        let requested = request
            .headers()
            .get(header::ACCESS_CONTROL_REQUEST_HEADERS)
            .cloned();

        let mut response = StatusCode::NO_CONTENT.into_response();
        let headers = response.headers_mut();
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(CORS_METHODS),
        );
        if let Some(requested) = requested {
            headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, requested);
            headers.insert(
                header::VARY,
                HeaderValue::from_static("access-control-request-headers"),
            );
        }
        return response;
    }

    let mut response = next.run(request).await;
    response.headers_mut().insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    response
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started = Instant::now();

    let response = next.run(request).await;

    log::info!(
        "{} {} {} {:?}",
        method,
        path,
        response.status().as_u16(),
        started.elapsed()
    );
    response
}

pub fn status_for(err: &ProfileError) -> StatusCode {
    match err {
        ProfileError::Validation { .. }
        | ProfileError::AgeRestriction(_)
        | ProfileError::Upload(_) => StatusCode::BAD_REQUEST,
        ProfileError::NotFound(_) => StatusCode::NOT_FOUND,
        ProfileError::Storage(_, _)
        | ProfileError::Io(_)
        | ProfileError::Parse(_)
        | ProfileError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Domain error rendered as `{"message": ..., "field": ...}`.
#[derive(Debug)]
pub struct ApiError(pub ProfileError);

impl From<ProfileError> for ApiError {
    fn from(err: ProfileError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if self.0.is_client_error() {
            log::debug!("Rejected request: {}", self.0);
        } else {
            log::error!("{}", self.0);
        }

        let body = match self.0.field() {
            Some(field) => json!({ "message": self.0.to_string(), "field": field }),
            None => json!({ "message": self.0.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

/// Run a service call on the blocking pool; storage access is synchronous.
pub async fn run_service<T, F>(
    state: &AppState,
    call: F,
) -> Result<T, ProfileError>
where
    F: FnOnce(&ProfileService) -> data_error::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let service = state.service.clone();
    tokio::task::spawn_blocking(move || call(&service))
        .await
        .map_err(|err| ProfileError::Other(anyhow::anyhow!(err)))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_follows_status() {
        let errors = [
            ProfileError::validation("name", "\"name\" is required"),
            ProfileError::AgeRestriction("too young".to_owned()),
            ProfileError::NotFound("1".to_owned()),
            ProfileError::Upload("No file uploaded".to_owned()),
            ProfileError::Storage("profiles".to_owned(), "gone".to_owned()),
            ProfileError::Parse("bad json".to_owned()),
        ];
        for err in errors {
            assert_eq!(
                status_for(&err).is_client_error(),
                err.is_client_error(),
                "{err}"
            );
        }
    }
}

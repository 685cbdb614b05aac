//! HTTP API layer exposing notebook read/write endpoints.

pub mod middleware;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use notebook_hub_core::storage::{Notebook, NotebookStore, NotebookSummary, StoreError};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

/// Shared application state containing the notebook store.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<NotebookStore>,
}

/// JSON body rendered with indentation.
pub struct PrettyJson<T>(pub StatusCode, pub T);

impl<T: Serialize> IntoResponse for PrettyJson<T> {
    fn into_response(self) -> Response {
        match serde_json::to_vec_pretty(&self.1) {
            Ok(body) => (
                self.0,
                [(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json; charset=utf-8"),
                )],
                body,
            )
                .into_response(),
            Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
        }
    }
}

#[derive(Serialize)]
struct NotFoundResponse {
    message: &'static str,
    identifier: String,
}

#[derive(Serialize)]
struct BadRequestResponse {
    identifier: String,
    error: String,
}

#[derive(Serialize)]
struct UpdatedResponse {
    message: &'static str,
    identifier: String,
    data: Value,
}

pub enum ApiError {
    NotFound(String),
    BadRequest { identifier: String, error: String },
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(identifier) => ApiError::NotFound(identifier),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound(identifier) => PrettyJson(
                StatusCode::NOT_FOUND,
                NotFoundResponse {
                    message: "Notebook not found",
                    identifier,
                },
            )
            .into_response(),
            ApiError::BadRequest { identifier, error } => PrettyJson(
                StatusCode::BAD_REQUEST,
                BadRequestResponse { identifier, error },
            )
            .into_response(),
        }
    }
}

pub fn router(store: Arc<NotebookStore>) -> Router {
    Router::new()
        .route("/notebooks", get(list_notebooks))
        .route(
            "/notebook/{identifier}",
            get(get_notebook).post(set_notebook),
        )
        .with_state(AppState { store })
}

async fn list_notebooks(State(state): State<AppState>) -> PrettyJson<Vec<NotebookSummary>> {
    PrettyJson(StatusCode::OK, state.store.list())
}

async fn get_notebook(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> Result<PrettyJson<Notebook>, ApiError> {
    let notebook = state.store.get(&identifier)?;
    Ok(PrettyJson(StatusCode::OK, notebook))
}

async fn set_notebook(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let contents: Value = match serde_json::from_slice(&body) {
        Ok(contents @ Value::Object(_)) => contents,
        Ok(_) => {
            return Err(ApiError::BadRequest {
                identifier,
                error: "notebook contents must be a JSON object".to_string(),
            })
        }
        Err(e) => {
            return Err(ApiError::BadRequest {
                identifier,
                error: e.to_string(),
            })
        }
    };
    state.store.set_content(&identifier, contents.clone())?;
    info!("contents of {} replaced by client", identifier);
    Ok(PrettyJson(
        StatusCode::OK,
        UpdatedResponse {
            message: "Notebook updated",
            identifier,
            data: contents,
        },
    ))
}

//! JSON envelope, error mapping and router composition for the HTTP surface.
//!
//! Successes render as `{"status":"success","payload":...}` and failures as
//! `{"status":"error","error":"..."}`.

use std::sync::Arc;

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tracing::error;

use vitrina_core::errors::{ApplicationError, InterfaceError};
use vitrina_db::DbPool;
use vitrina_services::{CartService, ProductService, ViewerRegistry};

use crate::{health, routes, viewers};

#[derive(Clone)]
pub struct AppState {
    pub products: Arc<ProductService>,
    pub carts: Arc<CartService>,
    pub viewers: Arc<ViewerRegistry>,
    pub db_pool: DbPool,
}

pub fn router(state: AppState) -> Router {
    let db_pool = state.db_pool.clone();

    Router::new()
        .merge(routes::products::router())
        .merge(routes::carts::router())
        .route("/ws", get(viewers::upgrade))
        .with_state(state)
        .merge(health::router(db_pool))
}

#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub status: &'static str,
    pub payload: T,
}

pub fn success<T: Serialize>(payload: T) -> Json<Envelope<T>> {
    Json(Envelope { status: "success", payload })
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: &'static str,
    pub error: String,
}

#[derive(Debug)]
pub struct ApiError(pub InterfaceError);

impl From<ApplicationError> for ApiError {
    fn from(value: ApplicationError) -> Self {
        Self(InterfaceError::from(value))
    }
}

/// A body that is not valid JSON for the expected shape is a validation failure (400).
impl From<JsonRejection> for ApiError {
    fn from(value: JsonRejection) -> Self {
        Self(InterfaceError::BadRequest { message: format!("invalid request body: {}", value.body_text()) })
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::Internal { message } => {
                error!(event_name = "http.request.internal_error", error = %message, "request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(ErrorBody { status: "error", error: self.0.message().to_string() }))
            .into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

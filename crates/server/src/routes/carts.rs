//! Cart endpoints. Cart writes never notify viewers.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use vitrina_core::domain::cart::CartItemInput;
use vitrina_core::errors::ApplicationError;

use crate::api::{success, ApiError, ApiResult, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/carts", post(create_cart))
        .route("/api/carts/{cid}", get(get_cart).put(replace_items).delete(clear_cart))
        .route(
            "/api/carts/{cid}/products/{pid}",
            post(add_item).put(update_quantity).delete(remove_item),
        )
}

#[derive(Debug, Deserialize)]
pub struct QuantityRequest {
    pub quantity: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ReplaceItemsRequest {
    pub products: Option<Vec<CartItemInput>>,
}

async fn create_cart(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let cart = state.carts.create().await?;
    Ok((StatusCode::CREATED, success(cart)))
}

async fn get_cart(
    State(state): State<AppState>,
    Path(cid): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(success(state.carts.get(&cid).await?))
}

async fn add_item(
    State(state): State<AppState>,
    Path((cid, pid)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    Ok(success(state.carts.add_item(&cid, &pid).await?))
}

async fn update_quantity(
    State(state): State<AppState>,
    Path((cid, pid)): Path<(String, String)>,
    body: Result<Json<QuantityRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = body.map_err(ApiError::from)?;
    let quantity = request.quantity.ok_or_else(|| {
        ApiError::from(ApplicationError::Validation("quantity is required".to_string()))
    })?;
    Ok(success(state.carts.update_quantity(&cid, &pid, quantity).await?))
}

async fn remove_item(
    State(state): State<AppState>,
    Path((cid, pid)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    Ok(success(state.carts.remove_item(&cid, &pid).await?))
}

async fn replace_items(
    State(state): State<AppState>,
    Path(cid): Path<String>,
    body: Result<Json<ReplaceItemsRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = body.map_err(ApiError::from)?;
    let items = request.products.ok_or_else(|| {
        ApiError::from(ApplicationError::Validation("products must be an array".to_string()))
    })?;
    Ok(success(state.carts.replace_items(&cid, items).await?))
}

async fn clear_cart(
    State(state): State<AppState>,
    Path(cid): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(success(state.carts.clear(&cid).await?))
}

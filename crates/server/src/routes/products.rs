//! Catalog endpoints.
//!
//! - `GET    /api/products`        paginated listing (`limit`, `page`, `sort`, `category`, `status`)
//! - `POST   /api/products`        create (201)
//! - `GET    /api/products/{pid}`  fetch one
//! - `PUT    /api/products/{pid}`  partial update; `id` and `code` keys are ignored
//! - `DELETE /api/products/{pid}`  delete (204)

use axum::{
    extract::{rejection::JsonRejection, Path, Query, RawQuery, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;

use vitrina_core::domain::listing::{ListingRequest, PageMeta};
use vitrina_core::domain::product::{Product, ProductDraft, ProductPatch};

use crate::api::{success, ApiError, ApiResult, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/products", get(list_products).post(create_product))
        .route("/api/products/{pid}", get(get_product).put(update_product).delete(delete_product))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPage {
    pub status: &'static str,
    pub payload: Vec<Product>,
    #[serde(flatten)]
    pub meta: PageMeta,
    pub prev_link: Option<String>,
    pub next_link: Option<String>,
}

async fn list_products(
    State(state): State<AppState>,
    Query(request): Query<ListingRequest>,
    RawQuery(raw_query): RawQuery,
) -> ApiResult<Json<ProductPage>> {
    let query = state.products.query_from(&request)?;
    let page = state.products.list(&query).await?;
    let raw_query = raw_query.unwrap_or_default();

    Ok(Json(ProductPage {
        status: "success",
        prev_link: page.meta.prev_page.map(|target| page_link(&raw_query, target)),
        next_link: page.meta.next_page.map(|target| page_link(&raw_query, target)),
        payload: page.items,
        meta: page.meta,
    }))
}

/// Rebuilds the listing URL with `page` swapped for `target`, keeping every other
/// parameter exactly as the client encoded it.
fn page_link(raw_query: &str, target: u32) -> String {
    let mut pairs: Vec<String> = raw_query
        .split('&')
        .filter(|pair| !pair.is_empty() && pair.split('=').next() != Some("page"))
        .map(str::to_string)
        .collect();
    pairs.push(format!("page={target}"));
    format!("/api/products?{}", pairs.join("&"))
}

async fn get_product(
    State(state): State<AppState>,
    Path(pid): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(success(state.products.get(&pid).await?))
}

async fn create_product(
    State(state): State<AppState>,
    body: Result<Json<ProductDraft>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(draft) = body.map_err(ApiError::from)?;
    let product = state.products.create(draft).await?;
    Ok((StatusCode::CREATED, success(product)))
}

async fn update_product(
    State(state): State<AppState>,
    Path(pid): Path<String>,
    body: Result<Json<ProductPatch>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(patch) = body.map_err(ApiError::from)?;
    Ok(success(state.products.update(&pid, patch).await?))
}

async fn delete_product(
    State(state): State<AppState>,
    Path(pid): Path<String>,
) -> ApiResult<StatusCode> {
    state.products.delete(&pid).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::page_link;
    use crate::api::test_support::{app, send, MOUSE};

    #[test]
    fn page_link_replaces_page_and_keeps_other_parameters() {
        assert_eq!(
            page_link("limit=5&page=1&category=Audio%20Gear", 2),
            "/api/products?limit=5&category=Audio%20Gear&page=2"
        );
        assert_eq!(page_link("", 3), "/api/products?page=3");
    }

    #[tokio::test]
    async fn create_returns_201_with_uppercased_code() {
        let (app, _state) = app().await;

        let (status, body) = send(&app, "POST", "/api/products", Some(MOUSE)).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "success");
        assert_eq!(body["payload"]["code"], "MOU001");
        assert_eq!(body["payload"]["status"], true);
    }

    #[tokio::test]
    async fn missing_fields_are_reported_as_validation_errors() {
        let (app, _state) = app().await;

        let (status, body) = send(&app, "POST", "/api/products", Some(r#"{"title":"Mouse"}"#)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().expect("message").contains("code is required"));
    }

    #[tokio::test]
    async fn listing_reports_pagination_fields_and_links() {
        let (app, _state) = app().await;
        for index in 0..3 {
            let body = MOUSE.replace("mou001", &format!("mou00{index}"));
            send(&app, "POST", "/api/products", Some(&body)).await;
        }

        let (status, body) = send(&app, "GET", "/api/products?limit=2&sort=desc", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["payload"].as_array().expect("items").len(), 2);
        assert_eq!(body["totalDocs"], 3);
        assert_eq!(body["totalPages"], 2);
        assert_eq!(body["hasNextPage"], true);
        assert_eq!(body["prevLink"], serde_json::Value::Null);
        assert_eq!(body["nextLink"], "/api/products?limit=2&sort=desc&page=2");
    }

    #[tokio::test]
    async fn invalid_listing_parameters_are_rejected() {
        let (app, _state) = app().await;

        let (page_status, _) = send(&app, "GET", "/api/products?page=0", None).await;
        let (sort_status, _) = send(&app, "GET", "/api/products?sort=sideways", None).await;

        assert_eq!(page_status, StatusCode::BAD_REQUEST);
        assert_eq!(sort_status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn update_ignores_code_and_delete_returns_204_then_404() {
        let (app, _state) = app().await;
        let (_, created) = send(&app, "POST", "/api/products", Some(MOUSE)).await;
        let id = created["payload"]["id"].as_str().expect("id").to_string();
        let uri = format!("/api/products/{id}");

        let (status, updated) =
            send(&app, "PUT", &uri, Some(r#"{"code":"OTHER","id":"x","stock":9}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["payload"]["code"], "MOU001");
        assert_eq!(updated["payload"]["id"], id.as_str());
        assert_eq!(updated["payload"]["stock"], 9);

        let (deleted, body) = send(&app, "DELETE", &uri, None).await;
        assert_eq!(deleted, StatusCode::NO_CONTENT);
        assert!(body.is_null());

        let (missing, _) = send(&app, "GET", &uri, None).await;
        assert_eq!(missing, StatusCode::NOT_FOUND);
    }
}

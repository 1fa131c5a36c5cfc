//! Catalog route handlers.
//!
//! Reads are public. Writes need an admin token.

use axum::{Json, extract::State, http::StatusCode};
use tracing::instrument;

use cartwheel_core::ProductId;
use cartwheel_core::api::{ProductInput, ProductList, ProductQuery, ProductView};

use crate::db::RepositoryError;
use crate::error::{AppError, Result};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::RequireAdmin;
use crate::models::NewProduct;
use crate::state::AppState;

/// List products, optionally narrowed to one category.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ProductQuery>,
) -> Result<Json<ProductList>> {
    let category = query
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());

    let products = state.catalog().list(category).await?;
    Ok(Json(ProductList {
        products: products.iter().map(|p| p.to_view()).collect(),
    }))
}

/// One product.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<Json<ProductView>> {
    let product = state
        .catalog()
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;
    Ok(Json(product.to_view()))
}

#[instrument(skip(state, input), fields(admin_id = %admin.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiJson(input): ApiJson<ProductInput>,
) -> Result<(StatusCode, Json<ProductView>)> {
    let product = validated(input)?;
    let product = state.catalog().create(&product).await?;
    Ok((StatusCode::CREATED, Json(product.to_view())))
}

#[instrument(skip(state, input), fields(admin_id = %admin.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<ProductId>,
    ApiJson(input): ApiJson<ProductInput>,
) -> Result<Json<ProductView>> {
    let product = validated(input)?;
    let product = state
        .catalog()
        .update(id, &product)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => AppError::NotFound("Product".to_string()),
            other => other.into(),
        })?;
    Ok(Json(product.to_view()))
}

/// Delete a product. Cart and wishlist entries go with it; orders keep
/// their lines.
#[instrument(skip(state), fields(admin_id = %admin.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<StatusCode> {
    if state.catalog().delete(id).await? {
        tracing::info!(product_id = %id, "product deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("Product".to_string()))
    }
}

fn validated(input: ProductInput) -> Result<NewProduct> {
    let product = NewProduct::from(input);
    product
        .validate()
        .map_err(|msg| AppError::BadRequest(msg.to_string()))?;
    Ok(product)
}

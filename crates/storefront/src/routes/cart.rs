//! Cart route handlers.
//!
//! Every handler answers with the whole cart as a JSON array of lines, so the
//! client never has to patch its copy.

use axum::{Json, extract::State};
use tracing::instrument;

use cartwheel_core::ProductId;
use cartwheel_core::api::{AddToCartRequest, CartLineView, SetQuantityRequest};

use crate::error::Result;
use crate::extract::{ApiJson, ApiPath};
use crate::middleware::RequireAuth;
use crate::state::AppState;

#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<CartLineView>>> {
    Ok(Json(state.carts().view(user.id).await?))
}

/// Add a product. An existing line grows by the requested quantity.
#[instrument(skip(state))]
pub async fn add(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(request): ApiJson<AddToCartRequest>,
) -> Result<Json<Vec<CartLineView>>> {
    let lines = state
        .carts()
        .add(user.id, request.product_id, request.quantity)
        .await?;
    Ok(Json(lines))
}

/// Set a line's quantity. Zero or less removes the line.
#[instrument(skip(state))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(product_id): ApiPath<ProductId>,
    ApiJson(request): ApiJson<SetQuantityRequest>,
) -> Result<Json<Vec<CartLineView>>> {
    let lines = state
        .carts()
        .set_quantity(user.id, product_id, request.quantity)
        .await?;
    Ok(Json(lines))
}

#[instrument(skip(state))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(product_id): ApiPath<ProductId>,
) -> Result<Json<Vec<CartLineView>>> {
    Ok(Json(state.carts().remove(user.id, product_id).await?))
}

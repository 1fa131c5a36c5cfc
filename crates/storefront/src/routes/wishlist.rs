//! Wishlist route handlers.

use axum::{Json, extract::State};
use tracing::instrument;

use cartwheel_core::ProductId;
use cartwheel_core::api::{AddToWishlistRequest, WishlistView};

use crate::error::Result;
use crate::extract::{ApiJson, ApiPath};
use crate::middleware::RequireAuth;
use crate::state::AppState;

#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<WishlistView>> {
    Ok(Json(state.wishlists().view(user.id).await?))
}

#[instrument(skip(state))]
pub async fn add(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(request): ApiJson<AddToWishlistRequest>,
) -> Result<Json<WishlistView>> {
    Ok(Json(state.wishlists().add(user.id, request.product_id).await?))
}

#[instrument(skip(state))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(product_id): ApiPath<ProductId>,
) -> Result<Json<WishlistView>> {
    Ok(Json(state.wishlists().remove(user.id, product_id).await?))
}

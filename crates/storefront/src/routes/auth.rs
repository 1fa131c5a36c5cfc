//! Account route handlers.
//!
//! Register and login answer with a bearer token; everything else needs one.

use axum::{Json, extract::State, http::StatusCode};
use tracing::instrument;

use cartwheel_core::api::{
    LoginRequest, ProfileUpdated, RegisterRequest, TokenResponse, UpdateProfileRequest, UserView,
};

use crate::error::Result;
use crate::extract::ApiJson;
use crate::middleware::RequireAuth;
use crate::state::AppState;

/// Create an account and sign it in.
#[instrument(skip(state, request), fields(email = %request.email))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<TokenResponse>)> {
    let (user, token) = state.auth().register(&request).await?;
    tracing::info!(user_id = %user.id, "account registered");
    Ok((StatusCode::CREATED, Json(TokenResponse { token })))
}

/// Exchange credentials for a token.
#[instrument(skip(state, request), fields(email = %request.email))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Json<TokenResponse>> {
    let (user, token) = state.auth().login(&request).await?;
    tracing::info!(user_id = %user.id, "login succeeded");
    Ok(Json(TokenResponse { token }))
}

/// The caller's account.
#[instrument(skip(state))]
pub async fn me(
    State(state): State<AppState>,
    RequireAuth(caller): RequireAuth,
) -> Result<Json<UserView>> {
    let user = state.auth().get_user(caller.id).await?;
    Ok(Json(user.to_view()))
}

/// The caller's profile, wrapped as `{"user": ...}`.
#[instrument(skip(state))]
pub async fn profile(
    State(state): State<AppState>,
    RequireAuth(caller): RequireAuth,
) -> Result<Json<ProfileUpdated>> {
    let user = state.auth().get_user(caller.id).await?;
    Ok(Json(ProfileUpdated {
        user: user.to_view(),
    }))
}

/// Change name, email or password. Omitted fields stay as they are.
#[instrument(skip(state, request))]
pub async fn update_profile(
    State(state): State<AppState>,
    RequireAuth(caller): RequireAuth,
    ApiJson(request): ApiJson<UpdateProfileRequest>,
) -> Result<Json<ProfileUpdated>> {
    let user = state.auth().update_profile(caller.id, &request).await?;
    tracing::info!(user_id = %user.id, "profile updated");
    Ok(Json(ProfileUpdated {
        user: user.to_view(),
    }))
}

//! Authentication Handlers

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use haulbid_types::PublicAccount;

use crate::dto::{
    field, filled, require, LoginRequest, LoginResponse, MessageResponse, RegisterRequest,
    RegisterResponse, ResetPasswordRequest,
};
use crate::error::ApiResult;
use crate::extractors::{ClientIp, RequireAuth, ValidatedJson};
use crate::state::AppState;

/// Register an account
#[utoipa::path(
    post,
    path = "/api/v1/register",
    tag = "Authentication",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = RegisterResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 403, description = "Admin code mismatch", body = ErrorResponse),
        (status = 409, description = "Username or email taken", body = ErrorResponse),
        (status = 429, description = "Too many registrations", body = ErrorResponse)
    )
)]
pub async fn register(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    ValidatedJson(request): ValidatedJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<RegisterResponse>)> {
    let user = state
        .identity
        .register(request.into_registration()?, &ip)
        .await?;
    Ok((StatusCode::CREATED, Json(RegisterResponse { user })))
}

/// Exchange credentials for a bearer token
#[utoipa::path(
    post,
    path = "/api/v1/login",
    tag = "Authentication",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 429, description = "Too many failed attempts", body = ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    require(&[
        ("usernameOrEmail", filled(&request.username_or_email)),
        ("password", filled(&request.password)),
    ])?;
    let identifier = field(request.username_or_email, "usernameOrEmail")?;
    let password = field(request.password, "password")?;

    let session = state.identity.login(&identifier, &password, &ip).await?;
    Ok(Json(session.into()))
}

/// Request a reset token, or redeem one
#[utoipa::path(
    post,
    path = "/api/v1/reset-password",
    tag = "Authentication",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Reset issued or completed", body = MessageResponse),
        (status = 400, description = "Invalid or expired token", body = ErrorResponse)
    )
)]
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    ValidatedJson(request): ValidatedJson<ResetPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    if filled(&request.token) {
        require(&[("newPassword", filled(&request.new_password))])?;
        let token = field(request.token, "token")?;
        let new_password = field(request.new_password, "newPassword")?;
        state
            .identity
            .complete_reset(&token, &new_password, &ip)
            .await?;
        return Ok(Json(MessageResponse::new("Password has been reset")));
    }

    require(&[("email", filled(&request.email))])?;
    let email = field(request.email, "email")?;
    let issued = state.identity.request_reset(&email, &ip).await?;
    Ok(Json(MessageResponse {
        message: issued.message,
        reset_token: issued.reset_token,
    }))
}

/// The caller's own profile
#[utoipa::path(
    get,
    path = "/api/v1/me",
    tag = "Authentication",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Profile", body = PublicAccount),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
pub async fn me(
    State(state): State<Arc<AppState>>,
    RequireAuth(user): RequireAuth,
) -> ApiResult<Json<PublicAccount>> {
    Ok(Json(state.identity.profile(user.account_id).await?))
}

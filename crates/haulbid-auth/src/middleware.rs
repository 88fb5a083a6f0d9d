//! Authentication Middleware for Axum
//!
//! [`AuthLayer`] validates `Authorization: Bearer <token>`, re-reads the
//! account behind it and stores the resulting [`AuthenticatedUser`] in
//! request extensions. Requests without a token pass through untouched;
//! handlers opt in with [`RequireAuth`], [`RequireAdmin`] or [`OptionalUser`].

use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, Request},
    http::{request::Parts, HeaderMap, StatusCode},
    response::Response,
};
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

use crate::error::{AuthError, ErrorResponse};
use crate::identity::IdentityService;
use crate::types::AuthenticatedUser;

/// Authentication middleware layer
#[derive(Clone)]
pub struct AuthLayer {
    identity: Arc<IdentityService>,
}

impl AuthLayer {
    pub fn new(identity: Arc<IdentityService>) -> Self {
        Self { identity }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthMiddleware {
            inner,
            identity: self.identity.clone(),
        }
    }
}

/// Authentication middleware service
#[derive(Clone)]
pub struct AuthMiddleware<S> {
    inner: S,
    identity: Arc<IdentityService>,
}

impl<S> Service<Request> for AuthMiddleware<S>
where
    S: Service<Request, Response = Response> + Send + Clone + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let identity = self.identity.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            match authenticate(req.headers(), &identity).await {
                Ok(Some(user)) => {
                    let (mut parts, body) = req.into_parts();
                    parts.extensions.insert(user);
                    inner.call(Request::from_parts(parts, body)).await
                }
                // No credentials - handler decides whether auth is required
                Ok(None) => inner.call(req).await,
                Err(e) => {
                    tracing::debug!(error = %e, "rejected bearer token");
                    Ok(auth_error_response(e))
                }
            }
        })
    }
}

/// Validate the bearer token, if any
async fn authenticate(
    headers: &HeaderMap,
    identity: &IdentityService,
) -> Result<Option<AuthenticatedUser>, AuthError> {
    let Some(auth_header) = headers.get("Authorization") else {
        return Ok(None);
    };
    let auth_str = auth_header.to_str().map_err(|_| AuthError::InvalidToken)?;
    let token = auth_str
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::InvalidToken)?;
    identity.authenticate(token).await.map(Some)
}

/// Create error response for authentication errors
pub fn auth_error_response(error: AuthError) -> Response {
    let status =
        StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let response = ErrorResponse::from(&error);

    let mut res = Response::builder()
        .status(status)
        .header("Content-Type", "application/json");

    // Add Retry-After header for rate limiting
    if let Some(retry_after) = response.retry_after {
        res = res.header("Retry-After", retry_after.to_string());
    }

    res.body(Body::from(serde_json::to_string(&response).unwrap_or_default()))
        .unwrap_or_else(|_| Response::new(Body::empty()))
}

// =============================================================================
// Axum Extractors
// =============================================================================

/// Caller identity left behind by [`AuthMiddleware`]
fn caller(parts: &Parts) -> Option<AuthenticatedUser> {
    parts.extensions.get::<AuthenticatedUser>().cloned()
}

/// Anonymous callers are `None`
pub struct OptionalUser(pub Option<AuthenticatedUser>);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for OptionalUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(caller(parts)))
    }
}

/// Any signed-in account; 401 otherwise
pub struct RequireAuth(pub AuthenticatedUser);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for RequireAuth {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        caller(parts)
            .map(Self)
            .ok_or_else(|| auth_error_response(AuthError::Unauthenticated))
    }
}

/// Admin accounts only; 401 when anonymous, 403 for other roles
pub struct RequireAdmin(pub AuthenticatedUser);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for RequireAdmin {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match caller(parts) {
            None => Err(auth_error_response(AuthError::Unauthenticated)),
            Some(user) if user.is_admin() => Ok(Self(user)),
            Some(_) => Err(auth_error_response(AuthError::InsufficientPermissions)),
        }
    }
}

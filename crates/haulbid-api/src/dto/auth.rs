//! Authentication DTOs

use haulbid_auth::{LoginSession, Registration};
use haulbid_types::{PublicAccount, Role};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::common::{field, filled, require};
use crate::error::ApiResult;

// =============================================================================
// Registration
// =============================================================================

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(max = 50, message = "Username must be at most 50 characters"))]
    pub username: Option<String>,
    #[validate(length(max = 254, message = "Email must be at most 254 characters"))]
    pub email: Option<String>,
    pub password: Option<String>,
    /// Defaults to `user`
    pub role: Option<Role>,
    /// Required when registering an admin
    pub admin_code: Option<String>,
}

impl RegisterRequest {
    pub fn into_registration(self) -> ApiResult<Registration> {
        require(&[
            ("username", filled(&self.username)),
            ("email", filled(&self.email)),
            ("password", filled(&self.password)),
        ])?;
        Ok(Registration {
            username: field(self.username, "username")?,
            email: field(self.email, "email")?,
            password: field(self.password, "password")?,
            role: self.role.unwrap_or_default(),
            admin_code: self.admin_code,
        })
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RegisterResponse {
    pub user: PublicAccount,
}

// =============================================================================
// Login
// =============================================================================

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    /// Username or email
    #[serde(alias = "username", alias = "email")]
    #[validate(length(max = 254, message = "Identifier must be at most 254 characters"))]
    pub username_or_email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    /// Bearer token
    pub token: String,
    /// Unix seconds
    pub expires_at: i64,
    pub user: PublicAccount,
}

impl From<LoginSession> for LoginResponse {
    fn from(session: LoginSession) -> Self {
        Self {
            token: session.token.token,
            expires_at: session.token.expires_at,
            user: session.user,
        }
    }
}

// =============================================================================
// Password Reset
// =============================================================================

/// Either `{email}` to request a token or `{token, newPassword}` to redeem one
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[validate(length(max = 254, message = "Email must be at most 254 characters"))]
    pub email: Option<String>,
    pub token: Option<String>,
    pub new_password: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;

    #[test]
    fn test_registration_defaults_role() {
        let request: RegisterRequest = serde_json::from_value(serde_json::json!({
            "username": "abc_1",
            "email": "abc@example.com",
            "password": "password1"
        }))
        .unwrap();
        let registration = request.into_registration().unwrap();
        assert_eq!(registration.role, Role::User);
    }

    #[test]
    fn test_registration_missing_fields() {
        let request: RegisterRequest =
            serde_json::from_value(serde_json::json!({ "username": "abc" })).unwrap();
        match request.into_registration().unwrap_err() {
            ApiError::MissingFields(fields) => assert_eq!(fields, vec!["email", "password"]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_login_aliases() {
        let request: LoginRequest =
            serde_json::from_value(serde_json::json!({ "email": "a@b.io", "password": "x" })).unwrap();
        assert_eq!(request.username_or_email.as_deref(), Some("a@b.io"));
    }
}

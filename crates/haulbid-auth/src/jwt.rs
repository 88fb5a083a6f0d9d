//! JWT Token Service
//!
//! HS256 bearer tokens carrying the account id and role.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use haulbid_types::{AccountId, Role};

use crate::config::JwtConfig;
use crate::error::{AuthError, AuthResult};
use crate::types::{AuthenticatedUser, IssuedToken, TokenClaims};

/// JWT service for token management
#[derive(Clone)]
pub struct JwtService {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    /// Create a new JWT service
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// Issue a token for `account_id` with the configured lifetime
    pub fn issue(&self, account_id: AccountId, role: Role) -> AuthResult<IssuedToken> {
        let now = Utc::now();
        let exp = now
            + Duration::from_std(self.config.token_lifetime)
                .map_err(|e| AuthError::Internal(e.to_string()))?;

        let claims = TokenClaims {
            sub: account_id.to_string(),
            role,
            iat: now.timestamp(),
            exp: exp.timestamp(),
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("Failed to encode token: {}", e)))?;

        Ok(IssuedToken {
            token,
            expires_at: claims.exp,
        })
    }

    /// Decode and validate a token
    pub fn decode(&self, token: &str) -> AuthResult<TokenClaims> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_audience(&[&self.config.audience]);
        validation.validate_exp = true;

        let token_data = decode::<TokenClaims>(token, &self.decoding_key, &validation)?;
        Ok(token_data.claims)
    }

    /// Validate a token and resolve the caller it names
    pub fn verify(&self, token: &str) -> AuthResult<AuthenticatedUser> {
        let claims = self.decode(token)?;
        let account_id = AccountId::parse(&claims.sub).map_err(|_| AuthError::InvalidToken)?;
        Ok(AuthenticatedUser {
            account_id,
            role: claims.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret-key-that-is-at-least-32-bytes-long".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_issue_and_verify() {
        let service = JwtService::new(test_config());
        let account_id = AccountId::new();

        let issued = service.issue(account_id, Role::Owner).unwrap();
        let user = service.verify(&issued.token).unwrap();

        assert_eq!(user.account_id, account_id);
        assert_eq!(user.role, Role::Owner);
    }

    #[test]
    fn test_token_lifetime_is_seven_days() {
        let service = JwtService::new(test_config());
        let issued = service.issue(AccountId::new(), Role::User).unwrap();
        let claims = service.decode(&issued.token).unwrap();
        assert_eq!(claims.exp - claims.iat, 7 * 24 * 3600);
    }

    #[test]
    fn test_expired_token_rejected() {
        let config = test_config();
        let service = JwtService::new(config.clone());
        let now = Utc::now().timestamp();
        let claims = TokenClaims {
            sub: AccountId::new().to_string(),
            role: Role::User,
            iat: now - 7200,
            exp: now - 3600,
            iss: config.issuer.clone(),
            aud: config.audience.clone(),
            jti: Uuid::new_v4().to_string(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.secret.as_bytes()),
        )
        .unwrap();

        assert!(matches!(service.verify(&token), Err(AuthError::TokenExpired)));
    }

    #[test]
    fn test_foreign_secret_rejected() {
        let service = JwtService::new(test_config());
        let other = JwtService::new(JwtConfig {
            secret: "another-secret-key-that-is-32-bytes-or-more".to_string(),
            ..Default::default()
        });

        let issued = other.issue(AccountId::new(), Role::Admin).unwrap();
        assert!(matches!(service.verify(&issued.token), Err(AuthError::InvalidToken)));
        assert!(service.verify("not-a-jwt").is_err());
    }
}

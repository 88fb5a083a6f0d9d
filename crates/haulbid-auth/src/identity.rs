//! Identity & credential management
//!
//! Registration, login, password reset and admin account management. Every
//! account-store call is bounded by `store_timeout`, every outcome is
//! written to the audit sink, and the login/registration paths are guarded
//! by the [`RateLimiter`].

use std::future::Future;
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use validator::ValidateEmail;

use haulbid_audit::{AuditEvent, AuditSink};
use haulbid_db::{AccountRepository, DbResult};
use haulbid_types::{Account, AccountId, AccountPatch, AccountSummary, PublicAccount, Role};

use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};
use crate::jwt::JwtService;
use crate::password::PasswordService;
use crate::rate_limit::{RateLimitStore, RateLimiter, Scope};
use crate::types::{AuthenticatedUser, IssuedToken};

const ADMIN_CODE_SECRET: &str = "ADMIN_REGISTRATION_CODE";
const RESET_REQUESTED_MESSAGE: &str =
    "If an account exists for this email, a password reset has been issued";

/// Registration input
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub admin_code: Option<String>,
}

/// Successful login
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginSession {
    #[serde(flatten)]
    pub token: IssuedToken,
    pub user: PublicAccount,
}

/// Outcome of a reset request. The token is returned directly as no mail transport exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetIssued {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_token: Option<String>,
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

fn hash_reset_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn validate_username(username: &str) -> AuthResult<()> {
    if username.chars().count() < 3 {
        return Err(AuthError::Validation(
            "Username must be at least 3 characters".into(),
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(AuthError::Validation(
            "Username may contain only letters, digits and underscores".into(),
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> AuthResult<()> {
    if String::from(email).validate_email() {
        Ok(())
    } else {
        Err(AuthError::Validation("Invalid email format".into()))
    }
}

/// Identity & Credential Manager
#[derive(Clone)]
pub struct IdentityService {
    accounts: Arc<dyn AccountRepository>,
    passwords: PasswordService,
    jwt: Arc<JwtService>,
    limiter: RateLimiter,
    audit: Arc<dyn AuditSink>,
    config: AuthConfig,
}

impl IdentityService {
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        rate_limits: Arc<dyn RateLimitStore>,
        audit: Arc<dyn AuditSink>,
        config: AuthConfig,
    ) -> Self {
        Self {
            accounts,
            passwords: PasswordService::new(config.password.clone()),
            jwt: Arc::new(JwtService::new(config.jwt.clone())),
            limiter: RateLimiter::new(rate_limits, config.rate_limit.clone()),
            audit,
            config,
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Race a store call against `store_timeout`
    async fn store<T>(&self, call: impl Future<Output = DbResult<T>>) -> AuthResult<T> {
        let result = tokio::time::timeout(self.config.store_timeout, call)
            .await
            .map_err(|_| AuthError::Timeout("account store".into()))?;
        Ok(result?)
    }

    async fn rate_limited(&self, scope: Scope, subject: &str, source_ip: Option<&str>, err: AuthError) -> AuthError {
        if matches!(err, AuthError::RateLimitExceeded { .. }) {
            metrics::counter!("haulbid_rate_limited_total", "scope" => scope.as_str()).increment(1);
            tracing::warn!(scope = scope.as_str(), subject = subject, "rate limit exceeded");
            self.audit
                .record(
                    AuditEvent::RateLimitExceeded {
                        scope: scope.as_str().to_string(),
                        key: subject.to_string(),
                    },
                    source_ip,
                )
                .await;
        }
        err
    }

    async fn registration_failed(&self, username: &str, source_ip: &str, err: AuthError) -> AuthError {
        tracing::info!(username = username, reason = %err, "registration rejected");
        self.audit
            .record(
                AuditEvent::RegistrationFailed {
                    username: username.to_string(),
                    reason: err.to_string(),
                },
                Some(source_ip),
            )
            .await;
        err
    }

    // =========================================================================
    // Registration & Login
    // =========================================================================

    /// Create an account and return its public projection
    pub async fn register(&self, input: Registration, source_ip: &str) -> AuthResult<PublicAccount> {
        let username = normalize(&input.username);
        let email = normalize(&input.email);

        if let Err(e) = self.limiter.reserve(Scope::Registration, source_ip).await {
            return Err(self
                .rate_limited(Scope::Registration, source_ip, Some(source_ip), e)
                .await);
        }

        let account = match self.create_account(&username, &email, &input).await {
            Ok(account) => account,
            Err(e) => {
                let e = self.abandon(Scope::Registration, source_ip, e).await;
                return Err(self.registration_failed(&username, source_ip, e).await);
            }
        };

        metrics::counter!("haulbid_registrations_total").increment(1);
        tracing::info!(account_id = %account.id, role = %account.role, "account registered");
        self.audit
            .record(
                AuditEvent::Registered {
                    account_id: account.id,
                    role: account.role,
                },
                Some(source_ip),
            )
            .await;

        Ok(account.public())
    }

    async fn create_account(
        &self,
        username: &str,
        email: &str,
        input: &Registration,
    ) -> AuthResult<Account> {
        self.validate_registration(username, email, input).await?;
        if self.store(self.accounts.is_taken(username, email)).await? {
            return Err(AuthError::DuplicateAccount);
        }

        let password_hash = self.passwords.hash(&input.password).await?;
        let account = Account::new(
            username.to_string(),
            email.to_string(),
            password_hash,
            input.role,
        );
        self.store(self.accounts.create(&account)).await?;
        Ok(account)
    }

    /// Hand back a reserved slot for an attempt that must not count
    async fn abandon(&self, scope: Scope, subject: &str, err: AuthError) -> AuthError {
        if let Err(release_err) = self.limiter.release(scope, subject).await {
            tracing::warn!(scope = scope.as_str(), error = %release_err, "rate limit slot not released");
        }
        err
    }

    async fn validate_registration(
        &self,
        username: &str,
        email: &str,
        input: &Registration,
    ) -> AuthResult<()> {
        validate_username(username)?;
        validate_email(email)?;
        self.passwords.validate_strength(&input.password)?;

        if input.role == Role::Admin {
            let Some(expected) = self.config.admin_registration_code.as_deref() else {
                tracing::error!("admin registration attempted but no admin code is configured");
                self.audit
                    .record(
                        AuditEvent::SecretMissing {
                            name: ADMIN_CODE_SECRET.to_string(),
                        },
                        None,
                    )
                    .await;
                return Err(AuthError::AdminCodeNotConfigured);
            };
            let provided = input.admin_code.as_deref().unwrap_or_default();
            if !bool::from(provided.as_bytes().ct_eq(expected.as_bytes())) {
                return Err(AuthError::AdminCodeMismatch);
            }
        }
        Ok(())
    }

    /// Exchange credentials for a bearer token
    pub async fn login(
        &self,
        username_or_email: &str,
        password: &str,
        source_ip: &str,
    ) -> AuthResult<LoginSession> {
        let identifier = normalize(username_or_email);
        if identifier.is_empty() || password.is_empty() {
            return Err(AuthError::Validation(
                "usernameOrEmail and password are required".into(),
            ));
        }

        // The slot is taken before any credential work and kept only when the
        // attempt counts as a failure
        if let Err(e) = self.limiter.reserve(Scope::Login, &identifier).await {
            metrics::counter!("haulbid_logins_total", "outcome" => "rate_limited").increment(1);
            return Err(self
                .rate_limited(Scope::Login, &identifier, Some(source_ip), e)
                .await);
        }

        let found = match self.store(self.accounts.find_by_login(&identifier)).await {
            Ok(found) => found,
            Err(e) => return Err(self.abandon(Scope::Login, &identifier, e).await),
        };
        let Some(account) = found else {
            return Err(self
                .login_failed(&identifier, source_ip, "unknown identifier", true)
                .await);
        };

        if !account.is_active {
            return Err(self
                .login_failed(&identifier, source_ip, "account inactive", false)
                .await);
        }

        let verified = match self.passwords.verify(password, &account.password_hash).await {
            Ok(verified) => verified,
            Err(e) => return Err(self.abandon(Scope::Login, &identifier, e).await),
        };
        if !verified {
            return Err(self
                .login_failed(&identifier, source_ip, "wrong password", true)
                .await);
        }

        self.limiter.clear(Scope::Login, &identifier).await?;
        let token = self.jwt.issue(account.id, account.role)?;

        metrics::counter!("haulbid_logins_total", "outcome" => "success").increment(1);
        tracing::info!(account_id = %account.id, "login succeeded");
        self.audit
            .record(
                AuditEvent::LoginSucceeded {
                    account_id: account.id,
                },
                Some(source_ip),
            )
            .await;

        Ok(LoginSession {
            token,
            user: account.public(),
        })
    }

    async fn login_failed(
        &self,
        identifier: &str,
        source_ip: &str,
        reason: &str,
        counts: bool,
    ) -> AuthError {
        if !counts {
            if let Err(e) = self.limiter.release(Scope::Login, identifier).await {
                return e;
            }
        }
        metrics::counter!("haulbid_logins_total", "outcome" => "failure").increment(1);
        tracing::info!(identifier = identifier, reason = reason, "login failed");
        self.audit
            .record(
                AuditEvent::LoginFailed {
                    identifier: identifier.to_string(),
                    reason: reason.to_string(),
                },
                Some(source_ip),
            )
            .await;
        AuthError::InvalidCredentials
    }

    /// Resolve a bearer token to the identity it was issued for
    pub fn verify_token(&self, token: &str) -> AuthResult<AuthenticatedUser> {
        self.jwt.verify(token)
    }

    /// Verify a bearer token against the account as stored now: deleted or
    /// deactivated accounts are refused and the stored role wins over the
    /// role in the claims
    pub async fn authenticate(&self, token: &str) -> AuthResult<AuthenticatedUser> {
        let claimed = self.verify_token(token)?;
        let account = self
            .store(self.accounts.find_by_id(claimed.account_id))
            .await?
            .filter(|a| a.is_active)
            .ok_or(AuthError::AccountDisabled)?;
        Ok(AuthenticatedUser {
            account_id: account.id,
            role: account.role,
        })
    }

    // =========================================================================
    // Password Reset
    // =========================================================================

    /// Issue a reset token. Unknown emails get the same message and no token.
    pub async fn request_reset(&self, email: &str, source_ip: &str) -> AuthResult<ResetIssued> {
        let email = normalize(email);
        validate_email(&email)?;

        let account = self.store(self.accounts.find_by_email(&email)).await?;
        self.audit
            .record(
                AuditEvent::PasswordResetRequested {
                    email: email.clone(),
                    known: account.is_some(),
                },
                Some(source_ip),
            )
            .await;

        let Some(account) = account else {
            return Ok(ResetIssued {
                message: RESET_REQUESTED_MESSAGE.to_string(),
                reset_token: None,
            });
        };

        let mut bytes = vec![0u8; self.config.reset.token_bytes];
        rand::thread_rng().fill_bytes(&mut bytes);
        let token = hex::encode(&bytes);

        let lifetime = ChronoDuration::from_std(self.config.reset.token_lifetime)
            .map_err(|e| AuthError::Internal(e.to_string()))?;
        let expiry = Utc::now() + lifetime;

        // Overwrites any earlier token
        self.store(self.accounts.set_reset_token(
            account.id,
            Some(&hash_reset_token(&token)),
            Some(expiry),
        ))
        .await?;
        tracing::info!(account_id = %account.id, "password reset token issued");

        Ok(ResetIssued {
            message: RESET_REQUESTED_MESSAGE.to_string(),
            reset_token: Some(token),
        })
    }

    /// Consume a reset token and set a new password
    pub async fn complete_reset(
        &self,
        token: &str,
        new_password: &str,
        source_ip: &str,
    ) -> AuthResult<()> {
        self.passwords.validate_strength(new_password)?;

        let token_hash = hash_reset_token(token.trim());
        let account = self
            .store(self.accounts.find_by_reset_token(&token_hash))
            .await?
            .filter(|a| a.has_live_reset_token(Utc::now()));

        let Some(account) = account else {
            self.audit
                .record(
                    AuditEvent::PasswordResetFailed {
                        reason: "unknown or expired token".to_string(),
                    },
                    Some(source_ip),
                )
                .await;
            return Err(AuthError::InvalidOrExpiredResetToken);
        };

        let password_hash = self.passwords.hash(new_password).await?;
        self.store(self.accounts.update_password(account.id, &password_hash))
            .await?;

        tracing::info!(account_id = %account.id, "password reset completed");
        self.audit
            .record(
                AuditEvent::PasswordResetCompleted {
                    account_id: account.id,
                },
                Some(source_ip),
            )
            .await;
        Ok(())
    }

    // =========================================================================
    // Accounts
    // =========================================================================

    pub async fn profile(&self, account_id: AccountId) -> AuthResult<PublicAccount> {
        self.store(self.accounts.find_by_id(account_id))
            .await?
            .map(|a| a.public())
            .ok_or(AuthError::UserNotFound)
    }

    pub async fn list_accounts(&self, actor: &AuthenticatedUser) -> AuthResult<Vec<AccountSummary>> {
        require_admin(actor)?;
        let accounts = self.store(self.accounts.list()).await?;
        Ok(accounts.iter().map(Account::summary).collect())
    }

    pub async fn update_account(
        &self,
        actor: &AuthenticatedUser,
        account_id: AccountId,
        mut patch: AccountPatch,
    ) -> AuthResult<AccountSummary> {
        require_admin(actor)?;
        if patch.is_empty() {
            return Err(AuthError::Validation("No fields to update".into()));
        }
        if let Some(email) = patch.email.take() {
            let email = normalize(&email);
            validate_email(&email)?;
            patch.email = Some(email);
        }

        let account = self.store(self.accounts.update(account_id, &patch)).await?;
        tracing::info!(account_id = %account_id, by = %actor.account_id, "account updated");
        self.audit
            .record(
                AuditEvent::AccountUpdated {
                    account_id,
                    by: actor.account_id,
                },
                None,
            )
            .await;
        Ok(account.summary())
    }

    pub async fn delete_account(
        &self,
        actor: &AuthenticatedUser,
        account_id: AccountId,
    ) -> AuthResult<()> {
        require_admin(actor)?;
        self.store(self.accounts.delete(account_id)).await?;
        tracing::info!(account_id = %account_id, by = %actor.account_id, "account deleted");
        self.audit
            .record(
                AuditEvent::AccountDeleted {
                    account_id,
                    by: actor.account_id,
                },
                None,
            )
            .await;
        Ok(())
    }
}

fn require_admin(actor: &AuthenticatedUser) -> AuthResult<()> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(AuthError::InsufficientPermissions)
    }
}

//! Account types
//!
//! Accounts are owned by the identity layer. The password hash and the
//! reset token never leave the process: they are skipped on serialization
//! and callers outside the identity layer only ever see [`PublicAccount`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

use crate::identity::AccountId;

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Posts delivery orders
    #[default]
    User,
    /// Delivery company that bids on orders
    Owner,
    /// Platform moderator
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Owner => "owner",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "owner" => Ok(Role::Owner),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// A stored account
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: AccountId,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
    /// SHA-256 of the outstanding reset token, hex encoded
    #[serde(skip_serializing)]
    pub reset_token_hash: Option<String>,
    #[serde(skip_serializing)]
    pub reset_token_expiry: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Build a fresh active account
    pub fn new(username: String, email: String, password_hash: String, role: Role) -> Self {
        Self {
            id: AccountId::new(),
            username,
            email,
            password_hash,
            role,
            is_active: true,
            reset_token_hash: None,
            reset_token_expiry: None,
            created_at: Utc::now(),
        }
    }

    /// Public-safe projection
    pub fn public(&self) -> PublicAccount {
        PublicAccount {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            role: self.role,
            created_at: self.created_at,
        }
    }

    /// Admin listing projection
    pub fn summary(&self) -> AccountSummary {
        AccountSummary {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            role: self.role,
            is_active: self.is_active,
            created_at: self.created_at,
        }
    }

    /// Whether the account holds an unexpired reset token
    pub fn has_live_reset_token(&self, now: DateTime<Utc>) -> bool {
        match (&self.reset_token_hash, self.reset_token_expiry) {
            (Some(_), Some(expiry)) => expiry > now,
            _ => false,
        }
    }
}

/// Account fields safe to return to any caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublicAccount {
    pub id: AccountId,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Account row as shown to admins
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    pub id: AccountId,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Admin-editable account fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountPatch {
    pub email: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

impl AccountPatch {
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.role.is_none() && self.is_active.is_none()
    }

    /// Apply the patch in place
    pub fn apply(&self, account: &mut Account) {
        if let Some(email) = &self.email {
            account.email = email.clone();
        }
        if let Some(role) = self.role {
            account.role = role;
        }
        if let Some(is_active) = self.is_active {
            account.is_active = is_active;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn account() -> Account {
        Account::new(
            "carrier_1".into(),
            "ops@carrier.io".into(),
            "$2b$10$hash".into(),
            Role::Owner,
        )
    }

    #[test]
    fn test_role_parse_and_display() {
        assert_eq!("Owner".parse::<Role>().unwrap(), Role::Owner);
        assert_eq!(Role::Admin.to_string(), "admin");
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn test_secrets_not_serialized() {
        let mut acct = account();
        acct.reset_token_hash = Some("abc".into());
        let json = serde_json::to_value(&acct).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("resetTokenHash").is_none());
        assert_eq!(json["role"], "owner");
    }

    #[test]
    fn test_reset_token_expiry() {
        let mut acct = account();
        let now = Utc::now();
        assert!(!acct.has_live_reset_token(now));

        acct.reset_token_hash = Some("abc".into());
        acct.reset_token_expiry = Some(now + Duration::minutes(30));
        assert!(acct.has_live_reset_token(now));
        assert!(!acct.has_live_reset_token(now + Duration::minutes(31)));
    }

    #[test]
    fn test_patch_apply() {
        let mut acct = account();
        let patch = AccountPatch {
            is_active: Some(false),
            ..Default::default()
        };
        patch.apply(&mut acct);
        assert!(!acct.is_active);
        assert_eq!(acct.role, Role::Owner);
        assert!(AccountPatch::default().is_empty());
    }
}

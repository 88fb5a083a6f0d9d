//! HaulBid Audit - security event trail
//!
//! Every login, registration and security-relevant event produces an
//! [`AuditEntry`]. Entries are chained by hash so tampering with or
//! dropping an entry breaks [`MemoryAuditLog::verify_chain`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use haulbid_types::{AccountId, Role};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Hash used as `previous_hash` of the first entry
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Audit chain broken at entry {sequence}")]
    ChainBroken { sequence: u64 },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for AuditError {
    fn from(e: serde_json::Error) -> Self {
        AuditError::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AuditError>;

/// Security-relevant events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    LoginSucceeded { account_id: AccountId },
    LoginFailed { identifier: String, reason: String },
    Registered { account_id: AccountId, role: Role },
    RegistrationFailed { username: String, reason: String },
    RateLimitExceeded { scope: String, key: String },
    /// A required secret is not configured
    SecretMissing { name: String },
    PasswordResetRequested { email: String, known: bool },
    PasswordResetCompleted { account_id: AccountId },
    PasswordResetFailed { reason: String },
    AccountUpdated { account_id: AccountId, by: AccountId },
    AccountDeleted { account_id: AccountId, by: AccountId },
}

impl AuditEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::LoginSucceeded { .. } => "login_succeeded",
            Self::LoginFailed { .. } => "login_failed",
            Self::Registered { .. } => "registered",
            Self::RegistrationFailed { .. } => "registration_failed",
            Self::RateLimitExceeded { .. } => "rate_limit_exceeded",
            Self::SecretMissing { .. } => "secret_missing",
            Self::PasswordResetRequested { .. } => "password_reset_requested",
            Self::PasswordResetCompleted { .. } => "password_reset_completed",
            Self::PasswordResetFailed { .. } => "password_reset_failed",
            Self::AccountUpdated { .. } => "account_updated",
            Self::AccountDeleted { .. } => "account_deleted",
        }
    }

    /// Failures and trips worth a warning
    pub fn is_alert(&self) -> bool {
        matches!(
            self,
            Self::LoginFailed { .. }
                | Self::RegistrationFailed { .. }
                | Self::RateLimitExceeded { .. }
                | Self::SecretMissing { .. }
                | Self::PasswordResetFailed { .. }
        )
    }
}

/// An audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    /// Position in the chain, starting at 1
    pub sequence: u64,
    /// Previous entry hash (for chain)
    pub previous_hash: String,
    /// Entry hash
    pub hash: String,
    pub timestamp: DateTime<Utc>,
    pub source_ip: Option<String>,
    pub event: AuditEvent,
}

impl AuditEntry {
    fn new(sequence: u64, previous_hash: String, event: AuditEvent, source_ip: Option<String>) -> Self {
        let mut entry = Self {
            id: Uuid::new_v4(),
            sequence,
            previous_hash,
            hash: String::new(),
            timestamp: Utc::now(),
            source_ip,
            event,
        };
        entry.hash = entry.compute_hash();
        entry
    }

    /// Compute hash of this entry
    pub fn compute_hash(&self) -> String {
        let content = format!(
            "{}:{}:{}:{:?}:{:?}",
            self.previous_hash,
            self.sequence,
            self.timestamp.timestamp_nanos_opt().unwrap_or_default(),
            self.source_ip,
            self.event
        );
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Verify the entry hash
    pub fn verify(&self) -> bool {
        self.hash == self.compute_hash()
    }
}

/// Tail of a hash chain
struct ChainHead {
    sequence: u64,
    hash: String,
}

impl Default for ChainHead {
    fn default() -> Self {
        Self {
            sequence: 0,
            hash: GENESIS_HASH.to_string(),
        }
    }
}

impl ChainHead {
    fn append(&mut self, event: AuditEvent, source_ip: Option<String>) -> AuditEntry {
        self.sequence += 1;
        let entry = AuditEntry::new(self.sequence, self.hash.clone(), event, source_ip);
        self.hash = entry.hash.clone();
        entry
    }
}

/// Destination for audit entries
#[async_trait::async_trait]
pub trait AuditSink: Send + Sync {
    /// Chain and persist one event
    async fn record(&self, event: AuditEvent, source_ip: Option<&str>) -> AuditEntry;
}

/// Writes entries as structured `tracing` events under the `haulbid::audit` target
#[derive(Default)]
pub struct TracingAuditSink {
    head: Mutex<ChainHead>,
}

impl TracingAuditSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: AuditEvent, source_ip: Option<&str>) -> AuditEntry {
        let entry = self
            .head
            .lock()
            .await
            .append(event, source_ip.map(String::from));
        let payload = serde_json::to_string(&entry.event).unwrap_or_default();

        if entry.event.is_alert() {
            tracing::warn!(
                target: "haulbid::audit",
                sequence = entry.sequence,
                kind = entry.event.kind(),
                source_ip = ?entry.source_ip,
                hash = %entry.hash,
                event = %payload,
                "audit"
            );
        } else {
            tracing::info!(
                target: "haulbid::audit",
                sequence = entry.sequence,
                kind = entry.event.kind(),
                source_ip = ?entry.source_ip,
                hash = %entry.hash,
                event = %payload,
                "audit"
            );
        }
        entry
    }
}

/// Keeps entries in memory. Used by tests and the admin tooling.
#[derive(Default)]
pub struct MemoryAuditLog {
    inner: Mutex<(ChainHead, Vec<AuditEntry>)>,
}

impl MemoryAuditLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn entries(&self) -> Vec<AuditEntry> {
        self.inner.lock().await.1.clone()
    }

    /// Entries whose event kind matches `kind`
    pub async fn of_kind(&self, kind: &str) -> Vec<AuditEntry> {
        self.inner
            .lock()
            .await
            .1
            .iter()
            .filter(|e| e.event.kind() == kind)
            .cloned()
            .collect()
    }

    /// Verify every hash and every link in the chain
    pub async fn verify_chain(&self) -> Result<()> {
        let guard = self.inner.lock().await;
        let mut previous = GENESIS_HASH;
        for entry in &guard.1 {
            if !entry.verify() || entry.previous_hash != previous {
                return Err(AuditError::ChainBroken {
                    sequence: entry.sequence,
                });
            }
            previous = &entry.hash;
        }
        Ok(())
    }

    /// Export for compliance
    pub async fn export_json(&self) -> Result<String> {
        let guard = self.inner.lock().await;
        Ok(serde_json::to_string_pretty(&guard.1)?)
    }
}

#[async_trait::async_trait]
impl AuditSink for MemoryAuditLog {
    async fn record(&self, event: AuditEvent, source_ip: Option<&str>) -> AuditEntry {
        let mut guard = self.inner.lock().await;
        let entry = guard.0.append(event, source_ip.map(String::from));
        guard.1.push(entry.clone());
        entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed_login() -> AuditEvent {
        AuditEvent::LoginFailed {
            identifier: "dispatch".into(),
            reason: "bad password".into(),
        }
    }

    #[tokio::test]
    async fn test_chain_links_entries() {
        let log = MemoryAuditLog::new();
        let first = log.record(failed_login(), Some("10.0.0.1")).await;
        let second = log
            .record(
                AuditEvent::LoginSucceeded {
                    account_id: AccountId::new(),
                },
                None,
            )
            .await;

        assert_eq!(first.sequence, 1);
        assert_eq!(first.previous_hash, GENESIS_HASH);
        assert_eq!(second.previous_hash, first.hash);
        assert!(log.verify_chain().await.is_ok());
    }

    #[tokio::test]
    async fn test_tampering_detected() {
        let log = MemoryAuditLog::new();
        log.record(failed_login(), None).await;
        log.record(failed_login(), None).await;

        {
            let mut guard = log.inner.lock().await;
            guard.1[0].source_ip = Some("forged".into());
        }

        assert!(matches!(
            log.verify_chain().await,
            Err(AuditError::ChainBroken { sequence: 1 })
        ));
    }

    #[tokio::test]
    async fn test_event_serialization_tagged() {
        let log = MemoryAuditLog::new();
        log.record(
            AuditEvent::SecretMissing {
                name: "ADMIN_REGISTRATION_CODE".into(),
            },
            None,
        )
        .await;

        let json = log.export_json().await.unwrap();
        assert!(json.contains("\"type\": \"secret_missing\""));
        assert_eq!(log.of_kind("secret_missing").await.len(), 1);
    }

    #[tokio::test]
    async fn test_tracing_sink_chains() {
        let sink = TracingAuditSink::new();
        let a = sink.record(failed_login(), None).await;
        let b = sink.record(failed_login(), None).await;
        assert_eq!(b.previous_hash, a.hash);
        assert!(a.verify() && b.verify());
    }

    #[test]
    fn test_alert_classification() {
        assert!(failed_login().is_alert());
        assert!(!AuditEvent::PasswordResetCompleted {
            account_id: AccountId::new()
        }
        .is_alert());
    }
}

//! Notifications

use std::sync::Arc;

use haulbid_db::NotificationRepository;
use haulbid_types::{AccountId, Actor, NewNotification, Notification, NotificationId};

use crate::error::{MarketError, MarketResult};
use crate::Bounded;

#[derive(Clone)]
pub struct Notifier {
    repo: Arc<dyn NotificationRepository>,
    store: Bounded,
}

impl Notifier {
    pub fn new(repo: Arc<dyn NotificationRepository>, store: Bounded) -> Self {
        Self { repo, store }
    }

    /// Validate, sanitize and store a notification
    pub async fn send(&self, new: NewNotification) -> MarketResult<Notification> {
        let notification = new.into_notification()?;
        self.store.run(self.repo.insert(&notification)).await?;
        tracing::debug!(
            notification_id = %notification.id,
            user_id = %notification.user_id,
            kind = notification.kind.as_str(),
            "notification sent"
        );
        Ok(notification)
    }

    /// Send on behalf of another operation. A failure is logged, never surfaced.
    pub(crate) async fn emit(&self, new: NewNotification) {
        if let Err(e) = self.send(new).await {
            tracing::warn!(error = %e, "failed to emit notification");
        }
    }

    /// Newest first
    pub async fn list(&self, user_id: AccountId) -> MarketResult<Vec<Notification>> {
        self.store.run(self.repo.list_for_user(user_id)).await
    }

    /// Mark one of the caller's notifications read
    pub async fn mark_read(&self, actor: Actor, id: NotificationId) -> MarketResult<Notification> {
        if !actor.is_admin() {
            let owner = actor
                .id
                .ok_or_else(|| MarketError::forbidden("anonymous caller"))?;
            let mine = self.list(owner).await?;
            if !mine.iter().any(|n| n.id == id) {
                return Err(MarketError::NotFound(format!("Notification {}", id)));
            }
        }
        self.store.run(self.repo.mark_read(id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haulbid_db::MemoryStore;
    use haulbid_types::{NotificationKind, Priority, Role};

    fn notifier() -> Notifier {
        Notifier::new(Arc::new(MemoryStore::new()), Bounded::default())
    }

    #[tokio::test]
    async fn test_send_strips_markup() {
        let notifier = notifier();
        let user = AccountId::new();
        let sent = notifier
            .send(NewNotification::to(
                user,
                NotificationKind::System,
                "<b>Hello</b>",
                "<script>x</script> welcome".into(),
            ))
            .await
            .unwrap();

        assert_eq!(sent.title, "bHello/b");
        assert!(!sent.message.contains('<'));
        assert_eq!(sent.priority, Priority::Medium);
        assert_eq!(notifier.list(user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_message_bound() {
        let notifier = notifier();
        let result = notifier
            .send(NewNotification::to(
                AccountId::new(),
                NotificationKind::System,
                "t",
                "x".repeat(501),
            ))
            .await;
        assert!(matches!(result, Err(MarketError::Domain(_))));
    }

    #[tokio::test]
    async fn test_mark_read_only_own() {
        let notifier = notifier();
        let (alice, bob) = (AccountId::new(), AccountId::new());
        let sent = notifier
            .send(NewNotification::to(alice, NotificationKind::Reminder, "t", "m".into()))
            .await
            .unwrap();

        let err = notifier
            .mark_read(Actor::account(bob, Role::User), sent.id)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::NotFound(_)));

        let read = notifier
            .mark_read(Actor::account(alice, Role::User), sent.id)
            .await
            .unwrap();
        assert!(read.is_read);
    }
}

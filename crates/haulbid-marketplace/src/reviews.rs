//! Generic reviews keyed by an arbitrary item id

use std::sync::Arc;

use haulbid_db::ReviewRepository;
use haulbid_types::{AccountId, DomainError, Review};

use crate::error::MarketResult;
use crate::Bounded;

#[derive(Clone)]
pub struct ReviewBoard {
    repo: Arc<dyn ReviewRepository>,
    store: Bounded,
}

impl ReviewBoard {
    pub fn new(repo: Arc<dyn ReviewRepository>, store: Bounded) -> Self {
        Self { repo, store }
    }

    pub async fn submit(
        &self,
        user_id: AccountId,
        item_id: &str,
        review: &str,
        rating: Option<i64>,
    ) -> MarketResult<Review> {
        let review = Review::new(user_id, item_id, review, rating)?;
        self.store.run(self.repo.insert(&review)).await?;
        tracing::debug!(review_id = %review.id, item_id = %review.item_id, "review stored");
        Ok(review)
    }

    /// Newest first
    pub async fn list(&self, item_id: &str) -> MarketResult<Vec<Review>> {
        let item_id = item_id.trim();
        if item_id.is_empty() {
            return Err(DomainError::MissingFields(vec!["itemId".into()]).into());
        }
        self.store.run(self.repo.list_for_item(item_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haulbid_db::MemoryStore;

    fn board() -> ReviewBoard {
        ReviewBoard::new(Arc::new(MemoryStore::new()), Bounded::default())
    }

    #[tokio::test]
    async fn test_submit_and_list() {
        let board = board();
        let user = AccountId::new();
        let review = board.submit(user, "order-42", "Great driver", None).await.unwrap();
        assert_eq!(review.rating, 5);

        board.submit(user, "order-7", "Late", Some(2)).await.unwrap();
        let listed = board.list("order-42").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].review, "Great driver");
    }

    #[tokio::test]
    async fn test_validation() {
        let board = board();
        let user = AccountId::new();

        let err = board.submit(user, "x", "   ", None).await.unwrap_err();
        assert_eq!(err.error_code(), "MISSING_FIELDS");

        let err = board.submit(user, "x", &"a".repeat(1001), None).await.unwrap_err();
        assert_eq!(err.error_code(), "TOO_LONG");

        let err = board.submit(user, "x", "ok", Some(0)).await.unwrap_err();
        assert_eq!(err.error_code(), "OUT_OF_RANGE");

        let err = board.list("").await.unwrap_err();
        assert_eq!(err.error_code(), "MISSING_FIELDS");
    }
}

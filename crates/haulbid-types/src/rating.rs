//! Ratings, rating summaries and generic reviews

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

use crate::error::{ensure_max_chars, ensure_score, DomainError, Result};
use crate::identity::{AccountId, OrderId, RatingId, ReviewId};

/// Maximum review length for ratings and generic reviews
pub const REVIEW_MAX_CHARS: usize = 1000;

// ============================================================================
// Ratings
// ============================================================================

/// Per-category scores, each 1-5
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RatingCategories {
    pub communication: u8,
    pub timeliness: u8,
    pub packaging: u8,
    pub professionalism: u8,
}

/// Category scores as submitted; absent values fall back to the overall rating
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CategoryScores {
    pub communication: Option<i64>,
    pub timeliness: Option<i64>,
    pub packaging: Option<i64>,
    pub professionalism: Option<i64>,
}

impl CategoryScores {
    /// Validate each present score and fill the gaps with `overall`
    pub fn resolve(&self, overall: u8) -> Result<RatingCategories> {
        let pick = |field: &str, value: Option<i64>| match value {
            Some(v) => ensure_score(field, v),
            None => Ok(overall),
        };
        Ok(RatingCategories {
            communication: pick("communication", self.communication)?,
            timeliness: pick("timeliness", self.timeliness)?,
            packaging: pick("packaging", self.packaging)?,
            professionalism: pick("professionalism", self.professionalism)?,
        })
    }
}

/// A post-delivery rating of an owner by the customer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    pub id: RatingId,
    pub order_id: OrderId,
    /// Rater
    pub user_id: AccountId,
    /// Rated owner
    pub owner_id: AccountId,
    pub rating: u8,
    pub review: String,
    pub categories: RatingCategories,
    pub is_recommended: bool,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Rating input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RatingSubmission {
    pub order_id: OrderId,
    pub user_id: AccountId,
    pub owner_id: AccountId,
    pub rating: i64,
    #[serde(default)]
    pub review: String,
    #[serde(default)]
    pub categories: CategoryScores,
    #[serde(default)]
    pub is_recommended: bool,
}

impl RatingSubmission {
    /// Validate and build a fresh rating
    pub fn into_rating(self) -> Result<Rating> {
        let rating = ensure_score("rating", self.rating)?;
        ensure_max_chars("review", &self.review, REVIEW_MAX_CHARS)?;
        let categories = self.categories.resolve(rating)?;
        let now = Utc::now();
        Ok(Rating {
            id: RatingId::new(),
            order_id: self.order_id,
            user_id: self.user_id,
            owner_id: self.owner_id,
            rating,
            review: self.review.trim().to_string(),
            categories,
            is_recommended: self.is_recommended,
            is_verified: false,
            created_at: now,
            updated_at: now,
        })
    }
}

impl Rating {
    /// Overwrite the mutable parts with a newer submission from the same rater
    pub fn revise(&mut self, newer: Rating) {
        self.owner_id = newer.owner_id;
        self.rating = newer.rating;
        self.review = newer.review;
        self.categories = newer.categories;
        self.is_recommended = newer.is_recommended;
        self.updated_at = newer.updated_at;
    }
}

// ============================================================================
// Summary
// ============================================================================

/// Mean category scores
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CategoryAverages {
    pub communication: f64,
    pub timeliness: f64,
    pub packaging: f64,
    pub professionalism: f64,
}

/// Aggregate statistics over every rating for one owner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RatingSummary {
    pub owner_id: AccountId,
    pub company_name: String,
    /// Mean rating rounded to one decimal
    pub average_rating: f64,
    pub total_ratings: u32,
    /// Count per star value, always holding keys 1 through 5
    pub rating_distribution: BTreeMap<u8, u32>,
    pub category_averages: CategoryAverages,
    /// Percentage of recommending raters, rounded to an integer
    pub recommendation_rate: u32,
}

impl RatingSummary {
    /// Summary with no ratings
    pub fn empty(owner_id: AccountId, company_name: impl Into<String>) -> Self {
        Self {
            owner_id,
            company_name: company_name.into(),
            average_rating: 0.0,
            total_ratings: 0,
            rating_distribution: (1..=5).map(|star| (star, 0)).collect(),
            category_averages: CategoryAverages::default(),
            recommendation_rate: 0,
        }
    }

    /// Recompute from the full rating set. Integer sums keep the result
    /// independent of input order.
    pub fn calculate(
        owner_id: AccountId,
        company_name: impl Into<String>,
        ratings: &[Rating],
    ) -> Self {
        let mut summary = Self::empty(owner_id, company_name);
        if ratings.is_empty() {
            return summary;
        }

        let total = ratings.len() as u32;
        let mut rating_sum = 0u64;
        let mut category_sums = [0u64; 4];
        let mut recommended = 0u32;

        for r in ratings {
            rating_sum += r.rating as u64;
            *summary.rating_distribution.entry(r.rating).or_insert(0) += 1;
            category_sums[0] += r.categories.communication as u64;
            category_sums[1] += r.categories.timeliness as u64;
            category_sums[2] += r.categories.packaging as u64;
            category_sums[3] += r.categories.professionalism as u64;
            if r.is_recommended {
                recommended += 1;
            }
        }

        let n = total as f64;
        let average = rating_sum as f64 / n;

        summary.total_ratings = total;
        summary.average_rating = (average * 10.0).round() / 10.0;
        summary.category_averages = CategoryAverages {
            communication: category_sums[0] as f64 / n,
            timeliness: category_sums[1] as f64 / n,
            packaging: category_sums[2] as f64 / n,
            professionalism: category_sums[3] as f64 / n,
        };
        summary.recommendation_rate = ((recommended as f64 / n) * 100.0).round() as u32;
        summary
    }
}

// ============================================================================
// Generic Reviews
// ============================================================================

/// Free-form review of any item (order, owner, listing)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: ReviewId,
    pub user_id: AccountId,
    pub item_id: String,
    pub review: String,
    pub rating: u8,
    pub created_at: DateTime<Utc>,
}

impl Review {
    /// Validate and build a review. Rating defaults to 5.
    pub fn new(user_id: AccountId, item_id: &str, review: &str, rating: Option<i64>) -> Result<Self> {
        let item_id = item_id.trim();
        let review = review.trim();

        let mut missing = Vec::new();
        if item_id.is_empty() {
            missing.push("itemId".to_string());
        }
        if review.is_empty() {
            missing.push("review".to_string());
        }
        if !missing.is_empty() {
            return Err(DomainError::MissingFields(missing));
        }

        ensure_max_chars("review", review, REVIEW_MAX_CHARS)?;
        let rating = ensure_score("rating", rating.unwrap_or(5))?;

        Ok(Self {
            id: ReviewId::new(),
            user_id,
            item_id: item_id.to_string(),
            review: review.to_string(),
            rating,
            created_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(owner: AccountId, rating: i64, recommended: bool) -> RatingSubmission {
        RatingSubmission {
            order_id: OrderId::new(),
            user_id: AccountId::new(),
            owner_id: owner,
            rating,
            review: "On time".into(),
            categories: CategoryScores::default(),
            is_recommended: recommended,
        }
    }

    #[test]
    fn test_rating_out_of_range() {
        let owner = AccountId::new();
        assert_eq!(
            submission(owner, 6, true).into_rating().unwrap_err(),
            DomainError::out_of_range("rating", 6)
        );
        assert!(submission(owner, 0, true).into_rating().is_err());

        let mut bad_category = submission(owner, 4, true);
        bad_category.categories.packaging = Some(9);
        assert_eq!(
            bad_category.into_rating().unwrap_err(),
            DomainError::out_of_range("packaging", 9)
        );
    }

    #[test]
    fn test_categories_default_to_overall() {
        let mut sub = submission(AccountId::new(), 4, true);
        sub.categories.timeliness = Some(2);
        let rating = sub.into_rating().unwrap();
        assert_eq!(rating.categories.communication, 4);
        assert_eq!(rating.categories.timeliness, 2);
        assert_eq!(rating.categories.professionalism, 4);
    }

    #[test]
    fn test_review_too_long() {
        let mut sub = submission(AccountId::new(), 5, true);
        sub.review = "x".repeat(REVIEW_MAX_CHARS + 1);
        assert!(matches!(
            sub.into_rating(),
            Err(DomainError::TooLong { max: REVIEW_MAX_CHARS, .. })
        ));
    }

    #[test]
    fn test_empty_summary_is_zeroed() {
        let owner = AccountId::new();
        let summary = RatingSummary::calculate(owner, "Swift Haulage", &[]);
        assert_eq!(summary.total_ratings, 0);
        assert_eq!(summary.average_rating, 0.0);
        assert_eq!(summary.recommendation_rate, 0);
        assert_eq!(summary.rating_distribution.len(), 5);
        assert!(summary.rating_distribution.values().all(|c| *c == 0));
    }

    #[test]
    fn test_summary_math_and_rounding() {
        let owner = AccountId::new();
        let ratings: Vec<Rating> = [(5, true), (4, true), (4, false)]
            .into_iter()
            .map(|(r, rec)| submission(owner, r, rec).into_rating().unwrap())
            .collect();

        let summary = RatingSummary::calculate(owner, "Swift Haulage", &ratings);
        assert_eq!(summary.total_ratings, 3);
        // 13 / 3 = 4.333..
        assert_eq!(summary.average_rating, 4.3);
        // 2 / 3 = 66.67%
        assert_eq!(summary.recommendation_rate, 67);
        assert_eq!(summary.rating_distribution[&5], 1);
        assert_eq!(summary.rating_distribution[&4], 2);
        assert_eq!(summary.rating_distribution[&1], 0);
        assert!((summary.category_averages.communication - 13.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_summary_independent_of_order() {
        let owner = AccountId::new();
        let mut ratings: Vec<Rating> = [1, 5, 3, 4, 2, 5, 5]
            .into_iter()
            .enumerate()
            .map(|(i, r)| submission(owner, r, i % 2 == 0).into_rating().unwrap())
            .collect();

        let forward = RatingSummary::calculate(owner, "x", &ratings);
        ratings.reverse();
        let reversed = RatingSummary::calculate(owner, "x", &ratings);
        ratings.rotate_left(3);
        let rotated = RatingSummary::calculate(owner, "x", &ratings);

        assert_eq!(forward, reversed);
        assert_eq!(forward, rotated);
    }

    #[test]
    fn test_distribution_serializes_with_string_keys() {
        let summary = RatingSummary::empty(AccountId::new(), "");
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["ratingDistribution"]["5"], 0);
        assert_eq!(json["recommendationRate"], 0);
    }

    #[test]
    fn test_generic_review_validation() {
        let user = AccountId::new();
        let review = Review::new(user, "order-17", "Friendly driver", None).unwrap();
        assert_eq!(review.rating, 5);

        assert!(matches!(
            Review::new(user, "", "  ", None),
            Err(DomainError::MissingFields(f)) if f.len() == 2
        ));
        assert!(Review::new(user, "x", "ok", Some(0)).is_err());
        assert!(Review::new(user, "x", &"y".repeat(1001), None).is_err());
    }
}

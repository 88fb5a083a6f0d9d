//! Account repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use haulbid_types::{Account, AccountId, AccountPatch};

use super::AccountRepository;
use crate::error::{DbError, DbResult};
use crate::models::{account_columns, DbAccount};

/// PostgreSQL account repository
pub struct PgAccountRepo {
    pool: PgPool,
}

impl PgAccountRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_unique(e: sqlx::Error, account: &Account) -> DbError {
    if let sqlx::Error::Database(ref db_err) = e {
        match db_err.constraint() {
            Some("accounts_username_key") => {
                return DbError::Duplicate(format!("Username {} already exists", account.username))
            }
            Some("accounts_email_key") => {
                return DbError::Duplicate(format!("Email {} already exists", account.email))
            }
            _ => {}
        }
    }
    DbError::from(e)
}

#[async_trait]
impl AccountRepository for PgAccountRepo {
    async fn create(&self, account: &Account) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, username, email, password_hash, role, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(account.id.0)
        .bind(&account.username)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(account.role.as_str())
        .bind(account.is_active)
        .bind(account.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique(e, account))?;

        Ok(())
    }

    async fn find_by_id(&self, id: AccountId) -> DbResult<Option<Account>> {
        let row = sqlx::query_as::<_, DbAccount>(concat!(
            "SELECT ",
            account_columns!(),
            " FROM accounts WHERE id = $1"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Account::try_from).transpose()
    }

    async fn find_by_login(&self, username_or_email: &str) -> DbResult<Option<Account>> {
        let row = sqlx::query_as::<_, DbAccount>(concat!(
            "SELECT ",
            account_columns!(),
            " FROM accounts WHERE username = $1 OR email = $1 LIMIT 1"
        ))
        .bind(username_or_email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Account::try_from).transpose()
    }

    async fn find_by_email(&self, email: &str) -> DbResult<Option<Account>> {
        let row = sqlx::query_as::<_, DbAccount>(concat!(
            "SELECT ",
            account_columns!(),
            " FROM accounts WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Account::try_from).transpose()
    }

    async fn find_by_reset_token(&self, token_hash: &str) -> DbResult<Option<Account>> {
        let row = sqlx::query_as::<_, DbAccount>(concat!(
            "SELECT ",
            account_columns!(),
            " FROM accounts WHERE reset_token_hash = $1"
        ))
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Account::try_from).transpose()
    }

    async fn is_taken(&self, username: &str, email: &str) -> DbResult<bool> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM accounts WHERE username = $1 OR email = $2)",
        )
        .bind(username)
        .bind(email)
        .fetch_one(&self.pool)
        .await?;

        Ok(taken)
    }

    async fn set_reset_token(
        &self,
        id: AccountId,
        token_hash: Option<&str>,
        expiry: Option<DateTime<Utc>>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE accounts SET reset_token_hash = $2, reset_token_expiry = $3 WHERE id = $1",
        )
        .bind(id.0)
        .bind(token_hash)
        .bind(expiry)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("Account {}", id)));
        }
        Ok(())
    }

    async fn update_password(&self, id: AccountId, password_hash: &str) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET password_hash = $2, reset_token_hash = NULL, reset_token_expiry = NULL
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("Account {}", id)));
        }
        Ok(())
    }

    async fn update(&self, id: AccountId, patch: &AccountPatch) -> DbResult<Account> {
        let row = sqlx::query_as::<_, DbAccount>(concat!(
            "UPDATE accounts SET ",
            "email = COALESCE($2, email), ",
            "role = COALESCE($3, role), ",
            "is_active = COALESCE($4, is_active) ",
            "WHERE id = $1 RETURNING ",
            account_columns!()
        ))
        .bind(id.0)
        .bind(patch.email.as_deref())
        .bind(patch.role.map(|r| r.as_str()))
        .bind(patch.is_active)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::Duplicate(_) => DbError::Duplicate("Email already exists".into()),
            other => other,
        })?
        .ok_or_else(|| DbError::NotFound(format!("Account {}", id)))?;

        Account::try_from(row)
    }

    async fn delete(&self, id: AccountId) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("Account {}", id)));
        }
        Ok(())
    }

    async fn list(&self) -> DbResult<Vec<Account>> {
        let rows = sqlx::query_as::<_, DbAccount>(concat!(
            "SELECT ",
            account_columns!(),
            " FROM accounts ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        crate::models::convert_all(rows)
    }

    async fn count(&self) -> DbResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM accounts")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}

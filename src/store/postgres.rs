use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{Account, AccountUpdate, CredentialStore, NewAccount, Result, StoredSession};
use crate::error::DatabaseError;

const ACCOUNT_COLUMNS: &str = "id, email, password_hash, role, is_active, \
     refresh_token_hash, refresh_token_expires_at, created_at, updated_at, deleted_at";

#[derive(sqlx::FromRow)]
struct AccountRow {
    id: Uuid,
    email: String,
    password_hash: String,
    role: String,
    is_active: bool,
    refresh_token_hash: Option<String>,
    refresh_token_expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl AccountRow {
    fn into_account(self, include_secrets: bool) -> Result<Account> {
        let session = match (self.refresh_token_hash, self.refresh_token_expires_at) {
            (Some(token_hash), Some(expires_at)) => Some(StoredSession {
                token_hash,
                expires_at,
            }),
            _ => None,
        };

        let account = Account {
            id: self.id,
            email: self.email,
            role: self.role.parse()?,
            is_active: self.is_active,
            password_hash: Some(self.password_hash),
            session,
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
        };

        Ok(if include_secrets {
            account
        } else {
            account.without_secrets()
        })
    }
}

/// PostgreSQL-backed credential store
///
/// Uniqueness is enforced by a partial unique index on `email` over
/// non-deleted rows (see `migrations/`).
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn not_found(id: Uuid) -> DatabaseError {
        DatabaseError::NotFound(format!("Account {} not found", id))
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_active_by_email(
        &self,
        email: &str,
        include_secrets: bool,
    ) -> Result<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {} FROM accounts WHERE email = $1 AND deleted_at IS NULL",
            ACCOUNT_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_account(include_secrets)).transpose()
    }

    async fn find_active_by_id(&self, id: Uuid, include_secrets: bool) -> Result<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {} FROM accounts WHERE id = $1 AND deleted_at IS NULL",
            ACCOUNT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_account(include_secrets)).transpose()
    }

    async fn create(&self, account: NewAccount) -> Result<Account> {
        let now = Utc::now();
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            r#"
            INSERT INTO accounts (id, email, password_hash, role, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING {}
            "#,
            ACCOUNT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(account.role.as_str())
        .bind(account.is_active)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        row.into_account(true)
    }

    async fn set_session(&self, id: Uuid, session: StoredSession) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET refresh_token_hash = $2, refresh_token_expires_at = $3, updated_at = $4
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(&session.token_hash)
        .bind(session.expires_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Self::not_found(id));
        }
        Ok(())
    }

    async fn rotate_session(
        &self,
        id: Uuid,
        expected_hash: &str,
        session: StoredSession,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET refresh_token_hash = $3, refresh_token_expires_at = $4, updated_at = $5
            WHERE id = $1 AND deleted_at IS NULL AND refresh_token_hash = $2
            "#,
        )
        .bind(id)
        .bind(expected_hash)
        .bind(&session.token_hash)
        .bind(session.expires_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn clear_session(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET refresh_token_hash = NULL, refresh_token_expires_at = NULL, updated_at = $2
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Self::not_found(id));
        }
        Ok(())
    }

    async fn update(&self, id: Uuid, changes: AccountUpdate) -> Result<Account> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            r#"
            UPDATE accounts
            SET role = COALESCE($2, role),
                is_active = COALESCE($3, is_active),
                updated_at = $4
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {}
            "#,
            ACCOUNT_COLUMNS
        ))
        .bind(id)
        .bind(changes.role.map(|r| r.as_str()))
        .bind(changes.is_active)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Self::not_found(id))?;

        row.into_account(false)
    }

    async fn soft_delete(&self, id: Uuid) -> Result<()> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET deleted_at = $2,
                refresh_token_hash = NULL,
                refresh_token_expires_at = NULL,
                updated_at = $2
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Self::not_found(id));
        }
        tracing::info!(account_id = %id, "Account soft-deleted");
        Ok(())
    }
}

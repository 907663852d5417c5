/// Credential Store
///
/// One record per account. The store owns email uniqueness among
/// non-deleted accounts and the per-account session slot. Every lookup
/// exposed here skips soft-deleted accounts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::DatabaseError;

mod memory;
mod postgres;

pub use memory::InMemoryCredentialStore;
pub use postgres::PgCredentialStore;

pub type Result<T> = std::result::Result<T, DatabaseError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(DatabaseError::UnexpectedError(format!("unknown role {:?}", other))),
        }
    }
}

/// The one live refresh token of an account: its hash and when it stops being honoured.
///
/// Hash and expiry travel together so neither can be stored without the other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSession {
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

impl StoredSession {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Full account record as held by the store.
///
/// `password_hash` and `session` are only populated when secrets were requested.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
    pub password_hash: Option<String>,
    pub session: Option<StoredSession>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Account {
    pub fn without_secrets(mut self) -> Self {
        self.password_hash = None;
        self.session = None;
        self
    }

    pub fn to_public(&self) -> PublicAccount {
        PublicAccount {
            id: self.id,
            email: self.email.clone(),
            role: self.role,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Account view safe to hand to callers and serialize into responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicAccount {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountUpdate {
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look up a non-deleted account by its normalized email
    async fn find_active_by_email(&self, email: &str, include_secrets: bool)
        -> Result<Option<Account>>;

    /// Look up a non-deleted account by id
    async fn find_active_by_id(&self, id: Uuid, include_secrets: bool) -> Result<Option<Account>>;

    /// Insert a new account.
    ///
    /// Fails with `UniqueConstraintViolation` if a non-deleted account already
    /// uses the email, including when two creates race.
    async fn create(&self, account: NewAccount) -> Result<Account>;

    /// Replace the session slot in a single write. `NotFound` if the account
    /// does not exist or is deleted.
    async fn set_session(&self, id: Uuid, session: StoredSession) -> Result<()>;

    /// Replace the session only if the slot still holds `expected_hash`.
    ///
    /// Returns `false` when another writer got there first or the account is
    /// gone, so one refresh token can be redeemed at most once.
    async fn rotate_session(
        &self,
        id: Uuid,
        expected_hash: &str,
        session: StoredSession,
    ) -> Result<bool>;

    /// Clear both session fields together
    async fn clear_session(&self, id: Uuid) -> Result<()>;

    /// Change role and/or active flag of a non-deleted account
    async fn update(&self, id: Uuid, changes: AccountUpdate) -> Result<Account>;

    /// Mark the account deleted and drop its session
    async fn soft_delete(&self, id: Uuid) -> Result<()>;
}

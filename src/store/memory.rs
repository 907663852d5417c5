use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Account, AccountUpdate, CredentialStore, NewAccount, Result, StoredSession};
use crate::error::DatabaseError;

/// In-memory credential store (useful for tests and local runs)
///
/// Every mutation happens under the write lock, so uniqueness checks and
/// session swaps are atomic with respect to each other.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    accounts: RwLock<HashMap<Uuid, Account>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn not_found(id: Uuid) -> DatabaseError {
        DatabaseError::NotFound(format!("Account {} not found", id))
    }

    fn view(account: &Account, include_secrets: bool) -> Account {
        if include_secrets {
            account.clone()
        } else {
            account.clone().without_secrets()
        }
    }
}

fn live_mut(accounts: &mut HashMap<Uuid, Account>, id: Uuid) -> Option<&mut Account> {
    accounts.get_mut(&id).filter(|a| a.deleted_at.is_none())
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_active_by_email(
        &self,
        email: &str,
        include_secrets: bool,
    ) -> Result<Option<Account>> {
        let accounts = self.accounts.read().await;
        Ok(accounts
            .values()
            .find(|a| a.deleted_at.is_none() && a.email.eq_ignore_ascii_case(email))
            .map(|a| Self::view(a, include_secrets)))
    }

    async fn find_active_by_id(&self, id: Uuid, include_secrets: bool) -> Result<Option<Account>> {
        let accounts = self.accounts.read().await;
        Ok(accounts
            .get(&id)
            .filter(|a| a.deleted_at.is_none())
            .map(|a| Self::view(a, include_secrets)))
    }

    async fn create(&self, account: NewAccount) -> Result<Account> {
        let mut accounts = self.accounts.write().await;

        let taken = accounts
            .values()
            .any(|a| a.deleted_at.is_none() && a.email.eq_ignore_ascii_case(&account.email));
        if taken {
            return Err(DatabaseError::UniqueConstraintViolation(
                "Email already registered".to_string(),
            ));
        }

        let now = Utc::now();
        let record = Account {
            id: Uuid::new_v4(),
            email: account.email,
            role: account.role,
            is_active: account.is_active,
            password_hash: Some(account.password_hash),
            session: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        accounts.insert(record.id, record.clone());

        Ok(record)
    }

    async fn set_session(&self, id: Uuid, session: StoredSession) -> Result<()> {
        let mut accounts = self.accounts.write().await;
        let account = live_mut(&mut accounts, id).ok_or_else(|| Self::not_found(id))?;
        account.session = Some(session);
        account.updated_at = Utc::now();
        Ok(())
    }

    async fn rotate_session(
        &self,
        id: Uuid,
        expected_hash: &str,
        session: StoredSession,
    ) -> Result<bool> {
        let mut accounts = self.accounts.write().await;
        let account = match live_mut(&mut accounts, id) {
            Some(account) => account,
            None => return Ok(false),
        };
        let current = account.session.as_ref().map(|s| s.token_hash.as_str());
        if current != Some(expected_hash) {
            return Ok(false);
        }
        account.session = Some(session);
        account.updated_at = Utc::now();
        Ok(true)
    }

    async fn clear_session(&self, id: Uuid) -> Result<()> {
        let mut accounts = self.accounts.write().await;
        let account = live_mut(&mut accounts, id).ok_or_else(|| Self::not_found(id))?;
        account.session = None;
        account.updated_at = Utc::now();
        Ok(())
    }

    async fn update(&self, id: Uuid, changes: AccountUpdate) -> Result<Account> {
        let mut accounts = self.accounts.write().await;
        let account = live_mut(&mut accounts, id).ok_or_else(|| Self::not_found(id))?;
        if let Some(role) = changes.role {
            account.role = role;
        }
        if let Some(is_active) = changes.is_active {
            account.is_active = is_active;
        }
        account.updated_at = Utc::now();
        Ok(account.clone().without_secrets())
    }

    async fn soft_delete(&self, id: Uuid) -> Result<()> {
        let mut accounts = self.accounts.write().await;
        let account = live_mut(&mut accounts, id).ok_or_else(|| Self::not_found(id))?;
        let now = Utc::now();
        account.deleted_at = Some(now);
        account.session = None;
        account.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Role;
    use chrono::Duration;
    use std::sync::Arc;

    fn new_account(email: &str) -> NewAccount {
        NewAccount {
            email: email.to_string(),
            password_hash: "$2b$04$hash".to_string(),
            role: Role::User,
            is_active: true,
        }
    }

    fn session(hash: &str) -> StoredSession {
        StoredSession {
            token_hash: hash.to_string(),
            expires_at: Utc::now() + Duration::days(7),
        }
    }

    #[tokio::test]
    async fn create_then_find_by_email_and_id() {
        let store = InMemoryCredentialStore::new();
        let created = store.create(new_account("a@x.com")).await.unwrap();

        let by_email = store.find_active_by_email("a@x.com", false).await.unwrap().unwrap();
        let by_id = store.find_active_by_id(created.id, false).await.unwrap().unwrap();

        assert_eq!(by_email.id, created.id);
        assert_eq!(by_id.email, "a@x.com");
    }

    #[tokio::test]
    async fn secrets_only_returned_when_requested() {
        let store = InMemoryCredentialStore::new();
        let created = store.create(new_account("a@x.com")).await.unwrap();
        store.set_session(created.id, session("h1")).await.unwrap();

        let public = store.find_active_by_id(created.id, false).await.unwrap().unwrap();
        assert!(public.password_hash.is_none());
        assert!(public.session.is_none());

        let full = store.find_active_by_id(created.id, true).await.unwrap().unwrap();
        assert!(full.password_hash.is_some());
        assert_eq!(full.session.unwrap().token_hash, "h1");
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let store = InMemoryCredentialStore::new();
        store.create(new_account("a@x.com")).await.unwrap();

        let err = store.create(new_account("a@x.com")).await.unwrap_err();
        assert!(matches!(err, DatabaseError::UniqueConstraintViolation(_)));
    }

    #[tokio::test]
    async fn concurrent_creates_admit_exactly_one() {
        let store = Arc::new(InMemoryCredentialStore::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.create(new_account("race@x.com")).await }));
        }

        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                created += 1;
            }
        }
        assert_eq!(created, 1);
    }

    #[tokio::test]
    async fn set_session_overwrites_previous() {
        let store = InMemoryCredentialStore::new();
        let created = store.create(new_account("a@x.com")).await.unwrap();

        store.set_session(created.id, session("first")).await.unwrap();
        store.set_session(created.id, session("second")).await.unwrap();

        let full = store.find_active_by_id(created.id, true).await.unwrap().unwrap();
        assert_eq!(full.session.unwrap().token_hash, "second");
    }

    #[tokio::test]
    async fn rotate_session_only_replaces_the_expected_hash() {
        let store = InMemoryCredentialStore::new();
        let created = store.create(new_account("a@x.com")).await.unwrap();
        store.set_session(created.id, session("first")).await.unwrap();

        assert!(store.rotate_session(created.id, "first", session("second")).await.unwrap());
        assert!(!store.rotate_session(created.id, "first", session("third")).await.unwrap());

        let full = store.find_active_by_id(created.id, true).await.unwrap().unwrap();
        assert_eq!(full.session.unwrap().token_hash, "second");
    }

    #[tokio::test]
    async fn rotate_session_without_session_or_account_fails() {
        let store = InMemoryCredentialStore::new();
        let created = store.create(new_account("a@x.com")).await.unwrap();

        assert!(!store.rotate_session(created.id, "h", session("h2")).await.unwrap());
        assert!(!store.rotate_session(Uuid::new_v4(), "h", session("h2")).await.unwrap());
        let full = store.find_active_by_id(created.id, true).await.unwrap().unwrap();
        assert!(full.session.is_none());
    }

    #[tokio::test]
    async fn set_session_on_unknown_account_is_not_found() {
        let store = InMemoryCredentialStore::new();
        let err = store.set_session(Uuid::new_v4(), session("h")).await.unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound(_)));
    }

    #[tokio::test]
    async fn soft_deleted_accounts_are_invisible_and_free_their_email() {
        let store = InMemoryCredentialStore::new();
        let created = store.create(new_account("a@x.com")).await.unwrap();
        store.set_session(created.id, session("h")).await.unwrap();

        store.soft_delete(created.id).await.unwrap();

        assert!(store.find_active_by_id(created.id, true).await.unwrap().is_none());
        assert!(store.find_active_by_email("a@x.com", true).await.unwrap().is_none());
        assert!(store.set_session(created.id, session("h2")).await.is_err());
        assert!(store.soft_delete(created.id).await.is_err());
        assert!(store.create(new_account("a@x.com")).await.is_ok());
    }

    #[tokio::test]
    async fn update_changes_role_and_active_flag() {
        let store = InMemoryCredentialStore::new();
        let created = store.create(new_account("a@x.com")).await.unwrap();

        let updated = store
            .update(
                created.id,
                AccountUpdate {
                    role: Some(Role::Admin),
                    is_active: Some(false),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.role, Role::Admin);
        assert!(!updated.is_active);
        assert!(updated.password_hash.is_none());
    }

    #[tokio::test]
    async fn clear_session_drops_hash_and_expiry_together() {
        let store = InMemoryCredentialStore::new();
        let created = store.create(new_account("a@x.com")).await.unwrap();
        store.set_session(created.id, session("h")).await.unwrap();

        store.clear_session(created.id).await.unwrap();

        let full = store.find_active_by_id(created.id, true).await.unwrap().unwrap();
        assert!(full.session.is_none());
    }
}

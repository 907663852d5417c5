//! Credential store against a real Postgres.
//!
//! Needs the database from `configuration.yaml`; run with
//! `cargo test --test pg_store -- --ignored`.

use account_auth::configuration::DatabaseSettings;
use account_auth::error::DatabaseError;
use account_auth::store::{
    AccountUpdate, CredentialStore, NewAccount, PgCredentialStore, Role, StoredSession,
};
use chrono::{Duration, Utc};
use sqlx::{Connection, Executor, PgConnection, PgPool};
use uuid::Uuid;

fn database_settings() -> DatabaseSettings {
    DatabaseSettings {
        username: "postgres".to_string(),
        password: "password".to_string(),
        port: 5432,
        host: "localhost".to_string(),
        database_name: Uuid::new_v4().to_string(),
    }
}

pub async fn configure_database(config: &DatabaseSettings) -> PgPool {
    // Create database
    let mut connection = PgConnection::connect(&config.connection_string_without_db())
        .await
        .expect("Failed to connect to Postgres");
    connection
        .execute(&*format!(r#"CREATE DATABASE "{}";"#, config.database_name))
        .await
        .expect("Failed to create database.");
    // Migrate database
    let connection_pool = PgPool::connect(&config.connection_string())
        .await
        .expect("Failed to connect to Postgres.");
    sqlx::migrate!("./migrations")
        .run(&connection_pool)
        .await
        .expect("Failed to migrate the database.");
    connection_pool
}

async fn spawn_store() -> (PgCredentialStore, PgPool) {
    let pool = configure_database(&database_settings()).await;
    (PgCredentialStore::new(pool.clone()), pool)
}

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
#[ignore = "requires a running Postgres"]
async fn create_and_find_round_trip() {
    let (store, _) = spawn_store().await;
    let created = store.create(new_account("a@x.com")).await.unwrap();

    let by_email = store.find_active_by_email("a@x.com", true).await.unwrap().unwrap();
    assert_eq!(by_email.id, created.id);
    assert_eq!(by_email.role, Role::User);
    assert_eq!(by_email.password_hash.as_deref(), Some("$2b$04$hash"));
    assert!(by_email.session.is_none());

    let public = store.find_active_by_id(created.id, false).await.unwrap().unwrap();
    assert!(public.password_hash.is_none());
}

#[tokio::test]
#[ignore = "requires a running Postgres"]
async fn duplicate_live_email_is_a_unique_violation() {
    let (store, _) = spawn_store().await;
    store.create(new_account("a@x.com")).await.unwrap();

    let err = store.create(new_account("a@x.com")).await.unwrap_err();

    assert!(matches!(err, DatabaseError::UniqueConstraintViolation(_)));
}

#[tokio::test]
#[ignore = "requires a running Postgres"]
async fn email_is_reusable_after_soft_delete() {
    let (store, pool) = spawn_store().await;
    let first = store.create(new_account("a@x.com")).await.unwrap();
    store.set_session(first.id, session("h")).await.unwrap();

    store.soft_delete(first.id).await.unwrap();

    assert!(store.find_active_by_id(first.id, true).await.unwrap().is_none());
    assert!(matches!(
        store.soft_delete(first.id).await.unwrap_err(),
        DatabaseError::NotFound(_)
    ));
    let second = store.create(new_account("a@x.com")).await.unwrap();
    assert_ne!(second.id, first.id);

    let (hash, expires_at): (Option<String>, Option<chrono::DateTime<Utc>>) = sqlx::query_as(
        "SELECT refresh_token_hash, refresh_token_expires_at FROM accounts WHERE id = $1",
    )
    .bind(first.id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert!(hash.is_none());
    assert!(expires_at.is_none());
}

#[tokio::test]
#[ignore = "requires a running Postgres"]
async fn set_session_overwrites_and_clear_session_drops_both_fields() {
    let (store, _) = spawn_store().await;
    let created = store.create(new_account("a@x.com")).await.unwrap();

    store.set_session(created.id, session("first")).await.unwrap();
    store.set_session(created.id, session("second")).await.unwrap();
    let full = store.find_active_by_id(created.id, true).await.unwrap().unwrap();
    assert_eq!(full.session.unwrap().token_hash, "second");

    store.clear_session(created.id).await.unwrap();
    let full = store.find_active_by_id(created.id, true).await.unwrap().unwrap();
    assert!(full.session.is_none());

    let err = store.set_session(Uuid::new_v4(), session("h")).await.unwrap_err();
    assert!(matches!(err, DatabaseError::NotFound(_)));
}

#[tokio::test]
#[ignore = "requires a running Postgres"]
async fn rotate_session_is_conditional_on_the_current_hash() {
    let (store, _) = spawn_store().await;
    let created = store.create(new_account("a@x.com")).await.unwrap();
    store.set_session(created.id, session("first")).await.unwrap();

    assert!(store.rotate_session(created.id, "first", session("second")).await.unwrap());
    assert!(!store.rotate_session(created.id, "first", session("third")).await.unwrap());

    let full = store.find_active_by_id(created.id, true).await.unwrap().unwrap();
    assert_eq!(full.session.unwrap().token_hash, "second");
}

#[tokio::test]
#[ignore = "requires a running Postgres"]
async fn session_fields_cannot_be_half_set() {
    let (store, pool) = spawn_store().await;
    let created = store.create(new_account("a@x.com")).await.unwrap();

    let result = sqlx::query("UPDATE accounts SET refresh_token_hash = 'h' WHERE id = $1")
        .bind(created.id)
        .execute(&pool)
        .await;

    assert!(result.is_err());
}

#[tokio::test]
#[ignore = "requires a running Postgres"]
async fn update_leaves_unspecified_fields_alone() {
    let (store, _) = spawn_store().await;
    let created = store.create(new_account("a@x.com")).await.unwrap();

    let updated = store
        .update(
            created.id,
            AccountUpdate {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(!updated.is_active);
    assert_eq!(updated.role, Role::User);

    let updated = store
        .update(
            created.id,
            AccountUpdate {
                role: Some(Role::Admin),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.role, Role::Admin);
    assert!(!updated.is_active);
    assert!(updated.password_hash.is_none());
}

//! Integration tests for the account_auth server

use account_auth::configuration::JwtSettings;
use account_auth::session::SessionManager;
use account_auth::startup::run;
use account_auth::store::InMemoryCredentialStore;
use std::net::TcpListener;
use std::sync::Arc;

fn spawn_app() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let settings = JwtSettings {
        secret: "test-secret-key-at-least-32-characters-long".to_string(),
        access_token_expiry: "15m".to_string(),
        refresh_token_expiry: "7d".to_string(),
        issuer: "test".to_string(),
        bcrypt_cost: 4,
    };
    let sessions = SessionManager::from_settings(Arc::new(InMemoryCredentialStore::new()), &settings)
        .expect("Failed to build session manager");
    let server = run(listener, Arc::new(sessions)).expect("Failed to create server");

    let _ = tokio::spawn(async move {
        let _ = server.await;
    });

    format!("http://127.0.0.1:{}", port)
}

#[tokio::test]
async fn health_check_works() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/health_check", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    assert_eq!(Some(0), response.content_length());
}

#[tokio::test]
async fn protected_route_without_token_is_401() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/accounts/me", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(401, response.status().as_u16());
}

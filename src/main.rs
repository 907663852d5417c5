use account_auth::configuration::get_configuration;
use account_auth::session::SessionManager;
use account_auth::startup::run;
use account_auth::store::PgCredentialStore;
use account_auth::telemetry::init_telemetry;
use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;
use std::sync::Arc;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry();

    tracing::info!("Starting application");

    // A missing JWT_SECRET ends the process here
    let configuration = match get_configuration() {
        Ok(config) => {
            tracing::info!(jwt = ?config.jwt, "Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to read configuration: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Configuration error",
            ));
        }
    };

    tracing::info!("Attempting to connect to database");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(&configuration.database.connection_string())
        .await
        .map_err(|e| {
            tracing::error!("Failed to create connection pool: {}", e);
            std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "Database connection error",
            )
        })?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to migrate the database: {}", e);
            std::io::Error::new(std::io::ErrorKind::Other, "Database migration error")
        })?;

    tracing::info!("Database ready");

    let store = Arc::new(PgCredentialStore::new(pool));
    let sessions = SessionManager::from_settings(store, &configuration.jwt).map_err(|e| {
        tracing::error!("Failed to build session manager: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "Session manager error")
    })?;

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    let server = run(listener, Arc::new(sessions))?;
    server.await
}

use chrono::Duration;
use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ConfigError;

const MIN_BCRYPT_COST: u32 = 4;
const MAX_BCRYPT_COST: u32 = 31;

lazy_static! {
    // "900", "30s", "15m", "12h", "7d"
    static ref DURATION_REGEX: Regex = Regex::new(r"^\s*(\d+)\s*([smhd]?)\s*$").unwrap();
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub jwt: JwtSettings,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }

    pub fn connection_string_without_db(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}",
            self.username, self.password, self.host, self.port
        )
    }
}

/// Token signing and password hashing settings
#[derive(serde::Deserialize, Clone)]
pub struct JwtSettings {
    pub secret: String,
    pub access_token_expiry: String,  // e.g. "15m"
    pub refresh_token_expiry: String, // e.g. "7d"
    pub issuer: String,
    pub bcrypt_cost: u32,
}

// The secret stays out of debug output.
impl std::fmt::Debug for JwtSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtSettings")
            .field("secret", &"[redacted]")
            .field("access_token_expiry", &self.access_token_expiry)
            .field("refresh_token_expiry", &self.refresh_token_expiry)
            .field("issuer", &self.issuer)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .finish()
    }
}

impl JwtSettings {
    pub fn access_ttl(&self) -> Result<Duration, ConfigError> {
        parse_duration("JWT_ACCESS_EXPIRY", &self.access_token_expiry)
    }

    pub fn refresh_ttl(&self) -> Result<Duration, ConfigError> {
        parse_duration("JWT_REFRESH_EXPIRY", &self.refresh_token_expiry)
    }

    /// Checks everything the service needs before it may start.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret.trim().is_empty() {
            return Err(ConfigError::MissingRequired("JWT_SECRET".to_string()));
        }
        self.access_ttl()?;
        self.refresh_ttl()?;
        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&self.bcrypt_cost) {
            return Err(ConfigError::InvalidValue(format!(
                "bcrypt_cost must be between {} and {}",
                MIN_BCRYPT_COST, MAX_BCRYPT_COST
            )));
        }
        Ok(())
    }
}

/// Parses a duration such as `15m` or `7d`. A bare number means seconds.
pub fn parse_duration(key: &str, value: &str) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::InvalidValue(format!("{} = {:?}", key, value));

    let captures = DURATION_REGEX.captures(value).ok_or_else(invalid)?;
    let amount: i64 = captures[1].parse().map_err(|_| invalid())?;
    if amount <= 0 {
        return Err(invalid());
    }

    let duration = match &captures[2] {
        "" | "s" => Duration::try_seconds(amount),
        "m" => Duration::try_minutes(amount),
        "h" => Duration::try_hours(amount),
        "d" => Duration::try_days(amount),
        _ => None,
    };
    duration.ok_or_else(invalid)
}

pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .set_default("application.host", "127.0.0.1")?
        .set_default("application.port", 8000)?
        .set_default("database.host", "localhost")?
        .set_default("database.port", 5432)?
        .set_default("database.username", "postgres")?
        .set_default("database.password", "password")?
        .set_default("database.database_name", "accounts")?
        .set_default("jwt.secret", "")?
        .set_default("jwt.access_token_expiry", "15m")?
        .set_default("jwt.refresh_token_expiry", "7d")?
        .set_default("jwt.issuer", "account-auth")?
        .set_default("jwt.bcrypt_cost", 10)?
        .add_source(config::File::with_name("configuration").required(false))
        .set_override_option("jwt.secret", std::env::var("JWT_SECRET").ok())?
        .set_override_option("jwt.access_token_expiry", std::env::var("JWT_ACCESS_EXPIRY").ok())?
        .set_override_option("jwt.refresh_token_expiry", std::env::var("JWT_REFRESH_EXPIRY").ok())?
        .build()?;

    let settings = settings.try_deserialize::<Settings>()?;
    settings.jwt.validate()?;
    Ok(settings)
}

/// Session Manager
///
/// Signup, login, refresh and bearer authentication on top of the credential
/// store, the password hasher and the token codec.
///
/// Each account has a single session slot. Issuing a pair (signup, login,
/// refresh) overwrites the slot, which is what invalidates the previously
/// issued refresh token. Refresh only overwrites the slot it verified, so
/// concurrent redemptions of one token yield a single new pair.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{
    hash_refresh_token, verify_refresh_token, BcryptHasher, JwtCodec, PasswordHasher, TokenCodec,
    TokenKind, TokenPayload,
};
use crate::configuration::JwtSettings;
use crate::error::{AppError, ConfigError};
use crate::store::{Account, CredentialStore, NewAccount, PublicAccount, Role, StoredSession};

/// Lifetime of the stored session record, counted from issuance.
///
/// Independent of the refresh token's signed `exp`; whichever is shorter wins.
pub const STORED_SESSION_TTL_DAYS: i64 = 7;

/// Tokens handed to the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub session_ttl: Duration,
}

impl SessionConfig {
    pub fn from_settings(settings: &JwtSettings) -> Result<Self, ConfigError> {
        Ok(Self {
            access_ttl: settings.access_ttl()?,
            refresh_ttl: settings.refresh_ttl()?,
            session_ttl: Duration::days(STORED_SESSION_TTL_DAYS),
        })
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            access_ttl: Duration::minutes(15),
            refresh_ttl: Duration::days(7),
            session_ttl: Duration::days(STORED_SESSION_TTL_DAYS),
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
    hasher: Arc<dyn PasswordHasher>,
    codec: Arc<dyn TokenCodec>,
    config: SessionConfig,
    // verified against when the email is unknown, so both paths cost one bcrypt run
    dummy_hash: String,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        hasher: Arc<dyn PasswordHasher>,
        codec: Arc<dyn TokenCodec>,
        config: SessionConfig,
    ) -> Result<Self, AppError> {
        let dummy_hash = hasher.hash(&Uuid::new_v4().to_string())?;
        Ok(Self {
            store,
            hasher,
            codec,
            config,
            dummy_hash,
        })
    }

    /// Wire the bcrypt hasher and JWT codec from settings
    pub fn from_settings(
        store: Arc<dyn CredentialStore>,
        settings: &JwtSettings,
    ) -> Result<Self, AppError> {
        settings.validate()?;
        Self::new(
            store,
            Arc::new(BcryptHasher::new(settings.bcrypt_cost)),
            Arc::new(JwtCodec::new(&settings.secret, settings.issuer.clone())),
            SessionConfig::from_settings(settings)?,
        )
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Create an account and open its first session.
    ///
    /// # Errors
    /// - `Conflict` if a live account already uses the email
    pub async fn signup(&self, request: SignupRequest) -> Result<TokenPair, AppError> {
        let email = normalize_email(&request.email);

        if self.store.find_active_by_email(&email, false).await?.is_some() {
            tracing::warn!(reason = "email_taken", "Signup rejected");
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let password_hash = self.hasher.hash(&request.password)?;
        let account = self
            .store
            .create(NewAccount {
                email,
                password_hash,
                role: request.role.unwrap_or_default(),
                is_active: request.is_active.unwrap_or(true),
            })
            .await?;

        let tokens = self.issue_tokens(&account).await?;
        tracing::info!(account_id = %account.id, role = %account.role, "Account created");
        Ok(tokens)
    }

    /// Exchange email and password for a fresh token pair.
    ///
    /// Unknown email, wrong password and disabled account all return the
    /// same `InvalidCredentials` error.
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, AppError> {
        let email = normalize_email(email);

        let account = match self.store.find_active_by_email(&email, true).await? {
            Some(account) => account,
            None => {
                self.hasher.verify(password, &self.dummy_hash)?;
                tracing::warn!(reason = "unknown_email", "Login rejected");
                return Err(AppError::invalid_credentials());
            }
        };

        let password_hash = account
            .password_hash
            .as_deref()
            .ok_or_else(|| AppError::Internal("Password hash not loaded".to_string()))?;
        if !self.hasher.verify(password, password_hash)? {
            tracing::warn!(account_id = %account.id, reason = "wrong_password", "Login rejected");
            return Err(AppError::invalid_credentials());
        }

        if !account.is_active {
            tracing::warn!(account_id = %account.id, reason = "account_disabled", "Login rejected");
            return Err(AppError::invalid_credentials());
        }

        let tokens = self.issue_tokens(&account).await?;
        tracing::info!(account_id = %account.id, "Account logged in");
        Ok(tokens)
    }

    /// Rotate a refresh token into a new pair.
    ///
    /// The stored session, not the token's own `exp`, decides whether the
    /// session is still alive. Every rejection is `InvalidToken`.
    pub async fn refresh(&self, presented: &str) -> Result<TokenPair, AppError> {
        let payload = self.codec.verify(presented)?;

        let reject = |account_id: Uuid, reason: &'static str| {
            tracing::warn!(account_id = %account_id, reason = reason, "Refresh rejected");
            AppError::invalid_token()
        };

        if payload.kind != TokenKind::Refresh {
            return Err(reject(payload.subject, "wrong_token_kind"));
        }

        let account = self
            .store
            .find_active_by_id(payload.subject, true)
            .await?
            .ok_or_else(|| reject(payload.subject, "unknown_account"))?;

        let session = account
            .session
            .as_ref()
            .ok_or_else(|| reject(account.id, "no_session"))?;

        if session.is_expired_at(Utc::now()) {
            return Err(reject(account.id, "session_expired"));
        }

        if !verify_refresh_token(self.hasher.as_ref(), presented, &session.token_hash)? {
            return Err(reject(account.id, "token_mismatch"));
        }

        if !account.is_active {
            return Err(reject(account.id, "account_disabled"));
        }

        let (tokens, next) = self.mint_tokens(&account)?;
        if !self
            .store
            .rotate_session(account.id, &session.token_hash, next)
            .await?
        {
            return Err(reject(account.id, "session_rotated"));
        }
        tracing::info!(account_id = %account.id, "Session refreshed");
        Ok(tokens)
    }

    /// Resolve a bearer access token to its live, enabled account.
    ///
    /// Runs on every protected request so that disabling or deleting an
    /// account takes effect before its access tokens expire.
    pub async fn authenticate(&self, access_token: &str) -> Result<PublicAccount, AppError> {
        let payload = self.codec.verify(access_token)?;

        if payload.kind != TokenKind::Access {
            tracing::warn!(account_id = %payload.subject, reason = "wrong_token_kind", "Bearer rejected");
            return Err(AppError::invalid_token());
        }

        match self.find_by_id_public(payload.subject).await? {
            Some(account) if account.is_active => Ok(account),
            Some(_) => {
                tracing::warn!(account_id = %payload.subject, reason = "account_disabled", "Bearer rejected");
                Err(AppError::invalid_token())
            }
            None => {
                tracing::warn!(account_id = %payload.subject, reason = "unknown_account", "Bearer rejected");
                Err(AppError::invalid_token())
            }
        }
    }

    /// Public view of a live account, secrets excluded
    pub async fn find_by_id_public(&self, id: Uuid) -> Result<Option<PublicAccount>, AppError> {
        Ok(self
            .store
            .find_active_by_id(id, false)
            .await?
            .map(|account| account.to_public()))
    }

    /// Drop the account's session; its current refresh token stops working
    pub async fn logout(&self, account_id: Uuid) -> Result<(), AppError> {
        self.store.clear_session(account_id).await?;
        tracing::info!(account_id = %account_id, "Session revoked");
        Ok(())
    }

    async fn issue_tokens(&self, account: &Account) -> Result<TokenPair, AppError> {
        let (tokens, session) = self.mint_tokens(account)?;
        self.store.set_session(account.id, session).await?;
        Ok(tokens)
    }

    /// Sign a new pair and build the session record that goes with it
    fn mint_tokens(&self, account: &Account) -> Result<(TokenPair, StoredSession), AppError> {
        let access = TokenPayload::new(account.id, account.email.clone(), TokenKind::Access);
        let refresh = TokenPayload::new(account.id, account.email.clone(), TokenKind::Refresh);

        let access_token = self.codec.sign(&access, self.config.access_ttl)?;
        let refresh_token = self.codec.sign(&refresh, self.config.refresh_ttl)?;

        let session = StoredSession {
            token_hash: hash_refresh_token(self.hasher.as_ref(), &refresh_token)?,
            expires_at: Utc::now() + self.config.session_ttl,
        };

        Ok((
            TokenPair {
                access_token,
                refresh_token,
            },
            session,
        ))
    }
}

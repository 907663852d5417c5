/// Account Routes
///
/// Thin HTTP layer over the session manager: signup, login, token refresh,
/// logout and account lookup. Error kinds map to status codes through
/// `AppError`'s `ResponseError` impl (Conflict→409, Unauthorized→401).

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, ErrorContext};
use crate::session::{SessionManager, SignupRequest, TokenPair};
use crate::store::{PublicAccount, Role};
use crate::validators::{is_valid_email, is_valid_password};

#[derive(Deserialize)]
pub struct SignupBody {
    pub email: String,
    pub password: String,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

#[derive(Deserialize)]
pub struct LoginBody {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RefreshBody {
    pub refresh_token: String,
}

/// Token pair as returned to clients
#[derive(Serialize, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

impl AuthResponse {
    fn new(tokens: TokenPair, sessions: &SessionManager) -> Self {
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: sessions.config().access_ttl.num_seconds(),
        }
    }
}

/// Run an operation, logging failures with its context
async fn logged<T>(
    context: &ErrorContext,
    operation: impl std::future::Future<Output = Result<T, AppError>>,
) -> Result<T, AppError> {
    operation.await.map_err(|e| {
        context.log_error(&e);
        e
    })
}

/// POST /accounts/signup
///
/// # Errors
/// - 400: invalid email or password length
/// - 409: email already registered
pub async fn signup(
    body: web::Json<SignupBody>,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("account_signup");
    let body = body.into_inner();

    let email = is_valid_email(&body.email)?;
    is_valid_password(&body.password)?;

    let tokens = logged(
        &context,
        sessions.signup(SignupRequest {
            email,
            password: body.password,
            role: body.role,
            is_active: body.is_active,
        }),
    )
    .await?;

    Ok(HttpResponse::Created().json(AuthResponse::new(tokens, &sessions)))
}

/// POST /accounts/login
///
/// # Errors
/// - 400: malformed email
/// - 401: invalid credentials (unknown email, wrong password, disabled account)
pub async fn login(
    body: web::Json<LoginBody>,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("account_login");

    let email = is_valid_email(&body.email)?;
    let tokens = logged(&context, sessions.login(&email, &body.password)).await?;

    Ok(HttpResponse::Ok().json(AuthResponse::new(tokens, &sessions)))
}

/// POST /accounts/refresh
///
/// Rotates the refresh token: the presented token stops working.
///
/// # Errors
/// - 401: invalid, expired, revoked or already-rotated refresh token
pub async fn refresh(
    body: web::Json<RefreshBody>,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("token_refresh");

    let tokens = logged(&context, sessions.refresh(&body.refresh_token)).await?;

    Ok(HttpResponse::Ok().json(AuthResponse::new(tokens, &sessions)))
}

/// POST /accounts/logout (bearer)
pub async fn logout(
    account: web::ReqData<PublicAccount>,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("account_logout").with_account_id(account.id.to_string());

    logged(&context, sessions.logout(account.id)).await?;

    Ok(HttpResponse::NoContent().finish())
}

/// GET /accounts/me (bearer)
pub async fn me(account: web::ReqData<PublicAccount>) -> HttpResponse {
    HttpResponse::Ok().json(account.into_inner())
}

/// GET /accounts/{id} (bearer)
pub async fn get_account(
    path: web::Path<Uuid>,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();

    let account = sessions
        .find_by_id_public(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Account not found".to_string()))?;

    Ok(HttpResponse::Ok().json(account))
}

/// Bearer Authentication Middleware
///
/// Extracts the access token from the Authorization header, resolves it to
/// a live account through the session manager, and injects the
/// `PublicAccount` into request extensions for route handlers.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;
use std::sync::Arc;

use crate::error::AppError;
use crate::session::SessionManager;

/// Middleware for protecting routes
pub struct JwtMiddleware {
    sessions: Arc<SessionManager>,
}

impl JwtMiddleware {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self { sessions }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = JwtMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(JwtMiddlewareService {
            service: Rc::new(service),
            sessions: self.sessions.clone(),
        }))
    }
}

pub struct JwtMiddlewareService<S> {
    service: Rc<S>,
    sessions: Arc<SessionManager>,
}

/// Pull the token out of `Authorization: Bearer <token>`
fn bearer_token(req: &ServiceRequest) -> Option<String> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let sessions = self.sessions.clone();

        Box::pin(async move {
            let token = match bearer_token(&req) {
                Some(token) => token,
                None => {
                    tracing::warn!(path = %req.path(), "Missing or invalid Authorization header");
                    return Err(AppError::invalid_token().into());
                }
            };

            // re-checked on every request: disabled or deleted accounts lose access immediately
            let account = sessions.authenticate(&token).await?;

            tracing::debug!(account_id = %account.id, "Bearer token accepted");
            req.extensions_mut().insert(account);

            service.call(req).await
        })
    }
}

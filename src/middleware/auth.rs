use actix_web::body::EitherBody;
use actix_web::cookie::time::Duration as CookieDuration;
use actix_web::cookie::{Cookie, CookieJar, Key, SameSite};
use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{web, Error, HttpMessage, HttpResponse};
use futures::future::LocalBoxFuture;
use mongodb::bson::{doc, oid::ObjectId, Document};
use std::future::{ready, Ready};
use std::rc::Rc;
use std::time::Duration;

use crate::database::MongoDB;
use crate::models::AuthenticatedUser;
use crate::services::user_service;
use crate::utils::error::AppError;

/// Signed cookie carrying the session JWT.
pub const LOGIN_COOKIE: &str = "login";

/// Builds the cookie-signing key from `COOKIE_SECRET`. The key derivation
/// requires at least 32 bytes of secret material.
pub fn cookie_key() -> Result<Key, AppError> {
    let secret = std::env::var("COOKIE_SECRET")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            AppError::InvalidRequest(
                "Invalid request (undefined environment variable 'COOKIE_SECRET')".to_string(),
            )
        })?;

    if secret.len() < 32 {
        return Err(AppError::InvalidRequest(
            "Invalid request (environment variable 'COOKIE_SECRET' must be at least 32 bytes)"
                .to_string(),
        ));
    }

    Ok(Key::derive_from(secret.as_bytes()))
}

/// Signs the session token into the `login` cookie: `httpOnly`, `secure`,
/// `SameSite=None`, valid for the same lifetime as the JWT itself.
pub fn sign_login_cookie(token: &str, max_age: Duration, key: &Key) -> Cookie<'static> {
    let cookie = Cookie::build(LOGIN_COOKIE, token.to_string())
        .path("/")
        .secure(true)
        .http_only(true)
        .same_site(SameSite::None)
        .max_age(CookieDuration::seconds(max_age.as_secs() as i64))
        .finish();

    let mut jar = CookieJar::new();
    jar.signed_mut(key).add(cookie);
    jar.get(LOGIN_COOKIE)
        .cloned()
        .expect("signed cookie was just added")
}

pub fn build_login_cookie(token: &str, max_age: Duration) -> Result<Cookie<'static>, AppError> {
    let key = cookie_key()?;
    Ok(sign_login_cookie(token, max_age, &key))
}

/// Expired `login` cookie with matching attributes, for logout.
pub fn clear_login_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::build(LOGIN_COOKIE, "")
        .path("/")
        .secure(true)
        .http_only(true)
        .same_site(SameSite::None)
        .finish();
    cookie.make_removal();
    cookie
}

/// Verifies the HMAC on a signed cookie and returns the embedded value.
pub fn verify_signed_cookie(cookie: &Cookie<'static>, key: &Key) -> Option<String> {
    let mut jar = CookieJar::new();
    jar.add_original(cookie.clone());
    jar.signed(key)
        .get(cookie.name())
        .map(|c| c.value().to_string())
}

/// Cookie → JWT → live user record. Every failure mode keeps its own 401
/// message; a valid signature whose subject no longer exists still fails.
async fn authenticate(req: &ServiceRequest) -> Result<AuthenticatedUser, AppError> {
    let cookie = req.cookie(LOGIN_COOKIE).ok_or_else(|| {
        AppError::AccessDenied("Access denied (no authentication token)".to_string())
    })?;

    let key = cookie_key()?;
    let token = verify_signed_cookie(&cookie, &key).ok_or_else(|| {
        AppError::AccessDenied("Access denied (invalid authentication token)".to_string())
    })?;

    let secret = std::env::var("JWT_SECRET").unwrap_or_default();
    let claims = user_service::verify_token(&token, &secret).map_err(|e| {
        if matches!(e.kind(), jsonwebtoken::errors::ErrorKind::ExpiredSignature) {
            AppError::AccessDenied("Access denied (authentication token has expired)".to_string())
        } else {
            AppError::AccessDenied("Access denied (invalid authentication token)".to_string())
        }
    })?;

    let _id = ObjectId::parse_str(&claims._id).map_err(|_| {
        AppError::AccessDenied("Access denied (token authentication error)".to_string())
    })?;

    let db = req
        .app_data::<web::Data<MongoDB>>()
        .ok_or_else(|| AppError::Internal("Internal server error (database unavailable)".to_string()))?;

    let user = db
        .collection::<Document>("users")
        .find_one(doc! { "_id": _id })
        .await
        .map_err(|e| AppError::DatabaseError(format!("Database error: {}", e)))?
        .ok_or_else(|| {
            AppError::AccessDenied("Access denied (token authentication error)".to_string())
        })?;

    Ok(AuthenticatedUser {
        _id,
        role: user.get_str("role").unwrap_or_default().to_string(),
    })
}

fn strict_failure_response(err: &AppError) -> HttpResponse {
    if err.status() == actix_web::http::StatusCode::UNAUTHORIZED {
        HttpResponse::Unauthorized().json(serde_json::json!({
            "ok": false,
            "error": err.to_string(),
            "redirect": "/index.html",
        }))
    } else {
        err.to_response()
    }
}

/// Strict verification: rejects the request unless the cookie-borne JWT
/// resolves to a live user.
pub struct Authenticate;

/// Optional verification: attaches the user when the token checks out,
/// passes anonymous requests through untouched. Only infrastructure
/// failures are surfaced.
pub struct TryAuthenticate;

impl<S, B> Transform<S, ServiceRequest> for Authenticate
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service: Rc::new(service),
            strict: true,
        }))
    }
}

impl<S, B> Transform<S, ServiceRequest> for TryAuthenticate
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service: Rc::new(service),
            strict: false,
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: Rc<S>,
    strict: bool,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let strict = self.strict;

        Box::pin(async move {
            match authenticate(&req).await {
                Ok(user) => {
                    req.extensions_mut().insert(user);
                    service.call(req).await.map(|res| res.map_into_left_body())
                }
                Err(err) if strict => {
                    Ok(req.into_response(strict_failure_response(&err)).map_into_right_body())
                }
                Err(AppError::DatabaseError(msg)) => Ok(req
                    .into_response(AppError::DatabaseError(msg).to_response())
                    .map_into_right_body()),
                Err(AppError::Internal(msg)) => Ok(req
                    .into_response(AppError::Internal(msg).to_response())
                    .map_into_right_body()),
                Err(_) => service.call(req).await.map(|res| res.map_into_left_body()),
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Admin,
}

impl Role {
    fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum RoleFailure {
    Unauthenticated,
    WrongRole,
}

/// Exact-match role gate: an admin does not satisfy the `user` guard.
pub fn check_role(user: Option<&AuthenticatedUser>, role: Role) -> Result<(), RoleFailure> {
    match user {
        None => Err(RoleFailure::Unauthenticated),
        Some(user) if user.role != role.as_str() => Err(RoleFailure::WrongRole),
        Some(_) => Ok(()),
    }
}

fn role_failure_response(failure: &RoleFailure) -> HttpResponse {
    match failure {
        RoleFailure::Unauthenticated => HttpResponse::Unauthorized().json(serde_json::json!({
            "ok": false,
            "error": "Access denied (token authentication error)",
        })),
        RoleFailure::WrongRole => HttpResponse::Forbidden().json(serde_json::json!({
            "ok": false,
            "message": "Invalid role (no permissions to access the resource)",
        })),
    }
}

/// Rejects requests whose authenticated role is not exactly the required
/// one. Must run after `Authenticate`.
pub struct RequireRole(Role);

impl RequireRole {
    pub fn user() -> Self {
        RequireRole(Role::User)
    }

    pub fn admin() -> Self {
        RequireRole(Role::Admin)
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequireRole
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = RequireRoleService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequireRoleService {
            service,
            role: self.0,
        }))
    }
}

pub struct RequireRoleService<S> {
    service: S,
    role: Role,
}

impl<S, B> Service<ServiceRequest> for RequireRoleService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let user = req.extensions().get::<AuthenticatedUser>().cloned();

        match check_role(user.as_ref(), self.role) {
            Ok(()) => {
                let fut = self.service.call(req);
                Box::pin(async move { fut.await.map(|res| res.map_into_left_body()) })
            }
            Err(failure) => {
                let response = req
                    .into_response(role_failure_response(&failure))
                    .map_into_right_body();
                Box::pin(ready(Ok(response)))
            }
        }
    }
}

/// Register and login are anonymous-only: a verified user is turned away
/// with a 409 pointing back to the app.
pub struct RequireAnonymous;

impl<S, B> Transform<S, ServiceRequest> for RequireAnonymous
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = RequireAnonymousService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequireAnonymousService { service }))
    }
}

pub struct RequireAnonymousService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for RequireAnonymousService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let signed_in = req.extensions().get::<AuthenticatedUser>().is_some();

        if signed_in {
            let response = HttpResponse::Conflict().json(serde_json::json!({
                "ok": false,
                "error": "Conflict (user already signed in, it is not possible to access resources specific to anonymity)",
                "redirect": { "user": "/html/main.html", "admin": "/html/main_admin.html" },
            }));
            let response = req.into_response(response).map_into_right_body();
            return Box::pin(ready(Ok(response)));
        }

        let fut = self.service.call(req);
        Box::pin(async move { fut.await.map(|res| res.map_into_left_body()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> Key {
        Key::derive_from(b"an-absolutely-minimal-test-secret-of-32b")
    }

    #[test]
    fn test_signed_cookie_roundtrip() {
        let key = test_key();
        let cookie = sign_login_cookie("token-value", Duration::from_secs(1800), &key);

        assert_eq!(cookie.name(), LOGIN_COOKIE);
        assert!(cookie.http_only().unwrap_or(false));
        assert!(cookie.secure().unwrap_or(false));
        assert_eq!(cookie.same_site(), Some(SameSite::None));
        assert_eq!(cookie.path(), Some("/"));
        // the stored value is signed, not the raw token
        assert_ne!(cookie.value(), "token-value");

        assert_eq!(
            verify_signed_cookie(&cookie, &key),
            Some("token-value".to_string())
        );
    }

    #[test]
    fn test_tampered_cookie_fails_verification() {
        let key = test_key();
        let cookie = sign_login_cookie("token-value", Duration::from_secs(1800), &key);

        let tampered = Cookie::new(LOGIN_COOKIE, format!("{}x", cookie.value()));
        assert_eq!(verify_signed_cookie(&tampered, &key), None);
    }

    #[test]
    fn test_foreign_key_fails_verification() {
        let key = test_key();
        let other = Key::derive_from(b"a-completely-different-32-byte-secret!!!");
        let cookie = sign_login_cookie("token-value", Duration::from_secs(1800), &key);

        assert_eq!(verify_signed_cookie(&cookie, &other), None);
    }

    #[test]
    fn test_clear_cookie_expires_immediately() {
        let cookie = clear_login_cookie();
        assert_eq!(cookie.name(), LOGIN_COOKIE);
        assert_eq!(cookie.max_age(), Some(CookieDuration::ZERO));
    }

    #[test]
    fn test_role_gate_is_exact_match() {
        let admin = AuthenticatedUser {
            _id: ObjectId::new(),
            role: "admin".to_string(),
        };
        let user = AuthenticatedUser {
            _id: ObjectId::new(),
            role: "user".to_string(),
        };

        assert_eq!(check_role(None, Role::User), Err(RoleFailure::Unauthenticated));
        assert_eq!(check_role(None, Role::Admin), Err(RoleFailure::Unauthenticated));

        assert_eq!(check_role(Some(&user), Role::User), Ok(()));
        assert_eq!(check_role(Some(&admin), Role::Admin), Ok(()));

        // an admin is not a "user" for gating purposes, and vice versa
        assert_eq!(check_role(Some(&admin), Role::User), Err(RoleFailure::WrongRole));
        assert_eq!(check_role(Some(&user), Role::Admin), Err(RoleFailure::WrongRole));
    }
}

use actix_web::http::header;
use actix_web::{web, HttpMessage, HttpRequest, HttpResponse};

use crate::database::MongoDB;
use crate::middleware::auth;
use crate::models::AuthenticatedUser;
use crate::services::user_service;
use crate::services::user_service::{LoginRequest, RegisterRequest};
use crate::utils::error::AppError;

#[utoipa::path(
    post,
    path = "/users/register",
    tag = "Users",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = crate::models::RegisteredUser),
        (status = 400, description = "Validation failure"),
        (status = 409, description = "Email or username already registered")
    )
)]
pub async fn register(
    db: web::Data<MongoDB>,
    request: web::Json<RegisterRequest>,
) -> HttpResponse {
    let email = request.email.as_deref().unwrap_or("N/A");
    log::info!("POST /users/register - email: {}", email);

    match user_service::register(&db, &request).await {
        Ok(document) => {
            log::info!("Registration successful: {}", document.email);
            HttpResponse::Created()
                .insert_header((header::LOCATION, format!("/users/{}", document._id)))
                .json(serde_json::json!({
                    "ok": true,
                    "message": "Success (user registered in the database)",
                    "insertedDocument": document,
                    "redirect": "/index.html",
                }))
        }
        Err(e) => {
            log::warn!("Registration failed: {} - {}", email, e);
            e.to_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/users/login",
    tag = "Users",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Access allowed, session cookie set"),
        (status = 401, description = "Incorrect email or password")
    )
)]
pub async fn login(db: web::Data<MongoDB>, request: web::Json<LoginRequest>) -> HttpResponse {
    let email = request.email.as_deref().unwrap_or("N/A");
    log::info!("POST /users/login - email: {}", email);

    match user_service::sign_in(&db, &request).await {
        Ok((token, expires_in)) => match auth::build_login_cookie(&token, expires_in) {
            Ok(cookie) => {
                log::info!("Login successful: {}", email);
                HttpResponse::Ok().cookie(cookie).json(serde_json::json!({
                    "ok": true,
                    "message": "Success (access allowed)",
                }))
            }
            Err(e) => {
                log::error!("Login cookie could not be issued: {}", e);
                e.to_response()
            }
        },
        Err(e) => {
            log::warn!("Login failed: {} - {}", email, e);
            e.to_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/users/me",
    tag = "Users",
    responses(
        (status = 200, description = "Authenticated user's public record", body = crate::models::PublicUser),
        (status = 401, description = "Missing, expired or invalid session")
    ),
    security(("cookie_auth" = []))
)]
pub async fn me(db: web::Data<MongoDB>, req: HttpRequest) -> HttpResponse {
    log::info!("GET /users/me");

    let user = req.extensions().get::<AuthenticatedUser>().cloned();
    let Some(user) = user else {
        return AppError::AccessDenied("Access denied (token authentication error)".to_string())
            .to_response();
    };

    match user_service::find_public_by_id(&db, &user._id).await {
        Ok(document) => HttpResponse::Ok().json(serde_json::json!({
            "ok": true,
            "message": "Success (user data extracted from the database)",
            "document": document,
            "redirect": { "user": "/html/main.html", "admin": "/html/main_admin.html" },
        })),
        Err(e) => {
            log::error!("Failed to read user {}: {}", user._id.to_hex(), e);
            e.to_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/users/logout",
    tag = "Users",
    responses(
        (status = 200, description = "Session cookie cleared")
    )
)]
pub async fn logout() -> HttpResponse {
    log::info!("GET /users/logout");

    HttpResponse::Ok()
        .cookie(auth::clear_login_cookie())
        .json(serde_json::json!({
            "ok": true,
            "message": "Success (logged out)",
            "redirect": "/index.html",
        }))
}

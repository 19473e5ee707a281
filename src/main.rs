mod api;
mod database;
mod middleware;
mod migrations;
mod models;
mod services;
mod utils;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use std::env;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use middleware::{Authenticate, RateLimit, RequireAnonymous, RequireRole, TryAuthenticate};

/// Service port: `PORT` within [3000, 3999], otherwise 3103.
fn configured_port() -> u16 {
    match env::var("PORT").ok().and_then(|p| p.trim().parse::<u16>().ok()) {
        Some(port) if (3000..=3999).contains(&port) => port,
        _ => 3103,
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    // Get configuration from environment
    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = configured_port();
    let uri = env::var("URI")
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|_| "mongodb://localhost:27017/".to_string());
    let database = env::var("DATABASE")
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|_| "database".to_string());

    log::info!("Starting KarenFlix service...");
    log::info!("Database: {} ({})", database, uri);

    // Initialize MongoDB connection
    let db = database::MongoDB::new(&uri, &database)
        .await
        .expect("Failed to connect to MongoDB");

    log::info!("MongoDB connected successfully");

    // One-time plaintext password upgrade, safe to re-run
    match migrations::password_hash::hash_all(&db).await {
        Ok(report) => log::info!(
            "Password hash migration done: checked={} updated={} skipped={}",
            report.checked,
            report.updated,
            report.skipped
        ),
        Err(e) => log::error!("Password hash migration failed: {}", e),
    }

    let db_data = web::Data::new(db.clone());

    let cors_origin =
        env::var("CORS_ORIGIN").unwrap_or_else(|_| "http://localhost:3000".to_string());

    // Per-route fixed windows, shared across workers
    let register_limiter = RateLimit::register();
    let login_limiter = RateLimit::login();
    let me_limiter = RateLimit::me();
    let logout_limiter = RateLimit::logout();
    let catalog_filter_limiter = RateLimit::catalog_filter();
    let catalog_by_code_limiter = RateLimit::catalog_find_by_code();
    let genre_list_limiter = RateLimit::genre_list();

    log::info!("Server starting on {}:{}", host, port);
    log::info!("Swagger UI available at: http://{}:{}/docs/", host, port);
    log::info!("OpenAPI spec at: http://{}:{}/api-docs/openapi.json", host, port);

    // Start HTTP server
    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&cors_origin)
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec![
                actix_web::http::header::CONTENT_TYPE,
                actix_web::http::header::ACCEPT,
            ])
            .supports_credentials()
            .max_age(3600);

        // Generate OpenAPI specification
        let openapi = api::swagger::ApiDoc::openapi();

        App::new()
            .app_data(db_data.clone())
            .wrap(cors)
            .wrap(Logger::default())
            // Swagger UI
            .service(
                SwaggerUi::new("/docs/{_:.*}").url("/api-docs/openapi.json", openapi.clone()),
            )
            // Health check
            .route("/health", web::get().to(api::health::health_check))
            // Users: registration and login are anonymous-only
            .service(
                web::scope("/users")
                    .service(
                        web::resource("/register")
                            .wrap(RequireAnonymous)
                            .wrap(TryAuthenticate)
                            .wrap(register_limiter.clone())
                            .route(web::post().to(api::users::register)),
                    )
                    .service(
                        web::resource("/login")
                            .wrap(RequireAnonymous)
                            .wrap(TryAuthenticate)
                            .wrap(login_limiter.clone())
                            .route(web::post().to(api::users::login)),
                    )
                    .service(
                        web::resource("/me")
                            .wrap(me_limiter.clone())
                            .wrap(Authenticate)
                            .route(web::get().to(api::users::me)),
                    )
                    .service(
                        web::resource("/logout")
                            .wrap(logout_limiter.clone())
                            .route(web::get().to(api::users::logout)),
                    ),
            )
            // Catalog: public, with the user attached when a session exists
            .service(
                web::scope("/catalog")
                    .service(
                        web::resource("")
                            .wrap(catalog_filter_limiter.clone())
                            .wrap(TryAuthenticate)
                            .route(web::get().to(api::catalog::filter)),
                    )
                    .service(
                        web::resource("/{code}")
                            .wrap(catalog_by_code_limiter.clone())
                            .wrap(TryAuthenticate)
                            .route(web::get().to(api::catalog::find_by_code)),
                    ),
            )
            // Genres
            .service(
                web::resource("/genres")
                    .wrap(genre_list_limiter.clone())
                    .route(web::get().to(api::genres::list)),
            )
            // Reviews export: admin only
            .service(
                web::resource("/reviews/{id}")
                    .wrap(RequireRole::admin())
                    .wrap(Authenticate)
                    .route(web::get().to(api::reviews::generate_file)),
            )
    })
    .bind(format!("{}:{}", host, port))?
    .run()
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_clamping() {
        env::remove_var("PORT");
        assert_eq!(configured_port(), 3103);

        env::set_var("PORT", "3200");
        assert_eq!(configured_port(), 3200);

        env::set_var("PORT", "8080");
        assert_eq!(configured_port(), 3103);

        env::set_var("PORT", "not-a-port");
        assert_eq!(configured_port(), 3103);

        env::remove_var("PORT");
    }
}

use actix_web::{web, HttpResponse};

use crate::database::MongoDB;
use crate::services::genre_service;

#[utoipa::path(
    get,
    path = "/genres",
    tag = "Genres",
    responses(
        (status = 200, description = "All genres", body = [crate::models::Genre])
    )
)]
pub async fn list(db: web::Data<MongoDB>) -> HttpResponse {
    log::info!("GET /genres");

    match genre_service::list(&db).await {
        Ok(documents) => HttpResponse::Ok().json(serde_json::json!({
            "ok": true,
            "message": "Success (genres extracted from the database)",
            "documents": documents,
        })),
        Err(e) => {
            log::error!("Genre listing failed: {}", e);
            e.to_response()
        }
    }
}

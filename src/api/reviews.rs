use actix_web::{web, HttpResponse};

use crate::database::MongoDB;
use crate::services::review_service;

#[utoipa::path(
    get,
    path = "/reviews/{id}",
    tag = "Reviews",
    params(
        ("id" = String, Path, description = "Catalog entry ObjectId")
    ),
    responses(
        (status = 200, description = "Reviews for the title, also appended to its export file", body = [crate::models::ReviewLine]),
        (status = 400, description = "Malformed id"),
        (status = 401, description = "Missing, expired or invalid session"),
        (status = 403, description = "Caller is not an admin")
    ),
    security(("cookie_auth" = []))
)]
pub async fn generate_file(db: web::Data<MongoDB>, path: web::Path<String>) -> HttpResponse {
    let id = path.into_inner();
    log::info!("GET /reviews/{}", id);

    match review_service::generate_file(&db, &id).await {
        Ok(documents) => HttpResponse::Ok().json(serde_json::json!({
            "ok": true,
            "message": "Success (reviews extracted from the database)",
            "documents": documents,
        })),
        Err(e) => {
            log::error!("Review export failed for {}: {}", id, e);
            e.to_response()
        }
    }
}

use actix_web::{web, HttpResponse};
use std::collections::HashMap;

use crate::database::MongoDB;
use crate::services::catalog_service;

#[utoipa::path(
    get,
    path = "/catalog",
    tag = "Catalog",
    params(
        ("type" = String, Query, description = "Title type: movie or serie"),
        ("ordering" = String, Query, description = "Sort field: ranking or popularity"),
        ("genre" = Option<String>, Query, description = "Genre name filter"),
        ("search" = Option<String>, Query, description = "Case-insensitive title substring")
    ),
    responses(
        (status = 200, description = "Approved titles matching the filter", body = [crate::models::CatalogListItem]),
        (status = 400, description = "Missing or unsupported query parameter")
    )
)]
pub async fn filter(
    db: web::Data<MongoDB>,
    query: web::Query<HashMap<String, String>>,
) -> HttpResponse {
    log::info!("GET /catalog - type: {:?}", query.get("type"));

    match catalog_service::filter(&db, &query).await {
        Ok(documents) => HttpResponse::Ok().json(serde_json::json!({
            "ok": true,
            "message": "Success (catalog extracted from the database)",
            "documents": documents,
        })),
        Err(e) => {
            log::warn!("Catalog filter failed: {}", e);
            e.to_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/catalog/{code}",
    tag = "Catalog",
    params(
        ("code" = String, Path, description = "Numeric title code")
    ),
    responses(
        (status = 200, description = "Title detail, or an empty object when the code is unknown", body = crate::models::CatalogDetail),
        (status = 400, description = "Non-numeric code")
    )
)]
pub async fn find_by_code(db: web::Data<MongoDB>, path: web::Path<String>) -> HttpResponse {
    let code = path.into_inner();
    log::info!("GET /catalog/{}", code);

    match catalog_service::find_by_code(&db, &code).await {
        Ok(Some(document)) => HttpResponse::Ok().json(serde_json::json!({
            "ok": true,
            "message": "Success (title extracted from the catalog)",
            "document": document,
        })),
        Ok(None) => HttpResponse::Ok().json(serde_json::json!({
            "ok": true,
            "message": "Success (title extracted from the catalog)",
            "document": {},
        })),
        Err(e) => {
            log::warn!("Catalog lookup failed for {}: {}", code, e);
            e.to_response()
        }
    }
}

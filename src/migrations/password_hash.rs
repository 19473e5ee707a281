use crate::{
    database::MongoDB,
    utils::{error::AppError, password::hash_password, validation::is_bcrypt_hash},
};
use futures::stream::StreamExt;
use mongodb::bson::{doc, DateTime as BsonDateTime, Document};
use mongodb::options::FindOptions;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HashAllReport {
    pub checked: u64,
    pub updated: u64,
    pub skipped: u64,
}

/// One-time upgrade path: any stored `password_hash` that is not already a
/// bcrypt hash is treated as legacy plaintext and re-hashed in place.
/// Idempotent — on a fully migrated collection every record is skipped.
/// Records are updated one by one with no transaction across them.
pub async fn hash_all(db: &MongoDB) -> Result<HashAllReport, AppError> {
    let collection = db.collection::<Document>("users");
    let options = FindOptions::builder()
        .projection(doc! { "_id": 1, "password_hash": 1 })
        .build();

    let mut cursor = collection
        .find(doc! {})
        .with_options(options)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Database error: {}", e)))?;

    let mut report = HashAllReport::default();

    while let Some(result) = cursor.next().await {
        let document = result.map_err(|e| AppError::DatabaseError(format!("Database error: {}", e)))?;
        report.checked += 1;

        let stored = match document.get_str("password_hash") {
            Ok(value) => value,
            Err(_) => {
                report.skipped += 1;
                continue;
            }
        };
        if is_bcrypt_hash(stored) {
            report.skipped += 1;
            continue;
        }

        let _id = match document.get_object_id("_id") {
            Ok(id) => id,
            Err(_) => {
                report.skipped += 1;
                continue;
            }
        };

        let password_hash = hash_password(stored)?;
        let update = doc! {
            "$set": {
                "password_hash": password_hash,
                "password_updated_at": BsonDateTime::now(),
            }
        };

        let response = collection
            .update_one(doc! { "_id": _id }, update)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Database error: {}", e)))?;

        if response.modified_count == 1 {
            report.updated += 1;
        } else {
            report.skipped += 1;
        }
    }

    log::info!(
        "users — checked={}, updated={}, skipped={}",
        report.checked,
        report.updated,
        report.skipped
    );

    Ok(report)
}

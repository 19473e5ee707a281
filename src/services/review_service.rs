use crate::{
    database::MongoDB,
    models::{ReviewLine, ReviewRow},
    utils::error::AppError,
};
use futures::stream::StreamExt;
use mongodb::bson::{doc, oid::ObjectId, Document};
use std::path::Path;

/// Flat per-title export files live here, one `<catalog_id>.csv` each.
pub const EXPORTS_DIR: &str = "exports";

pub fn validate_id_param(id: &str) -> Result<ObjectId, AppError> {
    ObjectId::parse_str(id.trim())
        .map_err(|_| AppError::InvalidRequest("Invalid request (unsupported 'id' format)".to_string()))
}

/// Reviews for one catalog entry, joined to their authors. `user_name` is
/// the un-unwound `$lookup` result, so it arrives as an array of usernames.
pub async fn list_by_catalog(db: &MongoDB, catalog_id: &ObjectId) -> Result<Vec<ReviewLine>, AppError> {
    let collection = db.collection::<Document>("reviews");

    let pipeline = vec![
        doc! { "$match": { "catalog_id": catalog_id } },
        doc! { "$lookup": { "from": "users", "localField": "user_id", "foreignField": "_id", "as": "user" } },
        doc! { "$project": {
            "_id": 0,
            "user_name": "$user.username",
            "score": 1,
            "review": 1,
            "created_at": "$created_at",
        } },
    ];

    let mut cursor = collection
        .aggregate(pipeline)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Database error: {}", e)))?;

    let mut documents = Vec::new();
    while let Some(result) = cursor.next().await {
        match result {
            Ok(document) => match mongodb::bson::from_document::<ReviewRow>(document) {
                Ok(row) => documents.push(ReviewLine::from(row)),
                Err(e) => log::error!("Error decoding review document: {}", e),
            },
            Err(e) => log::error!("Error reading review document: {}", e),
        }
    }

    Ok(documents)
}

/// Appends a fetched batch to the per-title export file, creating directory
/// and file on first use. Plain read-modify-write: concurrent exports for
/// the same title can lose a batch (last writer wins).
pub async fn append_to_export(
    dir: &Path,
    catalog_id: &str,
    reviews: &[ReviewLine],
) -> Result<(), AppError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| AppError::Internal(format!("Internal server error (review export failed: {})", e)))?;

    let path = dir.join(format!("{}.csv", catalog_id));

    let mut existing: Vec<ReviewLine> = match tokio::fs::read(&path).await {
        Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
        Err(_) => Vec::new(),
    };

    existing.extend(reviews.iter().cloned());

    let serialized = serde_json::to_vec(&existing)
        .map_err(|e| AppError::Internal(format!("Internal server error (review export failed: {})", e)))?;

    tokio::fs::write(&path, serialized)
        .await
        .map_err(|e| AppError::Internal(format!("Internal server error (review export failed: {})", e)))
}

/// Fetches the reviews for a title and mirrors them to the export file.
pub async fn generate_file(db: &MongoDB, id: &str) -> Result<Vec<ReviewLine>, AppError> {
    let catalog_id = validate_id_param(id)?;
    let documents = list_by_catalog(db, &catalog_id).await?;

    append_to_export(Path::new(EXPORTS_DIR), &catalog_id.to_hex(), &documents).await?;

    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(user: &str, score: f64) -> ReviewLine {
        ReviewLine {
            user_name: vec![user.to_string()],
            score: Some(score),
            review: Some("great".to_string()),
            created_at: None,
        }
    }

    #[test]
    fn test_id_param_validation() {
        let id = ObjectId::new();
        assert_eq!(validate_id_param(&id.to_hex()).unwrap(), id);
        assert!(validate_id_param("not-an-object-id").is_err());
        assert!(validate_id_param("").is_err());
    }

    #[tokio::test]
    async fn test_export_appends_batches() {
        let dir = std::env::temp_dir().join(format!("karenflix-exports-{}", std::process::id()));
        let id = ObjectId::new().to_hex();

        append_to_export(&dir, &id, &[line("ana", 4.0)]).await.unwrap();
        append_to_export(&dir, &id, &[line("leo", 5.0), line("mia", 3.0)])
            .await
            .unwrap();

        let bytes = tokio::fs::read(dir.join(format!("{}.csv", id))).await.unwrap();
        let stored: Vec<ReviewLine> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(stored.len(), 3);
        assert_eq!(stored[0].user_name, vec!["ana".to_string()]);
        assert_eq!(stored[2].user_name, vec!["mia".to_string()]);

        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn test_export_survives_corrupt_file() {
        let dir = std::env::temp_dir().join(format!("karenflix-exports-bad-{}", std::process::id()));
        let id = ObjectId::new().to_hex();

        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join(format!("{}.csv", id)), b"not json")
            .await
            .unwrap();

        append_to_export(&dir, &id, &[line("ana", 4.0)]).await.unwrap();

        let bytes = tokio::fs::read(dir.join(format!("{}.csv", id))).await.unwrap();
        let stored: Vec<ReviewLine> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(stored.len(), 1);

        tokio::fs::remove_dir_all(&dir).await.ok();
    }
}

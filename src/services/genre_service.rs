use crate::{database::MongoDB, models::Genre, utils::error::AppError};
use futures::stream::StreamExt;
use mongodb::bson::doc;
use mongodb::options::FindOptions;

pub async fn list(db: &MongoDB) -> Result<Vec<Genre>, AppError> {
    let collection = db.collection::<Genre>("genres");
    let options = FindOptions::builder()
        .projection(doc! { "_id": 0 })
        .build();

    let mut cursor = collection
        .find(doc! {})
        .with_options(options)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Database error: {}", e)))?;

    let mut genres = Vec::new();
    while let Some(result) = cursor.next().await {
        match result {
            Ok(genre) => genres.push(genre),
            Err(e) => log::error!("Error reading genre: {}", e),
        }
    }

    Ok(genres)
}

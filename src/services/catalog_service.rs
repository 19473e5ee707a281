use crate::{
    database::MongoDB,
    models::{CatalogDetail, CatalogListItem},
    utils::{error::AppError, validation},
};
use futures::stream::StreamExt;
use mongodb::bson::{doc, Document};
use mongodb::options::{AggregateOptions, Collation, CollationStrength};
use std::collections::HashMap;

/// Validated and normalized filter parameters for the catalog listing.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterParams {
    pub title_type: String,
    pub genre: Option<String>,
    pub ordering: String,
    pub search: Option<String>,
}

fn invalid(message: &str) -> AppError {
    AppError::InvalidRequest(message.to_string())
}

fn is_valid_type(title_type: &str) -> bool {
    let title_type = title_type.trim();
    title_type.eq_ignore_ascii_case("movie") || title_type.eq_ignore_ascii_case("serie")
}

fn is_valid_ordering(ordering: &str) -> bool {
    let ordering = ordering.trim();
    ordering.eq_ignore_ascii_case("ranking") || ordering.eq_ignore_ascii_case("popularity")
}

/// Pure part of the filter validation: the caller supplies the genre names
/// currently in the database.
pub fn validate_filter_values(
    query: &HashMap<String, String>,
    valid_genres: &[String],
) -> Result<FilterParams, AppError> {
    if query.is_empty() {
        return Err(invalid("Invalid request (insufficient data in the query)"));
    }
    if !query.contains_key("type") {
        return Err(invalid("Invalid request (query without 'type' included)"));
    }
    if !query.contains_key("ordering") {
        return Err(invalid("Invalid request (query without 'ordering' included)"));
    }

    let title_type = query.get("type").map(String::as_str).unwrap_or("");
    if !is_valid_type(title_type) {
        return Err(invalid("Invalid request (unsupported 'type')"));
    }

    let genre = query.get("genre").map(|g| g.trim().to_string());
    if let Some(genre) = &genre {
        let known = valid_genres
            .iter()
            .any(|name| name.to_lowercase() == genre.to_lowercase());
        if !known {
            return Err(invalid("Invalid request (unsupported 'genre')"));
        }
    }

    let ordering = query.get("ordering").map(String::as_str).unwrap_or("");
    if !is_valid_ordering(ordering) {
        return Err(invalid("Invalid request (unsupported 'ordering')"));
    }

    let search = query
        .get("search")
        .and_then(|s| validation::escape_search(s.trim()));

    Ok(FilterParams {
        title_type: title_type.trim().to_string(),
        genre,
        ordering: ordering.trim().to_string(),
        search,
    })
}

async fn list_genre_names(db: &MongoDB) -> Result<Vec<String>, AppError> {
    let collection = db.collection::<Document>("genres");

    let mut cursor = collection
        .find(doc! {})
        .await
        .map_err(|e| AppError::DatabaseError(format!("Database error: {}", e)))?;

    let mut names = Vec::new();
    while let Some(result) = cursor.next().await {
        match result {
            Ok(document) => {
                if let Ok(name) = document.get_str("name") {
                    names.push(name.to_string());
                }
            }
            Err(e) => log::error!("Error reading genre: {}", e),
        }
    }

    Ok(names)
}

pub async fn validate_filtering(
    db: &MongoDB,
    query: &HashMap<String, String>,
) -> Result<FilterParams, AppError> {
    let valid_genres = list_genre_names(db).await?;
    validate_filter_values(query, &valid_genres)
}

fn filter_projection() -> Document {
    doc! {
        "_id": 0,
        "code": 1,
        "poster_url": { "$ifNull": ["$poster_url", "$$REMOVE"] },
        "backdrop_url": { "$ifNull": ["$backdrop_url", "$$REMOVE"] },
        "genres": "$genres.name",
        "original_language": 1,
        "adult": { "$cond": [{ "$eq": ["$adult", true] }, "18+", "18-"] },
        "status": "$status.status",
        "avg_score": 1,
        "ranking": 1,
        "popularity": 1,
        "type": 1,
        "title": 1,
        "release_date": { "$cond": [{ "$eq": ["$type", "movie"] }, "$release_date", "$$REMOVE"] },
        "first_air_date": { "$cond": [{ "$eq": ["$type", "serie"] }, "$first_air_date", "$$REMOVE"] },
        "runtime": { "$cond": [{ "$eq": ["$type", "movie"] }, "$runtime", "$$REMOVE"] },
        "episode_runtime_avg": { "$cond": [{ "$eq": ["$type", "serie"] }, "$episode_runtime_avg", "$$REMOVE"] },
        "number_of_seasons": { "$cond": [{ "$eq": ["$type", "serie"] }, "$number_of_seasons", "$$REMOVE"] },
        "number_of_episodes": { "$cond": [{ "$eq": ["$type", "serie"] }, "$number_of_episodes", "$$REMOVE"] },
    }
}

/// Builds the listing pipeline. Stage order matters: the type match is
/// prepended, the title search lands right after it, the approved-status
/// gate runs post-projection, and the genre filter and sort close the
/// pipeline.
pub fn build_filter_pipeline(params: &FilterParams) -> Vec<Document> {
    let mut pipeline = vec![
        doc! { "$lookup": { "from": "catalog_status", "localField": "status_code", "foreignField": "code", "as": "status" } },
        doc! { "$unwind": "$status" },
        doc! { "$lookup": { "from": "titles_genres", "localField": "code", "foreignField": "title_code", "as": "genre_bridge" } },
        doc! { "$lookup": { "from": "genres", "localField": "genre_bridge.genre_code", "foreignField": "code", "as": "genres" } },
        doc! { "$project": filter_projection() },
        doc! { "$match": { "status": "approved" } },
    ];

    if params.title_type == "movie" || params.title_type == "serie" {
        pipeline.insert(0, doc! { "$match": { "type": &params.title_type } });
    }
    if let Some(genre) = &params.genre {
        pipeline.push(doc! { "$match": { "genres": genre } });
    }
    if params.ordering == "ranking" {
        pipeline.push(doc! { "$sort": { "ranking": -1 } });
    } else {
        pipeline.push(doc! { "$sort": { "popularity": -1 } });
    }
    if let Some(search) = &params.search {
        pipeline.insert(1, doc! { "$match": { "title": { "$regex": search, "$options": "i" } } });
    }

    pipeline
}

fn case_insensitive_collation() -> Collation {
    Collation::builder()
        .locale("en")
        .strength(CollationStrength::Primary)
        .build()
}

pub async fn filter(
    db: &MongoDB,
    query: &HashMap<String, String>,
) -> Result<Vec<CatalogListItem>, AppError> {
    let params = validate_filtering(db, query).await?;
    let pipeline = build_filter_pipeline(&params);

    let collection = db.collection::<Document>("catalog");
    let options = AggregateOptions::builder()
        .collation(case_insensitive_collation())
        .build();

    let mut cursor = collection
        .aggregate(pipeline)
        .with_options(options)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Database error: {}", e)))?;

    let mut documents = Vec::new();
    while let Some(result) = cursor.next().await {
        match result {
            Ok(document) => match mongodb::bson::from_document::<CatalogListItem>(document) {
                Ok(item) => documents.push(item),
                Err(e) => log::error!("Error decoding catalog document: {}", e),
            },
            Err(e) => log::error!("Error reading catalog document: {}", e),
        }
    }

    Ok(documents)
}

fn detail_projection() -> Document {
    doc! {
        "_id": 0,
        "code": 1,
        "overview": 1,
        "poster_url": { "$ifNull": ["$poster_url", "$$REMOVE"] },
        "backdrop_url": { "$ifNull": ["$backdrop_url", "$$REMOVE"] },
        "genres": "$genres.name",
        "original_language": 1,
        "adult": { "$cond": [{ "$eq": ["$adult", true] }, "18+", "18-"] },
        "avg_score": 1,
        "score_count": 1,
        "title": 1,
        "release_date": { "$cond": [{ "$eq": ["$type", "movie"] }, "$release_date", "$$REMOVE"] },
        "first_air_date": { "$cond": [{ "$eq": ["$type", "serie"] }, "$first_air_date", "$$REMOVE"] },
        "runtime": { "$cond": [{ "$eq": ["$type", "movie"] }, "$runtime", "$$REMOVE"] },
        "episode_runtime_avg": { "$cond": [{ "$eq": ["$type", "serie"] }, "$episode_runtime_avg", "$$REMOVE"] },
        "number_of_seasons": { "$cond": [{ "$eq": ["$type", "serie"] }, "$number_of_seasons", "$$REMOVE"] },
        "number_of_episodes": { "$cond": [{ "$eq": ["$type", "serie"] }, "$number_of_episodes", "$$REMOVE"] },
    }
}

pub fn build_find_by_code_pipeline(code: i64) -> Vec<Document> {
    vec![
        doc! { "$match": { "code": code } },
        doc! { "$lookup": { "from": "titles_genres", "localField": "code", "foreignField": "title_code", "as": "genre_bridge" } },
        doc! { "$lookup": { "from": "genres", "localField": "genre_bridge.genre_code", "foreignField": "code", "as": "genres" } },
        doc! { "$project": detail_projection() },
    ]
}

pub fn validate_code_param(code: &str) -> Result<i64, AppError> {
    if !validation::is_valid_code(code) {
        return Err(invalid("Invalid request (unsupported 'code' format)"));
    }
    code.trim()
        .parse::<i64>()
        .map_err(|_| invalid("Invalid request (unsupported 'code' format)"))
}

pub async fn find_by_code(db: &MongoDB, code: &str) -> Result<Option<CatalogDetail>, AppError> {
    let code = validate_code_param(code)?;
    let pipeline = build_find_by_code_pipeline(code);

    let collection = db.collection::<Document>("catalog");

    let mut cursor = collection
        .aggregate(pipeline)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Database error: {}", e)))?;

    while let Some(result) = cursor.next().await {
        match result {
            Ok(document) => match mongodb::bson::from_document::<CatalogDetail>(document) {
                Ok(detail) => return Ok(Some(detail)),
                Err(e) => log::error!("Error decoding catalog document: {}", e),
            },
            Err(e) => log::error!("Error reading catalog document: {}", e),
        }
    }

    Ok(None)
}

use serde::{Deserialize, Serialize};

/// One row of the filtered catalog listing, shaped by the aggregation
/// projection: genre names joined in, `adult` rendered as an age label, and
/// the fields belonging to the other title type removed.
#[derive(Debug, Serialize, Deserialize, Clone, utoipa::ToSchema)]
pub struct CatalogListItem {
    pub code: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poster_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backdrop_url: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_language: Option<String>,
    pub adult: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ranking: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub popularity: Option<f64>,
    #[serde(rename = "type")]
    pub title_type: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_air_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode_runtime_avg: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_seasons: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_episodes: Option<i64>,
}

/// Single-title detail view: the listing shape plus `overview` and
/// `score_count`, without the status join.
#[derive(Debug, Serialize, Deserialize, Clone, utoipa::ToSchema)]
pub struct CatalogDetail {
    pub code: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overview: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poster_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backdrop_url: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_language: Option<String>,
    pub adult: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_count: Option<i64>,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_air_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode_runtime_avg: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_seasons: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_episodes: Option<i64>,
}

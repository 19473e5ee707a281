use mongodb::bson::DateTime as BsonDateTime;
use serde::{Deserialize, Serialize};

/// Raw aggregation row: reviews joined to their authors. `user_name` stays an
/// array because the `$lookup` result is projected without unwinding.
#[derive(Debug, Deserialize, Clone)]
pub struct ReviewRow {
    #[serde(default)]
    pub user_name: Vec<String>,
    pub score: Option<f64>,
    pub review: Option<String>,
    pub created_at: Option<BsonDateTime>,
}

/// Review line as served to clients and appended to the per-title export
/// file, with the timestamp rendered as RFC 3339.
#[derive(Debug, Serialize, Deserialize, Clone, utoipa::ToSchema)]
pub struct ReviewLine {
    pub user_name: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl From<ReviewRow> for ReviewLine {
    fn from(row: ReviewRow) -> Self {
        ReviewLine {
            user_name: row.user_name,
            score: row.score,
            review: row.review,
            created_at: row
                .created_at
                .and_then(|ts| ts.try_to_rfc3339_string().ok()),
        }
    }
}

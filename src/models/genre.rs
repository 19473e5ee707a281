use serde::{Deserialize, Serialize};

/// `genres` document: numeric code plus display name, referenced by titles
/// through the `titles_genres` bridge collection.
#[derive(Debug, Serialize, Deserialize, Clone, utoipa::ToSchema)]
pub struct Genre {
    pub code: i64,
    pub name: String,
}

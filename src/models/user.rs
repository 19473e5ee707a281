use mongodb::bson::{oid::ObjectId, DateTime as BsonDateTime};
use serde::{Deserialize, Serialize};

/// Full user document as stored in the `users` collection.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,
    pub first_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub second_name: Option<String>,
    pub first_surname: String,
    pub second_surname: String,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub password_updated_at: BsonDateTime,
    pub role: String,
    pub avatar_url: String,
    pub status_code: i64,
    pub created_at: BsonDateTime,
    pub updated_at: BsonDateTime,
}

/// Public projection served by `/users/me`: credentials, status plumbing and
/// bookkeeping timestamps stay out.
#[derive(Debug, Serialize, Deserialize, Clone, utoipa::ToSchema)]
pub struct PublicUser {
    pub first_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub second_name: Option<String>,
    pub first_surname: String,
    pub second_surname: String,
    pub email: String,
    pub username: String,
    pub role: String,
    pub avatar_url: String,
}

/// Registration response document: the public fields plus the generated id
/// and creation timestamp.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct RegisteredUser {
    #[serde(rename = "_id")]
    pub _id: String,
    pub first_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub second_name: Option<String>,
    pub first_surname: String,
    pub second_surname: String,
    pub email: String,
    pub username: String,
    pub role: String,
    pub avatar_url: String,
    pub created_at: String,
}

/// `users_status` document: a human-readable state name mapped to the
/// numeric code stored on user records.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
}

/// Credential projection used by login: just enough to compare a password.
#[derive(Debug, Deserialize, Clone)]
pub struct Credentials {
    pub _id: ObjectId,
    pub password_hash: String,
}

/// Identity attached to a request once the JWT has been verified against the
/// live user record.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub _id: ObjectId,
    pub role: String,
}

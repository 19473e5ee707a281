use crate::{
    database::MongoDB,
    models::{Credentials, PublicUser, RegisteredUser, UserStatus},
    utils::{
        duration,
        error::AppError,
        password::{hash_password, verify_password},
        validation,
    },
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use mongodb::bson::{doc, oid::ObjectId, DateTime as BsonDateTime};
use mongodb::options::FindOneOptions;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

const DEFAULT_ADMIN_AVATAR: &str = "https://i.postimg.cc/XNHhZdnf/admin-purple.png";
const DEFAULT_USER_AVATAR: &str = "https://i.postimg.cc/76qczNCV/user-purple.png";

// JWT payload: just the user id plus the standard timestamps. Everything
// else is re-read from the live user record on each protected request.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub _id: String,
    pub iat: usize,
    pub exp: usize,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct RegisterRequest {
    pub first_name: Option<String>,
    pub second_name: Option<String>,
    pub first_surname: Option<String>,
    pub second_surname: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Registration payload once required/format checks passed and the string
/// fields have been normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub first_name: String,
    pub second_name: Option<String>,
    pub first_surname: String,
    pub second_surname: String,
    pub email: String,
    pub username: String,
    pub password: String,
    pub role: String,
    pub avatar_url: Option<String>,
}

fn invalid(message: &str) -> AppError {
    AppError::InvalidRequest(message.to_string())
}

fn validate_required_registration_fields(request: &RegisterRequest) -> Result<(), AppError> {
    if request.first_name.is_none()
        && request.second_name.is_none()
        && request.first_surname.is_none()
        && request.second_surname.is_none()
        && request.email.is_none()
        && request.username.is_none()
        && request.password.is_none()
        && request.role.is_none()
        && request.avatar_url.is_none()
    {
        return Err(invalid("Invalid request (insufficient data in the body)"));
    }

    if request.first_name.is_none() {
        return Err(invalid("Invalid request (body without 'first_name' included)"));
    }
    if request.first_surname.is_none() {
        return Err(invalid("Invalid request (body without 'first_surname' included)"));
    }
    if request.second_surname.is_none() {
        return Err(invalid("Invalid request (body without 'second_surname' included)"));
    }
    if request.email.is_none() {
        return Err(invalid("Invalid request (body without 'email' included)"));
    }
    if request.username.is_none() {
        return Err(invalid("Invalid request (body without 'username' included)"));
    }
    if request.password.is_none() {
        return Err(invalid("Invalid request (body without 'password' included)"));
    }
    if request.role.is_none() {
        return Err(invalid("Invalid request (body without 'role' included)"));
    }

    Ok(())
}

fn validate_registration_formats(request: &RegisterRequest) -> Result<(), AppError> {
    let first_name = request.first_name.as_deref().unwrap_or("");
    if !validation::is_valid_name(first_name) {
        return Err(invalid("Invalid request (unsupported name format)"));
    }
    if let Some(second_name) = request.second_name.as_deref() {
        if !validation::is_valid_name(second_name) {
            return Err(invalid("Invalid request (unsupported name format)"));
        }
    }

    if !validation::is_valid_name(request.first_surname.as_deref().unwrap_or(""))
        || !validation::is_valid_name(request.second_surname.as_deref().unwrap_or(""))
    {
        return Err(invalid("Invalid request (unsupported surname format)"));
    }

    if !validation::is_valid_email(request.email.as_deref().unwrap_or("")) {
        return Err(invalid("Invalid request (unsupported 'email' format)"));
    }
    if !validation::is_valid_username(request.username.as_deref().unwrap_or("")) {
        return Err(invalid("Invalid request (unsupported 'username' format)"));
    }
    if !validation::is_safe_password(request.password.as_deref().unwrap_or("")) {
        return Err(invalid("Invalid request (unsafe 'password')"));
    }

    if let Some(avatar_url) = request.avatar_url.as_deref() {
        if !avatar_url.is_empty() && !validation::is_valid_image_url(avatar_url) {
            return Err(invalid("Invalid request (unsupported 'avatar_url' format)"));
        }
    }

    let role = request.role.as_deref().unwrap_or("").trim();
    if role != "user" && role != "admin" {
        return Err(invalid("Invalid request (role must be 'user' or 'admin')"));
    }

    Ok(())
}

fn normalize_registration(request: &RegisterRequest) -> NewUser {
    let trimmed = |value: &Option<String>| value.as_deref().unwrap_or("").trim().to_string();

    NewUser {
        first_name: trimmed(&request.first_name),
        second_name: request
            .second_name
            .as_deref()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()),
        first_surname: trimmed(&request.first_surname),
        second_surname: trimmed(&request.second_surname),
        email: trimmed(&request.email).to_lowercase(),
        username: trimmed(&request.username).to_lowercase(),
        password: request.password.as_deref().unwrap_or("").to_string(),
        role: trimmed(&request.role),
        avatar_url: request
            .avatar_url
            .as_deref()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()),
    }
}

/// Required fields, formats and normalization: everything that can be
/// checked without touching the database.
pub fn validate_registration_fields(request: &RegisterRequest) -> Result<NewUser, AppError> {
    validate_required_registration_fields(request)?;
    validate_registration_formats(request)?;
    Ok(normalize_registration(request))
}

async fn validate_registration_uniqueness(db: &MongoDB, user: &NewUser) -> Result<(), AppError> {
    let collection = db.collection::<mongodb::bson::Document>("users");

    let email_exists = collection
        .find_one(doc! { "email": &user.email })
        .await
        .map_err(|e| AppError::DatabaseError(format!("Database error: {}", e)))?;
    if email_exists.is_some() {
        return Err(AppError::Conflict(
            "Conflict ('email' already registered in the database)".to_string(),
        ));
    }

    let username_exists = collection
        .find_one(doc! { "username": &user.username })
        .await
        .map_err(|e| AppError::DatabaseError(format!("Database error: {}", e)))?;
    if username_exists.is_some() {
        return Err(AppError::Conflict(
            "Conflict ('username' already registered in the database)".to_string(),
        ));
    }

    Ok(())
}

pub fn default_avatar(role: &str, avatar_url: Option<&str>) -> String {
    match avatar_url {
        Some(url) if !url.is_empty() => url.to_string(),
        _ => {
            if role == "admin" {
                DEFAULT_ADMIN_AVATAR.to_string()
            } else {
                DEFAULT_USER_AVATAR.to_string()
            }
        }
    }
}

/// Resolves the numeric code behind a `users_status` name. Login and
/// registration both depend on the `active` entry existing.
pub async fn search_default_status(db: &MongoDB, name: &str) -> Result<i64, AppError> {
    let collection = db.collection::<UserStatus>("users_status");

    let status_doc = collection
        .find_one(doc! { "status": name })
        .await
        .map_err(|e| AppError::DatabaseError(format!("Database error: {}", e)))?
        .ok_or_else(|| {
            AppError::DatabaseError("Database error (user status 'active' does not exist)".to_string())
        })?;

    status_doc.code.ok_or_else(|| {
        AppError::DatabaseError(
            "Database error (user status 'active' does not have the 'code' field)".to_string(),
        )
    })
}

pub async fn register(db: &MongoDB, request: &RegisterRequest) -> Result<RegisteredUser, AppError> {
    let user = validate_registration_fields(request)?;
    validate_registration_uniqueness(db, &user).await?;

    let status_code = search_default_status(db, "active").await?;
    let avatar_url = default_avatar(&user.role, user.avatar_url.as_deref());
    let password_hash = hash_password(&user.password)?;
    let now = BsonDateTime::now();

    let mut document = doc! {
        "first_name": &user.first_name,
        "first_surname": &user.first_surname,
        "second_surname": &user.second_surname,
        "email": &user.email,
        "username": &user.username,
        "password_hash": password_hash,
        "password_updated_at": now,
        "role": &user.role,
        "avatar_url": &avatar_url,
        "status_code": status_code,
        "created_at": now,
        "updated_at": now,
    };
    if let Some(second_name) = &user.second_name {
        document.insert("second_name", second_name);
    }

    let collection = db.collection::<mongodb::bson::Document>("users");
    let result = collection.insert_one(document).await.map_err(|e| {
        let message = e.to_string();
        // the unique indexes close the check-then-insert window
        if message.contains("E11000") {
            if message.contains("email") {
                AppError::Conflict("Conflict ('email' already registered in the database)".to_string())
            } else {
                AppError::Conflict(
                    "Conflict ('username' already registered in the database)".to_string(),
                )
            }
        } else {
            AppError::DatabaseError(format!("Database error (unable to create user: {})", e))
        }
    })?;

    let inserted_id = result
        .inserted_id
        .as_object_id()
        .map(|id| id.to_hex())
        .unwrap_or_else(|| result.inserted_id.to_string());

    Ok(RegisteredUser {
        _id: inserted_id,
        first_name: user.first_name,
        second_name: user.second_name,
        first_surname: user.first_surname,
        second_surname: user.second_surname,
        email: user.email,
        username: user.username,
        role: user.role,
        avatar_url,
        created_at: now.try_to_rfc3339_string().unwrap_or_default(),
    })
}

fn validate_login_fields(request: &LoginRequest) -> Result<(String, String), AppError> {
    if request.email.is_none() && request.password.is_none() {
        return Err(invalid("Invalid request (insufficient data in the body)"));
    }
    let email = request
        .email
        .as_deref()
        .ok_or_else(|| invalid("Invalid request (body without 'email' included)"))?;
    let password = request
        .password
        .as_deref()
        .ok_or_else(|| invalid("Invalid request (body without 'password' included)"))?;

    Ok((email.trim().to_lowercase(), password.to_string()))
}

/// Fetches the credentials for an active account and compares the password.
/// Unknown email, inactive account and wrong password all collapse into the
/// same 401 so callers cannot probe which one failed.
pub async fn verify_credentials(db: &MongoDB, request: &LoginRequest) -> Result<ObjectId, AppError> {
    let (email, password) = validate_login_fields(request)?;

    let status_code = search_default_status(db, "active").await?;

    let collection = db.collection::<Credentials>("users");
    let options = FindOneOptions::builder()
        .projection(doc! { "_id": 1, "password_hash": 1 })
        .build();

    let credentials = collection
        .find_one(doc! { "email": &email, "status_code": status_code })
        .with_options(options)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Database error: {}", e)))?
        .ok_or_else(|| {
            AppError::AccessDenied("Access denied (incorrect 'email' or 'password')".to_string())
        })?;

    let authorized = verify_password(&password, &credentials.password_hash)?;
    if !authorized {
        return Err(AppError::AccessDenied(
            "Access denied (incorrect 'email' or 'password')".to_string(),
        ));
    }

    Ok(credentials._id)
}

/// Reads the signing secret and session lifetime from the environment. A
/// missing secret is a configuration error surfaced to the caller.
pub fn jwt_parameters() -> Result<(String, Duration), AppError> {
    let secret = env::var("JWT_SECRET")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| invalid("Invalid request (undefined environment variable 'JWT_SECRET')"))?;

    let expires_in = duration::session_expiry(env::var("JWT_AND_COOKIE_EXPIRES").ok());

    Ok((secret, expires_in))
}

pub fn sign_token(_id: &ObjectId, secret: &str, expires_in: Duration) -> Result<String, AppError> {
    let iat = Utc::now().timestamp() as usize;
    let exp = iat + expires_in.as_secs() as usize;
    let claims = Claims {
        _id: _id.to_hex(),
        iat,
        exp,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
    .map_err(|e| AppError::Internal(format!("Internal server error (token generation failed: {})", e)))
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let validation = Validation::new(Algorithm::HS256);

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &validation,
    )
    .map(|data| data.claims)
}

/// Full sign-in: credentials, then a token carrying only `{_id}`. Returns
/// the token together with the lifetime the cookie should share.
pub async fn sign_in(db: &MongoDB, request: &LoginRequest) -> Result<(String, Duration), AppError> {
    let _id = verify_credentials(db, request).await?;
    let (secret, expires_in) = jwt_parameters()?;
    let token = sign_token(&_id, &secret, expires_in)?;

    Ok((token, expires_in))
}

pub async fn find_public_by_id(db: &MongoDB, _id: &ObjectId) -> Result<Option<PublicUser>, AppError> {
    let collection = db.collection::<PublicUser>("users");
    let options = FindOneOptions::builder()
        .projection(doc! {
            "_id": 0,
            "password_hash": 0,
            "password_updated_at": 0,
            "status_code": 0,
            "created_at": 0,
            "updated_at": 0,
        })
        .build();

    collection
        .find_one(doc! { "_id": _id })
        .with_options(options)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Database error: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_request() -> RegisterRequest {
        RegisterRequest {
            first_name: Some("Valeria".to_string()),
            second_name: Some("Andrea".to_string()),
            first_surname: Some("Duarte".to_string()),
            second_surname: Some("López".to_string()),
            email: Some("Valeria.Duarte@KarenFlix.com".to_string()),
            username: Some("valery_adl81".to_string()),
            password: Some("MiPassword123!".to_string()),
            role: Some("user".to_string()),
            avatar_url: None,
        }
    }

    #[test]
    fn test_empty_body_is_insufficient() {
        let request = RegisterRequest {
            first_name: None,
            second_name: None,
            first_surname: None,
            second_surname: None,
            email: None,
            username: None,
            password: None,
            role: None,
            avatar_url: None,
        };
        let err = validate_registration_fields(&request).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid request (insufficient data in the body)"
        );
    }

    #[test]
    fn test_missing_fields_are_named() {
        let mut request = full_request();
        request.email = None;
        let err = validate_registration_fields(&request).unwrap_err();
        assert_eq!(err.to_string(), "Invalid request (body without 'email' included)");

        let mut request = full_request();
        request.password = None;
        let err = validate_registration_fields(&request).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid request (body without 'password' included)"
        );

        let mut request = full_request();
        request.role = None;
        let err = validate_registration_fields(&request).unwrap_err();
        assert_eq!(err.to_string(), "Invalid request (body without 'role' included)");
    }

    #[test]
    fn test_format_violations() {
        let mut request = full_request();
        request.first_name = Some("X".to_string());
        let err = validate_registration_fields(&request).unwrap_err();
        assert_eq!(err.to_string(), "Invalid request (unsupported name format)");

        let mut request = full_request();
        request.email = Some("double..dot@mail.com".to_string());
        let err = validate_registration_fields(&request).unwrap_err();
        assert_eq!(err.to_string(), "Invalid request (unsupported 'email' format)");

        let mut request = full_request();
        request.password = Some("weakpass".to_string());
        let err = validate_registration_fields(&request).unwrap_err();
        assert_eq!(err.to_string(), "Invalid request (unsafe 'password')");

        let mut request = full_request();
        request.role = Some("superuser".to_string());
        let err = validate_registration_fields(&request).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid request (role must be 'user' or 'admin')"
        );
    }

    #[test]
    fn test_normalization_lowercases_identity_fields() {
        let user = validate_registration_fields(&full_request()).unwrap();
        assert_eq!(user.email, "valeria.duarte@karenflix.com");
        assert_eq!(user.username, "valery_adl81");
        assert_eq!(user.first_name, "Valeria");
    }

    #[test]
    fn test_default_avatar_by_role() {
        assert_eq!(default_avatar("admin", None), DEFAULT_ADMIN_AVATAR);
        assert_eq!(default_avatar("user", None), DEFAULT_USER_AVATAR);
        assert_eq!(default_avatar("user", Some("")), DEFAULT_USER_AVATAR);
        assert_eq!(
            default_avatar("user", Some("https://cdn.example.com/me.png")),
            "https://cdn.example.com/me.png"
        );
    }

    #[test]
    fn test_login_field_validation() {
        let request = LoginRequest {
            email: None,
            password: None,
        };
        let err = validate_login_fields(&request).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid request (insufficient data in the body)"
        );

        let request = LoginRequest {
            email: Some("USER@Mail.com ".to_string()),
            password: Some("MiPassword123!".to_string()),
        };
        let (email, password) = validate_login_fields(&request).unwrap();
        assert_eq!(email, "user@mail.com");
        assert_eq!(password, "MiPassword123!");
    }

    #[test]
    fn test_token_roundtrip() {
        let _id = ObjectId::new();
        let token = sign_token(&_id, "test-secret", Duration::from_secs(60)).unwrap();

        let claims = verify_token(&token, "test-secret").unwrap();
        assert_eq!(claims._id, _id.to_hex());
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_token_rejects_wrong_secret() {
        let _id = ObjectId::new();
        let token = sign_token(&_id, "test-secret", Duration::from_secs(60)).unwrap();

        let err = verify_token(&token, "other-secret").unwrap_err();
        assert!(matches!(
            err.kind(),
            jsonwebtoken::errors::ErrorKind::InvalidSignature
        ));
    }

    #[test]
    fn test_token_rejects_expired() {
        let now = Utc::now().timestamp() as usize;
        let claims = Claims {
            _id: ObjectId::new().to_hex(),
            iat: now - 3600,
            exp: now - 1800,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret("test-secret".as_ref()),
        )
        .unwrap();

        let err = verify_token(&token, "test-secret").unwrap_err();
        assert!(matches!(
            err.kind(),
            jsonwebtoken::errors::ErrorKind::ExpiredSignature
        ));
    }

    #[test]
    fn test_garbage_token_is_invalid() {
        assert!(verify_token("not-a-jwt", "test-secret").is_err());
    }

    #[tokio::test]
    #[ignore] // Requires MongoDB to be running
    async fn test_register_conflicts_and_login() {
        dotenv::dotenv().ok();

        let uri = std::env::var("URI").unwrap_or_else(|_| "mongodb://localhost:27017/".to_string());
        let db = crate::database::MongoDB::new(uri.trim(), "karenflix_test")
            .await
            .unwrap();

        db.collection::<mongodb::bson::Document>("users")
            .delete_many(doc! {})
            .await
            .unwrap();
        db.collection::<mongodb::bson::Document>("users_status")
            .update_one(
                doc! { "status": "active" },
                doc! { "$set": { "code": 3929_i64 } },
            )
            .upsert(true)
            .await
            .unwrap();

        let request = full_request();
        let registered = register(&db, &request).await.unwrap();
        assert_eq!(registered.email, "valeria.duarte@karenflix.com");

        // same email again: 409, nothing half-inserted
        let err = register(&db, &full_request()).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Conflict ('email' already registered in the database)"
        );

        let credentials = verify_credentials(
            &db,
            &LoginRequest {
                email: Some("valeria.duarte@karenflix.com".to_string()),
                password: Some("MiPassword123!".to_string()),
            },
        )
        .await
        .unwrap();
        assert_eq!(credentials.to_hex(), registered._id);

        // wrong password: the uniform denial message
        let err = verify_credentials(
            &db,
            &LoginRequest {
                email: Some("valeria.duarte@karenflix.com".to_string()),
                password: Some("WrongPassword1!".to_string()),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Access denied (incorrect 'email' or 'password')"
        );
    }
}

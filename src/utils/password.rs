use crate::utils::error::AppError;
use bcrypt::{hash, verify};
use std::env;

const DEFAULT_SALT_ROUNDS: u32 = 10;

/// Resolves the bcrypt cost from a raw `SALT_ROUNDS` value, falling back to
/// the default for anything unparsable or outside bcrypt's [4, 31] range.
pub fn salt_rounds_from(raw: Option<String>) -> u32 {
    match raw.and_then(|v| v.trim().parse::<i64>().ok()) {
        Some(rounds) if (4..=31).contains(&rounds) => rounds as u32,
        _ => DEFAULT_SALT_ROUNDS,
    }
}

pub fn salt_rounds() -> u32 {
    salt_rounds_from(env::var("SALT_ROUNDS").ok())
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    hash(password, salt_rounds())
        .map_err(|e| AppError::Internal(format!("Internal server error (password hashing failed: {})", e)))
}

pub fn verify_password(plain: &str, hashed: &str) -> Result<bool, AppError> {
    verify(plain, hashed).map_err(|e| {
        AppError::Internal(format!(
            "Internal server error (password verification failed: {})",
            e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::validation::is_bcrypt_hash;

    #[test]
    fn test_salt_rounds_clamping() {
        assert_eq!(salt_rounds_from(None), 10);
        assert_eq!(salt_rounds_from(Some("".into())), 10);
        assert_eq!(salt_rounds_from(Some("abc".into())), 10);
        assert_eq!(salt_rounds_from(Some("3".into())), 10);
        assert_eq!(salt_rounds_from(Some("32".into())), 10);
        assert_eq!(salt_rounds_from(Some("4".into())), 4);
        assert_eq!(salt_rounds_from(Some(" 12 ".into())), 12);
        assert_eq!(salt_rounds_from(Some("31".into())), 31);
    }

    #[test]
    fn test_hash_and_verify_roundtrip() {
        let hashed = hash("MiPassword123!", 4).unwrap();
        assert!(is_bcrypt_hash(&hashed));
        assert!(verify_password("MiPassword123!", &hashed).unwrap());
        assert!(!verify_password("OtraClave456?", &hashed).unwrap());
    }
}

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref NAME_RE: Regex = Regex::new(r"^[a-zA-ZáéíóúÁÉÍÓÚñÑ]{2,50}$").unwrap();
    static ref EMAIL_RE: Regex = Regex::new(
        r"(?i)^([a-z0-9]|[a-z0-9][a-z0-9._+-]*[a-z0-9])@([a-z0-9]|[a-z0-9][a-z0-9.-]*[a-z0-9])\.[a-z]{2,}$"
    )
    .unwrap();
    static ref USERNAME_RE: Regex = Regex::new(r"^[a-z0-9._]{3,30}$").unwrap();
    static ref UPPERCASE_RE: Regex = Regex::new(r"[A-Z]").unwrap();
    static ref DIGIT_RE: Regex = Regex::new(r"[0-9]").unwrap();
    static ref SPECIAL_RE: Regex =
        Regex::new(r#"[!@#$%^&*()_+=\[\]{};':",.<>/?-]"#).unwrap();
    static ref WHITESPACE_RE: Regex = Regex::new(r"\s").unwrap();
    static ref IMAGE_URL_RE: Regex = Regex::new(
        r"^https?://[^\s?#]+?\.(png|jpe?g|gif|webp|svg|bmp|ico|tiff)(\?[^#\s]*)?(#\S*)?$"
    )
    .unwrap();
    static ref TIME_STRING_RE: Regex = Regex::new(r"^(0|[1-9][0-9]*)(m?s|m|h|d|w|y)?$").unwrap();
    static ref BCRYPT_HASH_RE: Regex =
        Regex::new(r"^\$2[aby]\$(0[4-9]|1\d|2\d|3[01])\$[./A-Za-z0-9]{53}$").unwrap();
    static ref CODE_RE: Regex = Regex::new(r"^[0-9]+$").unwrap();
}

pub fn is_valid_name(name: &str) -> bool {
    let name = name.trim();
    !name.is_empty() && NAME_RE.is_match(name)
}

pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    // consecutive dots are excluded up front, the pattern handles the rest
    !email.is_empty() && !email.contains("..") && EMAIL_RE.is_match(email)
}

pub fn is_valid_username(username: &str) -> bool {
    let username = username.trim();
    !username.is_empty() && USERNAME_RE.is_match(username)
}

/// At least 8 characters with an uppercase letter, a digit and a special
/// character, and no whitespace anywhere.
pub fn is_safe_password(password: &str) -> bool {
    password.chars().count() >= 8
        && UPPERCASE_RE.is_match(password)
        && DIGIT_RE.is_match(password)
        && SPECIAL_RE.is_match(password)
        && !WHITESPACE_RE.is_match(password)
}

pub fn is_valid_image_url(url: &str) -> bool {
    let url = url.trim();
    !url.is_empty() && IMAGE_URL_RE.is_match(url)
}

/// Integer count with an optional `ms|s|m|h|d|w|y` unit, e.g. `30m` or `3600`.
pub fn is_time_string(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && TIME_STRING_RE.is_match(value)
}

pub fn is_bcrypt_hash(value: &str) -> bool {
    BCRYPT_HASH_RE.is_match(value)
}

pub fn is_valid_code(code: &str) -> bool {
    let code = code.trim();
    !code.is_empty() && CODE_RE.is_match(code)
}

/// Escapes regex metacharacters so free-text search can be embedded in a
/// `$regex` stage. Empty or whitespace-only input collapses to `None`.
pub fn escape_search(search: &str) -> Option<String> {
    if search.trim().is_empty() {
        return None;
    }

    let mut escaped = String::with_capacity(search.len());
    for ch in search.chars() {
        match ch {
            '-' | '.' | '*' | '+' | '?' | '^' | '$' | '{' | '}' | '(' | ')' | '|' | '['
            | ']' | '\\' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            _ => escaped.push(ch),
        }
    }

    Some(escaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        assert!(is_valid_name("Karen"));
        assert!(is_valid_name("María"));
        assert!(is_valid_name("Ñoño"));
        assert!(is_valid_name("  Juan  "));
    }

    #[test]
    fn test_invalid_names() {
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("A"));
        assert!(!is_valid_name("Anna-Lise"));
        assert!(!is_valid_name("name1"));
        assert!(!is_valid_name("two words"));
        assert!(!is_valid_name(&"a".repeat(51)));
    }

    #[test]
    fn test_valid_emails() {
        assert!(is_valid_email("valeria.duarte@karenflix.com"));
        assert!(is_valid_email("a@b.co"));
        assert!(is_valid_email("USER+tag@Example.ORG"));
    }

    #[test]
    fn test_invalid_emails() {
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("double..dot@mail.com"));
        assert!(!is_valid_email(".leading@mail.com"));
        assert!(!is_valid_email("trailing.@mail.com"));
        assert!(!is_valid_email("user@mail"));
        assert!(!is_valid_email("user@mail.c"));
    }

    #[test]
    fn test_valid_usernames() {
        assert!(is_valid_username("valery_adl81"));
        assert!(is_valid_username("abc"));
        assert!(is_valid_username("a.b_c9"));
    }

    #[test]
    fn test_invalid_usernames() {
        assert!(!is_valid_username("ab"));
        assert!(!is_valid_username("UpperCase"));
        assert!(!is_valid_username("has space"));
        assert!(!is_valid_username("has-dash"));
        assert!(!is_valid_username(&"a".repeat(31)));
    }

    #[test]
    fn test_safe_passwords() {
        assert!(is_safe_password("MiPassword123!"));
        assert!(is_safe_password("Abcdef1?"));
    }

    #[test]
    fn test_unsafe_passwords() {
        // each violation class on its own
        assert!(!is_safe_password("Short1!"));
        assert!(!is_safe_password("nouppercase1!"));
        assert!(!is_safe_password("NoDigits!!"));
        assert!(!is_safe_password("NoSpecial123"));
        assert!(!is_safe_password("Has Space1!"));
        assert!(!is_safe_password(""));
    }

    #[test]
    fn test_image_urls() {
        assert!(is_valid_image_url("https://i.postimg.cc/XNHhZdnf/admin-purple.png"));
        assert!(is_valid_image_url("http://cdn.example.com/a.jpeg?w=200"));
        assert!(is_valid_image_url("https://x.com/pic.webp#frag"));
        assert!(!is_valid_image_url("https://x.com/doc.pdf"));
        assert!(!is_valid_image_url("ftp://x.com/pic.png"));
        assert!(!is_valid_image_url(""));
    }

    #[test]
    fn test_time_strings() {
        assert!(is_time_string("30m"));
        assert!(is_time_string("1h"));
        assert!(is_time_string("500ms"));
        assert!(is_time_string("3600"));
        assert!(is_time_string("0"));
        assert!(!is_time_string("m30"));
        assert!(!is_time_string("1.5h"));
        assert!(!is_time_string("-1m"));
        assert!(!is_time_string(""));
    }

    #[test]
    fn test_bcrypt_hash_detection() {
        assert!(is_bcrypt_hash(
            "$2b$10$N9qo8uLOickgx2ZMRZoMyeIjZAgcfl7p92ldGxad68LJZdL17lhWy"
        ));
        assert!(!is_bcrypt_hash("plaintext-password"));
        assert!(!is_bcrypt_hash("$2b$03$N9qo8uLOickgx2ZMRZoMyeIjZAgcfl7p92ldGxad68LJZdL17lhWy"));
        assert!(!is_bcrypt_hash("$1$abc$def"));
    }

    #[test]
    fn test_code_format() {
        assert!(is_valid_code("42"));
        assert!(is_valid_code(" 1001 "));
        assert!(!is_valid_code("12a"));
        assert!(!is_valid_code("-5"));
        assert!(!is_valid_code(""));
    }

    #[test]
    fn test_escape_search() {
        assert_eq!(escape_search("matrix"), Some("matrix".to_string()));
        assert_eq!(escape_search("sp.der-man"), Some(r"sp\.der\-man".to_string()));
        assert_eq!(escape_search("a(b)[c]"), Some(r"a\(b\)\[c\]".to_string()));
        assert_eq!(escape_search("   "), None);
        assert_eq!(escape_search(""), None);
    }
}

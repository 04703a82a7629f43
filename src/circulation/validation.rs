//! Field format predicates used by the catalog, patron and auth services

use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("valid email regex")
});

// Philippine mobile number: +63 9XX XXX XXXX
static MOBILE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+63 9[0-9]{2} [0-9]{3} [0-9]{4}$").expect("valid mobile regex"));

static USERNAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.]{1,50}$").expect("valid username regex"));

pub fn validate_email(email: &str) -> bool {
    EMAIL_REGEX.is_match(email)
}

pub fn validate_mobile(mobile: &str) -> bool {
    MOBILE_REGEX.is_match(mobile)
}

/// 10 or 13 digits once hyphens and spaces are removed. The check digit is not verified.
pub fn validate_isbn(isbn: &str) -> bool {
    let digits = normalize_isbn(isbn);
    matches!(digits.len(), 10 | 13) && digits.chars().all(|c| c.is_ascii_digit())
}

/// ISBN with hyphens and spaces removed, the form it is stored and compared in
pub fn normalize_isbn(isbn: &str) -> String {
    isbn.chars().filter(|c| *c != '-' && *c != ' ').collect()
}

/// Letters, digits, `_` and `.`, at most 50 characters, not ending with a period.
pub fn validate_username(username: &str) -> bool {
    USERNAME_REGEX.is_match(username) && !username.ends_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email() {
        assert!(validate_email("juan.delacruz@example.ph"));
        assert!(validate_email("a+tag@mail.co"));
        assert!(!validate_email("juan@example"));
        assert!(!validate_email("juan@@example.com"));
        assert!(!validate_email("juan @example.com"));
        assert!(!validate_email("juan@example.c"));
    }

    #[test]
    fn test_mobile() {
        assert!(validate_mobile("+63 917 123 4567"));
        assert!(validate_mobile("+63 912 345 6789"));
        assert!(!validate_mobile("09171234567"));
        assert!(!validate_mobile("+63 817 123 4567"));
        assert!(!validate_mobile("+63 9171 23 4567"));
        assert!(!validate_mobile("+63  917 123 4567"));
        assert!(!validate_mobile("+63\t917 123 4567"));
    }

    #[test]
    fn test_isbn() {
        assert!(validate_isbn("978-3-16-148410-0"));
        assert!(validate_isbn("0 306 40615 2"));
        assert!(validate_isbn("0306406152"));
        assert!(!validate_isbn("12345"));
        assert!(!validate_isbn("030640615X"));
        assert!(!validate_isbn("978-3-16-148410-0-1"));
        assert!(!validate_isbn(""));
    }

    #[test]
    fn test_normalize_isbn() {
        assert_eq!(normalize_isbn("978-3-16-148410-0"), "9783161484100");
        assert_eq!(normalize_isbn("0 306 40615 2"), "0306406152");
        assert_eq!(normalize_isbn("0306406152"), "0306406152");
    }

    #[test]
    fn test_username() {
        assert!(validate_username("librarian"));
        assert!(validate_username("m.santos_2"));
        assert!(!validate_username("m.santos."));
        assert!(!validate_username("m santos"));
        assert!(!validate_username(""));
        assert!(!validate_username(&"a".repeat(51)));
    }
}

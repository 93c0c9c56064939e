//! Input normalisation and validation helpers shared by the services

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use super::error::{ServiceError, ServiceResult};

pub const MAX_TITLE_LENGTH: usize = 200;
pub const MAX_SLUG_LENGTH: usize = 100;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));
static COLOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").expect("valid color regex"));
static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.-]{3,50}$").expect("valid username regex"));

fn is_slug_char(c: char) -> bool {
    c.is_ascii_lowercase()
        || c.is_ascii_digit()
        || (!c.is_ascii() && c.is_alphanumeric() && !c.is_uppercase())
}

/// Generate a URL slug: lowercase, punctuation and whitespace collapse into
/// single hyphens, non-ASCII letters are kept.
pub fn generate_slug(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut prev_hyphen = false;

    for c in text.to_lowercase().chars() {
        if is_slug_char(c) {
            result.push(c);
            prev_hyphen = false;
        } else if !prev_hyphen && !result.is_empty() {
            result.push('-');
            prev_hyphen = true;
        }
    }

    let slug = result.trim_end_matches('-');
    slug.chars().take(MAX_SLUG_LENGTH).collect::<String>().trim_end_matches('-').to_string()
}

/// Non-empty hyphen-separated runs of lowercase letters and digits
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug.chars().count() <= MAX_SLUG_LENGTH
        && slug
            .split('-')
            .all(|part| !part.is_empty() && part.chars().all(is_slug_char))
}

pub fn is_valid_email(email: &str) -> bool {
    email.len() <= 254 && EMAIL_RE.is_match(email)
}

pub fn is_valid_username(username: &str) -> bool {
    USERNAME_RE.is_match(username)
}

pub fn is_valid_color(color: &str) -> bool {
    COLOR_RE.is_match(color)
}

/// Trimmed, non-empty text of bounded length
pub fn required_text(field: &str, value: &str, max_chars: usize) -> ServiceResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ServiceError::validation(format!("{} is required", field)));
    }
    if value.chars().count() > max_chars {
        return Err(ServiceError::validation(format!(
            "{} must be at most {} characters",
            field, max_chars
        )));
    }
    Ok(value.to_string())
}

/// Optional free text: blank input means "no value"
pub fn optional_text(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Absolute http(s) URL, returned normalised
pub fn http_url(field: &str, value: &str) -> ServiceResult<String> {
    let parsed = Url::parse(value.trim())
        .map_err(|_| ServiceError::validation(format!("{} must be a valid URL", field)))?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(parsed.to_string()),
        _ => Err(ServiceError::validation(format!("{} must use http or https", field))),
    }
}

/// Like [`http_url`] but blank input means "no value"
pub fn optional_http_url(field: &str, value: Option<String>) -> ServiceResult<Option<String>> {
    optional_text(value).map(|v| http_url(field, &v)).transpose()
}

/// Slug given by the client, or one derived from `fallback`
pub fn resolve_slug(requested: Option<&str>, fallback: &str) -> ServiceResult<String> {
    let slug = match requested.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => s.to_lowercase(),
        None => generate_slug(fallback),
    };
    if !is_valid_slug(&slug) {
        return Err(ServiceError::validation(
            "Slug may only contain lowercase letters, digits and single hyphens",
        ));
    }
    Ok(slug)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_generate_slug() {
        assert_eq!(generate_slug("Parent Evening 2024"), "parent-evening-2024");
        assert_eq!(generate_slug("  Maths & Science!! "), "maths-science");
        assert_eq!(generate_slug("Schülerrat"), "schülerrat");
        assert_eq!(generate_slug("--"), "");
    }

    #[test]
    fn test_is_valid_slug() {
        assert!(is_valid_slug("staff-handbook"));
        assert!(is_valid_slug("a1"));
        assert!(!is_valid_slug("Staff"));
        assert!(!is_valid_slug("double--hyphen"));
        assert!(!is_valid_slug("-lead"));
        assert!(!is_valid_slug(""));
    }

    #[test]
    fn test_email_username_color() {
        assert!(is_valid_email("office@school.example"));
        assert!(!is_valid_email("office@school"));
        assert!(!is_valid_email("no at sign"));

        assert!(is_valid_username("j.doe_42"));
        assert!(!is_valid_username("jd"));
        assert!(!is_valid_username("has space"));

        assert!(is_valid_color("#1a2B3c"));
        assert!(is_valid_color("#fff"));
        assert!(!is_valid_color("red"));
    }

    #[test]
    fn test_required_and_optional_text() {
        assert_eq!(required_text("Title", "  Trip  ", 10).unwrap(), "Trip");
        assert!(required_text("Title", "   ", 10).is_err());
        assert!(required_text("Title", "elevenchars", 10).is_err());

        assert_eq!(optional_text(Some("  ".into())), None);
        assert_eq!(optional_text(Some(" x ".into())), Some("x".into()));
        assert_eq!(optional_text(None), None);
    }

    #[test]
    fn test_http_url() {
        assert_eq!(
            http_url("URL", " https://docs.school.example/plan ").unwrap(),
            "https://docs.school.example/plan"
        );
        assert!(http_url("URL", "ftp://files.example/x").is_err());
        assert!(http_url("URL", "javascript:alert(1)").is_err());
        assert!(http_url("URL", "not a url").is_err());
        assert_eq!(optional_http_url("Thumbnail", Some(String::new())).unwrap(), None);
    }

    #[test]
    fn test_resolve_slug() {
        assert_eq!(resolve_slug(None, "Safeguarding Policy").unwrap(), "safeguarding-policy");
        assert_eq!(resolve_slug(Some("  "), "Trips").unwrap(), "trips");
        assert_eq!(resolve_slug(Some("Custom-Slug"), "x").unwrap(), "custom-slug");
        assert!(resolve_slug(Some("bad slug"), "x").is_err());
        assert!(resolve_slug(None, "!!!").is_err());
    }

    proptest! {
        #[test]
        fn generated_slugs_are_valid_or_empty(text in "\\PC{0,60}") {
            let slug = generate_slug(&text);
            prop_assert!(slug.is_empty() || is_valid_slug(&slug), "bad slug {:?}", slug);
        }
    }
}

//! Input validation for authorization requests.
//!
//! Both checks are pure: no network access, same answer for the same input.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// Letters, digits and `-._~`, between 20 and 80 characters.
static DRIVER_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9\-._~]{20,80}$").expect("driver token pattern is valid")
});

/// Check driver token syntax.
pub fn validate_driver_token(token: &str) -> bool {
    DRIVER_TOKEN_RE.is_match(token)
}

/// Check that `url` is an absolute HTTP(S) URL with a host.
///
/// The scheme comparison is case-insensitive (`HTTPS://...` is accepted).
pub fn validate_callback_url(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => {
            matches!(parsed.scheme(), "http" | "https")
                && parsed.host_str().is_some_and(|host| !host.is_empty())
        }
        Err(_) => false,
    }
}

//! Helpers for logging request material without leaking it
//!
//! Claims challenges and token parameters can carry secrets or large JSON
//! blobs, so log output goes through these helpers.

use crate::context::TokenParams;

/// Maximum number of bytes of claims JSON written to logs
pub const MAX_LOGGED_CLAIMS_BYTES: usize = 64;

/// Safely truncate a string at a UTF-8 character boundary.
///
/// # Example
/// ```
/// use oauth_token_context::utils::safe_truncate;
///
/// let text = "Status: 🔍 Active";
/// assert_eq!(safe_truncate(text, 10), "Status: ");
/// ```
#[inline]
#[must_use]
pub fn safe_truncate(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }

    let mut boundary = max_bytes;
    while boundary > 0 && !s.is_char_boundary(boundary) {
        boundary -= 1;
    }

    &s[..boundary]
}

/// Truncate a string for display, appending "..." when shortened.
///
/// # Example
/// ```
/// use oauth_token_context::utils::truncate_for_display;
///
/// assert_eq!(truncate_for_display("This is a long message", 10), "This is a ...");
/// ```
#[must_use]
pub fn truncate_for_display(s: &str, max_bytes: usize) -> String {
    let truncated = safe_truncate(s, max_bytes);
    if truncated.len() < s.len() {
        format!("{truncated}...")
    } else {
        truncated.to_string()
    }
}

/// Parameter names of a request, for logging. Values are never included.
#[must_use]
pub fn param_names(params: &TokenParams) -> String {
    params.iter().map(|(k, _)| k).collect::<Vec<_>>().join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_truncate_ascii() {
        let text = "Hello, World!";
        assert_eq!(safe_truncate(text, 7), "Hello, ");
        assert_eq!(safe_truncate(text, 100), text);
        assert_eq!(safe_truncate(text, 0), "");
    }

    #[test]
    fn test_safe_truncate_multibyte() {
        // 'é' is 2 bytes in UTF-8
        let text = "Café";
        assert_eq!(safe_truncate(text, 4), "Caf");
        assert_eq!(safe_truncate(text, 5), "Café");
    }

    #[test]
    fn test_truncate_for_display() {
        let text = r#"{"access_token":{"nbf":{"essential":true}}}"#;
        assert_eq!(truncate_for_display(text, 100), text);
        assert_eq!(truncate_for_display(text, 16), r#"{"access_token":..."#);
    }

    #[test]
    fn test_param_names_hide_values() {
        let mut params = TokenParams::new();
        params.insert("client_secret", "hunter2").unwrap();
        params.insert("client_id", "app").unwrap();

        let names = param_names(&params);
        assert_eq!(names, "client_id,client_secret");
        assert!(!names.contains("hunter2"));
    }
}

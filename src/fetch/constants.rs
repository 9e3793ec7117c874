//! Constants for the fetch module (timeouts, validation, identification).

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP request timeout, body streaming included (5 minutes).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Substring a Content-Type header must contain for the page to be accepted.
pub const HTML_CONTENT_TYPE: &str = "text/html";

/// User-Agent sent with every request.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    format!("fetch/{}", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_contains_crate_version() {
        let ua = default_user_agent();
        assert_eq!(ua.strip_prefix("fetch/"), Some(env!("CARGO_PKG_VERSION")));
    }
}

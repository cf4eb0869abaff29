//! Shared HTTP utilities for Warden crates.

/// Extract the first client IP from an X-Forwarded-For header value.
///
/// Pass the raw header value (e.g., `headers.get("x-forwarded-for")`).
/// Returns the first (leftmost) IP, which is the original client.
///
/// **Security note:** `X-Forwarded-For` is trivially spoofable by clients.
/// Use this for audit/informational logging only — never for authorization.
pub fn extract_client_ip(forwarded_for: Option<&str>) -> Option<String> {
    forwarded_for
        .map(|s| s.split(',').next().unwrap_or("").trim().to_string())
        .filter(|s| !s.is_empty())
}

use axum::http::HeaderMap;

/// Identifier used when the caller's address cannot be determined.
pub const FALLBACK_IP_ADDRESS: &str = "0.0.0.0";

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REAL_IP: &str = "x-real-ip";

/// Derive the quota partition key for a request.
///
/// Prefers the first hop of `x-forwarded-for`, then `x-real-ip`, then
/// [`FALLBACK_IP_ADDRESS`]. Values are not parsed as IP addresses: whatever
/// the edge proxy put there is the identifier.
pub fn rate_limit_identifier(headers: &HeaderMap) -> String {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(forwarded_for) = header_value(X_FORWARDED_FOR) {
        return forwarded_for
            .split(',')
            .next()
            .map(str::trim)
            .filter(|first| !first.is_empty())
            .unwrap_or(FALLBACK_IP_ADDRESS)
            .to_string();
    }

    header_value(X_REAL_IP)
        .unwrap_or(FALLBACK_IP_ADDRESS)
        .to_string()
}

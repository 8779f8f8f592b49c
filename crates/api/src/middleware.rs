use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub fn create_middleware_stack() -> impl tower::Layer<axum::Router> {
    ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Constant-time comparison for the `x-api-key` gate (§4.1 step 2). Avoids a
/// short-circuiting `==` so a wrong key doesn't leak its matching prefix
/// length through response timing.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_strings_match() {
        assert!(constant_time_eq("secret-key", "secret-key"));
    }

    #[test]
    fn different_lengths_never_match() {
        assert!(!constant_time_eq("short", "much-longer-key"));
    }

    #[test]
    fn same_length_mismatch_is_rejected() {
        assert!(!constant_time_eq("secret-key", "secret-kez"));
    }
}

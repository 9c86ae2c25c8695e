//! Negative-result caching helpers.
//!
//! An empty source result is stored as [`NIL_SENTINEL`] with a short TTL so
//! repeated lookups for keys known to have no data stop reaching the source.
//! The sentinel starts with a NUL character, which no JSON document can.

/// Stored value meaning "confirmed empty, do not reload"
pub const NIL_SENTINEL: &str = "\u{0}nil";

/// Sentinel for `true`, empty string (a miss) for `false`
pub fn wrap_nil(empty: bool) -> &'static str {
    if empty { NIL_SENTINEL } else { "" }
}

pub fn is_nil_sentinel(value: &str) -> bool {
    value == NIL_SENTINEL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapped_nil_is_sentinel() {
        assert!(is_nil_sentinel(wrap_nil(true)));
    }

    #[test]
    fn test_ordinary_payloads_are_not_sentinel() {
        assert!(!is_nil_sentinel(wrap_nil(false)));
        assert!(!is_nil_sentinel(""));
        assert!(!is_nil_sentinel("[]"));
        assert!(!is_nil_sentinel("nil"));
        assert!(!is_nil_sentinel("null"));
    }
}

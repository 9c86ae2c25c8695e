//! Cache key naming and path normalization.

use store_object::UserId;

/// Cache key of a user's permission set, e.g. `perm:user:42`
pub fn user_key(prefix: &str, uid: UserId) -> String {
    format!("{prefix}{uid}")
}

/// Trim, lower-case and `/`-prefix a permission path.
///
/// Returns `None` for a blank path, which never grants anything.
pub fn normalize_path(path: &str) -> Option<String> {
    let path = path.trim();
    if path.is_empty() {
        return None;
    }
    let path = path.to_lowercase();
    if path.starts_with('/') {
        Some(path)
    } else {
        Some(format!("/{path}"))
    }
}

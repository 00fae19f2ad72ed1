/// Longest sanitized key the cache will use as a filename stem.
const MAX_KEY_LEN: usize = 200;

/// Sanitize a cache key for use as a filename stem.
///
/// `.`, `/`, `\` and every character outside `[A-Za-z0-9_-]` are replaced
/// with `_`, and the result is capped at 200 characters. The output can never
/// escape the cache directory. Keys produced by [`crate::digest`] are already
/// fixed points of this function.
pub fn sanitize(key: &str) -> String {
    let mut sanitized: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    sanitized.truncate(MAX_KEY_LEN);
    sanitized
}

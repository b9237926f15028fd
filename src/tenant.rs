//! Tenant Namespacing
//!
//! Optional caller-side namespacing used by both front-ends: when a request
//! carries a username, every key is prefixed with `"{username}:"` before it
//! reaches the engine, and the prefix is stripped from any returned key
//! list. The engine itself is namespace-agnostic and only ever sees raw
//! keys.

/// Qualifies a key with an optional tenant prefix.
pub fn qualify(username: Option<&str>, key: &str) -> String {
    match username {
        Some(user) if !user.is_empty() => format!("{}:{}", user, key),
        _ => key.to_string(),
    }
}

/// Qualifies an optional glob pattern; no username and no pattern means
/// "all keys", a username alone means "all of that tenant's keys".
pub fn qualify_pattern(username: Option<&str>, pattern: Option<&str>) -> Option<String> {
    match username {
        Some(user) if !user.is_empty() => {
            Some(format!("{}:{}", user, pattern.unwrap_or("*")))
        }
        _ => pattern.map(str::to_string),
    }
}

/// Strips the tenant prefix from keys coming back out of the engine.
/// Keys without the prefix pass through unchanged.
pub fn strip_prefix(username: Option<&str>, keys: Vec<String>) -> Vec<String> {
    match username {
        Some(user) if !user.is_empty() => {
            let prefix = format!("{}:", user);
            keys.into_iter()
                .map(|k| k.strip_prefix(&prefix).map(str::to_string).unwrap_or(k))
                .collect()
        }
        _ => keys,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualify() {
        assert_eq!(qualify(Some("alice"), "k"), "alice:k");
        assert_eq!(qualify(None, "k"), "k");
        assert_eq!(qualify(Some(""), "k"), "k");
    }

    #[test]
    fn test_qualify_pattern() {
        assert_eq!(
            qualify_pattern(Some("alice"), Some("user_*")),
            Some("alice:user_*".to_string())
        );
        assert_eq!(
            qualify_pattern(Some("alice"), None),
            Some("alice:*".to_string())
        );
        assert_eq!(qualify_pattern(None, Some("x?")), Some("x?".to_string()));
        assert_eq!(qualify_pattern(None, None), None);
    }

    #[test]
    fn test_strip_prefix() {
        let keys = vec!["alice:a".to_string(), "alice:b".to_string(), "other".to_string()];
        assert_eq!(
            strip_prefix(Some("alice"), keys.clone()),
            vec!["a", "b", "other"]
        );
        assert_eq!(strip_prefix(None, keys.clone()), keys);
    }
}

//! Glob Key Patterns
//!
//! Key enumeration accepts a glob pattern where `*` matches any run of
//! characters and `?` matches exactly one. The pattern is translated to an
//! anchored full-string regex (`*` -> `.*`, `?` -> `.`, everything else
//! escaped), so matching is case-sensitive and never partial.

use regex::Regex;

/// A compiled key filter. Absence of a pattern matches every key.
#[derive(Debug, Clone)]
pub struct KeyPattern {
    re: Option<Regex>,
}

impl KeyPattern {
    /// Compiles an optional glob pattern.
    ///
    /// `None` (and the catch-all `"*"`) match every key.
    pub fn new(pattern: Option<&str>) -> Self {
        let re = match pattern {
            None | Some("*") | Some("") => None,
            Some(p) => {
                // Every non-wildcard character is escaped, so the regex
                // source is always valid.
                let source = glob_to_regex(p);
                Some(Regex::new(&source).expect("escaped glob compiles"))
            }
        };
        Self { re }
    }

    /// Tests a raw key against the pattern.
    pub fn matches(&self, key: &str) -> bool {
        match &self.re {
            Some(re) => re.is_match(key),
            None => true,
        }
    }
}

/// Translates a glob pattern into an anchored regex source string.
fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 4);
    out.push('^');
    for c in pattern.chars() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            // Escape regex metacharacters; everything else passes through.
            '.' | '+' | '(' | ')' | '[' | ']' | '{' | '}' | '^' | '$' | '|' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push('$');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_matches_any_run() {
        let p = KeyPattern::new(Some("user_*"));
        assert!(p.matches("user_1"));
        assert!(p.matches("user_"));
        assert!(p.matches("user_long_suffix"));
        assert!(!p.matches("admin_1"));
        assert!(!p.matches("xuser_1"));
    }

    #[test]
    fn test_question_matches_one_char() {
        let p = KeyPattern::new(Some("h?llo"));
        assert!(p.matches("hello"));
        assert!(p.matches("hallo"));
        assert!(!p.matches("hllo"));
        assert!(!p.matches("heello"));
    }

    #[test]
    fn test_no_pattern_matches_all() {
        assert!(KeyPattern::new(None).matches("anything"));
        assert!(KeyPattern::new(Some("*")).matches(""));
    }

    #[test]
    fn test_match_is_anchored_and_case_sensitive() {
        let p = KeyPattern::new(Some("abc"));
        assert!(p.matches("abc"));
        assert!(!p.matches("abcd"));
        assert!(!p.matches("zabc"));
        assert!(!p.matches("ABC"));
    }

    #[test]
    fn test_metacharacters_are_literal() {
        let p = KeyPattern::new(Some("a.b+c"));
        assert!(p.matches("a.b+c"));
        assert!(!p.matches("axb+c"));

        let p = KeyPattern::new(Some("ns:[0]*"));
        assert!(p.matches("ns:[0]abc"));
        assert!(!p.matches("ns:0abc"));
    }
}

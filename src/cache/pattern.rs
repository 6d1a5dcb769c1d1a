//! Invalidation pattern compiler
//!
//! Patterns are key globs where `*` matches any run of characters and every
//! other character is literal. Each compiled pattern is translated once into
//! the three tier-appropriate query forms: an anchored regex for the
//! in-process scan, a literal listing prefix for the distributed tier, and a
//! `LIKE` pattern (backslash-escaped) for the persistent tier.

use crate::error::{FlowgateError, Result};
use regex::Regex;

#[derive(Debug, Clone)]
pub struct KeyPattern {
    raw: String,
    regex: Regex,
    prefix: String,
}

impl KeyPattern {
    /// Compile a glob into its tier-specific query forms.
    ///
    /// All regex metacharacters in the pattern are escaped as literals, so
    /// keys like `wf.(1)` cannot produce false matches or pathological
    /// regexes. `*` may appear in any position, any number of times.
    pub fn compile(pattern: &str) -> Result<Self> {
        if pattern.is_empty() {
            return Err(FlowgateError::invalid_pattern(pattern, "empty pattern"));
        }

        let source = format!(
            "^{}$",
            pattern
                .split('*')
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(".*")
        );
        let regex = Regex::new(&source)
            .map_err(|e| FlowgateError::invalid_pattern(pattern, e.to_string()))?;

        let prefix = match pattern.find('*') {
            Some(idx) => pattern[..idx].to_string(),
            None => pattern.to_string(),
        };

        Ok(Self {
            raw: pattern.to_string(),
            regex,
            prefix,
        })
    }

    /// Anchored match against a full key
    pub fn matches(&self, key: &str) -> bool {
        self.regex.is_match(key)
    }

    /// Literal portion before the first wildcard, usable as a listing prefix
    pub fn listing_prefix(&self) -> &str {
        &self.prefix
    }

    /// SQL `LIKE` translation; pair with `ESCAPE '\'`
    pub fn to_like(&self) -> String {
        let mut out = String::with_capacity(self.raw.len() + 4);
        for ch in self.raw.chars() {
            match ch {
                '*' => out.push('%'),
                '\\' | '%' | '_' => {
                    out.push('\\');
                    out.push(ch);
                }
                _ => out.push(ch),
            }
        }
        out
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_wildcard() {
        let pattern = KeyPattern::compile("wf:*").unwrap();
        assert!(pattern.matches("wf:1"));
        assert!(pattern.matches("wf:abc:def"));
        assert!(!pattern.matches("other:1"));
        assert!(!pattern.matches("xwf:1"));
    }

    #[test]
    fn test_embedded_wildcard() {
        let pattern = KeyPattern::compile("app:workflow:*:v2").unwrap();
        assert!(pattern.matches("app:workflow:42:v2"));
        assert!(!pattern.matches("app:workflow:42:v1"));
    }

    #[test]
    fn test_multiple_wildcards() {
        let pattern = KeyPattern::compile("*:execution:*").unwrap();
        assert!(pattern.matches("app:execution:9"));
        assert!(pattern.matches(":execution:"));
        assert!(!pattern.matches("app:workflow:9"));
    }

    #[test]
    fn test_no_wildcard_is_exact_match() {
        let pattern = KeyPattern::compile("wf:1").unwrap();
        assert!(pattern.matches("wf:1"));
        assert!(!pattern.matches("wf:12"));
        assert_eq!(pattern.listing_prefix(), "wf:1");
    }

    #[test]
    fn test_metacharacters_are_literal() {
        let pattern = KeyPattern::compile("wf.(1)*").unwrap();
        assert!(pattern.matches("wf.(1):x"));
        // '.' must not act as a regex wildcard
        assert!(!pattern.matches("wfx(1):x"));
    }

    #[test]
    fn test_listing_prefix_stops_at_first_wildcard() {
        let pattern = KeyPattern::compile("app:wf:*:meta:*").unwrap();
        assert_eq!(pattern.listing_prefix(), "app:wf:");
    }

    #[test]
    fn test_like_translation_escapes_sql_wildcards() {
        let pattern = KeyPattern::compile("a_b%c\\d:*").unwrap();
        assert_eq!(pattern.to_like(), "a\\_b\\%c\\\\d:%");
    }

    #[test]
    fn test_empty_pattern_rejected() {
        assert!(matches!(
            KeyPattern::compile(""),
            Err(FlowgateError::InvalidPattern { .. })
        ));
    }
}

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;
use regex::Regex;

use crate::core::{ModelError, Result};

const PATTERN_CACHE_SIZE: usize = 200;

lazy_static::lazy_static! {
    static ref LIKE_PATTERNS: Mutex<LruCache<String, Arc<Regex>>> = Mutex::new(LruCache::new(
        NonZeroUsize::new(PATTERN_CACHE_SIZE).unwrap_or(NonZeroUsize::MIN)
    ));
}

/// Translates a SQL `LIKE` pattern (`%`, `_`, `\` escapes) into an anchored regex.
fn like_to_regex(pattern: &str) -> String {
    let mut regex = String::with_capacity(pattern.len() + 2);
    regex.push('^');

    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '%' => regex.push_str(".*"),
            '_' => regex.push('.'),
            '\\' => match chars.next() {
                Some(escaped) => regex.push_str(&regex::escape(&escaped.to_string())),
                None => regex.push_str(r"\\"),
            },
            c => regex.push_str(&regex::escape(&c.to_string())),
        }
    }

    regex.push('$');
    regex
}

/// Prefix/suffix/substring patterns without `_` never need a regex.
fn fast_path(text: &str, pattern: &str, case_insensitive: bool) -> Option<bool> {
    if pattern.contains('_') || pattern.contains('\\') {
        return None;
    }

    let (text, pattern) = if case_insensitive {
        (text.to_lowercase(), pattern.to_lowercase())
    } else {
        (text.to_string(), pattern.to_string())
    };

    match pattern.matches('%').count() {
        0 => Some(text == pattern),
        1 if pattern.ends_with('%') => Some(text.starts_with(&pattern[..pattern.len() - 1])),
        1 if pattern.starts_with('%') => Some(text.ends_with(&pattern[1..])),
        2 if pattern.len() >= 2 && pattern.starts_with('%') && pattern.ends_with('%') => {
            Some(text.contains(&pattern[1..pattern.len() - 1]))
        }
        _ => None,
    }
}

fn compiled(pattern: &str, case_insensitive: bool) -> Result<Arc<Regex>> {
    let key = format!("{}:{}", if case_insensitive { 'i' } else { 's' }, pattern);

    if let Some(regex) = LIKE_PATTERNS.lock()?.get(&key) {
        return Ok(Arc::clone(regex));
    }

    let regex = regex::RegexBuilder::new(&like_to_regex(pattern))
        .case_insensitive(case_insensitive)
        .build()
        .map_err(|e| ModelError::ParseError(format!("Invalid LIKE pattern: {}", e)))?;
    let regex = Arc::new(regex);

    LIKE_PATTERNS.lock()?.put(key, Arc::clone(&regex));
    Ok(regex)
}

pub fn like(text: &str, pattern: &str, case_insensitive: bool) -> Result<bool> {
    if let Some(result) = fast_path(text, pattern, case_insensitive) {
        return Ok(result);
    }
    Ok(compiled(pattern, case_insensitive)?.is_match(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_fast_paths() {
        assert!(like("downtown", "down%", false).unwrap());
        assert!(like("downtown", "%town", false).unwrap());
        assert!(like("downtown", "%wnt%", false).unwrap());
        assert!(!like("downtown", "up%", false).unwrap());
        assert!(like("DOWNTOWN", "down%", true).unwrap());
    }

    #[test]
    fn test_like_regex_path() {
        assert!(like("route 12", "route __", false).unwrap());
        assert!(!like("route 123", "route __", false).unwrap());
        assert!(like("a.b", "a.%", false).unwrap());
        assert!(like("50%", r"50\%", false).unwrap());
    }
}

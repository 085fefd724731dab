//! Cached regular expressions for identifier checks and LIKE matching.

use regex::Regex;
use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

const IDENTIFIER_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]*$";

/// Most patterns kept compiled at once. LIKE patterns come from callers, so
/// past this point new ones are compiled per call and not retained.
const CACHE_CAPACITY: usize = 256;

/// Thread-safe, bounded cache of compiled patterns.
struct RegexCache {
    cache: RwLock<HashMap<String, Regex>>,
}

impl RegexCache {
    fn new() -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn get_or_compile(&self, pattern: &str) -> Result<Regex, regex::Error> {
        // Recover from a poisoned lock: the map is never left half-written.
        {
            let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
            if let Some(regex) = cache.get(pattern) {
                return Ok(regex.clone());
            }
        }

        let regex = Regex::new(pattern)?;
        {
            let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
            if cache.len() < CACHE_CAPACITY {
                cache.insert(pattern.to_string(), regex.clone());
            }
        }
        Ok(regex)
    }
}

fn regex_cache() -> &'static RegexCache {
    static CACHE: OnceLock<RegexCache> = OnceLock::new();
    CACHE.get_or_init(RegexCache::new)
}

/// Is `name` a plain SQL identifier (letters, digits, underscores)?
pub(crate) fn is_identifier(name: &str) -> bool {
    match regex_cache().get_or_compile(IDENTIFIER_PATTERN) {
        Ok(regex) => regex.is_match(name),
        Err(e) => {
            tracing::warn!(error = %e, "identifier pattern failed to compile");
            false
        }
    }
}

/// Translate a SQL LIKE pattern into an anchored regex.
fn like_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push_str("(?s)^");
    let mut buf = [0u8; 4];
    for ch in pattern.chars() {
        match ch {
            '%' => out.push_str(".*"),
            '_' => out.push('.'),
            other => out.push_str(&regex::escape(other.encode_utf8(&mut buf))),
        }
    }
    out.push('$');
    out
}

/// Does `value` match the SQL LIKE `pattern`?
pub(crate) fn like_matches(value: &str, pattern: &str) -> Result<bool, regex::Error> {
    let regex = regex_cache().get_or_compile(&like_to_regex(pattern))?;
    Ok(regex.is_match(value))
}

//! LIKE pattern matching: `%` matches any run, `_` exactly one character.
//! The escape character defaults to backslash and must be a single
//! character. Collation decides case sensitivity; the engine default
//! (utf8mb4_0900_bin) is case-sensitive.

use crate::error::{Error, Result};
use regex::Regex;

/// Matches `text` against a LIKE `pattern`.
pub fn matches(text: &str, pattern: &str, escape: Option<char>, case_insensitive: bool) -> Result<bool> {
    let re = compile(pattern, escape, case_insensitive)?;
    Ok(re.is_match(text))
}

/// Translates a LIKE pattern into an anchored regex.
pub fn compile(pattern: &str, escape: Option<char>, case_insensitive: bool) -> Result<Regex> {
    let escape = escape.unwrap_or('\\');
    let mut out = String::from("^");
    if case_insensitive {
        out.insert_str(0, "(?is)");
    } else {
        out.insert_str(0, "(?s)");
    }
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        if c == escape {
            match chars.next() {
                Some(next) => out.push_str(&regex::escape(&next.to_string())),
                // A trailing escape matches itself.
                None => out.push_str(&regex::escape(&escape.to_string())),
            }
            continue;
        }
        match c {
            '%' => out.push_str(".*"),
            '_' => out.push('.'),
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');
    Regex::new(&out).map_err(|e| Error::InvalidValue(format!("invalid LIKE pattern: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcards() {
        assert!(matches("first row", "%row", None, false).unwrap());
        assert!(matches("abc", "a_c", None, false).unwrap());
        assert!(!matches("abc", "a_d", None, false).unwrap());
        assert!(matches("100%", "100\\%", None, false).unwrap());
    }

    #[test]
    fn custom_escape() {
        assert!(matches("50%", "50|%", Some('|'), false).unwrap());
        assert!(!matches("50x", "50|%", Some('|'), false).unwrap());
    }

    #[test]
    fn default_collation_is_case_sensitive() {
        assert!(!matches("ABC", "abc", None, false).unwrap());
        assert!(matches("ABC", "abc", None, true).unwrap());
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        assert!(matches("a.c", "a.c", None, false).unwrap());
        assert!(!matches("abc", "a.c", None, false).unwrap());
    }
}

//! REGEXP / RLIKE and REGEXP_REPLACE. Patterns are MySQL's POSIX-flavored
//! regular expressions, handed to the regex crate; invalid patterns error
//! at first use.

use crate::error::{Error, Result};
use regex::Regex;

pub fn compile(pattern: &str, case_insensitive: bool) -> Result<Regex> {
    let pattern = if case_insensitive {
        format!("(?i){}", pattern)
    } else {
        pattern.to_string()
    };
    Regex::new(&pattern).map_err(|e| Error::InvalidRegexp(e.to_string()))
}

pub fn matches(text: &str, pattern: &str, case_insensitive: bool) -> Result<bool> {
    Ok(compile(pattern, case_insensitive)?.is_match(text))
}

/// REGEXP_REPLACE(str, pat, repl, pos, occurrence, flags). `pos` is
/// 1-based; `occurrence` 0 replaces every match, n replaces only the n-th.
pub fn replace(
    text: &str,
    pattern: &str,
    replacement: &str,
    pos: usize,
    occurrence: usize,
    case_insensitive: bool,
) -> Result<String> {
    if pos == 0 || pos > text.chars().count() + 1 {
        return Err(Error::InvalidArgument(format!("REGEXP_REPLACE position {}", pos)));
    }
    let re = compile(pattern, case_insensitive)?;
    let split: usize = text.chars().take(pos - 1).map(|c| c.len_utf8()).sum();
    let (head, tail) = text.split_at(split);
    let replaced = if occurrence == 0 {
        re.replace_all(tail, replacement).into_owned()
    } else {
        let mut count = 0;
        let mut out = String::with_capacity(tail.len());
        let mut last = 0;
        for m in re.find_iter(tail) {
            count += 1;
            if count == occurrence {
                out.push_str(&tail[last..m.start()]);
                out.push_str(replacement);
                last = m.end();
                break;
            }
        }
        out.push_str(&tail[last..]);
        out
    };
    Ok(format!("{}{}", head, replaced))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_pattern_errors() {
        assert!(matches("x", "(", false).is_err());
    }

    #[test]
    fn case_flag() {
        assert!(matches("ABC", "abc", true).unwrap());
        assert!(!matches("ABC", "abc", false).unwrap());
    }

    #[test]
    fn replace_occurrences() {
        assert_eq!(replace("a b c b", "b", "X", 1, 0, false).unwrap(), "a X c X");
        assert_eq!(replace("a b c b", "b", "X", 1, 2, false).unwrap(), "a b c X");
        assert_eq!(replace("a b c b", "b", "X", 4, 1, false).unwrap(), "a b c X");
    }
}

//! JSON document semantics: MySQL's comparison precedence, path grammar,
//! normalized printing and copy-on-write mutation.
//!
//! Documents are `serde_json::Value`s. Printing normalizes to MySQL's form:
//! object keys sorted, `", "` after commas, `": "` after colons. Mutations
//! return a fresh document plus a changed flag and never alias their input.

use crate::error::{Error, Result};
use serde_json::Value as Json;
use std::cmp::Ordering;

/// MySQL's JSON type precedence, highest first: BOOLEAN, ARRAY, OBJECT,
/// STRING, NUMBER, NULL.
fn precedence(v: &Json) -> u8 {
    match v {
        Json::Bool(_) => 5,
        Json::Array(_) => 4,
        Json::Object(_) => 3,
        Json::String(_) => 2,
        Json::Number(_) => 1,
        Json::Null => 0,
    }
}

/// Total order over JSON documents.
pub fn compare(a: &Json, b: &Json) -> Ordering {
    let (pa, pb) = (precedence(a), precedence(b));
    if pa != pb {
        return pa.cmp(&pb);
    }
    match (a, b) {
        (Json::Bool(x), Json::Bool(y)) => x.cmp(y),
        (Json::Number(x), Json::Number(y)) => x
            .as_f64()
            .unwrap_or(f64::NAN)
            .partial_cmp(&y.as_f64().unwrap_or(f64::NAN))
            .unwrap_or(Ordering::Equal),
        (Json::String(x), Json::String(y)) => x.cmp(y),
        (Json::Array(x), Json::Array(y)) => {
            for (xe, ye) in x.iter().zip(y.iter()) {
                match compare(xe, ye) {
                    Ordering::Equal => continue,
                    other => return other,
                }
            }
            x.len().cmp(&y.len())
        }
        (Json::Object(x), Json::Object(y)) => {
            // Shorter objects sort first; ties break on sorted keys, then
            // values in key order.
            match x.len().cmp(&y.len()) {
                Ordering::Equal => {}
                other => return other,
            }
            let mut xk: Vec<&String> = x.keys().collect();
            let mut yk: Vec<&String> = y.keys().collect();
            xk.sort();
            yk.sort();
            match xk.cmp(&yk) {
                Ordering::Equal => {}
                other => return other,
            }
            for k in xk {
                match compare(&x[k], &y[k]) {
                    Ordering::Equal => continue,
                    other => return other,
                }
            }
            Ordering::Equal
        }
        (Json::Null, Json::Null) => Ordering::Equal,
        _ => Ordering::Equal,
    }
}

/// Prints a document in MySQL's normalized text form.
pub fn to_mysql_string(v: &Json) -> String {
    let mut out = String::new();
    write_json(v, &mut out);
    out
}

fn write_json(v: &Json, out: &mut String) {
    match v {
        Json::Null => out.push_str("null"),
        Json::Bool(true) => out.push_str("true"),
        Json::Bool(false) => out.push_str("false"),
        Json::Number(n) => out.push_str(&n.to_string()),
        Json::String(s) => out.push_str(&serde_json::to_string(s).unwrap_or_default()),
        Json::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_json(item, out);
            }
            out.push(']');
        }
        Json::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, k) in keys.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(&serde_json::to_string(k).unwrap_or_default());
                out.push_str(": ");
                write_json(&map[*k], out);
            }
            out.push('}');
        }
    }
}

/// One leg of a JSON path.
#[derive(Debug, Clone, PartialEq)]
pub enum PathLeg {
    /// `.name` or `."quoted name"`
    Member(String),
    /// `[n]`
    Index(usize),
    /// `[last]` or `[last-n]`
    Last(usize),
}

/// Parses a path of the form `$`, `$.a."b c"[0][last-1]`.
pub fn parse_path(path: &str) -> Result<Vec<PathLeg>> {
    let bad = || Error::InvalidJsonPath(path.to_string());
    let mut chars = path.trim().chars().peekable();
    if chars.next() != Some('$') {
        return Err(bad());
    }
    let mut legs = Vec::new();
    while let Some(&c) = chars.peek() {
        match c {
            '.' => {
                chars.next();
                match chars.peek() {
                    Some('"') => {
                        chars.next();
                        let mut name = String::new();
                        loop {
                            match chars.next() {
                                Some('"') => break,
                                Some('\\') => match chars.next() {
                                    Some(esc) => name.push(esc),
                                    None => return Err(bad()),
                                },
                                Some(ch) => name.push(ch),
                                None => return Err(bad()),
                            }
                        }
                        legs.push(PathLeg::Member(name));
                    }
                    Some(_) => {
                        let mut name = String::new();
                        while let Some(&ch) = chars.peek() {
                            if ch == '.' || ch == '[' {
                                break;
                            }
                            name.push(ch);
                            chars.next();
                        }
                        if name.is_empty() {
                            return Err(bad());
                        }
                        legs.push(PathLeg::Member(name));
                    }
                    None => return Err(bad()),
                }
            }
            '[' => {
                chars.next();
                let mut inner = String::new();
                loop {
                    match chars.next() {
                        Some(']') => break,
                        Some(ch) => inner.push(ch),
                        None => return Err(bad()),
                    }
                }
                let inner = inner.trim();
                if let Some(rest) = inner.strip_prefix("last") {
                    let rest = rest.trim();
                    if rest.is_empty() {
                        legs.push(PathLeg::Last(0));
                    } else if let Some(n) = rest.strip_prefix('-') {
                        let n: usize = n.trim().parse().map_err(|_| bad())?;
                        legs.push(PathLeg::Last(n));
                    } else {
                        return Err(bad());
                    }
                } else {
                    let n: usize = inner.parse().map_err(|_| bad())?;
                    legs.push(PathLeg::Index(n));
                }
            }
            _ => return Err(bad()),
        }
    }
    Ok(legs)
}

fn array_index(arr_len: usize, leg: &PathLeg) -> Option<usize> {
    match leg {
        PathLeg::Index(n) => Some(*n),
        PathLeg::Last(off) => arr_len.checked_sub(1 + off),
        PathLeg::Member(_) => None,
    }
}

/// Looks up a path in a document. Returns None when the path does not exist.
pub fn lookup<'a>(doc: &'a Json, legs: &[PathLeg]) -> Option<&'a Json> {
    let mut cur = doc;
    for leg in legs {
        match (cur, leg) {
            (Json::Object(map), PathLeg::Member(name)) => cur = map.get(name)?,
            (Json::Array(items), leg) => {
                let idx = array_index(items.len(), leg)?;
                cur = items.get(idx)?;
            }
            // MySQL treats a scalar as a one-element array for `[0]`.
            (scalar, PathLeg::Index(0)) if !matches!(scalar, Json::Object(_)) => {}
            _ => return None,
        }
    }
    Some(cur)
}

/// How a mutation treats existing and missing path targets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SetMode {
    /// JSON_SET: create or overwrite.
    Set,
    /// JSON_INSERT: create only, never overwrite.
    Insert,
    /// JSON_REPLACE: overwrite only, never create.
    Replace,
}

/// Applies one path assignment. Returns the (possibly new) document and
/// whether anything changed.
pub fn apply_set(doc: &Json, legs: &[PathLeg], new_value: Json, mode: SetMode) -> Result<(Json, bool)> {
    if legs.is_empty() {
        // `$` names the whole document.
        return match mode {
            SetMode::Insert => Ok((doc.clone(), false)),
            _ => Ok((new_value, true)),
        };
    }
    let mut out = doc.clone();
    let changed = set_rec(&mut out, legs, new_value, mode)?;
    Ok((out, changed))
}

fn set_rec(cur: &mut Json, legs: &[PathLeg], new_value: Json, mode: SetMode) -> Result<bool> {
    let (leg, rest) = legs.split_first().expect("nonempty path");
    let last = rest.is_empty();
    match leg {
        PathLeg::Member(name) => {
            if !matches!(cur, Json::Object(_)) {
                return Ok(false);
            }
            let Json::Object(map) = cur else { unreachable!() };
            match map.get_mut(name) {
                Some(slot) => {
                    if last {
                        if mode == SetMode::Insert {
                            return Ok(false);
                        }
                        if *slot == new_value {
                            return Ok(false);
                        }
                        *slot = new_value;
                        return Ok(true);
                    }
                    set_rec(slot, rest, new_value, mode)
                }
                None => {
                    if last && mode != SetMode::Replace {
                        map.insert(name.clone(), new_value);
                        return Ok(true);
                    }
                    Ok(false)
                }
            }
        }
        leg => {
            // Array leg. A non-array target is auto-wrapped when the index
            // walks past position zero, per MySQL's rules.
            if !matches!(cur, Json::Array(_)) {
                let idx = array_index(1, leg);
                if idx == Some(0) {
                    if last {
                        if mode == SetMode::Insert {
                            return Ok(false);
                        }
                        if *cur == new_value {
                            return Ok(false);
                        }
                        *cur = new_value;
                        return Ok(true);
                    }
                    return set_rec(cur, rest, new_value, mode);
                }
                if last && mode != SetMode::Replace {
                    // Promote the scalar into an array and append.
                    let old = cur.take();
                    *cur = Json::Array(vec![old, new_value]);
                    return Ok(true);
                }
                return Ok(false);
            }
            let Json::Array(items) = cur else { unreachable!() };
            match array_index(items.len(), leg) {
                Some(idx) if idx < items.len() => {
                    if last {
                        if mode == SetMode::Insert {
                            return Ok(false);
                        }
                        if items[idx] == new_value {
                            return Ok(false);
                        }
                        items[idx] = new_value;
                        return Ok(true);
                    }
                    set_rec(&mut items[idx], rest, new_value, mode)
                }
                _ => {
                    // Out of range appends for set/insert on the last leg.
                    if last && mode != SetMode::Replace {
                        items.push(new_value);
                        return Ok(true);
                    }
                    Ok(false)
                }
            }
        }
    }
}

/// JSON_REMOVE for one path. Removing `$` itself is an error.
pub fn apply_remove(doc: &Json, legs: &[PathLeg]) -> Result<(Json, bool)> {
    if legs.is_empty() {
        return Err(Error::InvalidJsonPath("$".to_string()));
    }
    let mut out = doc.clone();
    let changed = remove_rec(&mut out, legs);
    Ok((out, changed))
}

fn remove_rec(cur: &mut Json, legs: &[PathLeg]) -> bool {
    let (leg, rest) = legs.split_first().expect("nonempty path");
    let last = rest.is_empty();
    match (cur, leg) {
        (Json::Object(map), PathLeg::Member(name)) => {
            if last {
                return map.remove(name).is_some();
            }
            match map.get_mut(name) {
                Some(slot) => remove_rec(slot, rest),
                None => false,
            }
        }
        (Json::Array(items), leg) => match array_index(items.len(), leg) {
            Some(idx) if idx < items.len() => {
                if last {
                    items.remove(idx);
                    return true;
                }
                remove_rec(&mut items[idx], rest)
            }
            _ => false,
        },
        _ => false,
    }
}

/// JSON_ARRAY_APPEND: appends to the array at the path, promoting a scalar
/// target into an array first.
pub fn apply_array_append(doc: &Json, legs: &[PathLeg], new_value: Json) -> Result<(Json, bool)> {
    let mut out = doc.clone();
    let target = match legs.is_empty() {
        true => Some(&mut out),
        false => lookup_mut(&mut out, legs),
    };
    match target {
        Some(slot) => {
            match slot {
                Json::Array(items) => items.push(new_value),
                other => {
                    let old = other.take();
                    *other = Json::Array(vec![old, new_value]);
                }
            }
            Ok((out, true))
        }
        None => Ok((out, false)),
    }
}

/// JSON_ARRAY_INSERT: the final leg must be an array index; inserts before
/// that position, clamping to the end.
pub fn apply_array_insert(doc: &Json, legs: &[PathLeg], new_value: Json) -> Result<(Json, bool)> {
    let Some((last, prefix)) = legs.split_last() else {
        return Err(Error::InvalidJsonPath("$".to_string()));
    };
    if matches!(last, PathLeg::Member(_)) {
        return Err(Error::InvalidJsonPath("array insert requires an array cell path".into()));
    }
    let mut out = doc.clone();
    let target = match prefix.is_empty() {
        true => Some(&mut out),
        false => lookup_mut(&mut out, prefix),
    };
    match target {
        Some(Json::Array(items)) => {
            let idx = match last {
                PathLeg::Index(n) => (*n).min(items.len()),
                PathLeg::Last(off) => items.len().saturating_sub(1 + off),
                PathLeg::Member(_) => unreachable!(),
            };
            items.insert(idx, new_value);
            Ok((out, true))
        }
        _ => Ok((out, false)),
    }
}

fn lookup_mut<'a>(doc: &'a mut Json, legs: &[PathLeg]) -> Option<&'a mut Json> {
    let mut cur = doc;
    for leg in legs {
        match (cur, leg) {
            (Json::Object(map), PathLeg::Member(name)) => cur = map.get_mut(name)?,
            (Json::Array(items), leg) => {
                let idx = array_index(items.len(), leg)?;
                cur = items.get_mut(idx)?;
            }
            _ => return None,
        }
    }
    Some(cur)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalized_printing_sorts_keys() {
        let doc: Json = serde_json::from_str(r#"{"b":2,"a":1}"#).unwrap();
        assert_eq!(to_mysql_string(&doc), r#"{"a": 1, "b": 2}"#);
    }

    #[test]
    fn print_parse_round_trip() {
        let cases = [
            json!(null),
            json!(true),
            json!(1.5),
            json!("x"),
            json!([1, [2, 3], {"k": "v"}]),
            json!({"b": 2, "a": {"c": [null]}}),
        ];
        for doc in cases {
            let printed = to_mysql_string(&doc);
            let reparsed: Json = serde_json::from_str(&printed).unwrap();
            assert_eq!(reparsed, doc);
        }
    }

    #[test]
    fn precedence_ordering() {
        assert_eq!(compare(&json!(true), &json!([0])), Ordering::Greater);
        assert_eq!(compare(&json!([0]), &json!({"a": 0})), Ordering::Greater);
        assert_eq!(compare(&json!({"a": 0}), &json!("a")), Ordering::Greater);
        assert_eq!(compare(&json!("a"), &json!(0)), Ordering::Greater);
        assert_eq!(compare(&json!(0), &json!(null)), Ordering::Greater);
    }

    #[test]
    fn path_parsing() {
        assert_eq!(parse_path("$").unwrap(), vec![]);
        assert_eq!(parse_path("$.a").unwrap(), vec![PathLeg::Member("a".into())]);
        assert_eq!(
            parse_path(r#"$."a b"[0][last-2]"#).unwrap(),
            vec![PathLeg::Member("a b".into()), PathLeg::Index(0), PathLeg::Last(2)]
        );
        assert!(parse_path("a.b").is_err());
        assert!(parse_path("$[x]").is_err());
    }

    #[test]
    fn set_insert_replace_semantics() {
        let doc = json!({"a": 1});
        let legs = parse_path("$.b").unwrap();
        let (set, changed) = apply_set(&doc, &legs, json!(42), SetMode::Set).unwrap();
        assert!(changed);
        assert_eq!(set, json!({"a": 1, "b": 42}));

        let legs_a = parse_path("$.a").unwrap();
        let (ins, changed) = apply_set(&doc, &legs_a, json!(42), SetMode::Insert).unwrap();
        assert!(!changed);
        assert_eq!(ins, json!({"a": 1}));

        let (rep, changed) = apply_set(&doc, &legs, json!(42), SetMode::Replace).unwrap();
        assert!(!changed);
        assert_eq!(rep, json!({"a": 1}));
    }

    #[test]
    fn mutations_never_alias_input() {
        let doc = json!({"a": [1, 2]});
        let legs = parse_path("$.a[0]").unwrap();
        let (mutated, changed) = apply_set(&doc, &legs, json!(9), SetMode::Set).unwrap();
        assert!(changed);
        assert_eq!(doc, json!({"a": [1, 2]}));
        assert_eq!(mutated, json!({"a": [9, 2]}));
    }

    #[test]
    fn remove_and_array_ops() {
        let doc = json!({"a": [1, 2, 3]});
        let (out, changed) = apply_remove(&doc, &parse_path("$.a[last]").unwrap()).unwrap();
        assert!(changed);
        assert_eq!(out, json!({"a": [1, 2]}));

        let (out, changed) = apply_array_append(&doc, &parse_path("$.a").unwrap(), json!(4)).unwrap();
        assert!(changed);
        assert_eq!(out, json!({"a": [1, 2, 3, 4]}));

        let (out, changed) = apply_array_insert(&doc, &parse_path("$.a[1]").unwrap(), json!(9)).unwrap();
        assert!(changed);
        assert_eq!(out, json!({"a": [1, 9, 2, 3]}));
    }

    #[test]
    fn scalar_promotes_to_array_on_append() {
        let doc = json!({"a": 1});
        let (out, changed) = apply_array_append(&doc, &parse_path("$.a").unwrap(), json!(2)).unwrap();
        assert!(changed);
        assert_eq!(out, json!({"a": [1, 2]}));
    }
}

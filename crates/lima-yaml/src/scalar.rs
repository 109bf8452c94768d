//! Plain scalar resolution and quoting decisions.

use once_cell::sync::Lazy;
use regex::Regex;

/// The typed reading of a scalar under the YAML 1.2 core schema.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResolvedScalar<'a> {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(&'a str),
}

static INT_DECIMAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-+]?[0-9]+$").unwrap());
static INT_OCTAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^0o[0-7]+$").unwrap());
static INT_HEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^0x[0-9a-fA-F]+$").unwrap());
static FLOAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[-+]?(\.[0-9]+|[0-9]+(\.[0-9]*)?)([eE][-+]?[0-9]+)?$").unwrap()
});

/// Resolve the text of a plain scalar.
///
/// Integers that overflow `i64` are read as floats.
pub fn resolve_plain(text: &str) -> ResolvedScalar<'_> {
    match text {
        "" | "~" | "null" | "Null" | "NULL" => return ResolvedScalar::Null,
        "true" | "True" | "TRUE" => return ResolvedScalar::Bool(true),
        "false" | "False" | "FALSE" => return ResolvedScalar::Bool(false),
        ".inf" | ".Inf" | ".INF" | "+.inf" | "+.Inf" | "+.INF" => {
            return ResolvedScalar::Float(f64::INFINITY);
        }
        "-.inf" | "-.Inf" | "-.INF" => return ResolvedScalar::Float(f64::NEG_INFINITY),
        ".nan" | ".NaN" | ".NAN" => return ResolvedScalar::Float(f64::NAN),
        _ => {}
    }

    if INT_DECIMAL.is_match(text) {
        return match text.parse::<i64>() {
            Ok(i) => ResolvedScalar::Int(i),
            Err(_) => text
                .parse::<f64>()
                .map_or(ResolvedScalar::Str(text), ResolvedScalar::Float),
        };
    }
    if INT_OCTAL.is_match(text) {
        if let Ok(i) = i64::from_str_radix(&text[2..], 8) {
            return ResolvedScalar::Int(i);
        }
    }
    if INT_HEX.is_match(text) {
        if let Ok(i) = i64::from_str_radix(&text[2..], 16) {
            return ResolvedScalar::Int(i);
        }
    }
    if FLOAT.is_match(text) {
        if let Ok(f) = text.parse::<f64>() {
            return ResolvedScalar::Float(f);
        }
    }
    ResolvedScalar::Str(text)
}

/// Whether `value` must be quoted to be read back as the same string.
///
/// `in_flow` adds the flow indicators `,[]{}` to the characters that force
/// quoting.
pub fn needs_quotes(value: &str, in_flow: bool) -> bool {
    let Some(first) = value.chars().next() else {
        return true;
    };
    if !matches!(resolve_plain(value), ResolvedScalar::Str(_)) {
        return true;
    }
    if first.is_whitespace() || value.ends_with(char::is_whitespace) {
        return true;
    }
    let second_is_space = value.chars().nth(1).is_none_or(char::is_whitespace);
    match first {
        '-' | '?' | ':' if second_is_space => return true,
        ',' | '[' | ']' | '{' | '}' | '#' | '&' | '*' | '!' | '|' | '>' | '\'' | '"' | '%'
        | '@' | '`' => return true,
        _ => {}
    }
    if value.contains(": ") || value.contains(" #") || value.ends_with(':') {
        return true;
    }
    if value.chars().any(|c| c.is_control()) {
        return true;
    }
    in_flow && value.contains([',', '[', ']', '{', '}'])
}

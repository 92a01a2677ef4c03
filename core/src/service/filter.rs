//! LDAP-like filter language for service property matching.
//!
//! Grammar (a small subset of RFC 4515):
//!
//! ```text
//! filter      := '(' filter-comp ')'
//! filter-comp := and | or | not | item
//! and         := '&' filter+
//! or          := '|' filter+
//! not         := '!' filter
//! item        := attr ('=' | '>=' | '<=') value
//! ```

use std::fmt;

use forge_abi::{HeaderValue, Properties};

#[derive(Debug, Clone, PartialEq)]
pub enum FilterError {
    UnexpectedEnd,
    UnexpectedToken(String),
    EmptyExpression,
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterError::UnexpectedEnd => write!(f, "unexpected end of filter expression"),
            FilterError::UnexpectedToken(t) => write!(f, "unexpected token: {t}"),
            FilterError::EmptyExpression => write!(f, "empty filter expression"),
        }
    }
}

impl std::error::Error for FilterError {}

#[derive(Debug, Clone, PartialEq)]
enum Op {
    Eq,
    Ge,
    Le,
}

/// A parsed filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Item { attr: String, op: Op, value: String },
}

impl Filter {
    pub fn parse(input: &str) -> Result<Self, FilterError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(FilterError::EmptyExpression);
        }
        let mut chars: Vec<char> = trimmed.chars().collect();
        let (filter, rest) = parse_filter(&mut chars[..])?;
        if !rest.is_empty() {
            return Err(FilterError::UnexpectedToken(rest.iter().collect()));
        }
        Ok(filter)
    }

    /// Evaluates the filter against a property bag, using
    /// case-sensitive string comparison for `=` and lexical comparison
    /// (numeric when both sides parse as integers) for `>=`/`<=`
    ///.
    pub fn matches(&self, properties: &Properties) -> bool {
        match self {
            Filter::And(items) => items.iter().all(|f| f.matches(properties)),
            Filter::Or(items) => items.iter().any(|f| f.matches(properties)),
            Filter::Not(inner) => !inner.matches(properties),
            Filter::Item { attr, op, value } => {
                let Some(actual) = properties.get(attr.as_str()) else {
                    return false;
                };
                match op {
                    Op::Eq => header_eq(actual, value),
                    Op::Ge => header_cmp(actual, value).is_ge(),
                    Op::Le => header_cmp(actual, value).is_le(),
                }
            }
        }
    }
}

/// `expected` may be a bare presence test (`*`) or contain embedded `*`
/// wildcards for substring matching; otherwise it is a literal equality
/// test.
fn header_eq(actual: &HeaderValue, expected: &str) -> bool {
    if expected == "*" {
        return true;
    }
    if expected.contains('*') {
        return match actual {
            HeaderValue::String(s) => glob_matches(expected, s),
            HeaderValue::Integer(i) => glob_matches(expected, &i.to_string()),
            HeaderValue::Bool(b) => glob_matches(expected, &b.to_string()),
            HeaderValue::List(items) => items.iter().any(|item| header_eq(item, expected)),
            HeaderValue::Map(_) => false,
        };
    }
    match actual {
        HeaderValue::String(s) => s == expected,
        HeaderValue::Integer(i) => expected.parse::<i64>().map(|e| e == *i).unwrap_or(false),
        HeaderValue::Bool(b) => expected.parse::<bool>().map(|e| e == *b).unwrap_or(false),
        HeaderValue::List(items) => items.iter().any(|item| header_eq(item, expected)),
        HeaderValue::Map(_) => false,
    }
}

/// Matches `value` against a pattern containing zero or more `*`
/// wildcards, each matching any run of characters (including none).
fn glob_matches(pattern: &str, value: &str) -> bool {
    let segments: Vec<&str> = pattern.split('*').collect();
    let anchored_start = !pattern.starts_with('*');
    let anchored_end = !pattern.ends_with('*');

    let mut rest = value;
    for (i, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            continue;
        }
        if i == 0 && anchored_start {
            if !rest.starts_with(segment) {
                return false;
            }
            rest = &rest[segment.len()..];
            continue;
        }
        if i == segments.len() - 1 && anchored_end {
            return rest.ends_with(segment);
        }
        match rest.find(segment) {
            Some(pos) => rest = &rest[pos + segment.len()..],
            None => return false,
        }
    }
    true
}

fn header_cmp(actual: &HeaderValue, expected: &str) -> std::cmp::Ordering {
    match actual {
        HeaderValue::Integer(i) => expected
            .parse::<i64>()
            .map(|e| i.cmp(&e))
            .unwrap_or(std::cmp::Ordering::Less),
        HeaderValue::String(s) => s.as_str().cmp(expected),
        _ => std::cmp::Ordering::Less,
    }
}

fn skip_ws(chars: &[char]) -> &[char] {
    let mut i = 0;
    while i < chars.len() && chars[i].is_whitespace() {
        i += 1;
    }
    &chars[i..]
}

fn parse_filter(chars: &[char]) -> Result<(Filter, &[char]), FilterError> {
    let chars = skip_ws(chars);
    let (first, rest) = chars.split_first().ok_or(FilterError::UnexpectedEnd)?;
    if *first != '(' {
        return Err(FilterError::UnexpectedToken(first.to_string()));
    }
    let rest = skip_ws(rest);
    let (op, rest) = rest.split_first().ok_or(FilterError::UnexpectedEnd)?;

    let (filter, rest) = match op {
        '&' | '|' => {
            let mut items = Vec::new();
            let mut remaining = rest;
            loop {
                remaining = skip_ws(remaining);
                if remaining.first() == Some(&')') {
                    break;
                }
                let (item, next) = parse_filter(remaining)?;
                items.push(item);
                remaining = next;
            }
            let filter = if *op == '&' {
                Filter::And(items)
            } else {
                Filter::Or(items)
            };
            (filter, remaining)
        }
        '!' => {
            let (inner, remaining) = parse_filter(rest)?;
            (Filter::Not(Box::new(inner)), remaining)
        }
        _ => parse_item(chars)?,
    };

    let rest = skip_ws(rest);
    let (close, rest) = rest.split_first().ok_or(FilterError::UnexpectedEnd)?;
    if *close != ')' {
        return Err(FilterError::UnexpectedToken(close.to_string()));
    }
    Ok((filter, rest))
}

fn parse_item(chars: &[char]) -> Result<(Filter, &[char]), FilterError> {
    // chars starts at '(' here (re-entered from parse_filter for the
    // default branch); strip it and scan for the operator and closing ')'.
    let (open, rest) = chars.split_first().ok_or(FilterError::UnexpectedEnd)?;
    debug_assert_eq!(*open, '(');

    let end = rest
        .iter()
        .position(|c| *c == ')')
        .ok_or(FilterError::UnexpectedEnd)?;
    let body: String = rest[..end].iter().collect();

    let (attr, op, value) = if let Some(idx) = body.find(">=") {
        (&body[..idx], Op::Ge, &body[idx + 2..])
    } else if let Some(idx) = body.find("<=") {
        (&body[..idx], Op::Le, &body[idx + 2..])
    } else if let Some(idx) = body.find('=') {
        (&body[..idx], Op::Eq, &body[idx + 1..])
    } else {
        return Err(FilterError::UnexpectedToken(body));
    };

    Ok((
        Filter::Item {
            attr: attr.trim().to_ascii_lowercase(),
            op,
            value: value.trim().to_owned(),
        },
        &rest[end..],
    ))
}

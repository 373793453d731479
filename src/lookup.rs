//! Lookup operators for the filter DSL
//!
//! A static registry of named binary predicates keyed by the suffix of a
//! `field__operator` criteria key. Unknown suffixes are rejected, and keys
//! with more than one suffix segment (`field__sub__op`) are rejected
//! outright rather than misinterpreted.

use crate::error::{Error, Result};
use crate::record::Value;

/// A lookup predicate over (actual value, supplied argument)
pub type LookupFn = fn(&Value, &Value) -> bool;

/// The registry: suffix name -> predicate
pub static LOOKUPS: &[(&str, LookupFn)] = &[
    // strings
    ("startswith", starts_with),
    ("istartswith", istarts_with),
    ("endswith", ends_with),
    ("iendswith", iends_with),
    ("exact", exact),
    ("iexact", iexact),
    ("contains", contains),
    ("icontains", icontains),
    // nulls / truthiness
    ("bool", truthy_eq),
    ("isnull", is_null),
    ("isnotnull", truthy_eq),
    // numbers and dates
    ("gt", gt),
    ("gte", gte),
    ("lt", lt),
    ("lte", lte),
    ("range", range),
    // date components
    ("year", year),
    ("month", month),
];

/// A parsed criteria key.
#[derive(Clone, Copy)]
pub enum ParsedKey<'a> {
    /// Bare field name: plain equality
    Field(&'a str),
    /// `field__operator`: dispatch through the registry
    Lookup { field: &'a str, apply: LookupFn },
}

/// Parse a criteria key into a field and an optional operator.
pub fn parse_key(key: &str) -> Result<ParsedKey<'_>> {
    let mut segments = key.split("__");
    let field = segments.next().unwrap_or(key);

    let Some(suffix) = segments.next() else {
        return Ok(ParsedKey::Field(field));
    };

    if segments.next().is_some() {
        return Err(Error::ChainedLookup {
            key: key.to_string(),
        });
    }

    let apply = LOOKUPS
        .iter()
        .find(|(name, _)| *name == suffix)
        .map(|(_, apply)| *apply)
        .ok_or_else(|| Error::UnsupportedLookup {
            suffix: suffix.to_string(),
        })?;

    Ok(ParsedKey::Lookup { field, apply })
}

// String predicates match only when both operands are strings; an absent
// attribute (null) never matches.

fn both_strs<'a>(x: &'a Value, y: &'a Value) -> Option<(&'a str, &'a str)> {
    Some((x.as_str()?, y.as_str()?))
}

fn starts_with(x: &Value, y: &Value) -> bool {
    both_strs(x, y).is_some_and(|(x, y)| x.starts_with(y))
}

fn istarts_with(x: &Value, y: &Value) -> bool {
    both_strs(x, y).is_some_and(|(x, y)| x.to_lowercase().starts_with(&y.to_lowercase()))
}

fn ends_with(x: &Value, y: &Value) -> bool {
    both_strs(x, y).is_some_and(|(x, y)| x.ends_with(y))
}

fn iends_with(x: &Value, y: &Value) -> bool {
    both_strs(x, y).is_some_and(|(x, y)| x.to_lowercase().ends_with(&y.to_lowercase()))
}

fn exact(x: &Value, y: &Value) -> bool {
    x == y
}

fn iexact(x: &Value, y: &Value) -> bool {
    both_strs(x, y).is_some_and(|(x, y)| x.to_lowercase() == y.to_lowercase())
}

fn contains(x: &Value, y: &Value) -> bool {
    match x {
        Value::Str(s) => y.as_str().is_some_and(|needle| s.contains(needle)),
        Value::List(items) => items.iter().any(|item| item == y),
        _ => false,
    }
}

fn icontains(x: &Value, y: &Value) -> bool {
    both_strs(x, y).is_some_and(|(x, y)| x.to_lowercase().contains(&y.to_lowercase()))
}

// Truthiness predicates: `bool` and `isnotnull` ask "does the value's
// truthiness equal the argument", `isnull` asks the opposite.

fn truthy_eq(x: &Value, y: &Value) -> bool {
    x.is_truthy() == y.is_truthy()
}

fn is_null(x: &Value, y: &Value) -> bool {
    !x.is_truthy() == y.is_truthy()
}

// Ordered comparisons; incomparable kinds never match.

fn gt(x: &Value, y: &Value) -> bool {
    x.compare(y) == Some(std::cmp::Ordering::Greater)
}

fn gte(x: &Value, y: &Value) -> bool {
    matches!(
        x.compare(y),
        Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal)
    )
}

fn lt(x: &Value, y: &Value) -> bool {
    x.compare(y) == Some(std::cmp::Ordering::Less)
}

fn lte(x: &Value, y: &Value) -> bool {
    matches!(
        x.compare(y),
        Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal)
    )
}

/// Inclusive on both ends. The inclusivity was never pinned down upstream;
/// current behavior is kept as-is.
fn range(x: &Value, y: &Value) -> bool {
    let Value::List(bounds) = y else {
        return false;
    };
    let [low, high] = bounds.as_slice() else {
        return false;
    };
    gte(x, low) && lte(x, high)
}

fn year(x: &Value, y: &Value) -> bool {
    x.year().is_some_and(|year| Value::Int(year) == *y)
}

fn month(x: &Value, y: &Value) -> bool {
    x.month().is_some_and(|month| Value::Int(month) == *y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn eval(key: &str, x: Value, y: Value) -> bool {
        match parse_key(key).unwrap() {
            ParsedKey::Lookup { apply, .. } => apply(&x, &y),
            ParsedKey::Field(_) => panic!("expected an operator key"),
        }
    }

    #[test]
    fn test_parse_bare_field() {
        assert!(matches!(parse_key("name").unwrap(), ParsedKey::Field("name")));
    }

    #[test]
    fn test_parse_unknown_suffix() {
        assert!(matches!(
            parse_key("name__almost"),
            Err(Error::UnsupportedLookup { .. })
        ));
    }

    #[test]
    fn test_parse_chained_rejected() {
        assert!(matches!(
            parse_key("random_date__year__gte"),
            Err(Error::ChainedLookup { .. })
        ));
    }

    #[test]
    fn test_string_ops() {
        assert!(eval("f__startswith", "Poland".into(), "P".into()));
        assert!(!eval("f__startswith", "Poland".into(), "p".into()));
        assert!(eval("f__istartswith", "Poland".into(), "p".into()));
        assert!(eval("f__iendswith", "Poland".into(), "AND".into()));
        assert!(eval("f__icontains", "Poland".into(), "OLA".into()));
        assert!(eval("f__iexact", "POLAND".into(), "poland".into()));
        // null never matches string ops
        assert!(!eval("f__contains", Value::Null, "x".into()));
    }

    #[test]
    fn test_numeric_ops() {
        assert!(eval("f__gt", 5.into(), 3.into()));
        assert!(eval("f__gte", 5.into(), 5.into()));
        assert!(eval("f__lt", 3.0.into(), 5.into()));
        assert!(!eval("f__lte", 6.into(), 5.into()));
        assert!(!eval("f__gt", "a".into(), 5.into()));
    }

    #[test]
    fn test_range_inclusive_both_ends() {
        let range = Value::range(3, 5);
        assert!(eval("f__range", 3.into(), range.clone()));
        assert!(eval("f__range", 5.into(), range.clone()));
        assert!(!eval("f__range", 7.into(), range));
    }

    #[test]
    fn test_truthiness_ops() {
        assert!(eval("f__bool", "Poland".into(), true.into()));
        assert!(eval("f__isnull", Value::Null, true.into()));
        assert!(!eval("f__isnull", "Poland".into(), true.into()));
        assert!(eval("f__isnotnull", "Poland".into(), true.into()));
    }

    #[test]
    fn test_date_components() {
        let date: Value = NaiveDate::from_ymd_opt(2018, 10, 13).unwrap().into();
        assert!(eval("f__year", date.clone(), 2018.into()));
        assert!(!eval("f__year", date.clone(), 2000.into()));
        assert!(eval("f__month", date, 10.into()));
    }
}

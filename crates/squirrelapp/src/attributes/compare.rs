//! The predicate engine.
//!
//! [`compare`] evaluates one named operator against an attribute value and a
//! target. Every backend's `search` goes through here, so all variants agree
//! on what a term means.
//!
//! | Operator | Scalars | TagSets |
//! |----------|---------|---------|
//! | `eq` | equality (int and float compare numerically) | equality |
//! | `lt` | `data <= target` | every group of `data` is a subset of the same group in `target` |
//! | `gt` | `data >= target` | every group of `target` is a subset of the same group in `data` |
//! | `in` | `data` is an element of the target list (substring for two strings) | - |
//! | `like` | regex search on string data (UUIDs stringified) | - |
//!
//! A missing group counts as the empty set, which makes `gt` and `lt` mirrors
//! of each other on TagSets: `compare(Gt, a, b) == compare(Lt, b, a)`.
//!
//! `Null` data (an unset optional field, or a read without data) never
//! satisfies `lt`, `gt` or `like`, nor `in` against a string.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use regex::Regex;

use super::AttrValue;
use crate::error::{Result, SquirrelError};
use crate::tags::TagSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Lt,
    Gt,
    In,
    Like,
}

impl Operator {
    pub const ALL: [Operator; 5] = [
        Operator::Eq,
        Operator::Lt,
        Operator::Gt,
        Operator::In,
        Operator::Like,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Lt => "lt",
            Operator::Gt => "gt",
            Operator::In => "in",
            Operator::Like => "like",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = SquirrelError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Operator::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| SquirrelError::UnsupportedOperator(s.to_string()))
    }
}

/// Evaluate `operator` by name.
///
/// Unknown operator names fail with [`SquirrelError::UnsupportedOperator`];
/// targets of the wrong shape fail with [`SquirrelError::Comparison`].
pub fn compare(operator: &str, data: &AttrValue, target: &AttrValue) -> Result<bool> {
    let op: Operator = operator.parse()?;
    compare_with(op, data, target)
}

/// Typed form of [`compare`].
pub fn compare_with(op: Operator, data: &AttrValue, target: &AttrValue) -> Result<bool> {
    compare_prepared(op, data, target, None)
}

/// Compile the regular expression a `like` target denotes.
pub(crate) fn like_pattern(target: &AttrValue) -> Result<Regex> {
    let AttrValue::Str(pattern) = target else {
        return Err(SquirrelError::Comparison(format!(
            "like target must be a string pattern, got {}",
            target.type_name()
        )));
    };
    Regex::new(pattern)
        .map_err(|e| SquirrelError::Comparison(format!("invalid pattern '{}': {}", pattern, e)))
}

/// Evaluation with an already-compiled `like` pattern, as used by search.
pub(crate) fn compare_prepared(
    op: Operator,
    data: &AttrValue,
    target: &AttrValue,
    pattern: Option<&Regex>,
) -> Result<bool> {
    match op {
        Operator::Eq => Ok(values_equal(data, target)),
        Operator::Lt => upper_bound(data, target),
        Operator::Gt => lower_bound(data, target),
        Operator::In => contains(target, data),
        Operator::Like => match pattern {
            Some(pattern) => like(data, pattern),
            None => like(data, &like_pattern(target)?),
        },
    }
}

pub(crate) fn values_equal(a: &AttrValue, b: &AttrValue) -> bool {
    match (a, b) {
        (AttrValue::Int(x), AttrValue::Float(y)) | (AttrValue::Float(y), AttrValue::Int(x)) => {
            (*x as f64) == *y
        }
        (AttrValue::List(xs), AttrValue::List(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        _ => a == b,
    }
}

fn upper_bound(data: &AttrValue, target: &AttrValue) -> Result<bool> {
    if let (AttrValue::Tags(data), AttrValue::Tags(target)) = (data, target) {
        return Ok(tags_within(data, target));
    }
    Ok(order(data, target)?.is_some_and(|o| o != Ordering::Greater))
}

fn lower_bound(data: &AttrValue, target: &AttrValue) -> Result<bool> {
    if let (AttrValue::Tags(data), AttrValue::Tags(target)) = (data, target) {
        return Ok(tags_within(target, data));
    }
    Ok(order(data, target)?.is_some_and(|o| o != Ordering::Less))
}

/// Every group of `inner` is a subset of the same group in `outer`.
fn tags_within(inner: &TagSet, outer: &TagSet) -> bool {
    inner.iter().all(|(group, tags)| match outer.get(group) {
        Some(allowed) => tags.is_subset(allowed),
        None => tags.is_empty(),
    })
}

/// Ordering of two comparable values, `None` when `data` is null.
fn order(data: &AttrValue, target: &AttrValue) -> Result<Option<Ordering>> {
    let ordering = match (data, target) {
        (AttrValue::Null, t) if orderable(t) => return Ok(None),
        (AttrValue::Int(x), AttrValue::Int(y)) => x.cmp(y),
        (AttrValue::Str(x), AttrValue::Str(y)) => x.cmp(y),
        (AttrValue::Time(x), AttrValue::Time(y)) => x.cmp(y),
        (AttrValue::Uuid(x), AttrValue::Uuid(y)) => x.cmp(y),
        (x, y) => match (x.as_f64(), y.as_f64()) {
            // NaN compares as neither bound
            (Some(x), Some(y)) => match x.partial_cmp(&y) {
                Some(o) => o,
                None => return Ok(None),
            },
            _ => return Err(mismatch("order", data, target)),
        },
    };
    Ok(Some(ordering))
}

fn orderable(value: &AttrValue) -> bool {
    matches!(
        value,
        AttrValue::Int(_)
            | AttrValue::Float(_)
            | AttrValue::Str(_)
            | AttrValue::Time(_)
            | AttrValue::Uuid(_)
            | AttrValue::Tags(_)
    )
}

fn contains(container: &AttrValue, item: &AttrValue) -> Result<bool> {
    match (container, item) {
        (AttrValue::List(items), item) => Ok(items.iter().any(|x| values_equal(x, item))),
        (AttrValue::Str(_), AttrValue::Null) => Ok(false),
        (AttrValue::Str(haystack), AttrValue::Str(needle)) => {
            Ok(haystack.contains(needle.as_str()))
        }
        (AttrValue::Str(_), _) => Err(mismatch("search within a string", item, container)),
        _ => Err(SquirrelError::Comparison(format!(
            "in target must be a list or string, got {}",
            container.type_name()
        ))),
    }
}

fn like(data: &AttrValue, pattern: &Regex) -> Result<bool> {
    if data.is_null() {
        return Ok(false);
    }
    match data.as_text() {
        Some(text) => Ok(pattern.is_match(&text)),
        None => Err(SquirrelError::Comparison(format!(
            "like is only defined on text, got {}",
            data.type_name()
        ))),
    }
}

fn mismatch(what: &str, data: &AttrValue, target: &AttrValue) -> SquirrelError {
    SquirrelError::Comparison(format!(
        "cannot {} {} against {}",
        what,
        data.type_name(),
        target.type_name()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use uuid::Uuid;

    fn tags(pairs: &[(u32, &[u32])]) -> AttrValue {
        AttrValue::Tags(
            pairs
                .iter()
                .map(|(g, ids)| (*g, ids.iter().copied().collect::<BTreeSet<_>>()))
                .collect(),
        )
    }

    #[test]
    fn eq_is_structural() {
        assert!(compare("eq", &AttrValue::Int(3), &AttrValue::Int(3)).unwrap());
        assert!(compare("eq", &AttrValue::Int(3), &AttrValue::Float(3.0)).unwrap());
        assert!(!compare("eq", &AttrValue::Str("a".into()), &AttrValue::Int(3)).unwrap());
        assert!(compare("eq", &AttrValue::Null, &AttrValue::Null).unwrap());
        assert!(compare("eq", &tags(&[(0, &[1])]), &tags(&[(0, &[1])])).unwrap());
    }

    #[test]
    fn scalar_bounds_are_inclusive() {
        assert!(compare("lt", &AttrValue::Float(1.0), &AttrValue::Float(1.0)).unwrap());
        assert!(compare("lt", &AttrValue::Int(1), &AttrValue::Float(1.5)).unwrap());
        assert!(!compare("lt", &AttrValue::Int(2), &AttrValue::Int(1)).unwrap());
        assert!(compare("gt", &AttrValue::Int(2), &AttrValue::Int(2)).unwrap());
        assert!(!compare("gt", &AttrValue::Float(0.5), &AttrValue::Int(1)).unwrap());
        assert!(compare("gt", &AttrValue::Str("b".into()), &AttrValue::Str("a".into())).unwrap());
    }

    #[test]
    fn null_never_satisfies_a_bound() {
        assert!(!compare("lt", &AttrValue::Null, &AttrValue::Int(5)).unwrap());
        assert!(!compare("gt", &AttrValue::Null, &AttrValue::Int(5)).unwrap());
    }

    #[test]
    fn ordering_mismatched_types_fails() {
        let err = compare("lt", &AttrValue::Str("a".into()), &AttrValue::Int(5)).unwrap_err();
        assert!(matches!(err, SquirrelError::Comparison(_)));
    }

    #[test]
    fn gt_on_tags_requires_requested_tags() {
        let one = tags(&[(0, &[0])]);
        let both = tags(&[(0, &[0, 1])]);
        assert!(compare("gt", &one, &one).unwrap());
        assert!(compare("gt", &both, &one).unwrap());
        assert!(!compare("gt", &one, &both).unwrap());
        // a group missing from data counts as empty
        assert!(!compare("gt", &tags(&[]), &one).unwrap());
        assert!(compare("gt", &one, &tags(&[])).unwrap());
    }

    #[test]
    fn lt_on_tags_limits_to_permitted_set() {
        let permitted = tags(&[(0, &[0, 1]), (1, &[3])]);
        assert!(compare("lt", &tags(&[(0, &[1])]), &permitted).unwrap());
        assert!(compare("lt", &tags(&[]), &permitted).unwrap());
        assert!(!compare("lt", &tags(&[(2, &[0])]), &permitted).unwrap());
        assert!(!compare("lt", &tags(&[(1, &[3, 4])]), &permitted).unwrap());
    }

    #[test]
    fn gt_and_lt_mirror_on_tags() {
        let samples = [
            tags(&[]),
            tags(&[(0, &[0])]),
            tags(&[(0, &[0, 1])]),
            tags(&[(0, &[1]), (1, &[2])]),
            tags(&[(1, &[])]),
        ];
        for a in &samples {
            for b in &samples {
                assert_eq!(
                    compare("gt", a, b).unwrap(),
                    compare("lt", b, a).unwrap(),
                    "a={} b={}",
                    a,
                    b
                );
            }
        }
    }

    #[test]
    fn in_checks_membership() {
        let list = AttrValue::List(vec![AttrValue::Int(1), AttrValue::Int(2)]);
        assert!(compare("in", &AttrValue::Int(2), &list).unwrap());
        assert!(compare("in", &AttrValue::Float(1.0), &list).unwrap());
        assert!(!compare("in", &AttrValue::Int(3), &list).unwrap());
        assert!(compare(
            "in",
            &AttrValue::Str("GUNB".into()),
            &AttrValue::Str("MGNT:GUNB:TEST0".into())
        )
        .unwrap());
    }

    #[test]
    fn in_requires_a_container() {
        let err = compare("in", &AttrValue::Int(2), &AttrValue::Int(2)).unwrap_err();
        assert!(matches!(err, SquirrelError::Comparison(_)));
    }

    #[test]
    fn like_searches_within_text() {
        let data = AttrValue::Str("MGNT:GUNB:TEST0".into());
        assert!(compare("like", &data, &AttrValue::Str("GUNB".into())).unwrap());
        assert!(compare("like", &data, &AttrValue::Str("^MGNT.*0$".into())).unwrap());
        assert!(!compare("like", &data, &AttrValue::Str("^GUNB".into())).unwrap());
        assert!(!compare("like", &AttrValue::Null, &AttrValue::Str("x".into())).unwrap());
    }

    #[test]
    fn like_stringifies_uuid() {
        let id = Uuid::parse_str("a1b2c3d4-0000-4000-8000-000000000001").unwrap();
        assert!(compare("like", &AttrValue::Uuid(id), &AttrValue::Str("^a1b2".into())).unwrap());
        assert!(compare("like", &AttrValue::Uuid(id), &AttrValue::Str("0001$".into())).unwrap());
    }

    #[test]
    fn like_on_number_fails() {
        let err = compare("like", &AttrValue::Int(5), &AttrValue::Str("x".into())).unwrap_err();
        assert!(matches!(err, SquirrelError::Comparison(_)));
    }

    #[test]
    fn like_with_numeric_target_fails() {
        let err = compare("like", &AttrValue::Str("5".into()), &AttrValue::Int(5)).unwrap_err();
        assert!(matches!(err, SquirrelError::Comparison(_)));
    }

    #[test]
    fn like_with_broken_pattern_fails() {
        let err = compare("like", &AttrValue::Str("a".into()), &AttrValue::Str("(".into()))
            .unwrap_err();
        assert!(matches!(err, SquirrelError::Comparison(_)));
    }

    #[test]
    fn unknown_operator_fails() {
        let err = compare("near", &AttrValue::Int(1), &AttrValue::Int(1)).unwrap_err();
        assert!(matches!(err, SquirrelError::UnsupportedOperator(op) if op == "near"));
        assert!(compare("isclose", &AttrValue::Int(1), &AttrValue::Int(1)).is_err());
    }
}

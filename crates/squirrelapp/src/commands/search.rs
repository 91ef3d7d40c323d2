//! Client-side search terms.
//!
//! The client accepts everything the backends do plus `isclose`, which only
//! exists here: it expands to a `gt` lower bound and an `lt` upper bound
//! before the terms reach the backend.
//!
//! ```text
//! isclose(t, rel, abs)  =>  gt(t - t*rel - abs)  AND  lt(t + t*rel + abs)
//! ```

use tracing::debug;

use crate::attributes::{get_spec, AttrValue, AttributeKind, Operator, SearchTerm};
use crate::error::{Result, SquirrelError};
use crate::model::Entry;
use crate::store::Backend;

pub const ISCLOSE: &str = "isclose";

#[derive(Debug, Clone, PartialEq)]
pub enum QueryTerm {
    Term(SearchTerm),
    IsClose {
        attr: String,
        target: f64,
        rel_tol: f64,
        abs_tol: f64,
    },
}

impl QueryTerm {
    pub fn isclose(attr: impl Into<String>, target: f64, rel_tol: f64, abs_tol: f64) -> Self {
        QueryTerm::IsClose {
            attr: attr.into(),
            target,
            rel_tol,
            abs_tol,
        }
    }

    /// Build a term from three strings, typing the value by the attribute's
    /// registered kind. Unregistered attributes take numbers when the text
    /// parses as one, text otherwise.
    ///
    /// `in` splits its value on commas (except for tag sets). `isclose`
    /// takes `target[,rel_tol[,abs_tol]]`, missing tolerances being zero.
    pub fn parse(attr: &str, op: &str, value: &str) -> Result<Self> {
        if op.trim().eq_ignore_ascii_case(ISCLOSE) {
            return parse_isclose(attr, value);
        }
        let op: Operator = op.parse()?;
        let kind = get_spec(attr).map_or(AttributeKind::Data, |spec| spec.kind);
        let value = match op {
            Operator::In if kind != AttributeKind::TagSet => AttrValue::List(
                value
                    .split(',')
                    .map(|item| kind.parse(item))
                    .collect::<Result<_>>()?,
            ),
            Operator::Like => AttrValue::Str(value.to_string()),
            _ => kind.parse(value)?,
        };
        Ok(QueryTerm::Term(SearchTerm::new(attr, op, value)))
    }
}

impl From<SearchTerm> for QueryTerm {
    fn from(term: SearchTerm) -> Self {
        QueryTerm::Term(term)
    }
}

fn parse_isclose(attr: &str, value: &str) -> Result<QueryTerm> {
    let numbers = value
        .split(',')
        .map(|part| {
            part.trim().parse::<f64>().map_err(|_| {
                SquirrelError::Comparison(format!("isclose expects numbers, got '{}'", part))
            })
        })
        .collect::<Result<Vec<f64>>>()?;
    match numbers[..] {
        [target] => Ok(QueryTerm::isclose(attr, target, 0.0, 0.0)),
        [target, rel] => Ok(QueryTerm::isclose(attr, target, rel, 0.0)),
        [target, rel, abs] => Ok(QueryTerm::isclose(attr, target, rel, abs)),
        _ => Err(SquirrelError::Comparison(format!(
            "isclose expects target[,rel_tol[,abs_tol]], got '{}'",
            value
        ))),
    }
}

/// Replace every `isclose` with its two bounds; other terms pass through.
pub fn expand(terms: &[QueryTerm]) -> Vec<SearchTerm> {
    let mut expanded = Vec::with_capacity(terms.len());
    for term in terms {
        match term {
            QueryTerm::Term(term) => expanded.push(term.clone()),
            QueryTerm::IsClose {
                attr,
                target,
                rel_tol,
                abs_tol,
            } => {
                let lower = target - target * rel_tol - abs_tol;
                let upper = target + target * rel_tol + abs_tol;
                expanded.push(SearchTerm::gt(attr.as_str(), lower));
                expanded.push(SearchTerm::lt(attr.as_str(), upper));
            }
        }
    }
    expanded
}

pub fn run<B: Backend>(backend: &B, terms: &[QueryTerm]) -> Result<Vec<Entry>> {
    let terms = expand(terms);
    debug!(terms = terms.len(), "searching");
    backend.search(&terms)
}

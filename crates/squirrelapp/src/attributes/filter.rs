//! Search terms.
//!
//! A [`SearchTerm`] is an `(attribute, operator, value)` triple. A list of
//! terms is conjunctive: an entry matches when every term holds.
//!
//! Two attribute names bypass the field lookup:
//! - `entry_type` matches the entry's variant against a [`EntryKind`] or a
//!   list of them, whatever the operator.
//! - `ancestor` is accepted and always holds.
//!
//! Any other name is read with [`Entry::get_attr`]. When the variant does not
//! carry the attribute the term is not satisfied; that is not an error.
//!
//! Terms are checked up front by [`prepare`], so a malformed target fails the
//! whole search before any entry is matched.

use regex::Regex;

use super::compare::{compare_prepared, like_pattern};
use super::{AttrValue, Operator};
use crate::error::{Result, SquirrelError};
use crate::model::{Entry, EntryKind};

pub const ENTRY_TYPE: &str = "entry_type";
pub const ANCESTOR: &str = "ancestor";

#[derive(Debug, Clone, PartialEq)]
pub struct SearchTerm {
    pub attr: String,
    pub op: Operator,
    pub value: AttrValue,
}

impl SearchTerm {
    pub fn new(attr: impl Into<String>, op: Operator, value: impl Into<AttrValue>) -> Self {
        Self {
            attr: attr.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(attr: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        Self::new(attr, Operator::Eq, value)
    }

    pub fn lt(attr: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        Self::new(attr, Operator::Lt, value)
    }

    pub fn gt(attr: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        Self::new(attr, Operator::Gt, value)
    }

    pub fn like(attr: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new(attr, Operator::Like, AttrValue::Str(pattern.into()))
    }

    pub fn entry_type(kind: EntryKind) -> Self {
        Self::new(ENTRY_TYPE, Operator::Eq, AttrValue::Kind(kind))
    }
}

/// A term checked for well-formedness, with its `like` pattern compiled.
#[derive(Debug)]
pub struct PreparedTerm<'a> {
    term: &'a SearchTerm,
    pattern: Option<Regex>,
    kinds: Option<Vec<EntryKind>>,
}

impl PreparedTerm<'_> {
    pub fn matches(&self, entry: &Entry) -> Result<bool> {
        if let Some(kinds) = &self.kinds {
            return Ok(kinds.contains(&entry.kind()));
        }
        if self.term.attr == ANCESTOR {
            return Ok(true);
        }
        let Some(data) = entry.get_attr(&self.term.attr) else {
            return Ok(false);
        };
        compare_prepared(self.term.op, &data, &self.term.value, self.pattern.as_ref())
    }
}

/// Check every term's target shape before any entry is visited.
pub fn prepare(terms: &[SearchTerm]) -> Result<Vec<PreparedTerm<'_>>> {
    terms.iter().map(prepare_term).collect()
}

fn prepare_term(term: &SearchTerm) -> Result<PreparedTerm<'_>> {
    let mut prepared = PreparedTerm {
        term,
        pattern: None,
        kinds: None,
    };
    if term.attr == ENTRY_TYPE {
        prepared.kinds = Some(entry_kinds(&term.value)?);
        return Ok(prepared);
    }
    if term.attr == ANCESTOR {
        return Ok(prepared);
    }
    match (term.op, &term.value) {
        (Operator::Like, target) => prepared.pattern = Some(like_pattern(target)?),
        (Operator::In, AttrValue::List(_) | AttrValue::Str(_)) => {}
        (Operator::In, target) => {
            return Err(SquirrelError::Comparison(format!(
                "in target must be a list or string, got {}",
                target.type_name()
            )))
        }
        (
            Operator::Lt | Operator::Gt,
            AttrValue::Null | AttrValue::List(_) | AttrValue::Kind(_),
        ) => {
            return Err(SquirrelError::Comparison(format!(
                "{} needs an ordered target, got {}",
                term.op,
                term.value.type_name()
            )))
        }
        _ => {}
    }
    Ok(prepared)
}

/// The variants an `entry_type` target names.
pub fn entry_kinds(target: &AttrValue) -> Result<Vec<EntryKind>> {
    match target {
        AttrValue::Kind(kind) => Ok(vec![*kind]),
        AttrValue::Str(name) => Ok(vec![name.parse()?]),
        AttrValue::List(items) => items
            .iter()
            .map(|item| match item {
                AttrValue::Kind(kind) => Ok(*kind),
                AttrValue::Str(name) => name.parse(),
                other => Err(kind_error(other)),
            })
            .collect(),
        other => Err(kind_error(other)),
    }
}

fn kind_error(value: &AttrValue) -> SquirrelError {
    SquirrelError::Comparison(format!(
        "entry_type target must name an entry type, got {}",
        value.type_name()
    ))
}

/// The entry kinds a term list can possibly match, used by backends that
/// fetch PVs and snapshots separately.
pub fn wanted_kinds(terms: &[SearchTerm]) -> Result<Vec<EntryKind>> {
    let mut wanted = vec![EntryKind::Pv, EntryKind::Snapshot];
    for term in terms.iter().filter(|t| t.attr == ENTRY_TYPE) {
        let kinds = entry_kinds(&term.value)?;
        wanted.retain(|k| kinds.contains(k));
    }
    Ok(wanted)
}

/// Linear scan: entries for which every term holds, in input order.
pub fn filter_entries<'e, I>(entries: I, terms: &[SearchTerm]) -> Result<Vec<Entry>>
where
    I: IntoIterator<Item = &'e Entry>,
{
    let prepared = prepare(terms)?;
    let mut found = Vec::new();
    'entries: for entry in entries {
        for term in &prepared {
            if !term.matches(entry)? {
                continue 'entries;
            }
        }
        found.push(entry.clone());
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Pv, Snapshot};
    use crate::tags::TagSet;
    use std::collections::BTreeSet;

    fn entries() -> Vec<Entry> {
        vec![
            Pv::new()
                .with_setpoint("MGNT:GUNB:TEST0")
                .with_description("Only MGNT pv in GUNB")
                .into(),
            Pv::new()
                .with_readback("VAC:LI10:RB")
                .with_tags(TagSet::from([(0, BTreeSet::from([1]))]))
                .into(),
            Snapshot::new("Morning", "MGNT baseline").into(),
        ]
    }

    #[test]
    fn empty_terms_match_everything() {
        let all = entries();
        assert_eq!(filter_entries(&all, &[]).unwrap().len(), 3);
    }

    #[test]
    fn terms_are_conjunctive() {
        let all = entries();
        let found = filter_entries(
            &all,
            &[
                SearchTerm::like("description", "MGNT"),
                SearchTerm::entry_type(EntryKind::Pv),
            ],
        )
        .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].uuid(), all[0].uuid());
    }

    #[test]
    fn missing_attribute_is_not_satisfied() {
        let all = entries();
        let found = filter_entries(&all, &[SearchTerm::like("title", "Morn")]).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind(), EntryKind::Snapshot);
    }

    #[test]
    fn entry_type_accepts_lists() {
        let all = entries();
        let target = AttrValue::List(vec![
            AttrValue::Kind(EntryKind::Pv),
            AttrValue::Kind(EntryKind::Snapshot),
        ]);
        let found = filter_entries(&all, &[SearchTerm::new(ENTRY_TYPE, Operator::In, target)])
            .unwrap();
        assert_eq!(found.len(), 3);
    }

    #[test]
    fn ancestor_is_ignored() {
        let all = entries();
        let found = filter_entries(
            &all,
            &[SearchTerm::eq(ANCESTOR, AttrValue::Uuid(uuid::Uuid::new_v4()))],
        )
        .unwrap();
        assert_eq!(found.len(), 3);
    }

    #[test]
    fn malformed_target_fails_before_matching() {
        let like_number = SearchTerm::new("setpoint", Operator::Like, 5_i64);
        let err = filter_entries(&Vec::<Entry>::new(), &[like_number]).unwrap_err();
        assert!(matches!(err, SquirrelError::Comparison(_)));

        let gt_null = SearchTerm::new("tags", Operator::Gt, AttrValue::Null);
        let err = filter_entries(&Vec::<Entry>::new(), &[gt_null]).unwrap_err();
        assert!(matches!(err, SquirrelError::Comparison(_)));
    }

    #[test]
    fn like_on_numeric_field_surfaces_error() {
        let all = entries();
        let err = filter_entries(&all, &[SearchTerm::like("abs_tolerance", "1")]).unwrap_err();
        assert!(matches!(err, SquirrelError::Comparison(_)));
    }

    #[test]
    fn wanted_kinds_narrows_by_entry_type() {
        assert_eq!(
            wanted_kinds(&[SearchTerm::entry_type(EntryKind::Snapshot)]).unwrap(),
            vec![EntryKind::Snapshot]
        );
        assert_eq!(wanted_kinds(&[]).unwrap().len(), 2);
    }
}

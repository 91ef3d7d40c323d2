//! Attribute specifications and registry.
//!
//! Lists every attribute name search understands, what kind of value it
//! holds and which entry variants carry it. Used to parse typed targets from
//! text and to list searchable fields.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use super::AttrValue;
use crate::error::{Result, SquirrelError};
use crate::model::EntryKind;
use crate::tags::TagSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    /// Free text (addresses, descriptions, titles)
    Text,

    /// Int or float
    Number,

    Uuid,

    /// Timestamps (RFC 3339, `YYYY-MM-DDTHH:MM:SS` or `YYYY-MM-DD`, UTC)
    Time,

    /// Group id to tag ids
    TagSet,

    /// Captured value: number when it parses as one, text otherwise
    Data,

    /// Alarm status or severity name
    Alarm,

    /// `pv` or `snapshot`
    EntryType,
}

impl AttributeKind {
    /// Parse a single target value from text.
    pub fn parse(&self, text: &str) -> Result<AttrValue> {
        let text = text.trim();
        match self {
            AttributeKind::Text | AttributeKind::Alarm => Ok(AttrValue::Str(text.to_string())),
            AttributeKind::Number => parse_number(text).ok_or_else(|| invalid(text, "a number")),
            AttributeKind::Data => {
                Ok(parse_number(text).unwrap_or_else(|| AttrValue::Str(text.to_string())))
            }
            AttributeKind::Uuid => Uuid::parse_str(text)
                .map(AttrValue::Uuid)
                .map_err(|_| invalid(text, "a uuid")),
            AttributeKind::Time => parse_time(text)
                .map(AttrValue::Time)
                .ok_or_else(|| invalid(text, "a date or datetime")),
            AttributeKind::TagSet => parse_tag_set(text).map(AttrValue::Tags),
            AttributeKind::EntryType => text.parse::<EntryKind>().map(AttrValue::Kind),
        }
    }
}

/// Specification for a single searchable attribute.
#[derive(Debug, Clone)]
pub struct AttributeSpec {
    pub name: &'static str,
    pub kind: AttributeKind,
    pub on_pv: bool,
    pub on_snapshot: bool,
}

impl AttributeSpec {
    const fn new(name: &'static str, kind: AttributeKind) -> Self {
        Self {
            name,
            kind,
            on_pv: false,
            on_snapshot: false,
        }
    }

    const fn pv(mut self) -> Self {
        self.on_pv = true;
        self
    }

    const fn snapshot(mut self) -> Self {
        self.on_snapshot = true;
        self
    }

    pub fn applies_to(&self, kind: EntryKind) -> bool {
        match kind {
            EntryKind::Pv => self.on_pv,
            EntryKind::Snapshot => self.on_snapshot,
        }
    }
}

/// Registry of all searchable attributes.
pub const ATTRIBUTES: &[AttributeSpec] = &[
    // Special-cased by search
    AttributeSpec::new("entry_type", AttributeKind::EntryType)
        .pv()
        .snapshot(),
    AttributeSpec::new("ancestor", AttributeKind::Uuid)
        .pv()
        .snapshot(),
    // Shared
    AttributeSpec::new("uuid", AttributeKind::Uuid).pv().snapshot(),
    AttributeSpec::new("description", AttributeKind::Text)
        .pv()
        .snapshot(),
    AttributeSpec::new("creation_time", AttributeKind::Time)
        .pv()
        .snapshot(),
    // PV
    AttributeSpec::new("setpoint", AttributeKind::Text).pv(),
    AttributeSpec::new("readback", AttributeKind::Text).pv(),
    AttributeSpec::new("config", AttributeKind::Text).pv(),
    AttributeSpec::new("device", AttributeKind::Text).pv(),
    AttributeSpec::new("abs_tolerance", AttributeKind::Number).pv(),
    AttributeSpec::new("rel_tolerance", AttributeKind::Number).pv(),
    AttributeSpec::new("tags", AttributeKind::TagSet).pv(),
    AttributeSpec::new("setpoint_data.data", AttributeKind::Data).pv(),
    AttributeSpec::new("setpoint_data.status", AttributeKind::Alarm).pv(),
    AttributeSpec::new("setpoint_data.severity", AttributeKind::Alarm).pv(),
    AttributeSpec::new("setpoint_data.timestamp", AttributeKind::Time).pv(),
    AttributeSpec::new("setpoint_data.units", AttributeKind::Text).pv(),
    AttributeSpec::new("setpoint_data.precision", AttributeKind::Number).pv(),
    AttributeSpec::new("readback_data.data", AttributeKind::Data).pv(),
    AttributeSpec::new("readback_data.status", AttributeKind::Alarm).pv(),
    AttributeSpec::new("readback_data.severity", AttributeKind::Alarm).pv(),
    AttributeSpec::new("readback_data.timestamp", AttributeKind::Time).pv(),
    AttributeSpec::new("readback_data.units", AttributeKind::Text).pv(),
    AttributeSpec::new("readback_data.precision", AttributeKind::Number).pv(),
    AttributeSpec::new("config_data.data", AttributeKind::Data).pv(),
    // Snapshot
    AttributeSpec::new("title", AttributeKind::Text).snapshot(),
];

/// Look up an attribute spec by name.
pub fn get_spec(name: &str) -> Option<&'static AttributeSpec> {
    ATTRIBUTES.iter().find(|spec| spec.name == name)
}

/// Names of attributes carried by the given entry variant.
pub fn attrs_for(kind: EntryKind) -> impl Iterator<Item = &'static str> {
    ATTRIBUTES
        .iter()
        .filter(move |spec| spec.applies_to(kind))
        .map(|spec| spec.name)
}

fn invalid(text: &str, expected: &str) -> SquirrelError {
    SquirrelError::Comparison(format!("'{}' is not {}", text, expected))
}

fn parse_number(text: &str) -> Option<AttrValue> {
    if let Ok(v) = text.parse::<i64>() {
        return Some(AttrValue::Int(v));
    }
    text.parse::<f64>().ok().map(AttrValue::Float)
}

/// Parses RFC 3339, or a naive datetime/date taken as UTC.
pub fn parse_time(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(text) {
        return Some(t.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(t) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(t.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|t| t.and_utc())
}

/// Parses `group:tag,tag;group:tag` into a TagSet.
fn parse_tag_set(text: &str) -> Result<TagSet> {
    let mut tags: TagSet = BTreeMap::new();
    for part in text.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let (group, ids) = part
            .split_once(':')
            .ok_or_else(|| invalid(part, "a 'group:tag,...' pair"))?;
        let group: u32 = group
            .trim()
            .parse()
            .map_err(|_| invalid(group, "a tag group id"))?;
        let selected: &mut BTreeSet<u32> = tags.entry(group).or_default();
        for id in ids.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            selected.insert(id.parse().map_err(|_| invalid(id, "a tag id"))?);
        }
    }
    Ok(tags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn every_attribute_is_reachable_on_some_variant() {
        for spec in ATTRIBUTES {
            assert!(spec.on_pv || spec.on_snapshot, "{} is orphaned", spec.name);
        }
    }

    #[test]
    fn get_spec_finds_registered() {
        assert_eq!(get_spec("tags").unwrap().kind, AttributeKind::TagSet);
        assert!(get_spec("pinned").is_none());
    }

    #[test]
    fn attrs_for_snapshot_has_title_not_tags() {
        let names: Vec<_> = attrs_for(EntryKind::Snapshot).collect();
        assert!(names.contains(&"title"));
        assert!(!names.contains(&"tags"));
    }

    #[test]
    fn parse_numbers() {
        assert_eq!(AttributeKind::Number.parse("4").unwrap(), AttrValue::Int(4));
        assert_eq!(AttributeKind::Number.parse("0.5").unwrap(), AttrValue::Float(0.5));
        assert!(AttributeKind::Number.parse("abc").is_err());
        assert_eq!(
            AttributeKind::Data.parse("abc").unwrap(),
            AttrValue::Str("abc".into())
        );
    }

    #[test]
    fn parse_tag_sets() {
        let parsed = AttributeKind::TagSet.parse("0:0,1; 2:5").unwrap();
        let expected = TagSet::from([(0, BTreeSet::from([0, 1])), (2, BTreeSet::from([5]))]);
        assert_eq!(parsed, AttrValue::Tags(expected));
        assert!(AttributeKind::TagSet.parse("region:a").is_err());
    }

    #[test]
    fn parse_times() {
        let t = parse_time("2024-03-01").unwrap();
        assert_eq!((t.year(), t.month(), t.day(), t.hour()), (2024, 3, 1, 0));
        let t = parse_time("2024-03-01T12:30:00").unwrap();
        assert_eq!(t.minute(), 30);
        let t = parse_time("2024-03-01T12:30:00+02:00").unwrap();
        assert_eq!(t.hour(), 10);
        assert!(parse_time("yesterday").is_none());
    }

    #[test]
    fn parse_entry_type() {
        assert_eq!(
            AttributeKind::EntryType.parse("snapshot").unwrap(),
            AttrValue::Kind(EntryKind::Snapshot)
        );
    }
}

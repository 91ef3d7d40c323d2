//! # Domain Model
//!
//! This module defines the value objects squirrel moves between the live
//! control system, the backends and the UI: [`EpicsValue`], [`Pv`],
//! [`Snapshot`] and the [`Entry`] union over the storable variants.
//!
//! ## Working Copies
//!
//! Instances handed out by a backend are working copies. Mutating a field of
//! a [`Pv`] does nothing until the copy is resubmitted through the backend
//! (`update_entry`, `update_pv`, ...). The backend owns the persisted state.
//!
//! ## PV Lifecycle
//!
//! ```text
//! unsaved ──save/add_pv──▶ active ──delete/archive──▶ archived
//! ```
//!
//! - **active**: returned by `get_all_pvs`, searchable, captured by `snap`.
//! - **archived**: terminal. Resolvable by identity and still present inside
//!   every Snapshot that captured it, but excluded from listings and from
//!   future Snapshots.
//!
//! ## Field Lookup
//!
//! [`Entry::get_attr`] is the single place that maps attribute names to
//! values for the predicate engine. A name the variant does not carry yields
//! `None`, which search treats as "term not satisfied".

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::attributes::AttrValue;
use crate::error::SquirrelError;
use crate::tags::TagSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    NoAlarm,
    Minor,
    Major,
    Invalid,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::NoAlarm,
        Severity::Minor,
        Severity::Major,
        Severity::Invalid,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Severity::NoAlarm => "NO_ALARM",
            Severity::Minor => "MINOR",
            Severity::Major => "MAJOR",
            Severity::Invalid => "INVALID",
        }
    }
}

impl FromStr for Severity {
    type Err = SquirrelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Severity::ALL
            .into_iter()
            .find(|sev| sev.name() == s)
            .ok_or_else(|| SquirrelError::Backend(format!("Unknown severity '{}'", s)))
    }
}

/// EPICS alarm status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    NoAlarm,
    Read,
    Write,
    Hihi,
    High,
    Lolo,
    Low,
    State,
    Cos,
    Comm,
    Timeout,
    Hwlimit,
    Calc,
    Scan,
    Link,
    Soft,
    BadSub,
    Udf,
    Disable,
    Simm,
    ReadAccess,
    WriteAccess,
}

impl Status {
    pub const ALL: [Status; 22] = [
        Status::NoAlarm,
        Status::Read,
        Status::Write,
        Status::Hihi,
        Status::High,
        Status::Lolo,
        Status::Low,
        Status::State,
        Status::Cos,
        Status::Comm,
        Status::Timeout,
        Status::Hwlimit,
        Status::Calc,
        Status::Scan,
        Status::Link,
        Status::Soft,
        Status::BadSub,
        Status::Udf,
        Status::Disable,
        Status::Simm,
        Status::ReadAccess,
        Status::WriteAccess,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Status::NoAlarm => "NO_ALARM",
            Status::Read => "READ",
            Status::Write => "WRITE",
            Status::Hihi => "HIHI",
            Status::High => "HIGH",
            Status::Lolo => "LOLO",
            Status::Low => "LOW",
            Status::State => "STATE",
            Status::Cos => "COS",
            Status::Comm => "COMM",
            Status::Timeout => "TIMEOUT",
            Status::Hwlimit => "HWLIMIT",
            Status::Calc => "CALC",
            Status::Scan => "SCAN",
            Status::Link => "LINK",
            Status::Soft => "SOFT",
            Status::BadSub => "BAD_SUB",
            Status::Udf => "UDF",
            Status::Disable => "DISABLE",
            Status::Simm => "SIMM",
            Status::ReadAccess => "READ_ACCESS",
            Status::WriteAccess => "WRITE_ACCESS",
        }
    }
}

impl FromStr for Status {
    type Err = SquirrelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::ALL
            .into_iter()
            .find(|status| status.name() == s)
            .ok_or_else(|| SquirrelError::Backend(format!("Unknown status '{}'", s)))
    }
}

/// The raw value carried by one read of a PV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Str(String),
    Int(i64),
    Float(f64),
    /// Index into the PV's enum label list.
    Enum(u16),
}

impl Scalar {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(v) => Some(*v as f64),
            Scalar::Float(v) => Some(*v),
            Scalar::Enum(v) => Some(f64::from(*v)),
            Scalar::Str(_) => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Str(s) => write!(f, "{}", s),
            Scalar::Int(v) => write!(f, "{}", v),
            Scalar::Float(v) => write!(f, "{}", v),
            Scalar::Enum(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Str(value.to_string())
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}

/// One read of a PV: the value plus alarm state, timestamp and display metadata.
///
/// A fresh instance is produced per live read or per stored sample; nothing
/// mutates it afterwards. `data == None` marks a read that failed or never
/// happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpicsValue {
    pub data: Option<Scalar>,
    pub status: Status,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper_ctrl_limit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower_ctrl_limit: Option<f64>,
    // LOLO / HIHI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower_alarm_limit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper_alarm_limit: Option<f64>,
    // LOW / HIGH
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower_warning_limit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper_warning_limit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enums: Option<Vec<String>>,
}

impl Default for EpicsValue {
    fn default() -> Self {
        Self {
            data: None,
            status: Status::Udf,
            severity: Severity::Invalid,
            timestamp: Utc::now(),
            units: None,
            precision: None,
            upper_ctrl_limit: None,
            lower_ctrl_limit: None,
            lower_alarm_limit: None,
            upper_alarm_limit: None,
            lower_warning_limit: None,
            upper_warning_limit: None,
            enums: None,
        }
    }
}

impl EpicsValue {
    /// A value with no data, used for reads that failed.
    pub fn absent() -> Self {
        Self::default()
    }

    pub fn new(data: impl Into<Scalar>) -> Self {
        Self {
            data: Some(data.into()),
            ..Self::default()
        }
    }

    pub fn with_alarm(mut self, status: Status, severity: Severity) -> Self {
        self.status = status;
        self.severity = severity;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    /// Label for enum-valued data, if the label list is known.
    pub fn enum_label(&self) -> Option<&str> {
        match (&self.data, &self.enums) {
            (Some(Scalar::Enum(idx)), Some(labels)) => {
                labels.get(*idx as usize).map(String::as_str)
            }
            _ => None,
        }
    }

    fn get_attr(&self, name: &str) -> Option<AttrValue> {
        match name {
            "data" => Some(self.data.clone().map(AttrValue::from).unwrap_or(AttrValue::Null)),
            "status" => Some(AttrValue::Str(self.status.name().to_string())),
            "severity" => Some(AttrValue::Str(self.severity.name().to_string())),
            "timestamp" => Some(AttrValue::Time(self.timestamp)),
            "units" => Some(opt_str(&self.units)),
            "precision" => Some(
                self.precision
                    .map(|p| AttrValue::Int(i64::from(p)))
                    .unwrap_or(AttrValue::Null),
            ),
            _ => None,
        }
    }
}

/// A process variable: one logical device with up to three control points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pv {
    pub uuid: Uuid,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub setpoint: Option<String>,
    #[serde(default)]
    pub setpoint_data: EpicsValue,
    #[serde(default)]
    pub readback: Option<String>,
    #[serde(default)]
    pub readback_data: EpicsValue,
    #[serde(default)]
    pub config: Option<String>,
    #[serde(default)]
    pub config_data: EpicsValue,
    #[serde(default)]
    pub abs_tolerance: f64,
    #[serde(default)]
    pub rel_tolerance: f64,
    pub creation_time: DateTime<Utc>,
    /// Selected tag ids, keyed by tag group id.
    #[serde(default)]
    pub tags: TagSet,
}

impl Default for Pv {
    fn default() -> Self {
        Self {
            uuid: Uuid::new_v4(),
            description: String::new(),
            device: None,
            setpoint: None,
            setpoint_data: EpicsValue::default(),
            readback: None,
            readback_data: EpicsValue::default(),
            config: None,
            config_data: EpicsValue::default(),
            abs_tolerance: 0.0,
            rel_tolerance: 0.0,
            creation_time: Utc::now(),
            tags: TagSet::new(),
        }
    }
}

impl Pv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_uuid(mut self, uuid: Uuid) -> Self {
        self.uuid = uuid;
        self
    }

    pub fn with_setpoint(mut self, address: impl Into<String>) -> Self {
        self.setpoint = Some(address.into());
        self
    }

    pub fn with_readback(mut self, address: impl Into<String>) -> Self {
        self.readback = Some(address.into());
        self
    }

    pub fn with_config(mut self, address: impl Into<String>) -> Self {
        self.config = Some(address.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }

    pub fn with_tags(mut self, tags: TagSet) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_tolerances(mut self, abs_tolerance: f64, rel_tolerance: f64) -> Self {
        self.abs_tolerance = abs_tolerance;
        self.rel_tolerance = rel_tolerance;
        self
    }

    pub fn with_setpoint_data(mut self, data: EpicsValue) -> Self {
        self.setpoint_data = data;
        self
    }

    pub fn with_readback_data(mut self, data: EpicsValue) -> Self {
        self.readback_data = data;
        self
    }

    /// Display name: the setpoint address, else the readback address.
    pub fn name(&self) -> &str {
        self.setpoint
            .as_deref()
            .or(self.readback.as_deref())
            .unwrap_or("")
    }

    /// Get an attribute value by name.
    ///
    /// | Name | Value |
    /// |------|-------|
    /// | `uuid` | `Uuid` |
    /// | `description`, `device`, `setpoint`, `readback`, `config` | `Str` (or `Null`) |
    /// | `abs_tolerance`, `rel_tolerance` | `Float` |
    /// | `creation_time` | `Time` |
    /// | `tags` | `Tags` |
    /// | `setpoint_data.<field>` (also `readback_data`, `config_data`) | see [`EpicsValue`] |
    pub fn get_attr(&self, name: &str) -> Option<AttrValue> {
        if let Some((head, field)) = name.split_once('.') {
            return match head {
                "setpoint_data" => self.setpoint_data.get_attr(field),
                "readback_data" => self.readback_data.get_attr(field),
                "config_data" => self.config_data.get_attr(field),
                _ => None,
            };
        }
        match name {
            "uuid" => Some(AttrValue::Uuid(self.uuid)),
            "description" => Some(AttrValue::Str(self.description.clone())),
            "device" => Some(opt_str(&self.device)),
            "setpoint" => Some(opt_str(&self.setpoint)),
            "readback" => Some(opt_str(&self.readback)),
            "config" => Some(opt_str(&self.config)),
            "abs_tolerance" => Some(AttrValue::Float(self.abs_tolerance)),
            "rel_tolerance" => Some(AttrValue::Float(self.rel_tolerance)),
            "creation_time" => Some(AttrValue::Time(self.creation_time)),
            "tags" => Some(AttrValue::Tags(self.tags.clone())),
            _ => None,
        }
    }
}

/// Values of every PV captured at one moment, plus contextual meta PVs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub uuid: Uuid,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub pvs: Vec<Pv>,
    #[serde(default)]
    pub meta_pvs: Vec<Pv>,
    pub creation_time: DateTime<Utc>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            uuid: Uuid::new_v4(),
            title: String::new(),
            description: String::new(),
            pvs: Vec::new(),
            meta_pvs: Vec::new(),
            creation_time: Utc::now(),
        }
    }
}

impl Snapshot {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    /// Whether this snapshot captured the PV with the given identity.
    pub fn contains_pv(&self, id: &Uuid) -> bool {
        self.pvs.iter().any(|pv| pv.uuid == *id)
    }

    pub fn get_attr(&self, name: &str) -> Option<AttrValue> {
        match name {
            "uuid" => Some(AttrValue::Uuid(self.uuid)),
            "title" => Some(AttrValue::Str(self.title.clone())),
            "description" => Some(AttrValue::Str(self.description.clone())),
            "creation_time" => Some(AttrValue::Time(self.creation_time)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Pv,
    Snapshot,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Pv => "pv",
            EntryKind::Snapshot => "snapshot",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryKind {
    type Err = SquirrelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pv" => Ok(EntryKind::Pv),
            "snapshot" => Ok(EntryKind::Snapshot),
            other => Err(SquirrelError::Comparison(format!(
                "unknown entry type '{}' (expected 'pv' or 'snapshot')",
                other
            ))),
        }
    }
}

/// Anything a backend stores under an identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Entry {
    Pv(Pv),
    Snapshot(Snapshot),
}

impl Entry {
    pub fn uuid(&self) -> Uuid {
        match self {
            Entry::Pv(pv) => pv.uuid,
            Entry::Snapshot(snapshot) => snapshot.uuid,
        }
    }

    pub fn kind(&self) -> EntryKind {
        match self {
            Entry::Pv(_) => EntryKind::Pv,
            Entry::Snapshot(_) => EntryKind::Snapshot,
        }
    }

    /// Look up a named attribute on whichever variant this is.
    pub fn get_attr(&self, name: &str) -> Option<AttrValue> {
        match self {
            Entry::Pv(pv) => pv.get_attr(name),
            Entry::Snapshot(snapshot) => snapshot.get_attr(name),
        }
    }

    pub fn as_pv(&self) -> Option<&Pv> {
        match self {
            Entry::Pv(pv) => Some(pv),
            Entry::Snapshot(_) => None,
        }
    }

    pub fn as_snapshot(&self) -> Option<&Snapshot> {
        match self {
            Entry::Snapshot(snapshot) => Some(snapshot),
            Entry::Pv(_) => None,
        }
    }
}

impl From<Pv> for Entry {
    fn from(pv: Pv) -> Self {
        Entry::Pv(pv)
    }
}

impl From<Snapshot> for Entry {
    fn from(snapshot: Snapshot) -> Self {
        Entry::Snapshot(snapshot)
    }
}

fn opt_str(value: &Option<String>) -> AttrValue {
    value
        .as_ref()
        .map(|s| AttrValue::Str(s.clone()))
        .unwrap_or(AttrValue::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn pv_defaults_have_fresh_identity() {
        let a = Pv::new();
        let b = Pv::new();
        assert_ne!(a.uuid, b.uuid);
        assert!(!a.setpoint_data.has_data());
        assert_eq!(a.setpoint_data.status, Status::Udf);
        assert_eq!(a.setpoint_data.severity, Severity::Invalid);
    }

    #[test]
    fn pv_name_prefers_setpoint() {
        let pv = Pv::new().with_setpoint("SP").with_readback("RB");
        assert_eq!(pv.name(), "SP");
        let pv = Pv::new().with_readback("RB");
        assert_eq!(pv.name(), "RB");
        assert_eq!(Pv::new().name(), "");
    }

    #[test]
    fn pv_get_attr_known_fields() {
        let mut tags = TagSet::new();
        tags.insert(0, BTreeSet::from([1]));
        let pv = Pv::new()
            .with_setpoint("MGNT:GUNB:TEST0")
            .with_description("Only MGNT pv in GUNB")
            .with_tags(tags.clone())
            .with_tolerances(0.5, 0.1);

        assert_eq!(
            pv.get_attr("setpoint"),
            Some(AttrValue::Str("MGNT:GUNB:TEST0".into()))
        );
        assert_eq!(pv.get_attr("readback"), Some(AttrValue::Null));
        assert_eq!(pv.get_attr("abs_tolerance"), Some(AttrValue::Float(0.5)));
        assert_eq!(pv.get_attr("tags"), Some(AttrValue::Tags(tags)));
        assert_eq!(pv.get_attr("uuid"), Some(AttrValue::Uuid(pv.uuid)));
        assert_eq!(pv.get_attr("title"), None);
    }

    #[test]
    fn pv_get_attr_reaches_into_captured_values() {
        let pv = Pv::new()
            .with_setpoint("A")
            .with_setpoint_data(EpicsValue::new(4.5).with_alarm(Status::High, Severity::Minor));

        assert_eq!(pv.get_attr("setpoint_data.data"), Some(AttrValue::Float(4.5)));
        assert_eq!(
            pv.get_attr("setpoint_data.severity"),
            Some(AttrValue::Str("MINOR".into()))
        );
        assert_eq!(pv.get_attr("readback_data.data"), Some(AttrValue::Null));
        assert_eq!(pv.get_attr("setpoint_data.bogus"), None);
        assert_eq!(pv.get_attr("nothing.data"), None);
    }

    #[test]
    fn snapshot_has_no_pv_fields() {
        let snapshot = Snapshot::new("Morning", "Before tuning");
        let entry = Entry::from(snapshot.clone());
        assert_eq!(entry.get_attr("title"), Some(AttrValue::Str("Morning".into())));
        assert_eq!(entry.get_attr("tags"), None);
        assert_eq!(entry.get_attr("setpoint"), None);
        assert_eq!(entry.kind(), EntryKind::Snapshot);
        assert_eq!(entry.uuid(), snapshot.uuid);
    }

    #[test]
    fn status_and_severity_names_round_trip() {
        for status in Status::ALL {
            assert_eq!(status.name().parse::<Status>().unwrap(), status);
        }
        for severity in Severity::ALL {
            assert_eq!(severity.name().parse::<Severity>().unwrap(), severity);
        }
        assert!("LOUD".parse::<Status>().is_err());
    }

    #[test]
    fn status_serializes_with_epics_names() {
        let json = serde_json::to_string(&Status::BadSub).unwrap();
        assert_eq!(json, "\"BAD_SUB\"");
        let json = serde_json::to_string(&Status::Hihi).unwrap();
        assert_eq!(json, "\"HIHI\"");
    }

    #[test]
    fn enum_label_resolves_index() {
        let mut value = EpicsValue::new(Scalar::Enum(1));
        value.enums = Some(vec!["Off".into(), "On".into()]);
        assert_eq!(value.enum_label(), Some("On"));
        assert_eq!(EpicsValue::new(1_i64).enum_label(), None);
    }

    #[test]
    fn entry_kind_parses_case_insensitively() {
        assert_eq!("PV".parse::<EntryKind>().unwrap(), EntryKind::Pv);
        assert_eq!("snapshot".parse::<EntryKind>().unwrap(), EntryKind::Snapshot);
        assert!("collection".parse::<EntryKind>().is_err());
    }
}

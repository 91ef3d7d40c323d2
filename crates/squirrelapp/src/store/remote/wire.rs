//! JSON bodies exchanged with the remote service.
//!
//! Field names are camelCase on the wire. Tags travel as a flat list of tag
//! ids; the group each id belongs to is recovered from the TagDef. Values
//! travel as plain JSON scalars.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use crate::attributes::parse_time;
use crate::error::{Result, SquirrelError};
use crate::model::{EpicsValue, Pv, Scalar, Severity, Snapshot, Status};
use crate::store::NewPv;
use crate::tags::{TagDef, TagId, TagSet};

/// A tag reference as returned by the service: a bare id or `{"id": ..}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireTagRef {
    Id(TagId),
    Object { id: TagId },
}

impl WireTagRef {
    fn id(&self) -> TagId {
        match self {
            WireTagRef::Id(id) | WireTagRef::Object { id } => *id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePvOut {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub setpoint_address: Option<String>,
    pub readback_address: Option<String>,
    pub config_address: Option<String>,
    pub description: String,
    pub device: Option<String>,
    pub abs_tolerance: f64,
    pub rel_tolerance: f64,
    pub tags: Vec<TagId>,
    pub read_only: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePvIn {
    pub id: Uuid,
    #[serde(default)]
    pub setpoint_address: Option<String>,
    #[serde(default)]
    pub readback_address: Option<String>,
    #[serde(default)]
    pub config_address: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub tags: Vec<WireTagRef>,
    #[serde(default)]
    pub abs_tolerance: f64,
    #[serde(default)]
    pub rel_tolerance: f64,
    #[serde(default)]
    pub created_date: Option<String>,
}

/// One captured reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireReading {
    #[serde(default)]
    pub data: Value,
    pub status: String,
    pub severity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_date: Option<String>,
}

/// One PV's values inside a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pv_id: Option<Uuid>,
    #[serde(default)]
    pub pv_name: Option<String>,
    #[serde(flatten)]
    pub setpoint: WireReading,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readback_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readback: Option<WireReading>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireSnapshotOut {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub values: Vec<WireValue>,
    #[serde(rename = "metadataPVs")]
    pub metadata_pvs: Vec<WireMetaPv>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireSnapshotIn {
    pub id: Uuid,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub data: Vec<WireValue>,
    #[serde(default, rename = "metadataPVs")]
    pub metadata_pvs: Vec<WireMetaPv>,
    #[serde(default)]
    pub created_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMetaPv {
    #[serde(default)]
    pub setpoint_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readback_address: Option<String>,
    #[serde(flatten)]
    pub reading: WireReading,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireTagGroupSummary {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireTagGroup {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<WireTag>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireTag {
    pub id: TagId,
    pub name: String,
}

// --- dates ---

/// ISO 8601 with or without offset; a naive time is taken as UTC.
pub fn parse_date(text: &str) -> Result<DateTime<Utc>> {
    parse_time(text)
        .ok_or_else(|| SquirrelError::Backend(format!("unparseable date '{}' from service", text)))
}

fn date_or_now(text: &Option<String>) -> Result<DateTime<Utc>> {
    match text {
        Some(text) => parse_date(text),
        None => Ok(Utc::now()),
    }
}

// --- values ---

pub fn scalar_to_json(value: &Option<Scalar>) -> Value {
    match value {
        None => Value::Null,
        Some(Scalar::Str(s)) => Value::String(s.clone()),
        Some(Scalar::Int(v)) => Value::from(*v),
        Some(Scalar::Float(v)) => Value::from(*v),
        Some(Scalar::Enum(v)) => Value::from(*v),
    }
}

pub fn json_to_scalar(value: &Value) -> Option<Scalar> {
    match value {
        Value::String(s) => Some(Scalar::Str(s.clone())),
        Value::Number(n) => n
            .as_i64()
            .map(Scalar::Int)
            .or_else(|| n.as_f64().map(Scalar::Float)),
        Value::Bool(b) => Some(Scalar::Int(i64::from(*b))),
        _ => None,
    }
}

fn pack_reading(value: &EpicsValue, with_date: bool) -> WireReading {
    WireReading {
        data: scalar_to_json(&value.data),
        status: value.status.name().to_string(),
        severity: value.severity.name().to_string(),
        created_date: with_date.then(|| value.timestamp.to_rfc3339()),
    }
}

fn unpack_reading(reading: &WireReading) -> Result<EpicsValue> {
    Ok(EpicsValue {
        data: json_to_scalar(&reading.data),
        status: reading.status.parse::<Status>()?,
        severity: reading.severity.parse::<Severity>()?,
        timestamp: date_or_now(&reading.created_date)?,
        ..EpicsValue::default()
    })
}

// --- tags ---

pub fn pack_tags(tags: &TagSet) -> Vec<TagId> {
    tags.values().flat_map(|ids| ids.iter().copied()).collect()
}

/// Map each tag id to its group; ids the definition does not know are dropped.
pub fn unpack_tags(refs: &[WireTagRef], def: &TagDef) -> TagSet {
    let mut tags = TagSet::new();
    for tag in refs.iter().map(WireTagRef::id) {
        match def.group_of_tag(tag) {
            Some(group) => {
                tags.entry(group).or_default().insert(tag);
            }
            None => warn!(tag, "service returned a tag id missing from the tag definition"),
        }
    }
    tags
}

// --- PVs ---

pub fn pack_pv(pv: &Pv) -> WirePvOut {
    WirePvOut {
        id: Some(pv.uuid),
        ..pack_new_pv(&NewPv::from(pv))
    }
}

pub fn pack_new_pv(pv: &NewPv) -> WirePvOut {
    WirePvOut {
        id: None,
        setpoint_address: pv.setpoint.clone(),
        readback_address: pv.readback.clone(),
        config_address: pv.config.clone(),
        description: pv.description.clone(),
        device: pv.device.clone(),
        abs_tolerance: pv.abs_tolerance,
        rel_tolerance: pv.rel_tolerance,
        tags: pack_tags(&pv.tags),
        read_only: false,
    }
}

pub fn unpack_pv(pv: WirePvIn, def: &TagDef) -> Result<Pv> {
    Ok(Pv {
        uuid: pv.id,
        description: pv.description,
        device: pv.device.filter(|d| !d.is_empty()),
        setpoint: pv.setpoint_address.filter(|a| !a.is_empty()),
        readback: pv.readback_address.filter(|a| !a.is_empty()),
        config: pv.config_address.filter(|a| !a.is_empty()),
        abs_tolerance: pv.abs_tolerance,
        rel_tolerance: pv.rel_tolerance,
        tags: unpack_tags(&pv.tags, def),
        creation_time: date_or_now(&pv.created_date)?,
        ..Pv::default()
    })
}

// --- snapshots ---

fn pack_meta_pv(pv: &Pv) -> WireMetaPv {
    let reading = if pv.setpoint.is_some() {
        &pv.setpoint_data
    } else {
        &pv.readback_data
    };
    WireMetaPv {
        setpoint_address: pv.setpoint.clone(),
        readback_address: pv.readback.clone(),
        reading: pack_reading(reading, true),
    }
}

fn unpack_meta_pv(meta: &WireMetaPv) -> Result<Pv> {
    let reading = unpack_reading(&meta.reading)?;
    let mut pv = Pv::new();
    pv.creation_time = reading.timestamp;
    match (&meta.setpoint_address, &meta.readback_address) {
        (Some(setpoint), _) => {
            pv.setpoint = Some(setpoint.clone());
            pv.readback = meta.readback_address.clone();
            pv.setpoint_data = reading;
        }
        (None, readback) => {
            pv.readback = readback.clone();
            pv.readback_data = reading;
        }
    }
    Ok(pv)
}

pub fn pack_snapshot(snapshot: &Snapshot) -> WireSnapshotOut {
    WireSnapshotOut {
        id: snapshot.uuid,
        title: snapshot.title.clone(),
        description: snapshot.description.clone(),
        values: snapshot
            .pvs
            .iter()
            .map(|pv| WireValue {
                pv_id: Some(pv.uuid),
                pv_name: pv.setpoint.clone(),
                setpoint: pack_reading(&pv.setpoint_data, true),
                readback_name: pv.readback.clone(),
                readback: pv
                    .readback
                    .as_ref()
                    .map(|_| pack_reading(&pv.readback_data, true)),
            })
            .collect(),
        metadata_pvs: snapshot.meta_pvs.iter().map(pack_meta_pv).collect(),
    }
}

pub fn unpack_snapshot(snapshot: WireSnapshotIn) -> Result<Snapshot> {
    let pvs = snapshot
        .data
        .iter()
        .map(|value| {
            let mut pv = Pv::new();
            if let Some(id) = value.pv_id {
                pv.uuid = id;
            }
            pv.setpoint = value.pv_name.clone();
            pv.setpoint_data = unpack_reading(&value.setpoint)?;
            pv.readback = value.readback_name.clone();
            if let Some(readback) = &value.readback {
                pv.readback_data = unpack_reading(readback)?;
            }
            Ok(pv)
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Snapshot {
        uuid: snapshot.id,
        title: snapshot.title,
        description: snapshot.description,
        pvs,
        meta_pvs: snapshot
            .metadata_pvs
            .iter()
            .map(unpack_meta_pv)
            .collect::<Result<Vec<_>>>()?,
        creation_time: date_or_now(&snapshot.created_date)?,
    })
}

/// Listing rows carry metadata only; the PV list stays empty.
pub fn unpack_snapshot_metadata(mut snapshot: WireSnapshotIn) -> Result<Snapshot> {
    snapshot.data.clear();
    unpack_snapshot(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::TagGroup;
    use chrono::Timelike;
    use serde_json::json;
    use std::collections::BTreeSet;

    fn def() -> TagDef {
        TagDef::from_iter([
            (0, TagGroup::new("Region", "").with_tag(0, "A").with_tag(1, "B")),
            (1, TagGroup::new("Subsystem", "").with_tag(5, "Vacuum")),
        ])
    }

    #[test]
    fn pv_body_uses_camel_case() {
        let pv = NewPv::new(Some("SP"), Some("RB"), "desc")
            .with_tags(TagSet::from([(0, BTreeSet::from([1])), (1, BTreeSet::from([5]))]));
        let body = serde_json::to_value(pack_new_pv(&pv)).unwrap();
        assert_eq!(body["setpointAddress"], "SP");
        assert_eq!(body["readbackAddress"], "RB");
        assert_eq!(body["absTolerance"], 0.0);
        assert_eq!(body["tags"], json!([1, 5]));
        assert_eq!(body["readOnly"], false);
        assert!(body.get("id").is_none());
    }

    #[test]
    fn pv_round_trips_except_identity_and_time() {
        let tags = TagSet::from([(0, BTreeSet::from([0, 1])), (1, BTreeSet::from([5]))]);
        let pv = Pv::new()
            .with_setpoint("MGNT:GUNB:TEST0")
            .with_readback("MGNT:GUNB:TEST0:RB")
            .with_config("MGNT:GUNB:TEST0:CFG")
            .with_description("Only MGNT pv in GUNB")
            .with_device("Magnet 0")
            .with_tags(tags)
            .with_tolerances(0.5, 0.01);

        let mut body = serde_json::to_value(pack_pv(&pv)).unwrap();
        body["createdDate"] = json!("2024-05-01T12:00:00");
        let wire: WirePvIn = serde_json::from_value(body).unwrap();
        let back = unpack_pv(wire, &def()).unwrap();

        assert_eq!(back.uuid, pv.uuid);
        assert_eq!(back.setpoint, pv.setpoint);
        assert_eq!(back.readback, pv.readback);
        assert_eq!(back.config, pv.config);
        assert_eq!(back.description, pv.description);
        assert_eq!(back.device, pv.device);
        assert_eq!(back.tags, pv.tags);
        assert_eq!(back.abs_tolerance, pv.abs_tolerance);
        assert_eq!(back.rel_tolerance, pv.rel_tolerance);
        assert_eq!(back.creation_time.hour(), 12);
    }

    #[test]
    fn unknown_tag_ids_are_dropped() {
        let refs: Vec<WireTagRef> = serde_json::from_value(json!([{"id": 1}, 42, 5])).unwrap();
        let tags = unpack_tags(&refs, &def());
        assert_eq!(
            tags,
            TagSet::from([(0, BTreeSet::from([1])), (1, BTreeSet::from([5]))])
        );
    }

    #[test]
    fn snapshot_round_trips_captured_values() {
        let mut snapshot = Snapshot::new("Morning", "Before tuning");
        snapshot.pvs.push(
            Pv::new()
                .with_setpoint("A:SP")
                .with_readback("A:RB")
                .with_setpoint_data(EpicsValue::new(1.5).with_alarm(Status::High, Severity::Minor))
                .with_readback_data(EpicsValue::new("ok")),
        );
        snapshot.pvs.push(Pv::new().with_setpoint("B:SP"));
        snapshot.meta_pvs.push(
            Pv::new()
                .with_readback("BEAM:DEST")
                .with_readback_data(EpicsValue::new(3_i64)),
        );

        let mut body = serde_json::to_value(pack_snapshot(&snapshot)).unwrap();
        // the service echoes "values" back as "data"
        let values = body["values"].take();
        body["data"] = values;
        let wire: WireSnapshotIn = serde_json::from_value(body).unwrap();
        let back = unpack_snapshot(wire).unwrap();

        assert_eq!(back.uuid, snapshot.uuid);
        assert_eq!(back.title, "Morning");
        assert_eq!(back.description, "Before tuning");
        assert_eq!(back.pvs.len(), 2);
        assert_eq!(back.pvs[0].uuid, snapshot.pvs[0].uuid);
        assert_eq!(back.pvs[0].setpoint_data.data, Some(Scalar::Float(1.5)));
        assert_eq!(back.pvs[0].setpoint_data.status, Status::High);
        assert_eq!(back.pvs[0].setpoint_data.severity, Severity::Minor);
        assert_eq!(back.pvs[0].readback_data.data, Some(Scalar::Str("ok".into())));
        assert_eq!(back.pvs[1].setpoint_data.data, None);
        assert_eq!(back.meta_pvs[0].readback.as_deref(), Some("BEAM:DEST"));
        assert_eq!(back.meta_pvs[0].readback_data.data, Some(Scalar::Int(3)));
    }

    #[test]
    fn metadata_listing_has_no_pvs() {
        let wire: WireSnapshotIn = serde_json::from_value(json!({
            "id": "a1b2c3d4-0000-4000-8000-000000000001",
            "title": "Evening",
            "description": "",
            "data": [{"pvName": "A", "status": "NO_ALARM", "severity": "NO_ALARM", "data": 1}],
            "metadataPVs": [{
                "setpointAddress": "BEAM:DEST",
                "data": "HXR",
                "status": "NO_ALARM",
                "severity": "NO_ALARM",
                "createdDate": "2024-05-01T08:00:00+00:00"
            }],
            "createdDate": "2024-05-01T08:00:00.123456"
        }))
        .unwrap();
        let snapshot = unpack_snapshot_metadata(wire).unwrap();
        assert!(snapshot.pvs.is_empty());
        assert_eq!(snapshot.meta_pvs.len(), 1);
        assert_eq!(
            snapshot.meta_pvs[0].setpoint_data.data,
            Some(Scalar::Str("HXR".into()))
        );
    }

    #[test]
    fn unknown_status_is_an_error() {
        let reading = WireReading {
            data: Value::Null,
            status: "LOUD".into(),
            severity: "NO_ALARM".into(),
            created_date: None,
        };
        assert!(unpack_reading(&reading).is_err());
    }

    #[test]
    fn dates_with_and_without_offset() {
        assert_eq!(parse_date("2024-05-01T12:00:00").unwrap().hour(), 12);
        assert_eq!(parse_date("2024-05-01T12:00:00+02:00").unwrap().hour(), 10);
        assert!(parse_date("May first").is_err());
    }
}

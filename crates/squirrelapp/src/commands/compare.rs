//! Pairwise comparison of two Snapshots.
//!
//! PVs pair up by setpoint address, or readback address for readback-only
//! PVs. Rows follow the main Snapshot's order; PVs found only in the other
//! Snapshot are appended after them.
//!
//! Numeric values match when `|a - b| <= abs + rel * |b|`, using the PV's own
//! tolerances, or `rel = 1e-5`, `abs = 1e-8` when the PV sets neither. Other
//! values match by equality. A value missing on either side is a mismatch.

use std::collections::HashSet;

use crate::model::{EpicsValue, Pv, Scalar, Snapshot};

pub const DEFAULT_REL_TOL: f64 = 1e-5;
pub const DEFAULT_ABS_TOL: f64 = 1e-8;

#[derive(Debug, Clone, PartialEq)]
pub struct PvComparison {
    /// The address the pair was matched on.
    pub address: String,
    pub main: Option<Pv>,
    pub other: Option<Pv>,
    pub setpoint_match: bool,
    pub readback_match: bool,
}

impl PvComparison {
    pub fn is_match(&self) -> bool {
        self.setpoint_match && self.readback_match
    }
}

fn key(pv: &Pv) -> &str {
    pv.setpoint
        .as_deref()
        .or(pv.readback.as_deref())
        .unwrap_or_default()
}

/// `isclose` with the given tolerances; `None` when either side is not numeric.
pub fn isclose(a: &Scalar, b: &Scalar, rel_tol: f64, abs_tol: f64) -> Option<bool> {
    let (a, b) = (a.as_f64()?, b.as_f64()?);
    if a == b {
        return Some(true);
    }
    Some((a - b).abs() <= abs_tol + rel_tol * b.abs())
}

/// Whether two captured values agree, with `pv`'s tolerances. The side
/// that has an address but no data makes the pair differ; two sides with
/// no address agree.
fn values_match(pv: &Pv, address: Option<&String>, a: &EpicsValue, b: &EpicsValue) -> bool {
    if address.is_none() {
        return true;
    }
    let (Some(a), Some(b)) = (&a.data, &b.data) else {
        return false;
    };
    let (rel, abs) = if pv.rel_tolerance == 0.0 && pv.abs_tolerance == 0.0 {
        (DEFAULT_REL_TOL, DEFAULT_ABS_TOL)
    } else {
        (pv.rel_tolerance, pv.abs_tolerance)
    };
    isclose(a, b, rel, abs).unwrap_or_else(|| a == b)
}

fn pair(main: &Pv, other: &Pv) -> PvComparison {
    PvComparison {
        address: key(main).to_string(),
        main: Some(main.clone()),
        other: Some(other.clone()),
        setpoint_match: values_match(
            main,
            main.setpoint.as_ref().or(other.setpoint.as_ref()),
            &main.setpoint_data,
            &other.setpoint_data,
        ),
        readback_match: values_match(
            main,
            main.readback.as_ref().or(other.readback.as_ref()),
            &main.readback_data,
            &other.readback_data,
        ),
    }
}

fn unpaired(pv: &Pv, in_main: bool) -> PvComparison {
    let (main, other) = if in_main {
        (Some(pv.clone()), None)
    } else {
        (None, Some(pv.clone()))
    };
    PvComparison {
        address: key(pv).to_string(),
        main,
        other,
        setpoint_match: false,
        readback_match: false,
    }
}

pub fn compare_snapshots(main: &Snapshot, other: &Snapshot) -> Vec<PvComparison> {
    let mut used = HashSet::new();
    let mut rows = Vec::with_capacity(main.pvs.len());

    for pv in &main.pvs {
        let found = other
            .pvs
            .iter()
            .enumerate()
            .find(|(i, candidate)| !used.contains(i) && key(candidate) == key(pv));
        match found {
            Some((i, candidate)) => {
                used.insert(i);
                rows.push(pair(pv, candidate));
            }
            None => rows.push(unpaired(pv, true)),
        }
    }
    rows.extend(
        other
            .pvs
            .iter()
            .enumerate()
            .filter(|(i, _)| !used.contains(i))
            .map(|(_, pv)| unpaired(pv, false)),
    );
    rows
}

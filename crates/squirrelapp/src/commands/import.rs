//! CSV import of PVs.
//!
//! ## File Format
//!
//! ```text
//! Setpoint,Readback,Description,Device,Region,Subsystem
//! GUNB:SP,GUNB:RB,Gun bias,GUN1,"A,B",Vacuum
//! ```
//!
//! `Setpoint` and `Readback` headers are required; each row needs at least
//! one of them filled, rows with neither are skipped. `Description` and
//! `Device` are optional. Every other column names a tag group and holds a
//! comma-separated list of tag names; empty cells, `nan` and `none` select no
//! tags.
//!
//! ## Validation
//!
//! Group and tag names resolve against the backend's TagDef. Unknown groups
//! and unknown tag names are dropped from the row and reported, the PV itself
//! is still imported. Rows the backend rejects are collected as row errors
//! and the import continues with the next row.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::path::Path;

use tracing::{debug, warn};

use super::CmdMessage;
use crate::error::{Result, SquirrelError};
use crate::model::Pv;
use crate::store::{Backend, NewPv};
use crate::tags::{TagDef, TagSet};

const SETPOINT: &str = "Setpoint";
const READBACK: &str = "Readback";
const DESCRIPTION: &str = "Description";
const DEVICE: &str = "Device";

/// One PV row. `line` is the 1-based line number in the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRow {
    pub line: usize,
    pub setpoint: Option<String>,
    pub readback: Option<String>,
    pub description: String,
    pub device: Option<String>,
    /// Tag group name to tag names, in column order.
    pub groups: Vec<(String, Vec<String>)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct ImportReport {
    pub imported: Vec<Pv>,
    pub errors: Vec<RowError>,
    pub rejected_groups: Vec<String>,
    pub rejected_values: BTreeMap<String, BTreeSet<String>>,
    pub messages: Vec<CmdMessage>,
}

impl ImportReport {
    /// One line describing rejected groups and values.
    pub fn validation_summary(&self) -> String {
        let mut parts = Vec::new();
        if !self.rejected_groups.is_empty() {
            parts.push(format!("Rejected groups: {}", self.rejected_groups.join(", ")));
        }
        if !self.rejected_values.is_empty() {
            let values: Vec<String> = self
                .rejected_values
                .iter()
                .map(|(group, names)| {
                    let names: Vec<&str> = names.iter().map(String::as_str).collect();
                    format!("{}: {}", group, names.join(", "))
                })
                .collect();
            parts.push(format!("Rejected values: {}", values.join(" | ")));
        }
        if parts.is_empty() {
            "All groups and values are valid".to_string()
        } else {
            parts.join(" ; ")
        }
    }

    fn reject_group(&mut self, group: &str) {
        if !self.rejected_groups.iter().any(|g| g == group) {
            warn!(group, "rejected CSV group, not found in backend");
            self.rejected_groups.push(group.to_string());
        }
    }

    fn reject_value(&mut self, group: &str, value: &str) {
        let inserted = self
            .rejected_values
            .entry(group.to_string())
            .or_default()
            .insert(value.to_string());
        if inserted {
            warn!(group, value, "rejected CSV value, not in backend choices");
        }
    }
}

pub fn parse_csv(path: &Path) -> Result<Vec<ImportRow>> {
    let file = std::fs::File::open(path)?;
    parse_reader(file)
}

pub fn parse_reader<R: Read>(input: R) -> Result<Vec<ImportRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(input);
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let column = |name: &str| headers.iter().position(|h| h == name);
    let (Some(setpoint_col), Some(readback_col)) = (column(SETPOINT), column(READBACK)) else {
        return Err(SquirrelError::Csv(format!(
            "CSV file must have '{}' and '{}' columns",
            SETPOINT, READBACK
        )));
    };
    let description_col = column(DESCRIPTION);
    let device_col = column(DEVICE);
    let group_cols: Vec<(usize, &String)> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| {
            !h.is_empty() && ![SETPOINT, READBACK, DESCRIPTION, DEVICE].contains(&h.as_str())
        })
        .collect();

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record?;
        let cell = |col: Option<usize>| {
            col.and_then(|c| record.get(c))
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(String::from)
        };
        let setpoint = cell(Some(setpoint_col));
        let readback = cell(Some(readback_col));
        if setpoint.is_none() && readback.is_none() {
            continue;
        }
        let groups = group_cols
            .iter()
            .map(|(col, name)| ((*name).clone(), tag_names(record.get(*col).unwrap_or(""))))
            .collect();
        rows.push(ImportRow {
            line: record.position().map_or(index + 2, |p| p.line() as usize),
            setpoint,
            readback,
            description: cell(description_col).unwrap_or_default(),
            device: cell(device_col),
            groups,
        });
    }
    debug!(rows = rows.len(), "parsed CSV");
    Ok(rows)
}

fn tag_names(cell: &str) -> Vec<String> {
    let cell = cell.trim();
    if cell.is_empty() || cell.eq_ignore_ascii_case("nan") || cell.eq_ignore_ascii_case("none") {
        return Vec::new();
    }
    cell.split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
        .collect()
}

/// Add one PV per row, resolving tag names against the backend's TagDef.
pub fn import_rows<B: Backend>(backend: &mut B, rows: &[ImportRow]) -> Result<ImportReport> {
    let def = backend.get_tags()?;
    let mut report = ImportReport::default();

    for row in rows {
        let tags = resolve_tags(&def, row, &mut report);
        let new_pv = NewPv {
            setpoint: row.setpoint.clone(),
            readback: row.readback.clone(),
            description: row.description.clone(),
            device: row.device.clone(),
            tags,
            ..NewPv::default()
        };
        match backend.add_pv(new_pv) {
            Ok(pv) => report.imported.push(pv),
            Err(err) => {
                warn!(line = row.line, error = %err, "CSV row not imported");
                report.errors.push(RowError {
                    line: row.line,
                    message: err.to_string(),
                });
            }
        }
    }

    report.messages.push(CmdMessage::info(report.validation_summary()));
    for error in &report.errors {
        report
            .messages
            .push(CmdMessage::error(format!("line {}: {}", error.line, error.message)));
    }
    report.messages.push(if report.errors.is_empty() {
        CmdMessage::success(format!("Imported {} PVs", report.imported.len()))
    } else {
        CmdMessage::warning(format!(
            "Imported {} of {} PVs, {} failed",
            report.imported.len(),
            rows.len(),
            report.errors.len()
        ))
    });
    Ok(report)
}

fn resolve_tags(def: &TagDef, row: &ImportRow, report: &mut ImportReport) -> TagSet {
    let mut tags = TagSet::new();
    for (group_name, names) in &row.groups {
        let Some(group_id) = def.group_id(group_name) else {
            report.reject_group(group_name);
            continue;
        };
        let Some(group) = def.get(group_id) else {
            continue;
        };
        let mut ids = BTreeSet::new();
        for name in names {
            match group.tag_id(name) {
                Some(id) => {
                    ids.insert(id);
                }
                None => report.reject_value(group_name, name),
            }
        }
        if !ids.is_empty() {
            tags.insert(group_id, ids);
        }
    }
    tags
}

//! # Rendering
//!
//! Every function here turns library data into a `String`; handlers decide
//! when to print. Terminal mode is line oriented with fixed-width address
//! columns. JSON mode serializes the library types directly.

use chrono::{DateTime, Utc};
use squirrelapp::commands::apply::ApplyOutcome;
use squirrelapp::commands::compare::PvComparison;
use squirrelapp::commands::import::ImportReport;
use squirrelapp::commands::{CmdMessage, MessageLevel};
use squirrelapp::model::{Entry, EpicsValue, Pv, Severity, Snapshot};
use squirrelapp::tags::{TagDef, TagSet};

use super::styles;

pub const COL_ADDRESS: usize = 32;
pub const COL_VALUE: usize = 14;
const TIME_WIDTH: usize = 14;
const NONE: &str = "-";

pub fn messages(messages: &[CmdMessage]) -> String {
    let mut out = String::new();
    for message in messages {
        let style = match message.level {
            MessageLevel::Info => styles::muted(),
            MessageLevel::Success => styles::success(),
            MessageLevel::Warning => styles::warning(),
            MessageLevel::Error => styles::error(),
        };
        out.push_str(&format!("{}\n", style.apply_to(&message.content)));
    }
    out
}

pub fn format_time_ago(timestamp: DateTime<Utc>) -> String {
    let duration = Utc::now().signed_duration_since(timestamp);
    let formatter = timeago::Formatter::new();
    let text = formatter.convert(duration.to_std().unwrap_or_default());
    format!("{:>width$}", text, width = TIME_WIDTH)
}

/// Data, with the alarm appended when there is one; `-` for no data.
pub fn value(value: &EpicsValue) -> String {
    let Some(data) = &value.data else {
        return NONE.to_string();
    };
    let text = value
        .enum_label()
        .map(String::from)
        .unwrap_or_else(|| data.to_string());
    match value.severity {
        Severity::NoAlarm => text,
        severity => format!("{} ({} {})", text, value.status.name(), severity.name()),
    }
}

pub fn tags(def: &TagDef, tags: &TagSet) -> String {
    def.describe(tags)
        .into_iter()
        .map(|(group, names)| format!("{}: {}", group, names.join(", ")))
        .collect::<Vec<_>>()
        .join("; ")
}

fn or_none(address: &Option<String>) -> &str {
    address.as_deref().unwrap_or(NONE)
}

pub fn pv_table(pvs: &[Pv], def: &TagDef) -> String {
    if pvs.is_empty() {
        return format!("{}\n", styles::muted().apply_to("No PVs."));
    }
    let mut out = String::new();
    for pv in pvs {
        let mut line = format!(
            "{}  {}  {}",
            styles::address().apply_to(format!(
                "{:<width$}",
                or_none(&pv.setpoint),
                width = COL_ADDRESS
            )),
            format!("{:<width$}", or_none(&pv.readback), width = COL_ADDRESS),
            pv.description
        );
        let tags = tags(def, &pv.tags);
        if !tags.is_empty() {
            line.push_str(&format!("  {}", styles::tag().apply_to(format!("[{}]", tags))));
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

pub fn pv_detail(pv: &Pv, def: &TagDef) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n", styles::title().apply_to(pv.name())));
    let rows = [
        ("id", pv.uuid.to_string()),
        ("setpoint", or_none(&pv.setpoint).to_string()),
        ("readback", or_none(&pv.readback).to_string()),
        ("config", or_none(&pv.config).to_string()),
        ("device", or_none(&pv.device).to_string()),
        ("description", pv.description.clone()),
        ("tolerance", format!("abs {} / rel {}", pv.abs_tolerance, pv.rel_tolerance)),
        ("tags", tags(def, &pv.tags)),
        ("created", pv.creation_time.to_rfc3339()),
    ];
    for (label, text) in rows {
        out.push_str(&format!("  {:<12} {}\n", styles::muted().apply_to(label), text));
    }
    out
}

pub fn snapshot_list(snapshots: &[Snapshot]) -> String {
    if snapshots.is_empty() {
        return format!("{}\n", styles::muted().apply_to("No snapshots."));
    }
    let mut out = String::new();
    for snapshot in snapshots {
        out.push_str(&format!(
            "{}  {}  {}\n",
            styles::muted().apply_to(snapshot.uuid),
            styles::time().apply_to(format_time_ago(snapshot.creation_time)),
            styles::title().apply_to(&snapshot.title)
        ));
    }
    out
}

fn captured_row(pv: &Pv) -> String {
    format!(
        "  {}  {:<vw$}  {:<aw$}  {}\n",
        styles::address().apply_to(format!("{:<aw$}", or_none(&pv.setpoint), aw = COL_ADDRESS)),
        value(&pv.setpoint_data),
        or_none(&pv.readback),
        if pv.readback.is_some() {
            value(&pv.readback_data)
        } else {
            String::new()
        },
        vw = COL_VALUE,
        aw = COL_ADDRESS,
    )
}

pub fn snapshot_detail(snapshot: &Snapshot) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{}  {}\n",
        styles::title().apply_to(&snapshot.title),
        styles::time().apply_to(snapshot.creation_time.to_rfc3339())
    ));
    if !snapshot.description.is_empty() {
        out.push_str(&format!("{}\n", snapshot.description));
    }
    out.push('\n');
    for pv in &snapshot.pvs {
        out.push_str(&captured_row(pv));
    }
    if !snapshot.meta_pvs.is_empty() {
        out.push_str(&format!("\n{}\n", styles::muted().apply_to("metadata")));
        for pv in &snapshot.meta_pvs {
            out.push_str(&captured_row(pv));
        }
    }
    out
}

pub fn entries(entries: &[Entry], def: &TagDef) -> String {
    let (pvs, snapshots): (Vec<&Entry>, Vec<&Entry>) =
        entries.iter().partition(|e| e.as_pv().is_some());
    let pvs: Vec<Pv> = pvs.into_iter().filter_map(|e| e.as_pv().cloned()).collect();
    let snapshots: Vec<Snapshot> = snapshots
        .into_iter()
        .filter_map(|e| e.as_snapshot().cloned())
        .collect();

    let mut out = String::new();
    if !pvs.is_empty() || snapshots.is_empty() {
        out.push_str(&pv_table(&pvs, def));
    }
    if !snapshots.is_empty() {
        if !pvs.is_empty() {
            out.push('\n');
        }
        out.push_str(&snapshot_list(&snapshots));
    }
    out
}

pub fn comparison(rows: &[PvComparison], all: bool) -> String {
    let differing = rows.iter().filter(|r| !r.is_match()).count();
    let mut out = String::new();
    for row in rows.iter().filter(|r| all || !r.is_match()) {
        let side = |pv: &Option<Pv>| {
            pv.as_ref()
                .map(|pv| value(&pv.setpoint_data))
                .unwrap_or_else(|| "(absent)".to_string())
        };
        let marker = if row.is_match() {
            styles::matched().apply_to("=")
        } else {
            styles::mismatch().apply_to("≠")
        };
        out.push_str(&format!(
            "{} {}  {:<vw$}  {}\n",
            marker,
            styles::address().apply_to(format!("{:<aw$}", row.address, aw = COL_ADDRESS)),
            side(&row.main),
            side(&row.other),
            vw = COL_VALUE,
        ));
    }
    let summary = format!("{} of {} PVs differ", differing, rows.len());
    let style = if differing == 0 {
        styles::success()
    } else {
        styles::warning()
    };
    out.push_str(&format!("{}\n", style.apply_to(summary)));
    out
}

pub fn tag_def(def: &TagDef) -> String {
    if def.is_empty() {
        return format!("{}\n", styles::muted().apply_to("No tag groups."));
    }
    let mut out = String::new();
    for (id, group) in def.iter() {
        out.push_str(&format!(
            "{:>3}  {}",
            id,
            styles::title().apply_to(&group.name)
        ));
        if !group.description.is_empty() {
            out.push_str(&format!("  {}", styles::muted().apply_to(&group.description)));
        }
        out.push('\n');
        for (tag, name) in &group.tags {
            out.push_str(&format!("     {:>3}  {}\n", tag, styles::tag().apply_to(name)));
        }
    }
    out
}

/// The report's own messages: validation summary, row errors, totals.
pub fn import_report(report: &ImportReport) -> String {
    messages(&report.messages)
}

pub fn apply_outcome(outcome: &ApplyOutcome) -> String {
    let mut out = String::new();
    let mut line = |status: &squirrelapp::control::TaskStatus| {
        let style = if status.is_ok() {
            styles::success()
        } else {
            styles::error()
        };
        out.push_str(&format!("{}\n", style.apply_to(status)));
    };
    match outcome {
        ApplyOutcome::Bulk(status) => line(status),
        ApplyOutcome::Sequential(statuses) => statuses.iter().for_each(&mut line),
        ApplyOutcome::Aborted { completed, failed } => {
            completed.iter().for_each(&mut line);
            line(failed);
        }
    }
    if let ApplyOutcome::Aborted { .. } = outcome {
        out.push_str(&format!(
            "{}\n",
            styles::warning().apply_to("Stopped at the first failed write")
        ));
    }
    out
}

//! Write stored setpoint values back to the live system.

use tracing::{debug, warn};

use crate::control::{ControlLayer, PutRequest, TaskStatus};
use crate::error::{Result, SquirrelError};
use crate::model::{Entry, Pv, Scalar, Snapshot};

#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    /// One bulk request, or the single write of a lone PV.
    Bulk(TaskStatus),
    /// Every sequential write, all of them successful.
    Sequential(Vec<TaskStatus>),
    /// Sequential writes stopped at the first failure.
    Aborted {
        completed: Vec<TaskStatus>,
        failed: TaskStatus,
    },
}

impl ApplyOutcome {
    pub fn is_ok(&self) -> bool {
        match self {
            ApplyOutcome::Bulk(status) => status.is_ok(),
            ApplyOutcome::Sequential(statuses) => statuses.iter().all(TaskStatus::is_ok),
            ApplyOutcome::Aborted { .. } => false,
        }
    }

    /// Number of write requests issued.
    pub fn writes(&self) -> usize {
        match self {
            ApplyOutcome::Bulk(_) => 1,
            ApplyOutcome::Sequential(statuses) => statuses.len(),
            ApplyOutcome::Aborted { completed, .. } => completed.len() + 1,
        }
    }
}

pub fn run<C: ControlLayer>(
    control: &mut C,
    entry: &Entry,
    sequential: bool,
) -> Result<ApplyOutcome> {
    match entry {
        Entry::Pv(pv) => apply_pv(control, pv),
        Entry::Snapshot(snapshot) => Ok(apply_snapshot(control, snapshot, sequential)),
    }
}

fn apply_pv<C: ControlLayer>(control: &mut C, pv: &Pv) -> Result<ApplyOutcome> {
    let Some(address) = pv.setpoint.as_deref() else {
        return Err(SquirrelError::Api(format!(
            "PV {} has no setpoint address to apply",
            pv.uuid
        )));
    };
    let Some(value) = &pv.setpoint_data.data else {
        return Err(SquirrelError::Api(format!(
            "PV {} has no setpoint value to apply",
            address
        )));
    };
    debug!(address, value = %value, "putting");
    Ok(ApplyOutcome::Bulk(control.put(address, value)))
}

/// Setpoints with data; PVs lacking either are skipped.
fn requests(snapshot: &Snapshot) -> Vec<PutRequest> {
    snapshot
        .pvs
        .iter()
        .filter_map(|pv| {
            let address = pv.setpoint.as_ref()?;
            let value: &Scalar = pv.setpoint_data.data.as_ref()?;
            Some(PutRequest::new(address.as_str(), value.clone()))
        })
        .collect()
}

fn apply_snapshot<C: ControlLayer>(
    control: &mut C,
    snapshot: &Snapshot,
    sequential: bool,
) -> ApplyOutcome {
    let requests = requests(snapshot);
    debug!(
        snapshot = %snapshot.uuid,
        writes = requests.len(),
        sequential,
        "applying snapshot"
    );
    if !sequential {
        return ApplyOutcome::Bulk(control.put_many(&requests));
    }

    let mut completed = Vec::with_capacity(requests.len());
    for request in &requests {
        debug!(address = %request.address, value = %request.value, "putting");
        let status = control.put(&request.address, &request.value);
        if !status.is_ok() {
            warn!(
                address = %request.address,
                value = %request.value,
                "put failed, terminating put sequence"
            );
            return ApplyOutcome::Aborted {
                completed,
                failed: status,
            };
        }
        completed.push(status);
    }
    ApplyOutcome::Sequential(completed)
}

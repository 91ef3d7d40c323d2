//! Capture live values into a Snapshot.
//!
//! Every active PV and every meta PV is read through the control layer.
//! Each distinct address is read once even when several PVs share it. A
//! failed read does not abort the capture: that control point gets an
//! [`EpicsValue::absent`] value and the failure is logged.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::control::ControlLayer;
use crate::error::Result;
use crate::model::{EpicsValue, Pv, Snapshot};
use crate::store::Backend;

/// Capture into `dest` when given, otherwise into a fresh Snapshot. Captured
/// PVs are appended in backend order; meta PVs go to `meta_pvs`.
pub fn run<B: Backend, C: ControlLayer>(
    backend: &B,
    control: &C,
    dest: Option<Snapshot>,
) -> Result<Snapshot> {
    let pvs = backend.get_all_pvs()?;
    let meta_pvs = backend.get_meta_pvs()?;
    debug!(pvs = pvs.len(), meta = meta_pvs.len(), "capturing snapshot");

    let mut reader = Reader::new(control);
    let mut snapshot = dest.unwrap_or_default();
    snapshot
        .pvs
        .extend(pvs.into_iter().map(|pv| reader.fill(pv)));
    snapshot
        .meta_pvs
        .extend(meta_pvs.into_iter().map(|pv| reader.fill(pv)));

    if reader.failures > 0 {
        warn!(
            failures = reader.failures,
            "snapshot captured with unreadable addresses"
        );
    }
    Ok(snapshot)
}

/// Reads addresses through a per-capture memo.
struct Reader<'c, C> {
    control: &'c C,
    seen: HashMap<String, EpicsValue>,
    failures: usize,
}

impl<'c, C: ControlLayer> Reader<'c, C> {
    fn new(control: &'c C) -> Self {
        Self {
            control,
            seen: HashMap::new(),
            failures: 0,
        }
    }

    fn read(&mut self, address: &str) -> EpicsValue {
        if let Some(value) = self.seen.get(address) {
            return value.clone();
        }
        let value = match self.control.get(address) {
            Ok(value) => value,
            Err(err) => {
                warn!(address, error = %err, "read failed, storing absent value");
                self.failures += 1;
                EpicsValue::absent()
            }
        };
        self.seen.insert(address.to_string(), value.clone());
        value
    }

    fn fill(&mut self, mut pv: Pv) -> Pv {
        if let Some(address) = pv.setpoint.clone() {
            pv.setpoint_data = self.read(&address);
        }
        if let Some(address) = pv.readback.clone() {
            pv.readback_data = self.read(&address);
        }
        if let Some(address) = pv.config.clone() {
            pv.config_data = self.read(&address);
        }
        pv
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::fixtures::FakeControl;
    use crate::model::Scalar;
    use crate::store::memory::fixtures::StoreFixture;

    fn three_pvs() -> StoreFixture {
        StoreFixture::new()
            .with_pv(Pv::new().with_setpoint("P1"))
            .with_pv(Pv::new().with_setpoint("P2"))
            .with_pv(Pv::new().with_setpoint("P3"))
    }

    #[test]
    fn test_failed_read_is_isolated() {
        let fixture = three_pvs();
        let control = FakeControl::new()
            .with_value("P1", EpicsValue::new(1.0))
            .failing_read("P2")
            .with_value("P3", EpicsValue::new(3.0));

        let snapshot = run(&fixture.store, &control, None).unwrap();

        let names: Vec<_> = snapshot.pvs.iter().map(|pv| pv.name()).collect();
        assert_eq!(names, vec!["P1", "P2", "P3"]);
        assert_eq!(snapshot.pvs[0].setpoint_data.data, Some(Scalar::Float(1.0)));
        assert_eq!(snapshot.pvs[1].setpoint_data.data, None);
        assert_eq!(snapshot.pvs[2].setpoint_data.data, Some(Scalar::Float(3.0)));
    }

    #[test]
    fn test_shared_addresses_read_once() {
        let fixture = StoreFixture::new()
            .with_pv(Pv::new().with_setpoint("SP").with_readback("RB"))
            .with_pv(Pv::new().with_readback("RB"));
        let control = FakeControl::new()
            .with_value("SP", EpicsValue::new(1i64))
            .with_value("RB", EpicsValue::new(2i64));

        let snapshot = run(&fixture.store, &control, None).unwrap();

        assert_eq!(control.reads(), vec!["SP", "RB"]);
        assert_eq!(snapshot.pvs[1].readback_data.data, Some(Scalar::Int(2)));
    }

    #[test]
    fn test_meta_pvs_kept_apart() {
        let fixture = three_pvs().with_meta_pv("BEAM:DEST");
        let control = FakeControl::new()
            .with_value("P1", EpicsValue::new(1.0))
            .with_value("P2", EpicsValue::new(2.0))
            .with_value("P3", EpicsValue::new(3.0))
            .with_value("BEAM:DEST", EpicsValue::new("SC_HXR"));

        let snapshot = run(&fixture.store, &control, None).unwrap();

        assert_eq!(snapshot.pvs.len(), 3);
        assert_eq!(snapshot.meta_pvs.len(), 1);
        assert_eq!(
            snapshot.meta_pvs[0].readback_data.data,
            Some(Scalar::Str("SC_HXR".into()))
        );
    }

    #[test]
    fn test_fills_given_destination() {
        let fixture = three_pvs();
        let dest = Snapshot::new("Nightly", "before shutdown");
        let id = dest.uuid;

        let snapshot = run(&fixture.store, &FakeControl::new(), Some(dest)).unwrap();

        assert_eq!(snapshot.uuid, id);
        assert_eq!(snapshot.title, "Nightly");
        assert_eq!(snapshot.pvs.len(), 3);
        assert!(snapshot.pvs.iter().all(|pv| !pv.setpoint_data.has_data()));
    }

    #[test]
    fn test_archived_pvs_not_captured() {
        let mut fixture = three_pvs();
        let pvs = fixture.store.get_all_pvs().unwrap();
        fixture.store.archive_pv(&pvs[0].uuid).unwrap();

        let snapshot = run(&fixture.store, &FakeControl::new(), None).unwrap();

        assert_eq!(snapshot.pvs.len(), 2);
        assert!(!snapshot.contains_pv(&pvs[0].uuid));
    }
}

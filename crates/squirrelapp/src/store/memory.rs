use super::entry_store::{Document, EntryStore};
use super::mem_backend::MemBackend;

pub type InMemoryStore = EntryStore<MemBackend>;

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        EntryStore::with_backend(MemBackend::new())
    }

    /// A store pre-populated with the given document.
    pub fn from_document(document: Document) -> Self {
        EntryStore::with_backend(MemBackend::with_document(document))
    }
}

// --- Test Fixtures ---

#[cfg(any(test, feature = "test_utils"))]
pub mod fixtures {
    use super::*;
    use crate::model::{EpicsValue, Pv, Snapshot};
    use crate::store::{Backend, NewPv};
    use crate::tags::{TagGroup, TagSet};
    use std::collections::BTreeSet;

    pub struct StoreFixture {
        pub store: InMemoryStore,
    }

    impl Default for StoreFixture {
        fn default() -> Self {
            Self::new()
        }
    }

    impl StoreFixture {
        pub fn new() -> Self {
            Self {
                store: InMemoryStore::new(),
            }
        }

        /// Group 0 "Region" with tags 0 "A" and 1 "B".
        pub fn with_region_tags(mut self) -> Self {
            let mut def = self.store_tags();
            def.insert(
                0,
                TagGroup::new("Region", "").with_tag(0, "A").with_tag(1, "B"),
            );
            self.store.set_tags(&def).unwrap();
            self
        }

        /// Group 1 "Subsystem" with tags 0 "Vacuum", 1 "RF" and 2 "Magnets".
        pub fn with_subsystem_tags(mut self) -> Self {
            let mut def = self.store_tags();
            def.insert(
                1,
                TagGroup::new("Subsystem", "Owning subsystem")
                    .with_tag(0, "Vacuum")
                    .with_tag(1, "RF")
                    .with_tag(2, "Magnets"),
            );
            self.store.set_tags(&def).unwrap();
            self
        }

        pub fn with_pv(mut self, pv: Pv) -> Self {
            self.store.save_entry(&pv.into()).unwrap();
            self
        }

        /// `count` setpoint-only PVs named `PV:<n>:SP`, with setpoint data `n`.
        pub fn with_pvs(mut self, count: usize) -> Self {
            for i in 0..count {
                let pv = Pv::new()
                    .with_setpoint(format!("PV:{}:SP", i + 1))
                    .with_description(format!("Test PV {}", i + 1))
                    .with_setpoint_data(EpicsValue::new((i + 1) as f64));
                self.store.save_entry(&pv.into()).unwrap();
            }
            self
        }

        pub fn with_tagged_pv(mut self, setpoint: &str, group: u32, tags: &[u32]) -> Self {
            let ids = tags.iter().copied().collect::<BTreeSet<_>>();
            let tags = TagSet::from([(group, ids)]);
            self.store
                .add_pv(NewPv::new(Some(setpoint), None, "").with_tags(tags))
                .unwrap();
            self
        }

        pub fn with_meta_pv(mut self, readback: &str) -> Self {
            let mut meta = self.store.get_meta_pvs().unwrap();
            meta.push(Pv::new().with_readback(readback));
            self.store.set_meta_pvs(&meta).unwrap();
            self
        }

        /// A snapshot of every current PV, captured as stored.
        pub fn with_snapshot(mut self, title: &str) -> Self {
            let mut snapshot = Snapshot::new(title, "");
            snapshot.pvs = self.store.get_all_pvs().unwrap();
            self.store.add_snapshot(&snapshot).unwrap();
            self
        }

        fn store_tags(&self) -> crate::tags::TagDef {
            self.store.get_tags().unwrap()
        }
    }
}

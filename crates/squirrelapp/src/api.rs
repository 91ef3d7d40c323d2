//! # API Facade
//!
//! [`Client`] is the single entry point for every squirrel operation,
//! whatever UI sits on top. It owns a [`Backend`] and a [`ControlLayer`] and
//! dispatches to the command layer.
//!
//! ## What the Client Adds
//!
//! Most methods pass straight through to the backend. The client-only
//! behavior is:
//! - **`isclose` search terms**, expanded into bounds before the backend sees
//!   them ([`commands::search`])
//! - **`snap`**, which reads live values ([`commands::snap`])
//! - **`apply`**, which writes them back ([`commands::apply`])
//! - **CSV import** and **Snapshot comparison**
//!
//! ## Generic Over Backend
//!
//! `Client<B: Backend, C: ControlLayer>`:
//! - Production: `Client<AnyBackend, Disconnected>` or an external shim
//! - Testing: `Client<InMemoryStore, FakeControl>`

use std::path::Path;

use uuid::Uuid;

use crate::commands::{self, apply::ApplyOutcome, compare::PvComparison, import::ImportReport};
use crate::commands::search::QueryTerm;
use crate::control::ControlLayer;
use crate::error::{Result, SquirrelError};
use crate::model::{Entry, Pv, Snapshot};
use crate::store::{Backend, NewPv, PvUpdate, SnapshotFilter};
use crate::tags::{GroupId, TagDef, TagId};

pub struct Client<B: Backend, C: ControlLayer> {
    backend: B,
    control: C,
}

impl<B: Backend, C: ControlLayer> Client<B, C> {
    pub fn new(backend: B, control: C) -> Self {
        Self { backend, control }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn control(&self) -> &C {
        &self.control
    }

    // --- Entries ---

    pub fn search(&self, terms: &[QueryTerm]) -> Result<Vec<Entry>> {
        commands::search::run(&self.backend, terms)
    }

    pub fn get(&self, id: &Uuid) -> Result<Entry> {
        self.backend.get_entry(id)
    }

    pub fn save(&mut self, entry: &Entry) -> Result<()> {
        self.backend.save_entry(entry)
    }

    pub fn update(&mut self, entry: &Entry) -> Result<()> {
        self.backend.update_entry(entry)
    }

    pub fn delete(&mut self, entry: &Entry) -> Result<()> {
        self.backend.delete_entry(entry)
    }

    // --- PVs ---

    pub fn pvs(&self) -> Result<Vec<Pv>> {
        self.backend.get_all_pvs()
    }

    pub fn add_pv(&mut self, pv: NewPv) -> Result<Pv> {
        self.backend.add_pv(pv)
    }

    pub fn update_pv(&mut self, id: &Uuid, update: &PvUpdate) -> Result<Pv> {
        if update.is_empty() {
            return Err(SquirrelError::Api(format!("nothing to update for PV {}", id)));
        }
        self.backend.update_pv(id, update)
    }

    pub fn archive_pv(&mut self, id: &Uuid) -> Result<()> {
        self.backend.archive_pv(id)
    }

    pub fn meta_pvs(&self) -> Result<Vec<Pv>> {
        self.backend.get_meta_pvs()
    }

    pub fn set_meta_pvs(&mut self, pvs: &[Pv]) -> Result<()> {
        self.backend.set_meta_pvs(pvs)
    }

    // --- Snapshots ---

    pub fn snapshots(&self, filter: &SnapshotFilter) -> Result<Vec<Snapshot>> {
        self.backend.get_snapshots(filter)
    }

    /// The full Snapshot, PV list included.
    pub fn snapshot(&self, id: &Uuid) -> Result<Snapshot> {
        self.backend
            .get_snapshots(&SnapshotFilter::by_id(*id))?
            .into_iter()
            .next()
            .ok_or(SquirrelError::EntryNotFound(*id))
    }

    /// Capture live values of every active PV and meta PV.
    pub fn snap(&self, dest: Option<Snapshot>) -> Result<Snapshot> {
        commands::snap::run(&self.backend, &self.control, dest)
    }

    pub fn apply(&mut self, entry: &Entry, sequential: bool) -> Result<ApplyOutcome> {
        commands::apply::run(&mut self.control, entry, sequential)
    }

    pub fn compare(&self, main: &Uuid, other: &Uuid) -> Result<Vec<PvComparison>> {
        let main = self.snapshot(main)?;
        let other = self.snapshot(other)?;
        Ok(commands::compare::compare_snapshots(&main, &other))
    }

    pub fn import_csv(&mut self, path: &Path) -> Result<ImportReport> {
        let rows = commands::import::parse_csv(path)?;
        commands::import::import_rows(&mut self.backend, &rows)
    }

    // --- Tags ---

    pub fn tags(&self) -> Result<TagDef> {
        self.backend.get_tags()
    }

    pub fn set_tags(&mut self, tags: &TagDef) -> Result<()> {
        self.backend.set_tags(tags)
    }

    pub fn add_tag_group(&mut self, name: &str, description: &str) -> Result<GroupId> {
        self.backend.add_tag_group(name, description)
    }

    pub fn update_tag_group(
        &mut self,
        group: GroupId,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<()> {
        self.backend.update_tag_group(group, name, description)
    }

    pub fn delete_tag_group(&mut self, group: GroupId) -> Result<()> {
        self.backend.delete_tag_group(group)
    }

    pub fn add_tag_to_group(&mut self, group: GroupId, name: &str) -> Result<TagId> {
        self.backend.add_tag_to_group(group, name)
    }

    pub fn update_tag_in_group(
        &mut self,
        group: GroupId,
        tag: TagId,
        name: Option<&str>,
    ) -> Result<()> {
        self.backend.update_tag_in_group(group, tag, name)
    }

    pub fn delete_tag_from_group(&mut self, group: GroupId, tag: TagId) -> Result<()> {
        self.backend.delete_tag_from_group(group, tag)
    }
}

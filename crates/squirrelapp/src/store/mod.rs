//! # Storage Layer
//!
//! This module defines the [`Backend`] contract every persistence variant
//! honors, and its implementations:
//!
//! - [`memory::InMemoryStore`]: volatile store for tests and demos.
//! - [`fs::FileStore`]: one JSON document on disk.
//! - [`remote::HttpBackend`]: a REST service over HTTP.
//! - [`any::AnyBackend`]: closed sum over the three, built from config.
//!
//! The two local variants share one implementation, [`EntryStore`], over a
//! raw document I/O trait ([`backend::StorageBackend`]). `EntryStore` holds
//! the business rules (tag validation, cascades, archival), the raw backend
//! only loads and saves.
//!
//! ## Ownership
//!
//! The backend owns the persisted PVs, Snapshots, TagDef and meta PVs.
//! Everything it returns is a working copy; changes persist only when passed
//! back through an update call.
//!
//! ## Deletion
//!
//! Deleting a PV is archival once a Snapshot references it: the PV drops out
//! of [`Backend::get_all_pvs`] and search, but [`Backend::get_entry`] still
//! resolves it and existing Snapshots keep their captured copy. A PV no
//! Snapshot references is erased. Both deletes first check that the caller's
//! copy matches the stored one, so a stale copy cannot delete newer data.
//!
//! ## Storage Layout
//!
//! ```text
//! filestore.json
//! {
//!   "pvs":       [...],   # active PVs, insertion order
//!   "archived":  [...],   # archived PVs
//!   "snapshots": [...],
//!   "tags":      {...},   # TagDef
//!   "meta_pvs":  [...]
//! }
//! ```

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::attributes::SearchTerm;
use crate::error::Result;
use crate::model::{Entry, Pv, Snapshot};
use crate::tags::{GroupId, TagDef, TagId, TagSet};

pub mod any;
pub mod backend;
pub mod entry_store;
pub mod fs;
pub mod fs_backend;
pub mod mem_backend;
pub mod memory;
pub mod remote;

pub use any::{AnyBackend, BackendKind};
pub use entry_store::{Document, EntryStore};

/// Abstract interface for entry persistence.
///
/// Reads take `&self`, mutations `&mut self`. All calls are synchronous;
/// the remote variant blocks on the network.
pub trait Backend {
    // --- Entries ---

    /// The unique entry with that identity, archived PVs included.
    fn get_entry(&self, id: &Uuid) -> Result<Entry>;

    /// Insert a new entry. Fails with `EntryExists` on a duplicate identity.
    fn save_entry(&mut self, entry: &Entry) -> Result<()>;

    /// Replace stored data for an existing identity.
    fn update_entry(&mut self, entry: &Entry) -> Result<()>;

    /// Remove an entry, archiving PVs that Snapshots still reference.
    fn delete_entry(&mut self, entry: &Entry) -> Result<()>;

    /// Entries for which every term holds, in store order.
    fn search(&self, terms: &[SearchTerm]) -> Result<Vec<Entry>>;

    // --- Tags ---

    fn get_tags(&self) -> Result<TagDef>;

    /// Replace the complete TagDef.
    fn set_tags(&mut self, tags: &TagDef) -> Result<()>;

    fn add_tag_group(&mut self, name: &str, description: &str) -> Result<GroupId>;

    /// `None` keeps the current value.
    fn update_tag_group(
        &mut self,
        group: GroupId,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<()>;

    /// Removes the group and every PV's reference to it.
    fn delete_tag_group(&mut self, group: GroupId) -> Result<()>;

    fn add_tag_to_group(&mut self, group: GroupId, name: &str) -> Result<TagId>;

    fn update_tag_in_group(&mut self, group: GroupId, tag: TagId, name: Option<&str>)
        -> Result<()>;

    /// Removes the tag and every PV's reference to it.
    fn delete_tag_from_group(&mut self, group: GroupId, tag: TagId) -> Result<()>;

    // --- Meta PVs ---

    fn get_meta_pvs(&self) -> Result<Vec<Pv>>;

    fn set_meta_pvs(&mut self, pvs: &[Pv]) -> Result<()>;

    // --- PVs ---

    fn add_pv(&mut self, pv: NewPv) -> Result<Pv>;

    fn add_multiple_pvs(&mut self, pvs: Vec<NewPv>) -> Result<Vec<Pv>> {
        pvs.into_iter().map(|pv| self.add_pv(pv)).collect()
    }

    /// Change only the fields set in `update`.
    fn update_pv(&mut self, id: &Uuid, update: &PvUpdate) -> Result<Pv>;

    fn archive_pv(&mut self, id: &Uuid) -> Result<()>;

    /// Active PVs in insertion order.
    fn get_all_pvs(&self) -> Result<Vec<Pv>>;

    // --- Snapshots ---

    fn add_snapshot(&mut self, snapshot: &Snapshot) -> Result<()> {
        self.save_entry(&Entry::Snapshot(snapshot.clone()))
    }

    fn get_snapshots(&self, filter: &SnapshotFilter) -> Result<Vec<Snapshot>>;

    fn delete_snapshot(&mut self, snapshot: &Snapshot) -> Result<()> {
        self.delete_entry(&Entry::Snapshot(snapshot.clone()))
    }
}

/// Parameters for a PV the backend creates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewPv {
    pub setpoint: Option<String>,
    pub readback: Option<String>,
    pub config: Option<String>,
    pub description: String,
    pub device: Option<String>,
    pub tags: TagSet,
    pub abs_tolerance: f64,
    pub rel_tolerance: f64,
}

impl NewPv {
    pub fn new(setpoint: Option<&str>, readback: Option<&str>, description: &str) -> Self {
        Self {
            setpoint: setpoint.map(String::from),
            readback: readback.map(String::from),
            description: description.to_string(),
            ..Self::default()
        }
    }

    pub fn with_tags(mut self, tags: TagSet) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_device(mut self, device: &str) -> Self {
        self.device = Some(device.to_string());
        self
    }

    /// A fresh PV with its own identity and creation time.
    pub fn into_pv(self) -> Pv {
        Pv {
            description: self.description,
            device: self.device,
            setpoint: self.setpoint,
            readback: self.readback,
            config: self.config,
            abs_tolerance: self.abs_tolerance,
            rel_tolerance: self.rel_tolerance,
            tags: self.tags,
            ..Pv::default()
        }
    }
}

impl From<&Pv> for NewPv {
    fn from(pv: &Pv) -> Self {
        Self {
            setpoint: pv.setpoint.clone(),
            readback: pv.readback.clone(),
            config: pv.config.clone(),
            description: pv.description.clone(),
            device: pv.device.clone(),
            tags: pv.tags.clone(),
            abs_tolerance: pv.abs_tolerance,
            rel_tolerance: pv.rel_tolerance,
        }
    }
}

/// Partial PV update: `None` leaves a field as stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PvUpdate {
    pub setpoint: Option<String>,
    pub readback: Option<String>,
    pub description: Option<String>,
    pub device: Option<String>,
    pub tags: Option<TagSet>,
    pub abs_tolerance: Option<f64>,
    pub rel_tolerance: Option<f64>,
}

impl PvUpdate {
    pub fn is_empty(&self) -> bool {
        *self == PvUpdate::default()
    }

    pub fn apply(&self, pv: &mut Pv) {
        if let Some(setpoint) = &self.setpoint {
            pv.setpoint = Some(setpoint.clone());
        }
        if let Some(readback) = &self.readback {
            pv.readback = Some(readback.clone());
        }
        if let Some(description) = &self.description {
            pv.description = description.clone();
        }
        if let Some(device) = &self.device {
            pv.device = Some(device.clone());
        }
        if let Some(tags) = &self.tags {
            pv.tags = tags.clone();
        }
        if let Some(abs) = self.abs_tolerance {
            pv.abs_tolerance = abs;
        }
        if let Some(rel) = self.rel_tolerance {
            pv.rel_tolerance = rel;
        }
    }
}

/// Snapshot selection for [`Backend::get_snapshots`]. Empty selects all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotFilter {
    /// One specific snapshot; other fields are ignored when set.
    pub uuid: Option<Uuid>,
    /// Substring of the title.
    pub title: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl SnapshotFilter {
    pub fn by_id(id: Uuid) -> Self {
        Self {
            uuid: Some(id),
            ..Self::default()
        }
    }

    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn matches(&self, snapshot: &Snapshot) -> bool {
        if let Some(id) = self.uuid {
            return snapshot.uuid == id;
        }
        if let Some(title) = &self.title {
            if !snapshot.title.contains(title.as_str()) {
                return false;
            }
        }
        if self.since.is_some_and(|since| snapshot.creation_time < since) {
            return false;
        }
        if self.until.is_some_and(|until| snapshot.creation_time > until) {
            return false;
        }
        true
    }
}

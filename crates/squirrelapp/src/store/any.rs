//! Closed set of backend variants, chosen at runtime from configuration.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use uuid::Uuid;

use super::fs::FileStore;
use super::memory::InMemoryStore;
use super::remote::HttpBackend;
use super::{Backend, NewPv, PvUpdate, SnapshotFilter};
use crate::attributes::SearchTerm;
use crate::config::{build_abs_path, BackendConfig};
use crate::error::{Result, SquirrelError};
use crate::model::{Entry, Pv, Snapshot};
use crate::tags::{GroupId, TagDef, TagId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Memory,
    File,
    Remote,
}

impl BackendKind {
    pub const ALL: [BackendKind; 3] = [BackendKind::Memory, BackendKind::File, BackendKind::Remote];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Memory => "test",
            BackendKind::File => "file",
            BackendKind::Remote => "remote",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = SquirrelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "test" | "memory" => Ok(BackendKind::Memory),
            "file" | "filestore" => Ok(BackendKind::File),
            "remote" | "mongo" => Ok(BackendKind::Remote),
            other => {
                let known: Vec<_> = Self::ALL.iter().map(BackendKind::as_str).collect();
                Err(SquirrelError::Config(format!(
                    "unknown backend type '{}' (known: {})",
                    other,
                    known.join(", ")
                )))
            }
        }
    }
}

pub enum AnyBackend {
    Memory(InMemoryStore),
    File(FileStore),
    Remote(HttpBackend),
}

impl AnyBackend {
    /// Build the configured backend. Relative file paths resolve against
    /// `base_dir`, the directory holding the config file.
    pub fn from_config(config: &BackendConfig, base_dir: &Path) -> Self {
        match config {
            BackendConfig::Test => AnyBackend::Memory(InMemoryStore::new()),
            BackendConfig::File { path } => {
                AnyBackend::File(FileStore::open(build_abs_path(base_dir, path)))
            }
            BackendConfig::Remote {
                address,
                timeout_secs,
            } => {
                let backend = match timeout_secs {
                    Some(secs) => HttpBackend::with_timeout(address, Duration::from_secs(*secs)),
                    None => HttpBackend::new(address),
                };
                AnyBackend::Remote(backend)
            }
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            AnyBackend::Memory(_) => BackendKind::Memory,
            AnyBackend::File(_) => BackendKind::File,
            AnyBackend::Remote(_) => BackendKind::Remote,
        }
    }

    /// Where the data lives, for display.
    pub fn location(&self) -> String {
        match self {
            AnyBackend::Memory(_) => "memory".to_string(),
            AnyBackend::File(store) => store.path().display().to_string(),
            AnyBackend::Remote(remote) => remote.address().to_string(),
        }
    }
}

macro_rules! dispatch {
    ($self:ident, $backend:ident => $call:expr) => {
        match $self {
            AnyBackend::Memory($backend) => $call,
            AnyBackend::File($backend) => $call,
            AnyBackend::Remote($backend) => $call,
        }
    };
}

impl Backend for AnyBackend {
    fn get_entry(&self, id: &Uuid) -> Result<Entry> {
        dispatch!(self, b => b.get_entry(id))
    }

    fn save_entry(&mut self, entry: &Entry) -> Result<()> {
        dispatch!(self, b => b.save_entry(entry))
    }

    fn update_entry(&mut self, entry: &Entry) -> Result<()> {
        dispatch!(self, b => b.update_entry(entry))
    }

    fn delete_entry(&mut self, entry: &Entry) -> Result<()> {
        dispatch!(self, b => b.delete_entry(entry))
    }

    fn search(&self, terms: &[SearchTerm]) -> Result<Vec<Entry>> {
        dispatch!(self, b => b.search(terms))
    }

    fn get_tags(&self) -> Result<TagDef> {
        dispatch!(self, b => b.get_tags())
    }

    fn set_tags(&mut self, tags: &TagDef) -> Result<()> {
        dispatch!(self, b => b.set_tags(tags))
    }

    fn add_tag_group(&mut self, name: &str, description: &str) -> Result<GroupId> {
        dispatch!(self, b => b.add_tag_group(name, description))
    }

    fn update_tag_group(
        &mut self,
        group: GroupId,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<()> {
        dispatch!(self, b => b.update_tag_group(group, name, description))
    }

    fn delete_tag_group(&mut self, group: GroupId) -> Result<()> {
        dispatch!(self, b => b.delete_tag_group(group))
    }

    fn add_tag_to_group(&mut self, group: GroupId, name: &str) -> Result<TagId> {
        dispatch!(self, b => b.add_tag_to_group(group, name))
    }

    fn update_tag_in_group(
        &mut self,
        group: GroupId,
        tag: TagId,
        name: Option<&str>,
    ) -> Result<()> {
        dispatch!(self, b => b.update_tag_in_group(group, tag, name))
    }

    fn delete_tag_from_group(&mut self, group: GroupId, tag: TagId) -> Result<()> {
        dispatch!(self, b => b.delete_tag_from_group(group, tag))
    }

    fn get_meta_pvs(&self) -> Result<Vec<Pv>> {
        dispatch!(self, b => b.get_meta_pvs())
    }

    fn set_meta_pvs(&mut self, pvs: &[Pv]) -> Result<()> {
        dispatch!(self, b => b.set_meta_pvs(pvs))
    }

    fn add_pv(&mut self, pv: NewPv) -> Result<Pv> {
        dispatch!(self, b => b.add_pv(pv))
    }

    fn add_multiple_pvs(&mut self, pvs: Vec<NewPv>) -> Result<Vec<Pv>> {
        dispatch!(self, b => b.add_multiple_pvs(pvs))
    }

    fn update_pv(&mut self, id: &Uuid, update: &PvUpdate) -> Result<Pv> {
        dispatch!(self, b => b.update_pv(id, update))
    }

    fn archive_pv(&mut self, id: &Uuid) -> Result<()> {
        dispatch!(self, b => b.archive_pv(id))
    }

    fn get_all_pvs(&self) -> Result<Vec<Pv>> {
        dispatch!(self, b => b.get_all_pvs())
    }

    fn add_snapshot(&mut self, snapshot: &Snapshot) -> Result<()> {
        dispatch!(self, b => b.add_snapshot(snapshot))
    }

    fn get_snapshots(&self, filter: &SnapshotFilter) -> Result<Vec<Snapshot>> {
        dispatch!(self, b => b.get_snapshots(filter))
    }

    fn delete_snapshot(&mut self, snapshot: &Snapshot) -> Result<()> {
        dispatch!(self, b => b.delete_snapshot(snapshot))
    }
}

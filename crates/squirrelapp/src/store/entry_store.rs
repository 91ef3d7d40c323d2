use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use super::backend::StorageBackend;
use super::{Backend, NewPv, PvUpdate, SnapshotFilter};
use crate::attributes::{filter_entries, SearchTerm};
use crate::error::{Result, SquirrelError};
use crate::model::{Entry, Pv, Snapshot};
use crate::tags::{
    drop_group, drop_tag, prune_tag_set, validate_name, validate_tag_set, GroupId, TagDef,
    TagGroup, TagId,
};

/// Everything a local store persists, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub pvs: Vec<Pv>,
    #[serde(default)]
    pub archived: Vec<Pv>,
    #[serde(default)]
    pub snapshots: Vec<Snapshot>,
    #[serde(default)]
    pub tags: TagDef,
    #[serde(default)]
    pub meta_pvs: Vec<Pv>,
}

impl Document {
    fn contains(&self, id: &Uuid) -> bool {
        self.pvs.iter().any(|pv| pv.uuid == *id)
            || self.archived.iter().any(|pv| pv.uuid == *id)
            || self.snapshots.iter().any(|s| s.uuid == *id)
    }

    fn find(&self, id: &Uuid) -> Option<Entry> {
        self.pvs
            .iter()
            .chain(self.archived.iter())
            .find(|pv| pv.uuid == *id)
            .cloned()
            .map(Entry::Pv)
            .or_else(|| {
                self.snapshots
                    .iter()
                    .find(|s| s.uuid == *id)
                    .cloned()
                    .map(Entry::Snapshot)
            })
    }

    fn referenced(&self, id: &Uuid) -> bool {
        self.snapshots.iter().any(|s| s.contains_pv(id))
    }

    /// Active and archived PVs.
    fn stored_pvs_mut(&mut self) -> impl Iterator<Item = &mut Pv> {
        self.pvs.iter_mut().chain(self.archived.iter_mut())
    }
}

/// Business rules shared by the in-memory and file stores.
pub struct EntryStore<B: StorageBackend> {
    /// The underlying storage backend.
    /// Exposed as pub(crate) for testing and internal access only.
    pub(crate) backend: B,
}

impl<B: StorageBackend> EntryStore<B> {
    pub fn with_backend(backend: B) -> Self {
        Self { backend }
    }

    pub fn location(&self) -> String {
        self.backend.location()
    }

    /// Load, mutate, save. The document is written only if `f` succeeds.
    fn modify<T>(&self, f: impl FnOnce(&mut Document) -> Result<T>) -> Result<T> {
        let mut doc = self.backend.load_document()?;
        let out = f(&mut doc)?;
        self.backend.save_document(&doc)?;
        Ok(out)
    }

    fn check_tags(pv: &Pv, def: &TagDef) -> Result<()> {
        validate_tag_set(&pv.tags, def).map_err(|e| {
            SquirrelError::Backend(format!("PV {} has invalid tags: {}", pv.uuid, e))
        })
    }

    fn check_name(name: &str) -> Result<()> {
        validate_name(name).map_err(|e| SquirrelError::Backend(e.to_string()))
    }
}

fn stale(id: &Uuid) -> SquirrelError {
    SquirrelError::Backend(format!(
        "Entry {} differs from the stored copy; refusing to delete a stale copy",
        id
    ))
}

impl<B: StorageBackend> Backend for EntryStore<B> {
    fn get_entry(&self, id: &Uuid) -> Result<Entry> {
        let doc = self.backend.load_document()?;
        doc.find(id).ok_or(SquirrelError::EntryNotFound(*id))
    }

    fn save_entry(&mut self, entry: &Entry) -> Result<()> {
        self.modify(|doc| {
            let id = entry.uuid();
            if doc.contains(&id) {
                return Err(SquirrelError::EntryExists(id));
            }
            match entry {
                Entry::Pv(pv) => {
                    Self::check_tags(pv, &doc.tags)?;
                    doc.pvs.push(pv.clone());
                }
                Entry::Snapshot(snapshot) => doc.snapshots.push(snapshot.clone()),
            }
            debug!(%id, kind = %entry.kind(), "saved entry");
            Ok(())
        })
    }

    fn update_entry(&mut self, entry: &Entry) -> Result<()> {
        self.modify(|doc| {
            let id = entry.uuid();
            match entry {
                Entry::Pv(pv) => {
                    if doc.archived.iter().any(|p| p.uuid == id) {
                        return Err(SquirrelError::Backend(format!(
                            "PV {} is archived and cannot be edited",
                            id
                        )));
                    }
                    if doc.snapshots.iter().any(|s| s.uuid == id) {
                        return Err(SquirrelError::Backend(format!(
                            "Entry {} is stored as a snapshot, not a PV",
                            id
                        )));
                    }
                    Self::check_tags(pv, &doc.tags)?;
                    let slot = doc
                        .pvs
                        .iter_mut()
                        .find(|p| p.uuid == id)
                        .ok_or(SquirrelError::EntryNotFound(id))?;
                    *slot = pv.clone();
                }
                Entry::Snapshot(snapshot) => {
                    if doc.pvs.iter().chain(doc.archived.iter()).any(|p| p.uuid == id) {
                        return Err(SquirrelError::Backend(format!(
                            "Entry {} is stored as a PV, not a snapshot",
                            id
                        )));
                    }
                    let slot = doc
                        .snapshots
                        .iter_mut()
                        .find(|s| s.uuid == id)
                        .ok_or(SquirrelError::EntryNotFound(id))?;
                    *slot = snapshot.clone();
                }
            }
            debug!(%id, "updated entry");
            Ok(())
        })
    }

    fn delete_entry(&mut self, entry: &Entry) -> Result<()> {
        self.modify(|doc| {
            let id = entry.uuid();
            let stored = doc.find(&id).ok_or(SquirrelError::EntryNotFound(id))?;
            if stored != *entry {
                return Err(stale(&id));
            }
            match entry {
                Entry::Pv(pv) => {
                    let was_active = doc.pvs.iter().any(|p| p.uuid == id);
                    doc.pvs.retain(|p| p.uuid != id);
                    doc.archived.retain(|p| p.uuid != id);
                    if doc.referenced(&id) {
                        doc.archived.push(pv.clone());
                        if was_active {
                            debug!(%id, "archived PV referenced by snapshots");
                        }
                    } else {
                        debug!(%id, "erased PV");
                    }
                }
                Entry::Snapshot(_) => {
                    doc.snapshots.retain(|s| s.uuid != id);
                    debug!(%id, "deleted snapshot");
                }
            }
            Ok(())
        })
    }

    fn search(&self, terms: &[SearchTerm]) -> Result<Vec<Entry>> {
        let doc = self.backend.load_document()?;
        let entries: Vec<Entry> = doc
            .pvs
            .into_iter()
            .map(Entry::Pv)
            .chain(doc.snapshots.into_iter().map(Entry::Snapshot))
            .collect();
        filter_entries(&entries, terms)
    }

    fn get_tags(&self) -> Result<TagDef> {
        Ok(self.backend.load_document()?.tags)
    }

    fn set_tags(&mut self, tags: &TagDef) -> Result<()> {
        for (_, group) in tags.iter() {
            Self::check_name(&group.name)?;
        }
        self.modify(|doc| {
            doc.tags = tags.clone();
            let def = doc.tags.clone();
            for pv in doc.stored_pvs_mut() {
                let removed = prune_tag_set(&mut pv.tags, &def);
                if removed > 0 {
                    warn!(
                        pv = %pv.uuid,
                        removed,
                        "dropped tag references missing from the new tag definition"
                    );
                }
            }
            Ok(())
        })
    }

    fn add_tag_group(&mut self, name: &str, description: &str) -> Result<GroupId> {
        Self::check_name(name)?;
        self.modify(|doc| {
            if doc.tags.group_id(name).is_some() {
                return Err(SquirrelError::Backend(format!(
                    "Tag group '{}' already exists",
                    name
                )));
            }
            let id = doc.tags.add_group(TagGroup::new(name, description));
            debug!(group = id, name, "added tag group");
            Ok(id)
        })
    }

    fn update_tag_group(
        &mut self,
        group: GroupId,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<()> {
        if let Some(name) = name {
            Self::check_name(name)?;
        }
        self.modify(|doc| {
            if let Some(name) = name {
                if doc.tags.group_id(name).is_some_and(|other| other != group) {
                    return Err(SquirrelError::Backend(format!(
                        "Tag group '{}' already exists",
                        name
                    )));
                }
            }
            let entry = doc
                .tags
                .get_mut(group)
                .ok_or(SquirrelError::UnknownTagGroup(group))?;
            if let Some(name) = name {
                entry.name = name.to_string();
            }
            if let Some(description) = description {
                entry.description = description.to_string();
            }
            Ok(())
        })
    }

    fn delete_tag_group(&mut self, group: GroupId) -> Result<()> {
        self.modify(|doc| {
            doc.tags
                .remove(group)
                .ok_or(SquirrelError::UnknownTagGroup(group))?;
            let touched = doc
                .stored_pvs_mut()
                .map(|pv| drop_group(&mut pv.tags, group))
                .filter(|dropped| *dropped)
                .count();
            debug!(group, touched, "deleted tag group");
            Ok(())
        })
    }

    fn add_tag_to_group(&mut self, group: GroupId, name: &str) -> Result<TagId> {
        Self::check_name(name)?;
        self.modify(|doc| {
            let existing = doc
                .tags
                .get(group)
                .ok_or(SquirrelError::UnknownTagGroup(group))?;
            if existing.tag_id(name).is_some() {
                return Err(SquirrelError::Backend(format!(
                    "Tag '{}' already exists in group '{}'",
                    name, existing.name
                )));
            }
            doc.tags
                .add_tag(group, name)
                .ok_or(SquirrelError::UnknownTagGroup(group))
        })
    }

    fn update_tag_in_group(
        &mut self,
        group: GroupId,
        tag: TagId,
        name: Option<&str>,
    ) -> Result<()> {
        let Some(name) = name else {
            let def = self.get_tags()?;
            let existing = def.get(group).ok_or(SquirrelError::UnknownTagGroup(group))?;
            if !existing.tags.contains_key(&tag) {
                return Err(SquirrelError::UnknownTag { group, tag });
            }
            return Ok(());
        };
        Self::check_name(name)?;
        self.modify(|doc| {
            let entry = doc
                .tags
                .get_mut(group)
                .ok_or(SquirrelError::UnknownTagGroup(group))?;
            if entry.tag_id(name).is_some_and(|other| other != tag) {
                return Err(SquirrelError::Backend(format!(
                    "Tag '{}' already exists in group '{}'",
                    name, entry.name
                )));
            }
            let slot = entry
                .tags
                .get_mut(&tag)
                .ok_or(SquirrelError::UnknownTag { group, tag })?;
            *slot = name.to_string();
            Ok(())
        })
    }

    fn delete_tag_from_group(&mut self, group: GroupId, tag: TagId) -> Result<()> {
        self.modify(|doc| {
            let entry = doc
                .tags
                .get_mut(group)
                .ok_or(SquirrelError::UnknownTagGroup(group))?;
            entry
                .tags
                .remove(&tag)
                .ok_or(SquirrelError::UnknownTag { group, tag })?;
            let touched = doc
                .stored_pvs_mut()
                .map(|pv| drop_tag(&mut pv.tags, group, tag))
                .filter(|dropped| *dropped)
                .count();
            debug!(group, tag, touched, "deleted tag");
            Ok(())
        })
    }

    fn get_meta_pvs(&self) -> Result<Vec<Pv>> {
        Ok(self.backend.load_document()?.meta_pvs)
    }

    fn set_meta_pvs(&mut self, pvs: &[Pv]) -> Result<()> {
        self.modify(|doc| {
            doc.meta_pvs = pvs.to_vec();
            Ok(())
        })
    }

    fn add_pv(&mut self, pv: NewPv) -> Result<Pv> {
        let pv = pv.into_pv();
        self.save_entry(&Entry::Pv(pv.clone()))?;
        Ok(pv)
    }

    fn add_multiple_pvs(&mut self, pvs: Vec<NewPv>) -> Result<Vec<Pv>> {
        // One write for the batch; nothing is stored if any PV is rejected.
        self.modify(|doc| {
            let mut added = Vec::with_capacity(pvs.len());
            for new in pvs {
                let pv = new.into_pv();
                Self::check_tags(&pv, &doc.tags)?;
                doc.pvs.push(pv.clone());
                added.push(pv);
            }
            debug!(count = added.len(), "added PVs");
            Ok(added)
        })
    }

    fn update_pv(&mut self, id: &Uuid, update: &PvUpdate) -> Result<Pv> {
        self.modify(|doc| {
            let def = doc.tags.clone();
            let pv = doc
                .pvs
                .iter_mut()
                .find(|p| p.uuid == *id)
                .ok_or(SquirrelError::EntryNotFound(*id))?;
            let mut updated = pv.clone();
            update.apply(&mut updated);
            Self::check_tags(&updated, &def)?;
            *pv = updated.clone();
            Ok(updated)
        })
    }

    fn archive_pv(&mut self, id: &Uuid) -> Result<()> {
        self.modify(|doc| {
            if let Some(pos) = doc.pvs.iter().position(|p| p.uuid == *id) {
                let pv = doc.pvs.remove(pos);
                doc.archived.push(pv);
                debug!(%id, "archived PV");
                return Ok(());
            }
            if doc.archived.iter().any(|p| p.uuid == *id) {
                return Ok(());
            }
            Err(SquirrelError::EntryNotFound(*id))
        })
    }

    fn get_all_pvs(&self) -> Result<Vec<Pv>> {
        Ok(self.backend.load_document()?.pvs)
    }

    fn get_snapshots(&self, filter: &SnapshotFilter) -> Result<Vec<Snapshot>> {
        let doc = self.backend.load_document()?;
        Ok(doc
            .snapshots
            .into_iter()
            .filter(|s| filter.matches(s))
            .collect())
    }
}

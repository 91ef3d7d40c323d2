//! Tag groups for squirrel.
//!
//! Tags categorize PVs for filtering. They are organized in groups: a group
//! has a name, a description and a mapping of tag ids to tag names.
//!
//! ## Identity
//!
//! Group ids and tag ids are permanent and opaque. PVs reference tags by id
//! ([`TagSet`]), so renaming a group or a tag never breaks a reference.
//! Deleting one cascades: the backend removes the id from every stored PV.
//!
//! ## Id Assignment
//!
//! Local stores assign new ids as the current maximum in scope plus one, or
//! zero when the scope is empty ([`next_id`]). The remote service assigns its
//! own.
//!
//! ## Naming Rules
//!
//! See [`validation`] for the rules applied to group and tag names.

pub mod validation;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

pub use validation::{prune_tag_set, validate_name, validate_tag_set, TagValidationError};

pub type GroupId = u32;
pub type TagId = u32;

/// The tags a PV selects, keyed by group id.
pub type TagSet = BTreeMap<GroupId, BTreeSet<TagId>>;

/// One tag group: name, description and its tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagGroup {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: BTreeMap<TagId, String>,
}

impl TagGroup {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            tags: BTreeMap::new(),
        }
    }

    pub fn with_tag(mut self, id: TagId, name: impl Into<String>) -> Self {
        self.tags.insert(id, name.into());
        self
    }

    pub fn tag_id(&self, name: &str) -> Option<TagId> {
        self.tags
            .iter()
            .find(|(_, tag_name)| tag_name.as_str() == name)
            .map(|(id, _)| *id)
    }
}

/// The complete tag definition: group id to [`TagGroup`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagDef(BTreeMap<GroupId, TagGroup>);

impl TagDef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, group: GroupId) -> Option<&TagGroup> {
        self.0.get(&group)
    }

    pub fn get_mut(&mut self, group: GroupId) -> Option<&mut TagGroup> {
        self.0.get_mut(&group)
    }

    pub fn contains_group(&self, group: GroupId) -> bool {
        self.0.contains_key(&group)
    }

    pub fn contains_tag(&self, group: GroupId, tag: TagId) -> bool {
        self.0
            .get(&group)
            .is_some_and(|g| g.tags.contains_key(&tag))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&GroupId, &TagGroup)> {
        self.0.iter()
    }

    pub fn group_ids(&self) -> impl Iterator<Item = GroupId> + '_ {
        self.0.keys().copied()
    }

    pub fn insert(&mut self, id: GroupId, group: TagGroup) -> Option<TagGroup> {
        self.0.insert(id, group)
    }

    pub fn remove(&mut self, id: GroupId) -> Option<TagGroup> {
        self.0.remove(&id)
    }

    /// Adds a group under the next free id and returns that id.
    pub fn add_group(&mut self, group: TagGroup) -> GroupId {
        let id = next_id(self.0.keys());
        self.0.insert(id, group);
        id
    }

    /// Adds a tag to `group` under the next free tag id and returns that id.
    pub fn add_tag(&mut self, group: GroupId, name: impl Into<String>) -> Option<TagId> {
        let group = self.0.get_mut(&group)?;
        let id = next_id(group.tags.keys());
        group.tags.insert(id, name.into());
        Some(id)
    }

    pub fn group_id(&self, name: &str) -> Option<GroupId> {
        self.0
            .iter()
            .find(|(_, group)| group.name == name)
            .map(|(id, _)| *id)
    }

    /// The group a tag id belongs to.
    ///
    /// Tag ids are only unique within a group; when the same id exists in
    /// several groups the lowest group id wins.
    pub fn group_of_tag(&self, tag: TagId) -> Option<GroupId> {
        self.0
            .iter()
            .find(|(_, group)| group.tags.contains_key(&tag))
            .map(|(id, _)| *id)
    }

    /// Resolve a TagSet to `(group name, [tag names])` pairs, skipping ids
    /// the definition does not know.
    pub fn describe(&self, tags: &TagSet) -> Vec<(String, Vec<String>)> {
        tags.iter()
            .filter_map(|(group_id, tag_ids)| {
                let group = self.0.get(group_id)?;
                let names = tag_ids
                    .iter()
                    .filter_map(|id| group.tags.get(id).cloned())
                    .collect();
                Some((group.name.clone(), names))
            })
            .collect()
    }
}

impl FromIterator<(GroupId, TagGroup)> for TagDef {
    fn from_iter<I: IntoIterator<Item = (GroupId, TagGroup)>>(iter: I) -> Self {
        TagDef(iter.into_iter().collect())
    }
}

impl IntoIterator for TagDef {
    type Item = (GroupId, TagGroup);
    type IntoIter = std::collections::btree_map::IntoIter<GroupId, TagGroup>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Maximum existing id plus one, or zero for an empty scope.
pub fn next_id<'a>(ids: impl Iterator<Item = &'a u32>) -> u32 {
    ids.max().map(|max| max + 1).unwrap_or(0)
}

/// Remove every reference to `group` from a TagSet.
pub fn drop_group(tags: &mut TagSet, group: GroupId) -> bool {
    tags.remove(&group).is_some()
}

/// Remove one tag from a TagSet, dropping the group once it is empty.
pub fn drop_tag(tags: &mut TagSet, group: GroupId, tag: TagId) -> bool {
    let Some(selected) = tags.get_mut(&group) else {
        return false;
    };
    let removed = selected.remove(&tag);
    if selected.is_empty() {
        tags.remove(&group);
    }
    removed
}

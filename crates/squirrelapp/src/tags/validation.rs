//! Tag consistency checks.
//!
//! Two concerns live here:
//! - names of groups and tags (trimmed, non-empty, no commas since CSV cells
//!   list tag labels separated by commas)
//! - TagSets held by PVs, which may only reference ids present in the TagDef

use super::{GroupId, TagDef, TagId, TagSet};

/// Validates a group or tag name.
///
/// # Examples
/// ```
/// use squirrelapp::tags::validation::validate_name;
///
/// assert!(validate_name("Vacuum").is_ok());
/// assert!(validate_name("Beam Line 2").is_ok());
///
/// assert!(validate_name("").is_err());
/// assert!(validate_name("  ").is_err());
/// assert!(validate_name(" padded").is_err());
/// assert!(validate_name("a,b").is_err());
/// ```
pub fn validate_name(name: &str) -> Result<(), TagValidationError> {
    if name.trim().is_empty() {
        return Err(TagValidationError::EmptyName);
    }
    if name.trim() != name {
        return Err(TagValidationError::Whitespace(name.to_string()));
    }
    if name.contains(',') {
        return Err(TagValidationError::Comma(name.to_string()));
    }
    Ok(())
}

/// Checks that every group and tag id in `tags` exists in `def`.
///
/// Reports the first offending id.
pub fn validate_tag_set(tags: &TagSet, def: &TagDef) -> Result<(), TagValidationError> {
    for (group_id, tag_ids) in tags {
        let Some(group) = def.get(*group_id) else {
            return Err(TagValidationError::UnknownGroup(*group_id));
        };
        if let Some(tag) = tag_ids.iter().find(|id| !group.tags.contains_key(id)) {
            return Err(TagValidationError::UnknownTag {
                group: *group_id,
                tag: *tag,
            });
        }
    }
    Ok(())
}

/// Drops every reference `def` does not know, along with groups left empty.
///
/// Returns the number of tag references removed.
pub fn prune_tag_set(tags: &mut TagSet, def: &TagDef) -> usize {
    let mut removed = 0;
    tags.retain(|group_id, tag_ids| match def.get(*group_id) {
        Some(group) => {
            let before = tag_ids.len();
            tag_ids.retain(|id| group.tags.contains_key(id));
            removed += before - tag_ids.len();
            !tag_ids.is_empty()
        }
        None => {
            removed += tag_ids.len();
            false
        }
    });
    removed
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagValidationError {
    EmptyName,
    Whitespace(String),
    Comma(String),
    UnknownGroup(GroupId),
    UnknownTag { group: GroupId, tag: TagId },
}

impl std::fmt::Display for TagValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TagValidationError::EmptyName => write!(f, "name cannot be empty"),
            TagValidationError::Whitespace(name) => {
                write!(f, "name '{}' has leading or trailing whitespace", name)
            }
            TagValidationError::Comma(name) => {
                write!(f, "name '{}' cannot contain a comma", name)
            }
            TagValidationError::UnknownGroup(group) => {
                write!(f, "tag group {} is not defined", group)
            }
            TagValidationError::UnknownTag { group, tag } => {
                write!(f, "tag {} is not defined in group {}", tag, group)
            }
        }
    }
}

impl std::error::Error for TagValidationError {}

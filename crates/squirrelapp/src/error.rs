use thiserror::Error;
use uuid::Uuid;

use crate::tags::{GroupId, TagId};

#[derive(Error, Debug)]
pub enum SquirrelError {
    #[error("Entry not found: {0}")]
    EntryNotFound(Uuid),

    #[error("Entry already exists: {0}")]
    EntryExists(Uuid),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Tag group not found: {0}")]
    UnknownTagGroup(GroupId),

    #[error("Tag {tag} not found in group {group}")]
    UnknownTag { group: GroupId, tag: TagId },

    #[error("SearchTerm does not support operator \"{0}\"")]
    UnsupportedOperator(String),

    #[error("Invalid comparison: {0}")]
    Comparison(String),

    #[error("Communication error: {0}")]
    Communication(String),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] Box<ureq::Error>),

    #[error("Api Error: {0}")]
    Api(String),
}

impl SquirrelError {
    /// True for every failure that originates in a backend, including lookup
    /// misses and duplicate inserts.
    pub fn is_backend_error(&self) -> bool {
        matches!(
            self,
            SquirrelError::EntryNotFound(_)
                | SquirrelError::EntryExists(_)
                | SquirrelError::Backend(_)
                | SquirrelError::UnknownTagGroup(_)
                | SquirrelError::UnknownTag { .. }
                | SquirrelError::Http(_)
        )
    }
}

impl From<csv::Error> for SquirrelError {
    fn from(err: csv::Error) -> Self {
        SquirrelError::Csv(err.to_string())
    }
}

impl From<confique::Error> for SquirrelError {
    fn from(err: confique::Error) -> Self {
        SquirrelError::Config(err.to_string())
    }
}

impl From<ureq::Error> for SquirrelError {
    fn from(err: ureq::Error) -> Self {
        SquirrelError::Http(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, SquirrelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_failures_count_as_backend_errors() {
        assert!(SquirrelError::EntryNotFound(Uuid::nil()).is_backend_error());
        assert!(SquirrelError::EntryExists(Uuid::nil()).is_backend_error());
        assert!(SquirrelError::UnknownTag { group: 0, tag: 3 }.is_backend_error());
        assert!(!SquirrelError::UnsupportedOperator("near".into()).is_backend_error());
        assert!(!SquirrelError::Comparison("x".into()).is_backend_error());
    }

    #[test]
    fn unsupported_operator_names_the_operator() {
        let err = SquirrelError::UnsupportedOperator("near".into());
        assert!(err.to_string().contains("\"near\""));
    }
}

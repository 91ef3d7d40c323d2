//! # Command Layer
//!
//! The orchestration logic behind the [`crate::api::Client`] facade. Each
//! command is a plain function over a [`crate::store::Backend`] and, where live
//! values are involved, a [`crate::control::ControlLayer`].
//!
//! Commands never print and never prompt: they return data, and partial
//! failures come back as structured messages the UI decides how to show.
//!
//! ## Command Modules
//!
//! - [`search`]: client-side query terms, `isclose` expansion
//! - [`snap`]: capture live values into a Snapshot
//! - [`apply`]: write Snapshot or PV setpoints back
//! - [`import`]: CSV import of PVs with tag columns
//! - [`compare`]: pairwise comparison of two Snapshots
//!
//! ## Testing Strategy
//!
//! Command tests run against `InMemoryStore` and the scripted
//! `control::fixtures::FakeControl`; nothing touches disk or network.

use serde::Serialize;

pub mod apply;
pub mod compare;
pub mod import;
pub mod search;
pub mod snap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CmdMessage {
    pub level: MessageLevel,
    pub content: String,
}

impl CmdMessage {
    pub fn info(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Info,
            content: content.into(),
        }
    }

    pub fn success(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Success,
            content: content.into(),
        }
    }

    pub fn warning(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Warning,
            content: content.into(),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Error,
            content: content.into(),
        }
    }
}

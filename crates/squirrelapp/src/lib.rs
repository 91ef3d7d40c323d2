//! # Squirrel Architecture
//!
//! Squirrel saves, compares and restores snapshots of control-system process
//! variables (PVs). This crate is the **UI-agnostic core**: the `squirrel`
//! binary is one client of it, a GUI could be another.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  API Layer (api.rs)                                         │
//! │  - Client facade over a Backend and a ControlLayer          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Command Layer (commands/*.rs)                              │
//! │  - isclose expansion, snap, apply, CSV import, comparison   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Storage Layer (store/)                                     │
//! │  - Backend trait                                            │
//! │  - InMemoryStore, FileStore, HttpBackend, AnyBackend        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Query + Model (attributes/, tags/, model.rs)               │
//! │  - Predicate engine, TagDef/TagSet, PV/Snapshot values      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Live values come from a [`control::ControlLayer`], kept out of the
//! storage stack entirely.
//!
//! ## No I/O Assumptions in Core
//!
//! Nothing here writes to stdout or stderr. Diagnostics go through `tracing`;
//! the binary decides whether and where to show them.
//!
//! ## Module Overview
//!
//! - [`api`]: the [`api::Client`] facade
//! - [`commands`]: orchestration logic
//! - [`store`]: the Backend contract and its implementations
//! - [`attributes`]: search terms and the `compare` predicate engine
//! - [`tags`]: tag groups, TagDef and TagSet
//! - [`model`]: PV, Snapshot, EpicsValue
//! - [`control`]: live-value provider contract and poller
//! - [`config`], [`init`]: configuration and startup
//! - [`error`]: error types

pub mod api;
pub mod attributes;
pub mod commands;
pub mod config;
pub mod control;
pub mod error;
pub mod init;
pub mod model;
pub mod store;
pub mod tags;

#[cfg(test)]
pub mod test_utils;

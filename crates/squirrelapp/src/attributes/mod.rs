//! # Attribute System
//!
//! The query layer shared by every backend. Instead of each backend probing
//! entry fields ad hoc, this module provides:
//!
//! - **Values**: [`AttrValue`], the runtime shape of anything compared
//! - **Operators**: [`compare`] with `eq`, `lt`, `gt`, `in` and `like`
//! - **Terms**: [`SearchTerm`] and [`filter_entries`], the linear-scan search
//! - **Registry**: [`ATTRIBUTES`], the searchable field names and their kinds
//!
//! ## Usage
//!
//! ```ignore
//! // Reading an attribute
//! let value = entry.get_attr("setpoint");
//!
//! // One comparison
//! let ok = compare("like", &value, &AttrValue::Str("GUNB".into()))?;
//!
//! // A conjunctive search
//! let terms = [SearchTerm::like("setpoint", "GUNB"), SearchTerm::entry_type(EntryKind::Pv)];
//! let found = filter_entries(entries.iter(), &terms)?;
//! ```

mod compare;
mod filter;
mod spec;
mod value;

pub use compare::{compare, compare_with, Operator};
pub use filter::{
    entry_kinds, filter_entries, prepare, wanted_kinds, PreparedTerm, SearchTerm, ANCESTOR,
    ENTRY_TYPE,
};
pub use spec::{attrs_for, get_spec, parse_time, AttributeKind, AttributeSpec, ATTRIBUTES};
pub use value::AttrValue;

//! Directory tree construction for the document library
//!
//! Trees are built lazily: the top level is listed without recursion and
//! deeper levels are expanded on request up to a bounded depth.

pub mod builder;
pub mod ordering;

pub use builder::TreeBuilder;
pub use ordering::{sort_nodes, SortKey};

//! Hierarchical persistent model: nets holding ends, groups and chains.
//!
//! Every object is identified by a [`Name`]. Nets are owned by the
//! [`NetDisk`]; a net owns its ends, groups and chains; a non-leaf group
//! refers to its nested net by name (the nested net carries the group's name).

pub mod chain;
pub mod disk;
pub mod group;
pub mod net;

pub type Name = u64;

pub use chain::{Chain, Link};
pub use disk::NetDisk;
pub use group::{load_from_binary_representation, write_binary_representation, Group, GroupEndIterator};
pub use net::{End, Net};

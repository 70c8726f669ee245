//! Group/attribute/dataset/link container storage for FamDB leaf and root
//! files.
//!
//! [`backend`] defines the storage contract ([`ContainerBackend`]) that every
//! on-disk representation must satisfy; [`rocks`] is the default RocksDB
//! implementation. [`leaf`] and [`root`] build the actual FamDB record layout
//! (families, indices, taxonomy) on top of that contract.

pub mod backend;
pub mod leaf;
pub mod rocks;
pub mod root;

pub use backend::{AttrValue, ContainerBackend};
pub use leaf::{CuratedFilter, LeafContainer};
pub use rocks::RocksContainer;
pub use root::{Lineage, PrunedUpdate, ResolveOutcome, RootContainer};

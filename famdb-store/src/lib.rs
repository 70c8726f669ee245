//! Multi-file partitioned store: directory validation, query dispatch,
//! write routing, and pruned-tree maintenance over a set of
//! [`famdb_container`] containers.

pub mod build;
pub mod query;
pub mod report;
pub mod store;

pub use build::build_store;
pub use query::{get_accessions_filtered, Filters};
pub use report::AppendReport;
pub use store::PartitionedStore;

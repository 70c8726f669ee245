//! Shared types for FamDB: the taxonomy model, the family record, the chunk
//! manifest, and the ambient error/configuration stack used by every other
//! crate in the workspace.

pub mod config;
pub mod embl;
pub mod error;
pub mod family;
pub mod manifest;
pub mod taxonomy;

pub use config::Config;
pub use embl::{parse_embl_stream, EmblEntry, UnresolvedClade};
pub use error::{FamdbError, FamdbResult};
pub use family::{Family, FamilyAccession, TaxaThreshold};
pub use manifest::{Chunk, FileMapEntry, Manifest, ManifestMeta, PartitionId};
pub use taxonomy::{sanitize_name, soundex, sounds_like, NameKind, TaxId, Taxon, Taxonomy, TaxonomyBuilder};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

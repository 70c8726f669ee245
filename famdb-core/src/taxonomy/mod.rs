pub mod builder;
pub mod ncbi_dump;
pub mod sanitize;
pub mod soundex;
pub mod types;

pub use builder::TaxonomyBuilder;
pub use sanitize::sanitize_name;
pub use soundex::{soundex, sounds_like};
pub use types::{NameKind, TaxId, Taxon, Taxonomy};

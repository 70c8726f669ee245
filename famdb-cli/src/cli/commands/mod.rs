pub mod append;
pub mod common;
pub mod edit_description;
pub mod families;
pub mod family;
pub mod fasta_all;
pub mod info;
pub mod lineage;
pub mod names;
pub mod repeat_peps;

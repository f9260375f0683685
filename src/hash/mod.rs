// Match finding for the delta encoder.
//
// - `config` holds the source and target table profiles
// - `table` is the fixed-slot content hash table

pub mod config;
pub mod table;

pub use config::{HashConfig, SOURCE_HASH, TARGET_HASH};
pub use table::HashTable;

// Data structures and types

pub mod config;
pub mod index;
pub mod record;
pub mod records;
pub mod tables;

pub use config::StoreConfig;
pub use index::Index;
pub use record::{FieldShape, FlatString, HostMap, Record};
pub use records::{DeleteArchive, SequenceRecord};

//! MongoDB connection management and operations.
//!
//! This module provides:
//! - `ConnectionManager`: connection lifecycle, sequences and table administration
//! - `Table`: per-collection handle carrying the query builder and document verbs
//! - `ops`: database operations (find, documents, indexes, sequence, tables)
//! - `read_pref`: read preference routing
//! - `txn`: session and transaction handling
//! - `types`: call context and shared option types

pub mod manager;
pub mod ops;
pub mod read_pref;
pub mod table;
pub mod txn;
pub mod types;

pub use manager::{ConnectionManager, MIN_SERVER_VERSION};
pub use ops::find::{Find, Page};
pub use table::Table;
pub use types::{CancellationToken, Context, FindOpts, ReadPreferenceMode, TxnMode, UpdateOp};

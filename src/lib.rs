//! Transactional MongoDB access layer for the CMDB inventory store.
//!
//! ```no_run
//! use cmdb_store::{ConnectionManager, Context, StoreConfig};
//! use mongodb::bson::doc;
//!
//! # fn main() -> cmdb_store::Result<()> {
//! let config = StoreConfig::new("mongodb://127.0.0.1:27017/cmdb", "rs0");
//! let store = ConnectionManager::connect(&config)?;
//! let mut ctx = Context::new();
//!
//! store.transaction(&mut ctx, |ctx| {
//!     let id = store.next_sequence(ctx, "cc_SetBase")?;
//!     store.table("cc_SetBase").insert_one(ctx, &doc! { "bk_set_id": id as i64 })
//! })?;
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod error;
pub mod helpers;
pub mod models;
pub mod perf;
pub mod schema;

pub use connection::{
    CancellationToken, ConnectionManager, Context, Find, FindOpts, Page, ReadPreferenceMode,
    Table, TxnMode, UpdateOp,
};
pub use error::{Error, Result};
pub use models::{
    DeleteArchive, FieldShape, FlatString, HostMap, Index, Record, SequenceRecord, StoreConfig,
};
pub use perf::{OpKind, OpMetrics, OpSnapshot};
pub use schema::{SchemaReport, TableSchema};

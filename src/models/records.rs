// Documents the store itself persists

use mongodb::bson::{Bson, Document};
use serde::{Deserialize, Serialize};

use crate::models::Record;

/// One counter per sequence name in the id generator collection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceRecord {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "SequenceID")]
    pub sequence_id: u64,
}

impl Record for SequenceRecord {}

impl SequenceRecord {
    /// The `count` values claimed by the increment that produced this record.
    pub fn claimed(&self, count: u64) -> Vec<u64> {
        (0..count).map(|i| self.sequence_id - (count - i - 1)).collect()
    }
}

/// Snapshot of a deleted document, kept in the archive collection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeleteArchive {
    pub oid: String,
    pub detail: Document,
    pub coll: String,
}

impl Record for DeleteArchive {}

impl DeleteArchive {
    /// Split `doc` into its identifier and the remaining fields.
    pub fn from_document(coll: &str, mut doc: Document) -> Self {
        let oid = match doc.remove("_id") {
            Some(Bson::ObjectId(oid)) => oid.to_hex(),
            Some(Bson::String(id)) => id,
            Some(other) => other.to_string(),
            None => String::new(),
        };
        Self { oid, detail: doc, coll: coll.to_string() }
    }
}

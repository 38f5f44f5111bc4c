// Index descriptor

use std::time::Duration;

use mongodb::IndexModel;
use mongodb::bson::Document;
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

/// Name of the index MongoDB builds on `_id` for every collection.
pub const DEFAULT_ID_INDEX: &str = "_id_";

pub const UNIQUE_INDEX_PREFIX: &str = "bkcc_unique_";
pub const INDEX_PREFIX: &str = "bkcc_idx_";

/// A declared index. Changing the shape of an existing index means dropping
/// it and creating a new one under a different name.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Index {
    pub name: String,
    /// Ordered field → direction pairs.
    pub keys: Document,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub background: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial_filter_expression: Option<Document>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_after_seconds: Option<u64>,
}

impl Index {
    pub fn new(name: impl Into<String>, keys: Document) -> Self {
        Self { name: name.into(), keys, background: true, ..Default::default() }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn partial(mut self, filter: Document) -> Self {
        self.partial_filter_expression = Some(filter);
        self
    }

    pub fn expire_after(mut self, seconds: u64) -> Self {
        self.expire_after_seconds = Some(seconds);
        self
    }

    /// Whether two indexes cover the same keys in the same order and direction.
    pub fn same_keys(&self, other: &Document) -> bool {
        self.keys.len() == other.len()
            && self.keys.iter().zip(other.iter()).all(|((lk, lv), (rk, rv))| {
                lk == rk && direction(lv) == direction(rv)
            })
    }

    pub fn to_model(&self) -> IndexModel {
        let mut options = IndexOptions::default();
        options.name = (!self.name.is_empty()).then(|| self.name.clone());
        options.unique = Some(self.unique);
        options.background = Some(self.background);
        options.partial_filter_expression = self.partial_filter_expression.clone();
        options.expire_after = self.expire_after_seconds.map(Duration::from_secs);
        IndexModel::builder().keys(self.keys.clone()).options(options).build()
    }
}

/// Numeric key directions compare by value regardless of their BSON width.
fn direction(value: &mongodb::bson::Bson) -> Option<i64> {
    use mongodb::bson::Bson;
    match value {
        Bson::Int32(v) => Some(i64::from(*v)),
        Bson::Int64(v) => Some(*v),
        Bson::Double(v) => Some(*v as i64),
        _ => None,
    }
}

impl From<IndexModel> for Index {
    fn from(model: IndexModel) -> Self {
        let options = model.options.unwrap_or_default();
        Self {
            name: options.name.unwrap_or_default(),
            keys: model.keys,
            unique: options.unique.unwrap_or(false),
            background: options.background.unwrap_or(false),
            partial_filter_expression: options.partial_filter_expression,
            expire_after_seconds: options.expire_after.map(|ttl| ttl.as_secs()),
        }
    }
}

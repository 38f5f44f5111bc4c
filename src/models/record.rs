//! Result types that queries decode into.
//!
//! Host address and operator fields are stored as arrays but callers read them
//! as comma-joined strings. A result type declares how it decodes each of those
//! fields through [`Record::field_shape`], so a read against the host table can
//! be refused before it returns data in the wrong representation.
//!
//! ```
//! use cmdb_store::{FieldShape, FlatString, Record};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct HostIp {
//!     bk_host_id: i64,
//!     bk_host_innerip: FlatString,
//! }
//!
//! impl Record for HostIp {
//!     fn field_shape(field: &str) -> FieldShape {
//!         match field {
//!             "bk_host_innerip" => FieldShape::Flattened,
//!             _ => FieldShape::Absent,
//!         }
//!     }
//! }
//! ```

use std::ops::{Deref, DerefMut};

use mongodb::bson::{Bson, Document};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::models::tables::{HOST_SPECIAL_FIELDS, is_host_special_field};

/// How a result type decodes one field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldShape {
    /// Decoded exactly as stored.
    Raw,
    /// Arrays of strings are joined with `,`.
    Flattened,
    /// The type has no such field.
    Absent,
}

/// A type that query results can be decoded into.
pub trait Record: DeserializeOwned + Send + Sync + Unpin {
    fn field_shape(_field: &str) -> FieldShape {
        FieldShape::Raw
    }
}

impl Record for Document {}

impl Record for HostMap {
    fn field_shape(field: &str) -> FieldShape {
        if is_host_special_field(field) { FieldShape::Flattened } else { FieldShape::Raw }
    }
}

/// A string read from a field that is stored as an array of strings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct FlatString(pub String);

impl FlatString {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The stored array form.
    pub fn parts(&self) -> Vec<&str> {
        self.0.split(',').map(str::trim).filter(|part| !part.is_empty()).collect()
    }
}

impl From<&str> for FlatString {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Display for FlatString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredStrings {
    One(String),
    Many(Vec<String>),
}

impl<'de> Deserialize<'de> for FlatString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let stored = Option::<StoredStrings>::deserialize(deserializer)?;
        Ok(match stored {
            None => FlatString::default(),
            Some(StoredStrings::One(value)) => FlatString(value),
            Some(StoredStrings::Many(values)) => FlatString(values.join(",")),
        })
    }
}

impl Serialize for FlatString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.parts().serialize(serializer)
    }
}

/// A generic host document with its special fields flattened.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HostMap(pub Document);

impl HostMap {
    pub fn into_inner(self) -> Document {
        self.0
    }
}

impl Deref for HostMap {
    type Target = Document;

    fn deref(&self) -> &Document {
        &self.0
    }
}

impl DerefMut for HostMap {
    fn deref_mut(&mut self) -> &mut Document {
        &mut self.0
    }
}

fn flatten_value(value: &Bson) -> Option<String> {
    let Bson::Array(items) = value else {
        return None;
    };
    let parts: Vec<&str> = items.iter().filter_map(Bson::as_str).collect();
    Some(parts.join(","))
}

impl<'de> Deserialize<'de> for HostMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut doc = Document::deserialize(deserializer)?;
        for field in HOST_SPECIAL_FIELDS {
            if let Some(flat) = doc.get(*field).and_then(flatten_value) {
                doc.insert(*field, flat);
            }
        }
        Ok(HostMap(doc))
    }
}

impl Serialize for HostMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut doc = self.0.clone();
        for field in HOST_SPECIAL_FIELDS {
            if let Some(Bson::String(flat)) = doc.get(*field) {
                let parts: Vec<Bson> = FlatString(flat.clone())
                    .parts()
                    .into_iter()
                    .map(|part| Bson::String(part.to_string()))
                    .collect();
                doc.insert(*field, parts);
            }
        }
        doc.serialize(serializer)
    }
}

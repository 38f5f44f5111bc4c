//! Database operations split into focused modules.

pub mod documents;
pub mod find;
pub mod indexes;
pub mod sequence;
pub mod tables;

use std::future::IntoFuture;
use std::time::Duration;

use futures::TryStreamExt;
use mongodb::bson::Document;
use mongodb::options::{AggregateOptions, FindOptions};
use mongodb::{ClientSession, Collection};
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// Await one server round trip, failing when it takes longer than `ceiling`.
pub(crate) async fn round_trip<T, F>(ceiling: Duration, what: &str, call: F) -> Result<T>
where
    F: IntoFuture<Output = mongodb::error::Result<T>>,
{
    match tokio::time::timeout(ceiling, call).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(Error::Timeout(format!("{what} round trip exceeded {ceiling:?}"))),
    }
}

/// Run a find and drain its cursor, inside `session` when there is one.
/// Every batch is bounded by `round` on its own.
pub(crate) async fn find_all<T>(
    coll: &Collection<T>,
    filter: Document,
    options: FindOptions,
    session: Option<&mut ClientSession>,
    round: Duration,
) -> Result<Vec<T>>
where
    T: DeserializeOwned + Unpin + Send + Sync,
{
    let mut out = Vec::new();
    match session {
        Some(session) => {
            let action = coll.find(filter).with_options(options).session(&mut *session);
            let mut cursor = round_trip(round, "find", action).await?;
            let mut stream = cursor.stream(session);
            while let Some(item) = round_trip(round, "getMore", stream.try_next()).await? {
                out.push(item);
            }
        }
        None => {
            let action = coll.find(filter).with_options(options);
            let mut cursor = round_trip(round, "find", action).await?;
            while let Some(item) = round_trip(round, "getMore", cursor.try_next()).await? {
                out.push(item);
            }
        }
    }
    Ok(out)
}

/// Run a pipeline and drain its cursor, inside `session` when there is one.
/// Every batch is bounded by `round` on its own.
pub(crate) async fn aggregate_all(
    coll: &Collection<Document>,
    pipeline: Vec<Document>,
    options: AggregateOptions,
    session: Option<&mut ClientSession>,
    round: Duration,
) -> Result<Vec<Document>> {
    let mut out = Vec::new();
    match session {
        Some(session) => {
            let action = coll.aggregate(pipeline).with_options(options).session(&mut *session);
            let mut cursor = round_trip(round, "aggregate", action).await?;
            let mut stream = cursor.stream(session);
            while let Some(doc) = round_trip(round, "getMore", stream.try_next()).await? {
                out.push(doc);
            }
        }
        None => {
            let action = coll.aggregate(pipeline).with_options(options);
            let mut cursor = round_trip(round, "aggregate", action).await?;
            while let Some(doc) = round_trip(round, "getMore", cursor.try_next()).await? {
                out.push(doc);
            }
        }
    }
    Ok(out)
}

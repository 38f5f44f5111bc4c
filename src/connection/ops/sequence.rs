//! Id generation.

use mongodb::bson::{DateTime, doc};
use mongodb::options::ReturnDocument;

use crate::connection::manager::ConnectionManager;
use crate::connection::types::Context;
use crate::error::{Error, Result};
use crate::models::SequenceRecord;
use crate::models::tables::{TABLE_ID_GENERATOR, sequence_name};
use crate::perf::OpKind;

impl ConnectionManager {
    /// Next id of the sequence named after `name`.
    pub fn next_sequence(&self, ctx: &Context<'_>, name: &str) -> Result<u64> {
        self.next_sequences(ctx, name, 1)?
            .pop()
            .ok_or_else(|| Error::InvalidArgument(format!("sequence {name} returned no id")))
    }

    /// Claim `count` consecutive ids with one atomic increment.
    ///
    /// Runs outside any transaction on `ctx`: ids stay claimed when the
    /// caller's transaction aborts, and two transactions never see the same
    /// counter value.
    pub fn next_sequences(&self, ctx: &Context<'_>, name: &str, count: u64) -> Result<Vec<u64>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let step = i64::try_from(count)
            .map_err(|_| Error::InvalidArgument(format!("sequence batch {count} too large")))?;
        let sequence = sequence_name(name).to_string();
        let limits = ctx.limits();
        let coll = self.collection::<SequenceRecord>(TABLE_ID_GENERATOR, None);
        let filter = doc! { "_id": sequence.as_str() };

        let record = self.track(TABLE_ID_GENERATOR, OpKind::Sequence, &limits, &filter, || {
            self.exec(&limits, "next sequence", async {
                let now = DateTime::now();
                let update = doc! {
                    "$inc": { "SequenceID": step },
                    "$setOnInsert": { "create_time": now },
                    "$set": { "last_time": now },
                };
                coll.find_one_and_update(filter.clone(), update)
                    .upsert(true)
                    .return_document(ReturnDocument::After)
                    .await?
                    .ok_or(Error::NotFound)
            })
        })?;

        log::debug!("sequence {sequence} advanced by {count} to {}", record.sequence_id);
        Ok(record.claimed(count))
    }
}

//! Document writes, archival deletes, aggregation and column maintenance.

use mongodb::bson::{Bson, Document, doc, from_document, to_document};
use mongodb::options::{AggregateOptions, FindOptions};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::connection::ops::{aggregate_all, find_all, round_trip};
use crate::connection::table::Table;
use crate::connection::types::{Context, UpdateOp};
use crate::error::{Error, Result};
use crate::models::DeleteArchive;
use crate::models::tables::{TABLE_DEL_ARCHIVE, should_archive};
use crate::perf::OpKind;

impl Table<'_> {
    /// Insert documents. Empty input is a no-op.
    pub fn insert<D: Serialize>(&self, ctx: &mut Context<'_>, docs: &[D]) -> Result<()> {
        if docs.is_empty() {
            return Ok(());
        }
        let docs = docs.iter().map(to_document).collect::<std::result::Result<Vec<_>, _>>()?;
        let limits = ctx.limits();
        let coll = self.raw();
        let detail = format!("documents: {}", docs.len());
        self.manager.track(&self.name, OpKind::Insert, &limits, detail, || {
            self.manager.exec(&limits, "insert", async {
                let action = coll.insert_many(docs);
                match ctx.session() {
                    Some(session) => action.session(session).await?,
                    None => action.await?,
                };
                Ok(())
            })
        })
    }

    /// Insert a single document; same path as [`insert`](Self::insert).
    pub fn insert_one<D: Serialize>(&self, ctx: &mut Context<'_>, doc: &D) -> Result<()> {
        self.insert(ctx, std::slice::from_ref(doc))
    }

    /// `$set` `data` on every document matching `filter`.
    pub fn update<D: Serialize + ?Sized>(
        &self,
        ctx: &mut Context<'_>,
        filter: Document,
        data: &D,
    ) -> Result<()> {
        self.update_many(ctx, filter, data).map(|_| ())
    }

    /// `$set` `data` on every document matching `filter`, returning how
    /// many were modified.
    pub fn update_many<D: Serialize + ?Sized>(
        &self,
        ctx: &mut Context<'_>,
        filter: Document,
        data: &D,
    ) -> Result<u64> {
        let update = doc! { "$set": to_document(data)? };
        self.apply_update(ctx, OpKind::Update, filter, update)
    }

    /// `$set` `data` on the first match, inserting when nothing matches.
    ///
    /// Not atomic: two concurrent upserts for a missing document can both
    /// insert. Callers that need one row must back the filter with a unique
    /// index and handle the duplicate key error.
    pub fn upsert<D: Serialize + ?Sized>(
        &self,
        ctx: &mut Context<'_>,
        filter: Document,
        data: &D,
    ) -> Result<()> {
        let update = doc! { "$set": to_document(data)? };
        let limits = ctx.limits();
        let coll = self.raw();
        self.manager.track(&self.name, OpKind::Upsert, &limits, &filter, || {
            self.manager.exec(&limits, "upsert", async {
                let action = coll.update_one(filter.clone(), update).upsert(true);
                match ctx.session() {
                    Some(session) => action.session(session).await?,
                    None => action.await?,
                };
                Ok(())
            })
        })
    }

    /// Apply several update operators at once, e.g. `set` and `unset`.
    pub fn update_multi_model(
        &self,
        ctx: &mut Context<'_>,
        filter: Document,
        ops: &[UpdateOp],
    ) -> Result<()> {
        let update = build_multi_update(ops)?;
        self.apply_update(ctx, OpKind::Update, filter, update).map(|_| ())
    }

    /// Delete every match, archiving it first when the table is archived.
    pub fn delete(&self, ctx: &mut Context<'_>, filter: Document) -> Result<()> {
        self.delete_many(ctx, filter).map(|_| ())
    }

    /// Delete every match and return how many were removed. For archived
    /// tables each match is copied into the archive table first; the delete
    /// only runs once every copy is written, and only removes documents that
    /// were copied.
    pub fn delete_many(&self, ctx: &mut Context<'_>, filter: Document) -> Result<u64> {
        let limits = ctx.limits();
        let coll = self.raw();
        let archive = should_archive(&self.name)
            .then(|| self.manager.collection::<DeleteArchive>(TABLE_DEL_ARCHIVE, None));
        let round = self.manager.round_trip_timeout();
        self.manager.track(&self.name, OpKind::Delete, &limits, &filter, || {
            self.manager.exec_drain(&limits, "delete", async {
                let mut session = ctx.session();
                let mut target = filter.clone();
                if let Some(archive) = &archive {
                    let docs = find_all(
                        &coll,
                        filter.clone(),
                        FindOptions::default(),
                        session.as_deref_mut(),
                        round,
                    )
                    .await?;
                    if docs.is_empty() {
                        return Ok(0);
                    }
                    let ids: Vec<Bson> =
                        docs.iter().filter_map(|doc| doc.get("_id").cloned()).collect();
                    let records: Vec<DeleteArchive> = docs
                        .into_iter()
                        .map(|doc| DeleteArchive::from_document(&self.name, doc))
                        .collect();
                    let action = archive.insert_many(records);
                    match session.as_deref_mut() {
                        Some(session) => {
                            round_trip(round, "archive", action.session(session)).await?
                        }
                        None => round_trip(round, "archive", action).await?,
                    };
                    target = archived_only(filter.clone(), ids);
                }
                let action = coll.delete_many(target);
                let result = match session {
                    Some(session) => {
                        round_trip(round, "delete", action.session(session)).await?
                    }
                    None => round_trip(round, "delete", action).await?,
                };
                Ok(result.deleted_count)
            })
        })
    }

    /// Run `pipeline` and decode every resulting document.
    pub fn aggregate_all<T: DeserializeOwned>(
        &self,
        ctx: &mut Context<'_>,
        pipeline: Vec<Document>,
        allow_disk_use: bool,
    ) -> Result<Vec<T>> {
        let mut options = AggregateOptions::default();
        options.allow_disk_use = allow_disk_use.then_some(true);
        let docs = self.aggregate(ctx, pipeline, options)?;
        docs.into_iter().map(|doc| from_document(doc).map_err(Error::from)).collect()
    }

    /// First document produced by `pipeline`, or [`Error::NotFound`].
    pub fn aggregate_one<T: DeserializeOwned>(
        &self,
        ctx: &mut Context<'_>,
        pipeline: Vec<Document>,
    ) -> Result<T> {
        let doc = self
            .aggregate(ctx, pipeline, AggregateOptions::default())?
            .into_iter()
            .next()
            .ok_or(Error::NotFound)?;
        Ok(from_document(doc)?)
    }

    /// Distinct values of `field` among documents matching `filter`.
    pub fn distinct(
        &self,
        ctx: &mut Context<'_>,
        field: &str,
        filter: Document,
    ) -> Result<Vec<Bson>> {
        let limits = ctx.limits();
        let coll = self.reader::<Document>(ctx);
        self.manager.track(&self.name, OpKind::Distinct, &limits, &filter, || {
            self.manager.exec(&limits, "distinct", async {
                let action = coll.distinct(field, filter.clone());
                let values = match ctx.session() {
                    Some(session) => action.session(session).await?,
                    None => action.await?,
                };
                Ok(values)
            })
        })
    }

    /// Set `column` to `value` on every document that lacks it.
    pub fn add_column(&self, ctx: &mut Context<'_>, column: &str, value: Bson) -> Result<()> {
        let mut filter = Document::new();
        filter.insert(column, doc! { "$exists": false });
        let mut set = Document::new();
        set.insert(column, value);
        let update = doc! { "$set": set };
        self.apply_update(ctx, OpKind::Column, filter, update).map(|_| ())
    }

    /// Rename `old` to `new` on every document matching `filter`.
    pub fn rename_column(
        &self,
        ctx: &mut Context<'_>,
        filter: Document,
        old: &str,
        new: &str,
    ) -> Result<()> {
        let mut rename = Document::new();
        rename.insert(old, new);
        let update = doc! { "$rename": rename };
        self.apply_update(ctx, OpKind::Column, filter, update).map(|_| ())
    }

    /// Remove `field` from every document.
    pub fn drop_column(&self, ctx: &mut Context<'_>, field: &str) -> Result<()> {
        self.drop_docs_column(ctx, field, Document::new())
    }

    /// Remove `fields` from every document matching `filter`.
    pub fn drop_columns(
        &self,
        ctx: &mut Context<'_>,
        filter: Document,
        fields: &[&str],
    ) -> Result<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let unset: Document =
            fields.iter().map(|field| (field.to_string(), Bson::from(""))).collect();
        self.apply_update(ctx, OpKind::Column, filter, doc! { "$unset": unset }).map(|_| ())
    }

    /// Remove `field` from every document matching `filter`.
    pub fn drop_docs_column(
        &self,
        ctx: &mut Context<'_>,
        field: &str,
        filter: Document,
    ) -> Result<()> {
        self.drop_columns(ctx, filter, &[field])
    }

    fn apply_update(
        &self,
        ctx: &mut Context<'_>,
        op: OpKind,
        filter: Document,
        update: Document,
    ) -> Result<u64> {
        let limits = ctx.limits();
        let coll = self.raw();
        self.manager.track(&self.name, op, &limits, &filter, || {
            self.manager.exec(&limits, op.label(), async {
                let action = coll.update_many(filter.clone(), update);
                let result = match ctx.session() {
                    Some(session) => action.session(session).await?,
                    None => action.await?,
                };
                Ok(result.modified_count)
            })
        })
    }

    fn aggregate(
        &self,
        ctx: &mut Context<'_>,
        pipeline: Vec<Document>,
        options: AggregateOptions,
    ) -> Result<Vec<Document>> {
        let limits = ctx.limits();
        let coll = self.reader::<Document>(ctx);
        let detail = format!("pipeline stages: {}", pipeline.len());
        let round = self.manager.round_trip_timeout();
        self.manager.track(&self.name, OpKind::Aggregate, &limits, detail, || {
            let drained = aggregate_all(&coll, pipeline, options, ctx.session(), round);
            self.manager.exec_drain(&limits, "aggregate", drained)
        })
    }
}

/// Narrow `filter` to the archived documents, so a match that appears after
/// the archive read is left in place.
pub(crate) fn archived_only(filter: Document, ids: Vec<Bson>) -> Document {
    doc! { "$and": [filter, { "_id": { "$in": ids } }] }
}

/// Merge `(operator, document)` pairs into one update document. An operator
/// may appear once.
pub(crate) fn build_multi_update(ops: &[UpdateOp]) -> Result<Document> {
    let mut update = Document::new();
    for op in ops {
        let name = op.name();
        if name.is_empty() {
            return Err(Error::InvalidArgument("update operator name is empty".into()));
        }
        let key = format!("${name}");
        if update.contains_key(&key) {
            return Err(Error::DuplicateOperator(name.to_string()));
        }
        update.insert(key, op.doc.clone());
    }
    if update.is_empty() {
        return Err(Error::InvalidArgument("no update operators given".into()));
    }
    Ok(update)
}

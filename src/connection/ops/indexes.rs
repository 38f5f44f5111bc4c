//! Index operations for store tables.

use futures::TryStreamExt;
use mongodb::IndexModel;

use crate::connection::table::Table;
use crate::connection::types::Context;
use crate::error::Result;
use crate::models::Index;
use crate::perf::OpKind;

/// The server rejects a create because an index with these keys or this
/// name already exists in a different form.
const INDEX_OPTIONS_CONFLICT: i32 = 85;
const INDEX_ALREADY_EXISTS: i32 = 68;
const INDEX_NOT_FOUND: i32 = 27;
const NAMESPACE_NOT_FOUND: i32 = 26;

impl Table<'_> {
    /// Indexes defined on the table.
    pub fn indexes(&self, ctx: &Context<'_>) -> Result<Vec<Index>> {
        self.list_index_models(ctx).map(|models| models.into_iter().map(Index::from).collect())
    }

    /// Create `index`. Returns `false` when nothing was created because an
    /// index with the same keys already exists under another name. Any other
    /// conflict, such as the same name with different options, is returned
    /// as the server reported it.
    pub fn create_index(&self, ctx: &Context<'_>, index: &Index) -> Result<bool> {
        let limits = ctx.limits();
        let coll = self.raw();
        let detail = format!("index: {}, keys: {}", index.name, index.keys);
        self.manager.track(&self.name, OpKind::IndexCreate, &limits, detail, || {
            let created = self.manager.exec(&limits, "create index", async {
                coll.create_index(index.to_model()).await?;
                Ok(true)
            });
            match created {
                Err(err)
                    if err.has_server_code(INDEX_OPTIONS_CONFLICT)
                        || err.has_server_code(INDEX_ALREADY_EXISTS) =>
                {
                    let existing = self.list_index_models(ctx)?;
                    match renamed_twin(index, &existing) {
                        Some(name) => {
                            log::info!(
                                "index {} on {} already exists as {name}, skip",
                                index.name,
                                self.name
                            );
                            Ok(false)
                        }
                        None => Err(err),
                    }
                }
                other => other,
            }
        })
    }

    /// Drop the index called `name`; a missing index is not an error.
    pub fn drop_index(&self, ctx: &Context<'_>, name: &str) -> Result<()> {
        let limits = ctx.limits();
        let coll = self.raw();
        self.manager.track(&self.name, OpKind::IndexDrop, &limits, format!("index: {name}"), || {
            let dropped = self.manager.exec(&limits, "drop index", async {
                coll.drop_index(name).await?;
                Ok(())
            });
            match dropped {
                Err(err)
                    if err.has_server_code(INDEX_NOT_FOUND)
                        || err.has_server_code(NAMESPACE_NOT_FOUND) =>
                {
                    log::info!("index {name} on {} does not exist, skip drop", self.name);
                    Ok(())
                }
                other => other,
            }
        })
    }

    fn list_index_models(&self, ctx: &Context<'_>) -> Result<Vec<IndexModel>> {
        let limits = ctx.limits();
        let coll = self.raw();
        self.manager.exec(&limits, "list indexes", async {
            Ok(coll.list_indexes().await?.try_collect().await?)
        })
    }
}

/// Name of an existing index that covers the same keys as `index` under a
/// different name.
fn renamed_twin<'a>(index: &Index, existing: &'a [IndexModel]) -> Option<&'a str> {
    existing.iter().find_map(|model| {
        let name = model.options.as_ref()?.name.as_deref()?;
        (name != index.name && index.same_keys(&model.keys)).then_some(name)
    })
}

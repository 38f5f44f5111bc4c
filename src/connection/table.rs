use mongodb::Collection;
use mongodb::bson::Document;

use crate::connection::manager::ConnectionManager;
use crate::connection::ops::find::Find;
use crate::connection::types::Context;

/// Handle to one collection. Creating it never touches the database.
#[derive(Clone)]
pub struct Table<'m> {
    pub(crate) manager: &'m ConnectionManager,
    pub(crate) name: String,
}

impl<'m> Table<'m> {
    pub(crate) fn new(manager: &'m ConnectionManager, name: String) -> Self {
        Self { manager, name }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start a query; nothing runs until `all`, `one`, `list` or `count`.
    pub fn find(&self, filter: Document) -> Find<'m> {
        Find::new(self.clone(), filter)
    }

    /// Raw collection for writes: primary only, no routing hint.
    pub(crate) fn raw(&self) -> Collection<Document> {
        self.manager.collection(&self.name, None)
    }

    /// Raw collection for reads, routed by the context's hint unless the
    /// context is inside a transaction.
    pub(crate) fn reader<T: Send + Sync>(&self, ctx: &Context<'_>) -> Collection<T> {
        let hint = if ctx.in_transaction() { None } else { ctx.read_preference_mode() };
        self.manager.collection(&self.name, hint)
    }
}

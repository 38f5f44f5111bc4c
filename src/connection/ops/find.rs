//! Query builder.

use mongodb::bson::Document;
use mongodb::options::FindOptions;
use serde::Serialize;

use crate::connection::ops::find_all;
use crate::connection::table::Table;
use crate::connection::types::{Context, FindOpts};
use crate::error::{Error, Result};
use crate::models::FieldShape;
use crate::models::Record;
use crate::models::tables::{HOST_SPECIAL_FIELDS, TABLE_HOST_BASE, is_host_special_field};
use crate::perf::OpKind;

/// One page of results plus the total number of matches.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Zero when counting was skipped.
    pub count: u64,
}

/// A pending query. Builder calls only record state; the query runs in
/// [`all`](Find::all), [`one`](Find::one), [`list`](Find::list) or
/// [`count`](Find::count).
#[derive(Clone)]
pub struct Find<'m> {
    table: Table<'m>,
    filter: Document,
    fields: Vec<String>,
    sort: Document,
    start: u64,
    limit: u64,
    opts: FindOpts,
}

impl<'m> Find<'m> {
    pub(crate) fn new(table: Table<'m>, filter: Document) -> Self {
        Self {
            table,
            filter,
            fields: Vec::new(),
            sort: Document::new(),
            start: 0,
            limit: 0,
            opts: FindOpts::default(),
        }
    }

    /// Add fields to the projection.
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for field in fields {
            let field = field.into();
            if !field.is_empty() && !self.fields.contains(&field) {
                self.fields.push(field);
            }
        }
        self
    }

    /// Sort by a spec such as `"bk_host_id:-1,name"` or `"-create_time"`.
    /// An empty spec keeps the current order.
    pub fn sort(mut self, spec: &str) -> Self {
        if !spec.trim().is_empty() {
            self.sort = parse_sort(spec);
        }
        self
    }

    pub fn start(mut self, start: u64) -> Self {
        self.start = start;
        self
    }

    /// Zero means no limit.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    pub fn option(mut self, opts: FindOpts) -> Self {
        self.opts = opts;
        self
    }

    /// Every match.
    pub fn all<T: Record>(&self, ctx: &mut Context<'_>) -> Result<Vec<T>> {
        self.fetch(ctx, self.find_options())
    }

    /// The first match, or [`Error::NotFound`].
    pub fn one<T: Record>(&self, ctx: &mut Context<'_>) -> Result<T> {
        let mut options = self.find_options();
        options.limit = Some(1);
        self.fetch(ctx, options)?.into_iter().next().ok_or(Error::NotFound)
    }

    /// Matches plus their total count. The count is only computed on the
    /// first page or when [`FindOpts::with_count`] is set.
    pub fn list<T: Record>(&self, ctx: &mut Context<'_>) -> Result<Page<T>> {
        let items = self.all(ctx)?;
        let count = if self.start == 0 || self.opts.with_count { self.count(ctx)? } else { 0 };
        Ok(Page { items, count })
    }

    /// Number of documents matching the filter, ignoring start and limit.
    pub fn count(&self, ctx: &mut Context<'_>) -> Result<u64> {
        let limits = ctx.limits();
        let coll = self.table.reader::<Document>(ctx);
        let manager = self.table.manager;
        manager.track(&self.table.name, OpKind::Count, &limits, &self.filter, || {
            manager.exec(&limits, "count", async {
                let action = coll.count_documents(self.filter.clone());
                let count = match ctx.session() {
                    Some(session) => action.session(session).await?,
                    None => action.await?,
                };
                Ok(count)
            })
        })
    }

    fn fetch<T: Record>(&self, ctx: &mut Context<'_>, options: FindOptions) -> Result<Vec<T>> {
        check_result_type::<T>(&self.table.name, &self.fields)?;
        let limits = ctx.limits();
        let coll = self.table.reader::<T>(ctx);
        let manager = self.table.manager;
        let round = manager.round_trip_timeout();
        manager.track(&self.table.name, OpKind::Find, &limits, &self.filter, || {
            let drained = find_all(&coll, self.filter.clone(), options, ctx.session(), round);
            manager.exec_drain(&limits, "find", drained)
        })
    }

    fn find_options(&self) -> FindOptions {
        let mut options = FindOptions::default();
        options.projection = build_projection(&self.fields, self.opts.with_object_id);
        options.sort = (!self.sort.is_empty()).then(|| self.sort.clone());
        options.skip = (self.start > 0).then_some(self.start);
        options.limit = (self.limit > 0).then(|| i64::try_from(self.limit).unwrap_or(i64::MAX));
        options
    }
}

/// Parse a comma separated sort spec into an ordered sort document.
///
/// Each token is a field with an optional `:1`/`:-1` suffix or `+`/`-`
/// prefix. The suffix wins over the prefix; neither means ascending.
pub(crate) fn parse_sort(spec: &str) -> Document {
    let mut sort = Document::new();
    for token in spec.split(',').map(str::trim).filter(|token| !token.is_empty()) {
        let (key, suffix) = match token.split_once(':') {
            Some((key, suffix)) => (key.trim(), Some(suffix.trim())),
            None => (token, None),
        };
        let field = key.trim_start_matches(['+', '-']).trim();
        if field.is_empty() {
            continue;
        }
        let descending = match suffix {
            Some(suffix) => suffix == "-1",
            None => key.starts_with('-'),
        };
        sort.insert(field, if descending { -1 } else { 1 });
    }
    sort
}

/// Projection for `fields`. An empty list projects nothing so every field
/// comes back; otherwise `_id` stays unless explicitly suppressed.
pub(crate) fn build_projection(
    fields: &[String],
    with_object_id: Option<bool>,
) -> Option<Document> {
    if fields.is_empty() {
        return None;
    }
    let mut projection = Document::new();
    for field in fields {
        projection.insert(field.as_str(), 1);
    }
    if with_object_id == Some(false) && !projection.contains_key("_id") {
        projection.insert("_id", 0);
    }
    Some(projection)
}

/// Refuse host reads whose result type would decode an array-shaped
/// address or operator field as is.
pub(crate) fn check_result_type<T: Record>(table: &str, fields: &[String]) -> Result<()> {
    if table != TABLE_HOST_BASE {
        return Ok(());
    }
    let relevant: Vec<&str> = if fields.is_empty() {
        HOST_SPECIAL_FIELDS.to_vec()
    } else {
        fields.iter().map(String::as_str).filter(|field| is_host_special_field(field)).collect()
    };
    match relevant.into_iter().find(|field| T::field_shape(field) == FieldShape::Raw) {
        Some(field) => Err(Error::InvalidResultType {
            table: table.to_string(),
            reason: format!(
                "field {field} must decode into a flattened string, use FlatString or HostMap"
            ),
        }),
        None => Ok(()),
    }
}

//! Core ConnectionManager struct and basic connection methods.

use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

use mongodb::bson::doc;
use mongodb::options::{ClientOptions, CollectionOptions};
use mongodb::{Client, Collection, Database};
use semver::Version;
use tokio::runtime::Runtime;

use crate::connection::read_pref::selection_criteria;
use crate::connection::table::Table;
use crate::connection::types::{Limits, ReadPreferenceMode};
use crate::error::{Error, Result};
use crate::helpers::database_from_uri;
use crate::models::StoreConfig;
use crate::perf::{OpKind, OpMetrics};

/// Oldest server release with multi-document transactions on replica sets
/// and the `$inc` upsert behaviour sequences rely on.
pub const MIN_SERVER_VERSION: Version = Version::new(4, 2, 0);

const MAX_IDLE_TIME: Duration = Duration::from_secs(25 * 60);

/// Blocking handle to one database of a replica set.
pub struct ConnectionManager {
    /// Tokio runtime for MongoDB async operations
    pub(crate) runtime: Runtime,
    pub(crate) client: Client,
    pub(crate) database: Database,
    socket_timeout: Duration,
    metrics: OpMetrics,
}

impl ConnectionManager {
    /// Connect, verify the server answers and (optionally) check its version.
    pub fn connect(config: &StoreConfig) -> Result<Self> {
        config.validate()?;
        let database_name = database_from_uri(&config.uri).ok_or_else(|| {
            Error::Config(format!("mongodb uri {} does not name a database", config.redacted_uri()))
        })?;
        let runtime = Runtime::new()?;

        let client = runtime.block_on(async {
            let mut options =
                ClientOptions::parse(&config.uri).await.map_err(Error::ConnectFailed)?;
            options.repl_set_name = Some(config.rs_name.clone());
            options.max_pool_size = Some(config.max_open_conns);
            options.min_pool_size = Some(config.max_idle_conns);
            options.max_idle_time = Some(MAX_IDLE_TIME);
            options.connect_timeout = Some(config.connect_timeout());
            options.server_selection_timeout = Some(config.connect_timeout());
            // Sequence increments must not be replayed by the driver.
            options.retry_writes = Some(false);
            if config.app_name.is_some() {
                options.app_name = config.app_name.clone();
            }
            Client::with_options(options).map_err(Error::ConnectFailed)
        })?;

        let manager = Self {
            database: client.database(&database_name),
            client,
            runtime,
            socket_timeout: config.socket_timeout(),
            metrics: OpMetrics::new(),
        };

        manager.ping().map_err(|err| match err {
            Error::Unreachable(source) => Error::ConnectFailed(source),
            other => other,
        })?;
        if config.check_version {
            let found = manager.server_version()?;
            if found < MIN_SERVER_VERSION {
                return Err(Error::UnsupportedVersion {
                    found: found.to_string(),
                    required: MIN_SERVER_VERSION.to_string(),
                });
            }
        }

        log::info!(
            "connected to mongodb {} (replica set {}, database {})",
            config.redacted_uri(),
            config.rs_name,
            database_name
        );
        Ok(manager)
    }

    /// Round trip to the server.
    pub fn ping(&self) -> Result<()> {
        let limits = Limits::default();
        self.exec(&limits, "ping", async {
            self.client
                .database("admin")
                .run_command(doc! { "ping": 1 })
                .await
                .map_err(Error::Unreachable)?;
            Ok(())
        })
    }

    /// Server version reported by `buildInfo`.
    pub fn server_version(&self) -> Result<Version> {
        let limits = Limits::default();
        let info = self.exec(&limits, "buildInfo", async {
            Ok(self.client.database("admin").run_command(doc! { "buildInfo": 1 }).await?)
        })?;
        let raw = info.get_str("version").map_err(|_| Error::UnsupportedVersion {
            found: "unknown".into(),
            required: MIN_SERVER_VERSION.to_string(),
        })?;
        parse_server_version(raw).ok_or_else(|| Error::UnsupportedVersion {
            found: raw.to_string(),
            required: MIN_SERVER_VERSION.to_string(),
        })
    }

    /// Close every pooled connection.
    pub fn close(self) {
        let ConnectionManager { runtime, client, .. } = self;
        runtime.block_on(async { client.shutdown().await });
        log::info!("mongodb connection closed");
    }

    pub fn database_name(&self) -> &str {
        self.database.name()
    }

    /// Handle to one collection.
    pub fn table(&self, name: impl Into<String>) -> Table<'_> {
        Table::new(self, name.into())
    }

    pub fn metrics(&self) -> &OpMetrics {
        &self.metrics
    }

    /// Typed collection, routed by `read_preference` when one is given.
    pub(crate) fn collection<T: Send + Sync>(
        &self,
        name: &str,
        read_preference: Option<ReadPreferenceMode>,
    ) -> Collection<T> {
        match selection_criteria(read_preference) {
            Some(criteria) => self.database.collection_with_options(
                name,
                CollectionOptions::builder().selection_criteria(criteria).build(),
            ),
            None => self.database.collection(name),
        }
    }

    /// Upper bound for a single server round trip.
    pub(crate) fn round_trip_timeout(&self) -> Duration {
        self.socket_timeout
    }

    /// Drive one database round trip to completion on the runtime, bounded by
    /// the socket timeout and the caller's deadline, and raced against the
    /// caller's cancellation token.
    pub(crate) fn exec<T, F>(&self, limits: &Limits, what: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        limits.check()?;
        let budget = limits.budget(self.socket_timeout);
        self.drive(limits, what, Some(budget), fut)
    }

    /// Drive a call made of several round trips, such as a cursor drain. Each
    /// round trip bounds itself; the whole call is only bounded by the
    /// caller's deadline.
    pub(crate) fn exec_drain<T, F>(&self, limits: &Limits, what: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        limits.check()?;
        self.drive(limits, what, limits.remaining(), fut)
    }

    fn drive<T, F>(
        &self,
        limits: &Limits,
        what: &str,
        bound: Option<Duration>,
        fut: F,
    ) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.runtime.block_on(async {
            let cancelled = async {
                match &limits.cancellation {
                    Some(token) => token.cancelled().await,
                    None => std::future::pending().await,
                }
            };
            tokio::select! {
                result = bounded(bound, what, fut) => result,
                _ = cancelled => Err(Error::Cancelled),
            }
        })
    }

    /// Run `call`, record it under (`table`, `op`) and log its failure.
    pub(crate) fn track<T>(
        &self,
        table: &str,
        op: OpKind,
        limits: &Limits,
        detail: impl fmt::Display,
        call: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        let started = Instant::now();
        let result = call();
        self.metrics.observe_since(table, op, started, &result);
        if let Some(err) = result.as_ref().err().filter(|err| !err.is_not_found()) {
            log::error!(
                "mongo {} failed, table: {table}, {detail}, err: {err}, rid: {}",
                op.label(),
                limits.request_id
            );
        }
        result
    }
}

/// Await `fut`, failing with [`Error::Timeout`] once `bound` elapses.
pub(crate) async fn bounded<T, F>(bound: Option<Duration>, what: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match bound {
        Some(bound) => match tokio::time::timeout(bound, fut).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(format!("{what} exceeded {bound:?}"))),
        },
        None => fut.await,
    }
}

/// Leading `major.minor.patch` of a server version string such as
/// `7.0.2` or `4.4.0-rc1`.
pub(crate) fn parse_server_version(raw: &str) -> Option<Version> {
    let mut parts = raw
        .split(|c: char| !c.is_ascii_digit())
        .take(3)
        .map(|part| part.parse::<u64>().ok());
    let major = parts.next()??;
    let minor = parts.next().flatten().unwrap_or(0);
    let patch = parts.next().flatten().unwrap_or(0);
    Some(Version::new(major, minor, patch))
}

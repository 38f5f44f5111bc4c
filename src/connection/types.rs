use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use mongodb::ClientSession;
use mongodb::bson::Document;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

use crate::error::{Error, Result};

/// Cancellation token for aborting in-flight database calls.
#[derive(Clone, Default)]
pub struct CancellationToken {
    inner: Arc<TokenState>,
}

#[derive(Default)]
struct TokenState {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken").field("cancelled", &self.is_cancelled()).finish()
    }
}

/// Which replica set members may serve a read.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReadPreferenceMode {
    Primary,
    PrimaryPreferred,
    Secondary,
    SecondaryPreferred,
    Nearest,
}

impl ReadPreferenceMode {
    pub fn label(self) -> &'static str {
        match self {
            ReadPreferenceMode::Primary => "primary",
            ReadPreferenceMode::PrimaryPreferred => "primaryPreferred",
            ReadPreferenceMode::Secondary => "secondary",
            ReadPreferenceMode::SecondaryPreferred => "secondaryPreferred",
            ReadPreferenceMode::Nearest => "nearest",
        }
    }
}

impl FromStr for ReadPreferenceMode {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "primary" => Ok(ReadPreferenceMode::Primary),
            "primaryPreferred" => Ok(ReadPreferenceMode::PrimaryPreferred),
            "secondary" => Ok(ReadPreferenceMode::Secondary),
            "secondaryPreferred" => Ok(ReadPreferenceMode::SecondaryPreferred),
            "nearest" => Ok(ReadPreferenceMode::Nearest),
            other => Err(Error::InvalidArgument(format!("unknown read preference {other:?}"))),
        }
    }
}

/// Transaction behaviour for a context that carries no session yet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TxnMode {
    /// Run without a session.
    #[default]
    Standalone,
    /// Open a session and transaction, commit on success, abort on error.
    Auto,
}

/// Extra find options.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FindOpts {
    /// `Some(false)` drops `_id` from a non-empty projection.
    pub with_object_id: Option<bool>,
    /// Count in `list` even when `start > 0`.
    pub with_count: bool,
}

/// One operator of a multi-operator update, e.g. `("set", {...})`.
#[derive(Clone, Debug, PartialEq)]
pub struct UpdateOp {
    pub operator: String,
    pub doc: Document,
}

impl UpdateOp {
    pub fn new(operator: impl Into<String>, doc: Document) -> Self {
        Self { operator: operator.into(), doc }
    }

    /// Operator name without its leading `$`.
    pub(crate) fn name(&self) -> &str {
        self.operator.trim().trim_start_matches('$')
    }
}

/// Request-scoped state threaded through every call.
///
/// A context holding a session is inside a transaction; every data verb
/// joins that session.
pub struct Context<'s> {
    request_id: String,
    read_preference: Option<ReadPreferenceMode>,
    deadline: Option<Instant>,
    cancellation: Option<CancellationToken>,
    session: Option<&'s mut ClientSession>,
}

impl Default for Context<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'s> Context<'s> {
    pub fn new() -> Self {
        Self::with_request_id(uuid::Uuid::new_v4().to_string())
    }

    pub fn with_request_id(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            read_preference: None,
            deadline: None,
            cancellation: None,
            session: None,
        }
    }

    pub fn read_preference(mut self, mode: ReadPreferenceMode) -> Self {
        self.read_preference = Some(mode);
        self
    }

    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn timeout(self, timeout: Duration) -> Self {
        self.deadline(Instant::now() + timeout)
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn read_preference_mode(&self) -> Option<ReadPreferenceMode> {
        self.read_preference
    }

    pub fn in_transaction(&self) -> bool {
        self.session.is_some()
    }

    pub(crate) fn session(&mut self) -> Option<&mut ClientSession> {
        self.session.as_deref_mut()
    }

    /// A context sharing this one's request state and bound to `session`.
    pub(crate) fn attach<'c>(&self, session: &'c mut ClientSession) -> Context<'c> {
        Context {
            request_id: self.request_id.clone(),
            read_preference: self.read_preference,
            deadline: self.deadline,
            cancellation: self.cancellation.clone(),
            session: Some(session),
        }
    }

    pub(crate) fn limits(&self) -> Limits {
        Limits {
            request_id: self.request_id.clone(),
            deadline: self.deadline,
            cancellation: self.cancellation.clone(),
        }
    }
}

impl fmt::Debug for Context<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("request_id", &self.request_id)
            .field("read_preference", &self.read_preference)
            .field("deadline", &self.deadline)
            .field("cancellation", &self.cancellation.is_some())
            .field("in_transaction", &self.session.is_some())
            .finish()
    }
}

/// Deadline and cancellation copied out of a context, so they stay usable
/// while its session is mutably borrowed.
#[derive(Clone, Debug, Default)]
pub(crate) struct Limits {
    pub request_id: String,
    pub deadline: Option<Instant>,
    pub cancellation: Option<CancellationToken>,
}

impl Limits {
    /// Fail fast when the call is already dead.
    pub fn check(&self) -> Result<()> {
        if self.cancellation.as_ref().is_some_and(CancellationToken::is_cancelled) {
            return Err(Error::Cancelled);
        }
        if self.deadline.is_some_and(|deadline| deadline <= Instant::now()) {
            return Err(Error::Timeout(format!("request {} deadline exceeded", self.request_id)));
        }
        Ok(())
    }

    /// Time left before the deadline, if there is one.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline.map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Time allowed for one round trip: the ceiling, shortened by the deadline.
    pub fn budget(&self, ceiling: Duration) -> Duration {
        match self.remaining() {
            Some(remaining) => ceiling.min(remaining),
            None => ceiling,
        }
    }
}

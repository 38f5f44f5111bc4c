//! Per-table operation counters and timers.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;

const SLOW_CALL: Duration = Duration::from_millis(200);

fn perf_log_enabled() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| std::env::var_os("CMDB_STORE_PERF").is_some())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    Find,
    Count,
    Insert,
    Update,
    Upsert,
    Delete,
    Aggregate,
    Distinct,
    Column,
    IndexCreate,
    IndexDrop,
    Sequence,
}

impl OpKind {
    pub fn label(self) -> &'static str {
        match self {
            OpKind::Find => "find",
            OpKind::Count => "count",
            OpKind::Insert => "insert",
            OpKind::Update => "update",
            OpKind::Upsert => "upsert",
            OpKind::Delete => "delete",
            OpKind::Aggregate => "aggregate",
            OpKind::Distinct => "distinct",
            OpKind::Column => "column",
            OpKind::IndexCreate => "index_create",
            OpKind::IndexDrop => "index_drop",
            OpKind::Sequence => "sequence",
        }
    }
}

#[derive(Default)]
struct OpStats {
    calls: AtomicU64,
    errors: AtomicU64,
    total_micros: AtomicU64,
}

/// Snapshot of one (table, operation) pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OpSnapshot {
    pub table: String,
    pub op: OpKind,
    pub calls: u64,
    pub errors: u64,
    pub total_micros: u64,
}

#[derive(Default)]
pub struct OpMetrics {
    stats: DashMap<(String, OpKind), OpStats>,
}

impl OpMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one finished call.
    pub fn observe(&self, table: &str, op: OpKind, elapsed: Duration, failed: bool) {
        let entry = self.stats.entry((table.to_string(), op)).or_default();
        entry.calls.fetch_add(1, Ordering::Relaxed);
        if failed {
            entry.errors.fetch_add(1, Ordering::Relaxed);
        }
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        entry.total_micros.fetch_add(micros, Ordering::Relaxed);
        drop(entry);

        if perf_log_enabled() && elapsed >= SLOW_CALL {
            let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
            log::info!("[perf-store] {table} {} ms={elapsed_ms:.3}", op.label());
        }
    }

    pub fn observe_since<T, E>(
        &self,
        table: &str,
        op: OpKind,
        started: Instant,
        result: &std::result::Result<T, E>,
    ) {
        self.observe(table, op, started.elapsed(), result.is_err());
    }

    /// All counters, ordered by table then operation.
    pub fn snapshot(&self) -> Vec<OpSnapshot> {
        let mut out: Vec<OpSnapshot> = self
            .stats
            .iter()
            .map(|entry| {
                let (table, op) = entry.key();
                OpSnapshot {
                    table: table.clone(),
                    op: *op,
                    calls: entry.calls.load(Ordering::Relaxed),
                    errors: entry.errors.load(Ordering::Relaxed),
                    total_micros: entry.total_micros.load(Ordering::Relaxed),
                }
            })
            .collect();
        out.sort_by(|a, b| a.table.cmp(&b.table).then(a.op.cmp(&b.op)));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_calls_and_errors_per_table_and_op() {
        let metrics = OpMetrics::new();
        metrics.observe("cc_HostBase", OpKind::Find, Duration::from_micros(10), false);
        metrics.observe("cc_HostBase", OpKind::Find, Duration::from_micros(5), true);
        metrics.observe("cc_HostBase", OpKind::Delete, Duration::from_micros(1), false);
        metrics.observe("cc_SetBase", OpKind::Find, Duration::from_micros(1), false);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(
            snapshot[0],
            OpSnapshot {
                table: "cc_HostBase".into(),
                op: OpKind::Find,
                calls: 2,
                errors: 1,
                total_micros: 15,
            }
        );
        assert_eq!(snapshot[1].op, OpKind::Delete);
        assert_eq!(snapshot[2].table, "cc_SetBase");
    }

    #[test]
    fn observe_since_marks_failures() {
        let metrics = OpMetrics::new();
        let failed: Result<(), &str> = Err("boom");
        metrics.observe_since("cc_PodBase", OpKind::Insert, Instant::now(), &failed);
        assert_eq!(metrics.snapshot()[0].errors, 1);
    }
}

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters accumulated by one [`GraphProcessor`](crate::GraphProcessor)
/// and all of its clones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessStats {
    pub runs: u64,
    pub failed_runs: u64,
    pub node_executions: u64,
    pub forks: u64,
}

impl ProcessStats {
    pub fn success_rate(&self) -> f64 {
        if self.runs == 0 {
            return 0.0;
        }
        (self.runs - self.failed_runs) as f64 / self.runs as f64
    }
}

#[derive(Debug, Default)]
pub(crate) struct StatsRecorder {
    runs: AtomicU64,
    failed_runs: AtomicU64,
    node_executions: AtomicU64,
    forks: AtomicU64,
}

impl StatsRecorder {
    pub(crate) fn run_finished(&self, failed: bool) {
        self.runs.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.failed_runs.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn node_executed(&self) {
        self.node_executions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn forked(&self) {
        self.forks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> ProcessStats {
        ProcessStats {
            runs: self.runs.load(Ordering::Relaxed),
            failed_runs: self.failed_runs.load(Ordering::Relaxed),
            node_executions: self.node_executions.load(Ordering::Relaxed),
            forks: self.forks.load(Ordering::Relaxed),
        }
    }
}

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Reason codes attached to failed scans, mirrored in both the record's
/// `failure_reason` prefix and the failure counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    SubmissionError,
    ResultError,
    InvalidState,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::SubmissionError => "submission_error",
            FailureReason::ResultError => "result_error",
            FailureReason::InvalidState => "invalid_state",
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process-local counters for the scan pipeline.
///
/// The pending-submitted gauge is not kept here; it is read live from
/// the store (`count_by_status`) when a snapshot is served.
#[derive(Debug, Default)]
pub struct ScanMetrics {
    user_cache_hits: AtomicU64,
    global_cache_hits: AtomicU64,
    new_submissions: AtomicU64,
    completed: AtomicU64,
    failed_submission: AtomicU64,
    failed_result: AtomicU64,
    failed_invalid_state: AtomicU64,
}

impl ScanMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_user_cache_hit(&self) {
        self.user_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_global_cache_hit(&self) {
        self.global_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_new_submission(&self) {
        self.new_submissions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self, reason: FailureReason) {
        let counter = match reason {
            FailureReason::SubmissionError => &self.failed_submission,
            FailureReason::ResultError => &self.failed_result,
            FailureReason::InvalidState => &self.failed_invalid_state,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            user_cache_hits: self.user_cache_hits.load(Ordering::Relaxed),
            global_cache_hits: self.global_cache_hits.load(Ordering::Relaxed),
            new_submissions: self.new_submissions.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: FailureSnapshot {
                submission_error: self.failed_submission.load(Ordering::Relaxed),
                result_error: self.failed_result.load(Ordering::Relaxed),
                invalid_state: self.failed_invalid_state.load(Ordering::Relaxed),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub user_cache_hits: u64,
    pub global_cache_hits: u64,
    pub new_submissions: u64,
    pub completed: u64,
    pub failed: FailureSnapshot,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FailureSnapshot {
    pub submission_error: u64,
    pub result_error: u64,
    pub invalid_state: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_into_snapshot() {
        let metrics = ScanMetrics::new();
        metrics.record_user_cache_hit();
        metrics.record_global_cache_hit();
        metrics.record_global_cache_hit();
        metrics.record_new_submission();
        metrics.record_completed();
        metrics.record_failure(FailureReason::SubmissionError);
        metrics.record_failure(FailureReason::InvalidState);

        let snap = metrics.snapshot();
        assert_eq!(snap.user_cache_hits, 1);
        assert_eq!(snap.global_cache_hits, 2);
        assert_eq!(snap.new_submissions, 1);
        assert_eq!(snap.completed, 1);
        assert_eq!(snap.failed.submission_error, 1);
        assert_eq!(snap.failed.result_error, 0);
        assert_eq!(snap.failed.invalid_state, 1);
    }
}

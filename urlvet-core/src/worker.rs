use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{debug, error, info, warn};
use urlvet_model::{ScanRecord, ScanStatus};
use uuid::Uuid;

use crate::metrics::{FailureReason, ScanMetrics};
use crate::provider::ScanProvider;
use crate::store::{ScanClaimSession, ScanStore};
use crate::Result;

/// Tuning for the two scheduled passes.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub submission_interval: Duration,
    pub result_interval: Duration,
    /// Overall budget for one submission pass.
    pub submission_batch_size: usize,
    /// Overall budget for one result pass.
    pub result_batch_size: usize,
    /// Per-owner claim limit during the fairness phase.
    pub per_owner_batch_size: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            submission_interval: Duration::from_millis(10_000),
            result_interval: Duration::from_millis(15_000),
            submission_batch_size: 100,
            result_batch_size: 100,
            per_owner_batch_size: 5,
        }
    }
}

/// What one pass did. Not-ready records count as processed but neither
/// advanced nor failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub processed: usize,
    pub advanced: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy)]
enum PassKind {
    Submission,
    Result,
}

enum StepOutcome {
    Advanced,
    Failed,
    Untouched,
}

/// Fairness-aware batch worker.
///
/// Two independent timers drive the scan state machine: the submission
/// pass moves `SUBMITTED` records to `PROCESSING` via the provider, the
/// result pass moves `PROCESSING` records to `DONE` once results are
/// ready. Each pass claims its batch in two phases: a round-robin
/// fairness phase capped per owner, then an unrestricted efficiency
/// phase for whatever budget remains. All claims of a pass live in one
/// claim session, so row locks are held until the pass commits.
pub struct ScanWorker {
    store: Arc<dyn ScanStore>,
    provider: Arc<dyn ScanProvider>,
    metrics: Arc<ScanMetrics>,
    config: WorkerConfig,
}

impl std::fmt::Debug for ScanWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanWorker")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ScanWorker {
    pub fn new(
        store: Arc<dyn ScanStore>,
        provider: Arc<dyn ScanProvider>,
        metrics: Arc<ScanMetrics>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            store,
            provider,
            metrics,
            config,
        }
    }

    /// Run both passes on their timers until a shutdown signal arrives.
    pub async fn run(self: Arc<Self>, mut shutdown_rx: mpsc::Receiver<()>) {
        info!(
            submission_interval_ms = self.config.submission_interval.as_millis() as u64,
            result_interval_ms = self.config.result_interval.as_millis() as u64,
            "Starting scan worker"
        );

        let worker = self.clone();
        let submission_task = tokio::spawn(async move {
            worker.submission_loop().await;
        });

        let worker = self.clone();
        let result_task = tokio::spawn(async move {
            worker.result_loop().await;
        });

        let _ = shutdown_rx.recv().await;

        info!("Shutting down scan worker");
        submission_task.abort();
        result_task.abort();
    }

    async fn submission_loop(&self) {
        let mut ticker = interval(self.config.submission_interval);
        loop {
            ticker.tick().await;
            match self.run_submission_pass().await {
                Ok(summary) if summary.processed > 0 => {
                    info!(
                        processed = summary.processed,
                        advanced = summary.advanced,
                        failed = summary.failed,
                        "submission pass finished"
                    );
                }
                Ok(_) => {}
                Err(e) => error!(error = %e, "submission pass failed"),
            }
        }
    }

    async fn result_loop(&self) {
        let mut ticker = interval(self.config.result_interval);
        loop {
            ticker.tick().await;
            match self.run_result_pass().await {
                Ok(summary) if summary.processed > 0 => {
                    info!(
                        processed = summary.processed,
                        advanced = summary.advanced,
                        failed = summary.failed,
                        "result pass finished"
                    );
                }
                Ok(_) => {}
                Err(e) => error!(error = %e, "result pass failed"),
            }
        }
    }

    /// One submission pass over `SUBMITTED` records.
    pub async fn run_submission_pass(&self) -> Result<PassSummary> {
        self.run_pass(
            ScanStatus::Submitted,
            self.config.submission_batch_size,
            PassKind::Submission,
        )
        .await
    }

    /// One result pass over `PROCESSING` records.
    pub async fn run_result_pass(&self) -> Result<PassSummary> {
        self.run_pass(
            ScanStatus::Processing,
            self.config.result_batch_size,
            PassKind::Result,
        )
        .await
    }

    async fn run_pass(
        &self,
        target: ScanStatus,
        budget: usize,
        kind: PassKind,
    ) -> Result<PassSummary> {
        let mut session = self.store.begin_claim().await?;
        let mut summary = PassSummary::default();
        let mut seen: HashSet<Uuid> = HashSet::new();

        // Phase 1: round-robin per owner so a heavy owner cannot starve
        // the rest.
        let owners = session.distinct_owners(target).await?;
        if !owners.is_empty() {
            debug!(owners = owners.len(), status = %target, "fairness phase");
            for owner in owners {
                if summary.processed >= budget {
                    info!(
                        status = %target,
                        "batch budget reached during fairness phase, deferring remaining owners"
                    );
                    break;
                }
                let batch = session
                    .claim_by_owner_and_status(
                        owner,
                        target,
                        self.config.per_owner_batch_size as i64,
                    )
                    .await?;
                for mut record in batch {
                    if !seen.insert(record.id) {
                        continue;
                    }
                    self.process_record(kind, &mut record, &mut *session, &mut summary)
                        .await;
                }
            }
        }

        // Phase 2: fill whatever budget remains without owner limits.
        let remaining = budget.saturating_sub(summary.processed);
        if remaining > 0 {
            let batch = session.claim_by_status(target, remaining as i64).await?;
            if !batch.is_empty() {
                debug!(claimed = batch.len(), status = %target, "efficiency phase");
            }
            for mut record in batch {
                // A session's own locks do not hide rows from its later
                // claims; skip anything already handled this pass.
                if !seen.insert(record.id) {
                    continue;
                }
                self.process_record(kind, &mut record, &mut *session, &mut summary)
                    .await;
            }
        }

        session.commit().await?;
        Ok(summary)
    }

    async fn process_record(
        &self,
        kind: PassKind,
        record: &mut ScanRecord,
        session: &mut dyn ScanClaimSession,
        summary: &mut PassSummary,
    ) {
        summary.processed += 1;

        let outcome = match kind {
            PassKind::Submission => self.submit_step(record).await,
            PassKind::Result => self.poll_step(record).await,
        };

        match outcome {
            StepOutcome::Advanced => summary.advanced += 1,
            StepOutcome::Failed => summary.failed += 1,
            StepOutcome::Untouched => return,
        }

        if let Err(e) = session.persist(record).await {
            error!(scan_id = %record.id, error = %e, "failed to persist scan update");
        }
    }

    async fn submit_step(&self, record: &mut ScanRecord) -> StepOutcome {
        match self.provider.submit(&record.url).await {
            Some(external_id) => match record.mark_processing(external_id) {
                Ok(()) => {
                    info!(
                        scan_id = %record.id,
                        external_scan_id = record.external_scan_id.as_deref().unwrap_or(""),
                        "scan submitted to provider"
                    );
                    StepOutcome::Advanced
                }
                Err(e) => self.fail(
                    record,
                    FailureReason::SubmissionError,
                    &format!("submission_error: {e}"),
                ),
            },
            None => self.fail(
                record,
                FailureReason::SubmissionError,
                "submission_error: failed to submit scan to the scanning provider",
            ),
        }
    }

    async fn poll_step(&self, record: &mut ScanRecord) -> StepOutcome {
        let external_id = match record.external_scan_id.clone() {
            Some(id) if !id.is_empty() => id,
            _ => {
                // Internal-state violation, not a provider failure.
                error!(
                    scan_id = %record.id,
                    "scan is PROCESSING but has no external scan id"
                );
                return self.fail(
                    record,
                    FailureReason::InvalidState,
                    "invalid_state: scan is processing but has no external scan id",
                );
            }
        };

        match self.provider.fetch_result(&external_id).await {
            Some(result) => match record.mark_done(result) {
                Ok(()) => {
                    self.metrics.record_completed();
                    info!(scan_id = %record.id, "scan result stored, status DONE");
                    StepOutcome::Advanced
                }
                Err(e) => self.fail(
                    record,
                    FailureReason::ResultError,
                    &format!("result_error: {e}"),
                ),
            },
            None => {
                debug!(scan_id = %record.id, "scan result not yet available");
                StepOutcome::Untouched
            }
        }
    }

    fn fail(&self, record: &mut ScanRecord, reason: FailureReason, message: &str) -> StepOutcome {
        self.metrics.record_failure(reason);
        if let Err(e) = record.mark_failed(message) {
            warn!(scan_id = %record.id, error = %e, "could not mark scan failed");
            return StepOutcome::Untouched;
        }
        error!(scan_id = %record.id, reason = %reason, message, "scan failed");
        StepOutcome::Failed
    }
}

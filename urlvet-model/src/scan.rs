use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a scan record.
///
/// Transitions only move forward: `Submitted -> Processing -> Done`, with
/// `Failed` reachable from either non-terminal state. `Done` and `Failed`
/// are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanStatus {
    Submitted,
    Processing,
    Done,
    Failed,
}

impl ScanStatus {
    /// Stable text form used in the database and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Submitted => "SUBMITTED",
            ScanStatus::Processing => "PROCESSING",
            ScanStatus::Done => "DONE",
            ScanStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanStatus::Done | ScanStatus::Failed)
    }

    /// Whether the forward-only state machine permits `self -> next`.
    pub fn can_transition_to(&self, next: ScanStatus) -> bool {
        match (self, next) {
            (ScanStatus::Submitted, ScanStatus::Processing) => true,
            (ScanStatus::Processing, ScanStatus::Done) => true,
            (ScanStatus::Submitted | ScanStatus::Processing, ScanStatus::Failed) => true,
            _ => false,
        }
    }
}

impl std::str::FromStr for ScanStatus {
    type Err = TransitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUBMITTED" => Ok(ScanStatus::Submitted),
            "PROCESSING" => Ok(ScanStatus::Processing),
            "DONE" => Ok(ScanStatus::Done),
            "FAILED" => Ok(ScanStatus::Failed),
            other => Err(TransitionError::UnknownStatus(other.to_string())),
        }
    }
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("invalid status transition: {from} -> {to}")]
    Invalid { from: ScanStatus, to: ScanStatus },

    #[error("unknown scan status: {0}")]
    UnknownStatus(String),

    #[error("external scan id must not be empty")]
    MissingExternalId,
}

/// One URL scan request owned by a single user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRecord {
    pub id: Uuid,
    pub url: String,
    pub user_id: Uuid,
    pub status: ScanStatus,
    pub external_scan_id: Option<String>,
    pub result: Option<serde_json::Value>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScanRecord {
    /// Fresh record awaiting submission to the external provider.
    pub fn new(url: impl Into<String>, user_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            url: url.into(),
            user_id,
            status: ScanStatus::Submitted,
            external_scan_id: None,
            result: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Cache-derived record: a completed scan of the same URL is copied
    /// for a new owner without another round-trip to the provider.
    pub fn from_cache(url: impl Into<String>, user_id: Uuid, cached: &ScanRecord) -> Self {
        let mut record = Self::new(url, user_id);
        record.status = ScanStatus::Done;
        record.external_scan_id = cached.external_scan_id.clone();
        record.result = cached.result.clone();
        record
    }

    fn transition(&mut self, next: ScanStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError::Invalid {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Accepted by the provider; the record now polls for results.
    pub fn mark_processing(&mut self, external_id: impl Into<String>) -> Result<(), TransitionError> {
        let external_id = external_id.into();
        if external_id.is_empty() {
            return Err(TransitionError::MissingExternalId);
        }
        self.transition(ScanStatus::Processing)?;
        self.external_scan_id = Some(external_id);
        Ok(())
    }

    /// Provider returned the full result payload.
    pub fn mark_done(&mut self, result: serde_json::Value) -> Result<(), TransitionError> {
        if self.external_scan_id.as_deref().unwrap_or("").is_empty() {
            return Err(TransitionError::MissingExternalId);
        }
        self.transition(ScanStatus::Done)?;
        self.result = Some(result);
        Ok(())
    }

    /// Terminal failure; the reason is surfaced to the owner verbatim.
    pub fn mark_failed(&mut self, reason: impl Into<String>) -> Result<(), TransitionError> {
        self.transition(ScanStatus::Failed)?;
        self.failure_reason = Some(reason.into());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> ScanRecord {
        ScanRecord::new("https://example.com", Uuid::new_v4())
    }

    #[test]
    fn new_record_starts_submitted() {
        let r = record();
        assert_eq!(r.status, ScanStatus::Submitted);
        assert!(r.external_scan_id.is_none());
        assert!(r.result.is_none());
        assert!(r.failure_reason.is_none());
    }

    #[test]
    fn full_lifecycle_advances_forward() {
        let mut r = record();
        r.mark_processing("ext-1").unwrap();
        assert_eq!(r.status, ScanStatus::Processing);
        assert_eq!(r.external_scan_id.as_deref(), Some("ext-1"));

        r.mark_done(json!({"verdict": "clean"})).unwrap();
        assert_eq!(r.status, ScanStatus::Done);
        assert!(r.result.is_some());
    }

    #[test]
    fn processing_requires_external_id() {
        let mut r = record();
        assert_eq!(
            r.mark_processing(""),
            Err(TransitionError::MissingExternalId)
        );
        assert_eq!(r.status, ScanStatus::Submitted);
    }

    #[test]
    fn done_requires_external_id() {
        let mut r = record();
        r.status = ScanStatus::Processing;
        assert_eq!(
            r.mark_done(json!({})),
            Err(TransitionError::MissingExternalId)
        );
    }

    #[test]
    fn terminal_states_reject_regression() {
        let mut r = record();
        r.mark_failed("submission_error: provider rejected").unwrap();
        assert!(r.mark_processing("ext-2").is_err());
        assert!(r.mark_failed("again").is_err());
        assert_eq!(r.status, ScanStatus::Failed);

        let mut d = record();
        d.mark_processing("ext-3").unwrap();
        d.mark_done(json!({})).unwrap();
        assert!(d.mark_failed("late failure").is_err());
        assert_eq!(d.status, ScanStatus::Done);
    }

    #[test]
    fn cache_copy_is_done_with_copied_fields() {
        let mut original = record();
        original.mark_processing("ext-9").unwrap();
        original.mark_done(json!({"score": 0})).unwrap();

        let owner = Uuid::new_v4();
        let copy = ScanRecord::from_cache(original.url.clone(), owner, &original);
        assert_eq!(copy.status, ScanStatus::Done);
        assert_eq!(copy.user_id, owner);
        assert_ne!(copy.id, original.id);
        assert_eq!(copy.external_scan_id, original.external_scan_id);
        assert_eq!(copy.result, original.result);
    }

    #[test]
    fn status_round_trips_through_text() {
        for status in [
            ScanStatus::Submitted,
            ScanStatus::Processing,
            ScanStatus::Done,
            ScanStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<ScanStatus>().unwrap(), status);
        }
        assert!("PENDING".parse::<ScanStatus>().is_err());
    }
}

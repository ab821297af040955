//! Event router.
//!
//! Maps a bus subject to its event kind, decodes the payload and hands the
//! typed event to the [`Denormalizer`]. The returned [`Disposition`] tells
//! the consumer loop whether to acknowledge the message or ask for
//! redelivery.

use crate::denormalize::Denormalizer;
use analytics_core::events::ScheduleGenerated;
use analytics_core::{AnalyticsEvent, Error, EventKind, Result};
use telemetry::metrics;
use tracing::{debug, error, info, warn};

/// Verdict on one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Store updated
    Applied,
    /// Subject not handled by this pipeline
    Ignored,
    /// Payload unusable; redelivery would fail the same way
    Dropped,
    /// Store write failed; redeliver
    Retry,
}

impl Disposition {
    pub fn should_ack(&self) -> bool {
        !matches!(self, Self::Retry)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Ignored => "ignored",
            Self::Dropped => "dropped",
            Self::Retry => "retry",
        }
    }
}

/// Routes messages by subject.
#[derive(Clone)]
pub struct EventRouter {
    denormalizer: Denormalizer,
}

impl EventRouter {
    pub fn new(denormalizer: Denormalizer) -> Self {
        Self { denormalizer }
    }

    pub fn denormalizer(&self) -> &Denormalizer {
        &self.denormalizer
    }

    pub async fn route(&self, subject: &str, payload: &[u8]) -> Disposition {
        let Some(kind) = EventKind::from_subject(subject) else {
            debug!(subject, "No handler for subject, ignoring");
            metrics().events_ignored.inc();
            return Disposition::Ignored;
        };

        let event = match kind.decode(payload) {
            Ok(event) => event,
            Err(e) => {
                error!(subject, kind = %kind, error = %e, "Failed to decode event, dropping");
                metrics().decode_errors.inc();
                return Disposition::Dropped;
            }
        };

        let disposition = match event {
            AnalyticsEvent::ScheduleGenerated(batch) => self.apply_schedule(subject, &batch).await,
            event => {
                let result = self.apply(&event).await;
                self.settle(subject, kind, result)
            }
        };

        if disposition == Disposition::Applied {
            metrics().events_applied.inc();
        }
        disposition
    }

    async fn apply(&self, event: &AnalyticsEvent) -> Result<()> {
        let d = &self.denormalizer;
        match event {
            AnalyticsEvent::TeacherUpserted(t) => d.upsert_teacher(t).await,
            AnalyticsEvent::TeacherDeleted { teacher_id } => d.delete_teacher(*teacher_id).await,
            AnalyticsEvent::DepartmentUpserted(dep) => d.upsert_department(dep).await,
            AnalyticsEvent::SubjectUpserted(s) => d.upsert_subject(s).await,
            AnalyticsEvent::SubjectDeleted { subject_id } => d.delete_subject(*subject_id).await,
            AnalyticsEvent::SemesterCreated(s) => d.upsert_semester(s).await,
            AnalyticsEvent::ScheduleGenerated(_) => Err(Error::internal(
                "schedule batches are applied entry by entry",
            )),
        }
    }

    fn settle(&self, subject: &str, kind: EventKind, result: Result<()>) -> Disposition {
        match result {
            Ok(()) => Disposition::Applied,
            Err(e) if e.is_retryable() => {
                error!(subject, kind = %kind, error = %e, "Failed to persist event, will redeliver");
                metrics().persistence_errors.inc();
                Disposition::Retry
            }
            Err(e) => {
                error!(subject, kind = %kind, error = %e, "Event rejected by store, dropping");
                Disposition::Dropped
            }
        }
    }

    /// Each entry is decoded and written on its own; a bad entry never stops
    /// the rest. Any failed write sends the whole message back for
    /// redelivery, and entries already written are simply upserted again.
    async fn apply_schedule(&self, subject: &str, batch: &ScheduleGenerated) -> Disposition {
        let mut applied = 0usize;
        let mut skipped = 0usize;
        let mut failed = 0usize;

        for (index, entry) in batch.entries().enumerate() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    error!(subject, index, error = %e, "Skipping undecodable schedule entry");
                    metrics().decode_errors.inc();
                    skipped += 1;
                    continue;
                }
            };

            match self.denormalizer.upsert_schedule_entry(&entry).await {
                Ok(()) => {
                    metrics().schedule_entries_applied.inc();
                    applied += 1;
                }
                Err(e) => {
                    error!(
                        subject,
                        index,
                        schedule_id = %entry.schedule_id,
                        error = %e,
                        "Failed to persist schedule entry"
                    );
                    metrics().persistence_errors.inc();
                    failed += 1;
                }
            }
        }

        info!(
            subject,
            entries = batch.len(),
            applied,
            skipped,
            failed,
            "Schedule batch processed"
        );

        if failed > 0 {
            warn!(subject, failed, "Schedule batch incomplete, will redeliver");
            Disposition::Retry
        } else if applied == 0 && skipped > 0 {
            Disposition::Dropped
        } else {
            Disposition::Applied
        }
    }
}

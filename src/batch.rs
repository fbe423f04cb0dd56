//! Batch resolution with the pipeline failure policy.
//!
//! A record that fails validation is skipped and reported; any other failure
//! aborts the batch and reports the index to resume from. Resolution is
//! idempotent, so resuming at that index (or even re-running the whole batch)
//! is safe.

use serde::Serialize;
use tracing::{error, info, warn};

use crate::confidence::Confidence;
use crate::contact::RawRecord;
use crate::error::BatchError;
use crate::resolver::{Resolution, Resolver};

/// One resolved record.
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    /// Position of the record in the submitted slice.
    pub index: usize,
    /// How the record was resolved.
    pub resolution: Resolution,
}

/// One record skipped for insufficient identity.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedRecord {
    /// Position of the record in the submitted slice.
    pub index: usize,
    /// Why the record could not be resolved.
    pub reason: String,
}

/// Summary of a completed batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    /// Resolved records, in input order.
    pub outcomes: Vec<BatchOutcome>,
    /// Records skipped for insufficient identity, in input order.
    pub skipped: Vec<SkippedRecord>,
}

impl BatchReport {
    /// Number of records that created a new contact.
    #[must_use]
    pub fn created(&self) -> usize {
        self.outcomes.iter().filter(|o| o.resolution.created).count()
    }

    /// Number of records merged into an existing contact.
    #[must_use]
    pub fn merged(&self) -> usize {
        self.outcomes.len() - self.created()
    }

    /// Records resolved or skipped.
    #[must_use]
    pub fn processed(&self) -> usize {
        self.outcomes.len() + self.skipped.len()
    }
}

impl Resolver {
    /// Resolves every record in order.
    ///
    /// # Errors
    ///
    /// Returns `BatchError` on the first non-validation failure. Records
    /// before `resume_from` have been applied.
    pub fn resolve_batch(
        &self,
        records: &[RawRecord],
        min_confidence: Confidence,
    ) -> Result<BatchReport, BatchError> {
        self.resolve_batch_from(records, 0, min_confidence)
    }

    /// Resolves `records[start..]`, keeping indices relative to `records`.
    ///
    /// # Errors
    ///
    /// See [`Resolver::resolve_batch`].
    pub fn resolve_batch_from(
        &self,
        records: &[RawRecord],
        start: usize,
        min_confidence: Confidence,
    ) -> Result<BatchReport, BatchError> {
        let mut report = BatchReport::default();

        for (index, record) in records.iter().enumerate().skip(start) {
            match self.resolve(record, min_confidence) {
                Ok(resolution) => report.outcomes.push(BatchOutcome { index, resolution }),
                Err(err) if err.is_validation() => {
                    warn!(index, source = %record.lead_source_tag, error = %err, "skipped record");
                    report.skipped.push(SkippedRecord {
                        index,
                        reason: err.to_string(),
                    });
                }
                Err(err) => {
                    error!(
                        index,
                        retryable = err.is_retryable(),
                        error = %err,
                        "batch aborted"
                    );
                    return Err(BatchError {
                        resume_from: index,
                        source: err,
                    });
                }
            }
        }

        info!(
            created = report.created(),
            merged = report.merged(),
            skipped = report.skipped.len(),
            "batch resolved"
        );
        Ok(report)
    }
}

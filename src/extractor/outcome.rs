use crate::error::{AggregateError, ExtractError};
use crate::git::Commit;
use crossbeam_channel::Receiver;
use std::path::PathBuf;

/// Result of one job a worker picked up.
#[derive(Debug)]
pub struct ExtractionOutcome<'a> {
    pub commit: &'a Commit,
    /// Zero-based position of the commit in the input sequence.
    pub index: usize,
    pub output_path: PathBuf,
    pub error: Option<ExtractError>,
}

impl ExtractionOutcome<'_> {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Every outcome of a run, in completion order.
#[derive(Debug)]
pub struct ExtractionRun<'a> {
    pub outcomes: Vec<ExtractionOutcome<'a>>,
    pub total: usize,
    /// Set when the run stopped picking up jobs because of a shutdown request.
    pub cancelled: bool,
}

impl<'a> ExtractionRun<'a> {
    pub fn empty() -> Self {
        Self {
            outcomes: Vec::new(),
            total: 0,
            cancelled: false,
        }
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// Jobs that were never picked up.
    pub fn skipped(&self) -> usize {
        self.total.saturating_sub(self.outcomes.len())
    }

    pub fn failures(&self) -> impl Iterator<Item = &ExtractionOutcome<'a>> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    /// `Ok` iff every job ran and none failed.
    pub fn verdict(&self) -> Result<(), AggregateError> {
        let failed = self.failed();
        let skipped = self.skipped();
        if failed == 0 && skipped == 0 {
            return Ok(());
        }

        let mut causes: Vec<(usize, String, String)> = self
            .failures()
            .map(|o| {
                let message = o.error.as_ref().map(ToString::to_string).unwrap_or_default();
                (o.index, o.commit.short_hash.clone(), message)
            })
            .collect();
        causes.sort_by_key(|(index, _, _)| *index);

        Err(AggregateError {
            failed,
            skipped,
            total: self.total,
            causes,
        })
    }

    /// Outcomes sorted back into input order.
    pub fn into_ordered(mut self) -> Vec<ExtractionOutcome<'a>> {
        self.outcomes.sort_by_key(|o| o.index);
        self.outcomes
    }
}

/// Drain outcomes until every sender is gone.
pub fn collect_outcomes<'a>(
    results: &Receiver<ExtractionOutcome<'a>>,
    expected: usize,
) -> Vec<ExtractionOutcome<'a>> {
    let mut outcomes = Vec::with_capacity(expected);
    outcomes.extend(results.iter());
    outcomes
}

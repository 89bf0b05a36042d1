//! Accumulation state for one acquisition run.

use tracing::{debug, warn};

use crate::models::{Batch, GrabMode, Identifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionState {
    Idle,
    WaitingForFirstBatch,
    WaitingForNextBatch,
    Paginating,
    Complete,
    Failed,
}

impl AcquisitionState {
    /// Complete and Failed are terminal.
    pub fn is_settled(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

/// What the caller must do after a batch was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// The batch was full; bring row `ordinal` into view to load the next one.
    Paginate { ordinal: usize },
    /// The list is finished.
    Complete,
    /// The run had already settled; the batch was dropped.
    Ignored,
}

/// Owns the identifier sequence and decides when it is complete.
///
/// A batch shorter than the page threshold is the only end-of-list signal
/// the site gives.
#[derive(Debug)]
pub struct AcquisitionStateMachine {
    state: AcquisitionState,
    identifiers: Vec<Identifier>,
    page_threshold: usize,
    mode: GrabMode,
    batches: usize,
    /// Page rows covered so far, including entries that were not usable.
    rows: usize,
}

impl AcquisitionStateMachine {
    pub fn new(page_threshold: usize, mode: GrabMode) -> Self {
        Self {
            state: AcquisitionState::Idle,
            identifiers: Vec::new(),
            page_threshold,
            mode,
            batches: 0,
            rows: 0,
        }
    }

    /// Begin waiting for the first batch.
    pub fn start(&mut self) {
        if self.state == AcquisitionState::Idle {
            self.state = AcquisitionState::WaitingForFirstBatch;
        }
    }

    /// Append a batch and decide whether the list is finished.
    pub fn accept(&mut self, batch: Batch) -> BatchOutcome {
        if self.state.is_settled() {
            warn!(
                state = ?self.state,
                size = batch.len(),
                "Dropping batch received after acquisition settled"
            );
            return BatchOutcome::Ignored;
        }

        let size = batch.rows();
        if batch.len() < size {
            debug!(skipped = size - batch.len(), "Batch had unusable entries");
        }
        self.identifiers.extend(batch.into_identifiers());
        self.rows += size;
        self.batches += 1;
        debug!(
            batch = self.batches,
            size,
            total = self.identifiers.len(),
            "Accepted batch"
        );

        if self.mode == GrabMode::FirstBatch || size < self.page_threshold {
            self.state = AcquisitionState::Complete;
            BatchOutcome::Complete
        } else {
            self.state = AcquisitionState::Paginating;
            BatchOutcome::Paginate { ordinal: self.rows }
        }
    }

    /// The next batch has been triggered.
    pub fn pagination_done(&mut self) {
        if self.state == AcquisitionState::Paginating {
            self.state = AcquisitionState::WaitingForNextBatch;
        }
    }

    /// Mark the run as failed once its deadline race has resolved with an
    /// error. A completed run stays complete.
    pub fn fail(&mut self) {
        if !self.state.is_settled() {
            self.state = AcquisitionState::Failed;
        }
    }

    pub fn state(&self) -> AcquisitionState {
        self.state
    }

    pub fn is_complete(&self) -> bool {
        self.state == AcquisitionState::Complete
    }

    pub fn batches(&self) -> usize {
        self.batches
    }

    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }

    pub fn identifiers(&self) -> &[Identifier] {
        &self.identifiers
    }

    pub fn into_identifiers(self) -> Vec<Identifier> {
        self.identifiers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(prefix: &str, size: usize) -> Batch {
        Batch::new((0..size).map(|i| Identifier::new(format!("{prefix}{i}"))).collect()).unwrap()
    }

    #[test]
    fn test_short_first_batch_completes() {
        let mut machine = AcquisitionStateMachine::new(250, GrabMode::All);
        machine.start();
        assert_eq!(machine.state(), AcquisitionState::WaitingForFirstBatch);

        assert_eq!(machine.accept(batch("a", 12)), BatchOutcome::Complete);
        assert!(machine.is_complete());
        assert_eq!(machine.len(), 12);
    }

    #[test]
    fn test_full_batches_paginate_at_running_total() {
        let mut machine = AcquisitionStateMachine::new(250, GrabMode::All);
        machine.start();

        assert_eq!(
            machine.accept(batch("a", 250)),
            BatchOutcome::Paginate { ordinal: 250 }
        );
        assert_eq!(machine.state(), AcquisitionState::Paginating);
        machine.pagination_done();
        assert_eq!(machine.state(), AcquisitionState::WaitingForNextBatch);

        assert_eq!(
            machine.accept(batch("b", 250)),
            BatchOutcome::Paginate { ordinal: 500 }
        );
        machine.pagination_done();
        assert_eq!(machine.accept(batch("c", 37)), BatchOutcome::Complete);

        assert_eq!(machine.len(), 537);
        assert_eq!(machine.batches(), 3);
        assert_eq!(machine.identifiers()[0].as_str(), "a0");
        assert_eq!(machine.identifiers()[250].as_str(), "b0");
        assert_eq!(machine.identifiers()[536].as_str(), "c36");
    }

    #[test]
    fn test_late_batches_are_ignored_after_completion() {
        let mut machine = AcquisitionStateMachine::new(250, GrabMode::All);
        machine.start();
        machine.accept(batch("a", 3));

        assert_eq!(machine.accept(batch("late", 250)), BatchOutcome::Ignored);
        assert_eq!(machine.accept(batch("late", 2)), BatchOutcome::Ignored);
        assert_eq!(machine.len(), 3);
        assert_eq!(machine.batches(), 1);
    }

    #[test]
    fn test_unusable_entries_still_count_as_rows() {
        let mut machine = AcquisitionStateMachine::new(250, GrabMode::All);
        machine.start();

        let mut ids = batch("a", 250).into_identifiers();
        ids.remove(10);
        let partial = Batch::with_rows(ids, 250).unwrap();

        assert_eq!(machine.accept(partial), BatchOutcome::Paginate { ordinal: 250 });
        machine.pagination_done();
        assert_eq!(machine.accept(batch("b", 3)), BatchOutcome::Complete);
        assert_eq!(machine.len(), 252);
    }

    #[test]
    fn test_first_batch_mode_never_paginates() {
        let mut machine = AcquisitionStateMachine::new(250, GrabMode::FirstBatch);
        machine.start();
        assert_eq!(machine.accept(batch("a", 250)), BatchOutcome::Complete);
        assert_eq!(machine.len(), 250);
    }

    #[test]
    fn test_fail_does_not_override_completion() {
        let mut machine = AcquisitionStateMachine::new(250, GrabMode::All);
        machine.start();
        machine.fail();
        assert_eq!(machine.state(), AcquisitionState::Failed);
        assert_eq!(machine.accept(batch("a", 1)), BatchOutcome::Ignored);

        let mut machine = AcquisitionStateMachine::new(250, GrabMode::All);
        machine.accept(batch("a", 1));
        machine.fail();
        assert!(machine.is_complete());
    }
}

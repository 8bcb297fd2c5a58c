use super::ValidationReport;
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Handed out when a run starts; presented again when it finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunTicket {
    generation: u64,
    revision: u64,
}

impl RunTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Store revision the run validated.
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

#[derive(Debug, Clone)]
pub struct AppliedReport {
    pub generation: u64,
    pub revision: u64,
    pub report: Arc<ValidationReport>,
}

/// Decides which finished validation run wins. Only a run that is still the most recently
/// started one may publish its report; anything older is dropped on completion.
#[derive(Debug, Default)]
pub struct ValidationSequencer {
    started: AtomicU64,
    applied: RwLock<Option<AppliedReport>>,
}

impl ValidationSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self, revision: u64) -> RunTicket {
        let generation = self.started.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(generation, revision, "validation run started");
        RunTicket {
            generation,
            revision,
        }
    }

    /// Publishes the report if the ticket is still current. Returns whether it was applied.
    pub fn complete(&self, ticket: RunTicket, report: ValidationReport) -> bool {
        let mut slot = self.applied.write();
        let latest = self.started.load(Ordering::SeqCst);
        if ticket.generation != latest {
            debug!(
                generation = ticket.generation,
                latest, "discarding stale validation result"
            );
            return false;
        }
        *slot = Some(AppliedReport {
            generation: ticket.generation,
            revision: ticket.revision,
            report: Arc::new(report),
        });
        true
    }

    pub fn latest(&self) -> Option<AppliedReport> {
        self.applied.read().clone()
    }

    pub fn latest_report(&self) -> Option<Arc<ValidationReport>> {
        self.applied.read().as_ref().map(|applied| Arc::clone(&applied.report))
    }

    pub fn started_runs(&self) -> u64 {
        self.started.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn older_run_finishing_last_is_discarded() {
        let sequencer = ValidationSequencer::new();
        let first = sequencer.begin(1);
        let second = sequencer.begin(2);

        assert!(sequencer.complete(second, ValidationReport::from_errors(Vec::new())));
        assert!(!sequencer.complete(first, ValidationReport::from_errors(Vec::new())));

        let applied = sequencer.latest().unwrap();
        assert_eq!(applied.generation, second.generation());
        assert_eq!(applied.revision, 2);
    }

    #[test]
    fn older_run_finishing_first_is_discarded_too() {
        let sequencer = ValidationSequencer::new();
        let first = sequencer.begin(1);
        let _second = sequencer.begin(2);
        assert!(!sequencer.complete(first, ValidationReport::from_errors(Vec::new())));
        assert!(sequencer.latest().is_none());
    }
}

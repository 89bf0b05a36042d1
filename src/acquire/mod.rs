//! Intercept-and-paginate acquisition loop.
//!
//! Batches are consumed from the session's request stream one at a time, in
//! delivery order. A full batch hands control to the [`PaginationDriver`]
//! until the next batch has been triggered; requests that arrive meanwhile
//! queue in the stream. Everything runs on one task, so the identifier
//! sequence needs no locking.

mod deadline;
mod observer;
mod pagination;
mod state;

pub use deadline::DeadlineGuard;
pub use observer::{decode_payload, NetworkObserver, PayloadError};
pub use pagination::PaginationDriver;
pub use state::{AcquisitionState, AcquisitionStateMachine, BatchOutcome};

use std::time::Duration;

use tracing::debug;

use crate::error::{AcquireError, Result};
use crate::session::{RequestStream, Session};
use crate::site::SiteProfile;

/// Counters from a completed loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub batches: usize,
    pub paginations: usize,
}

/// Couples the observer and the pagination driver over one session.
pub struct Acquirer<'a> {
    session: &'a dyn Session,
    site: &'a SiteProfile,
    poll_interval: Duration,
}

impl<'a> Acquirer<'a> {
    pub fn new(session: &'a dyn Session, site: &'a SiteProfile, poll_interval: Duration) -> Self {
        Self {
            session,
            site,
            poll_interval,
        }
    }

    /// Feed batches into `machine` until it completes.
    ///
    /// Errors leave the machine where it was; the caller settles it once the
    /// deadline race resolves.
    pub async fn run(
        &self,
        requests: &mut RequestStream,
        machine: &mut AcquisitionStateMachine,
    ) -> Result<LoopStats> {
        let observer = NetworkObserver::new(self.site);
        let mut driver = PaginationDriver::new(self.session, self.poll_interval);
        machine.start();

        while !machine.is_complete() {
            let Some(request) = requests.recv().await else {
                return Err(AcquireError::TrafficClosed);
            };

            let Some(batch) = observer.decode(self.session, &request).await else {
                continue;
            };

            match machine.accept(batch) {
                BatchOutcome::Paginate { ordinal } => {
                    driver.advance(ordinal).await?;
                    machine.pagination_done();
                }
                BatchOutcome::Complete => {
                    debug!(total = machine.len(), "Final batch received");
                }
                BatchOutcome::Ignored => {}
            }
        }

        Ok(LoopStats {
            batches: machine.batches(),
            paginations: driver.invocations(),
        })
    }
}

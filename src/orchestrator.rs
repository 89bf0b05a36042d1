//! Top-level sequencing of one list acquisition.

use tracing::{debug, info, warn};

use crate::acquire::{Acquirer, AcquisitionStateMachine, DeadlineGuard};
use crate::config::Settings;
use crate::error::{AcquireError, Result};
use crate::models::{sanitize_user_id, AcquisitionResult, Identifier, OwnerLabel};
use crate::session::{Locator, Session, SessionLauncher};

/// Runs acquisitions, one fresh session per call.
///
/// Holds no per-run state, so a single orchestrator can serve many runs.
pub struct ScrapeOrchestrator<L> {
    launcher: L,
    settings: Settings,
}

impl<L: SessionLauncher> ScrapeOrchestrator<L> {
    pub fn new(launcher: L, settings: Settings) -> Self {
        Self { launcher, settings }
    }

    /// Acquire the complete ordered list for `user_id`.
    ///
    /// The session is closed on every path once it has been launched.
    pub async fn grab(&self, user_id: &str) -> Result<AcquisitionResult> {
        let user_id = sanitize_user_id(user_id);
        let url = self.settings.site.list_url(&user_id);
        info!(user_id = %user_id, mode = ?self.settings.grab_mode, "Starting acquisition");

        let mut session = self.launcher.launch().await?;
        let outcome = self.run(session.as_mut(), &url).await;

        if let Err(e) = session.close().await {
            warn!("Failed to close browser session: {:#}", e);
        }

        match outcome {
            Ok((identifiers, owner)) => finish(identifiers, owner),
            Err(e) => {
                warn!(kind = e.kind(), "Acquisition failed: {}", e);
                Err(e)
            }
        }
    }

    async fn run(&self, session: &mut dyn Session, url: &str) -> Result<(Vec<Identifier>, OwnerLabel)> {
        // Subscribe first: the first batch can be requested during page load.
        let mut requests = session.subscribe_requests().await?;
        session.goto(url).await?;

        if self.is_private(session).await? {
            return Err(AcquireError::PrivateList);
        }

        let owner = self.read_owner(session).await;

        let session: &dyn Session = session;
        let acquirer = Acquirer::new(session, &self.settings.site, self.settings.poll_interval);
        let mut machine =
            AcquisitionStateMachine::new(self.settings.site.page_threshold, self.settings.grab_mode);

        let guard = DeadlineGuard::new(self.settings.timeout);
        let outcome = guard.race(acquirer.run(&mut requests, &mut machine)).await;
        match outcome {
            Ok(stats) => {
                info!(
                    total = machine.len(),
                    batches = stats.batches,
                    paginations = stats.paginations,
                    "Acquisition complete"
                );
                Ok((machine.into_identifiers(), owner))
            }
            Err(e) => {
                machine.fail();
                debug!(discarded = machine.len(), "Discarding partial identifiers");
                Err(e)
            }
        }
    }

    async fn is_private(&self, session: &dyn Session) -> Result<bool> {
        for marker in &self.settings.site.private_markers {
            if !session.is_visible(&Locator::Text(marker.clone())).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Best-effort; any failure reads as no owner.
    async fn read_owner(&self, session: &dyn Session) -> OwnerLabel {
        let locator = Locator::TestId(self.settings.site.owner_test_id.clone());

        match session.is_visible(&locator).await {
            Ok(true) => {}
            Ok(false) => return None,
            Err(e) => {
                debug!("Owner label check failed: {:#}", e);
                return None;
            }
        }

        match session.inner_text(&locator).await {
            Ok(text) => text
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
            Err(e) => {
                debug!("Owner label read failed: {:#}", e);
                None
            }
        }
    }
}

/// Reduce a completed loop to the run's result.
fn finish(identifiers: Vec<Identifier>, owner: OwnerLabel) -> Result<AcquisitionResult> {
    if identifiers.is_empty() {
        return Err(AcquireError::EmptyResult);
    }
    Ok(AcquisitionResult { identifiers, owner })
}

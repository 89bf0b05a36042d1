//! Scroll-driven pagination of the list page.

use std::time::Duration;

use anyhow::Result;
use tracing::debug;

use crate::session::{Key, Locator, Session};

/// Presses `End` until a given row is rendered, then scrolls it into view so
/// the page's lazy loader requests the following batch.
///
/// There is no retry cap: if the row never renders (the page is exhausted or
/// its layout changed) the loop only stops when the surrounding deadline
/// drops it. Keep it under a [`super::DeadlineGuard`].
pub struct PaginationDriver<'a> {
    session: &'a dyn Session,
    poll_interval: Duration,
    invocations: usize,
}

impl<'a> PaginationDriver<'a> {
    pub fn new(session: &'a dyn Session, poll_interval: Duration) -> Self {
        Self {
            session,
            poll_interval,
            invocations: 0,
        }
    }

    /// Bring row `ordinal` (1-based) into view.
    pub async fn advance(&mut self, ordinal: usize) -> Result<()> {
        self.invocations += 1;
        let row = Locator::RowLink(ordinal);
        let mut presses = 0u64;

        // Rendering lags input, so visibility is re-checked after every press.
        while !self.session.is_visible(&row).await? {
            self.session.press(Key::End).await?;
            presses += 1;
            if !self.poll_interval.is_zero() {
                tokio::time::sleep(self.poll_interval).await;
            }
        }

        self.session.scroll_into_view(&row).await?;
        debug!(ordinal, presses, "Row in view, next batch requested");
        Ok(())
    }

    /// How many times pagination was triggered.
    pub fn invocations(&self) -> usize {
        self.invocations
    }
}

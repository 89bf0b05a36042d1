//! Remote browsing session abstraction.
//!
//! The acquisition core only talks to a browser through [`Session`], which
//! keeps it testable without Chromium. [`chromium`] provides the real
//! implementation on top of chromiumoxide.

pub mod chromium;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

pub use chromium::{ChromiumLauncher, ChromiumSession};

/// Way of finding one element on the rendered page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// Innermost element whose rendered text contains the string, ignoring
    /// case and differences in whitespace.
    Text(String),
    /// Element with a matching `data-testid` attribute.
    TestId(String),
    /// Link whose accessible name starts with `"<n>."`, i.e. the n-th list row.
    RowLink(usize),
}

/// Keyboard input understood by sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    End,
}

impl Key {
    pub fn name(self) -> &'static str {
        match self {
            Key::End => "End",
        }
    }

    /// Windows virtual key code, required by CDP for non-printable keys.
    pub fn virtual_key_code(self) -> i64 {
        match self {
            Key::End => 35,
        }
    }
}

/// An outgoing request seen by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptedRequest {
    pub request_id: String,
    pub method: String,
    pub url: String,
    /// Body when the backend delivered it with the event. Chromium never
    /// does; its bodies come from [`Session::post_data`].
    pub post_data: Option<String>,
    /// The request has a body, even if `post_data` is not populated.
    pub has_post_data: bool,
}

/// Stream of outgoing requests, in the order the browser reported them.
pub type RequestStream = mpsc::UnboundedReceiver<InterceptedRequest>;

/// One page in an isolated browser context.
///
/// The session owns its traffic subscription; closing the session ends it.
#[async_trait]
pub trait Session: Send + Sync {
    /// Start observing outgoing requests. Must be called before [`Session::goto`]
    /// so the first batch is not missed.
    async fn subscribe_requests(&mut self) -> Result<RequestStream>;

    /// Body of a POST request, fetched from the browser if it was not inline.
    async fn post_data(&self, request: &InterceptedRequest) -> Result<Option<String>>;

    async fn goto(&self, url: &str) -> Result<()>;

    async fn is_visible(&self, locator: &Locator) -> Result<bool>;

    /// Rendered text of the element, or `None` if it does not exist.
    async fn inner_text(&self, locator: &Locator) -> Result<Option<String>>;

    async fn scroll_into_view(&self, locator: &Locator) -> Result<()>;

    async fn press(&self, key: Key) -> Result<()>;

    /// Close page, context and browser, in that order.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Opens fresh sessions.
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn Session>>;
}

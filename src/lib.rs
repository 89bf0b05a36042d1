//! listacquire - ordered identifier acquisition from infinite-scroll rating lists.
//!
//! The list page never ships its rows in the initial markup. It fetches them
//! in batches from an internal GraphQL endpoint as the user scrolls. This
//! crate drives a browser session to do the scrolling, reads the identifier
//! batches out of the intercepted requests, and stops on the first short
//! batch or when the deadline expires.

pub mod acquire;
pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod session;
pub mod site;
pub mod user_agent;

pub use config::{Config, Settings};
pub use error::AcquireError;
pub use models::{AcquisitionResult, Batch, GrabMode, Identifier};
pub use orchestrator::ScrapeOrchestrator;
pub use session::{ChromiumLauncher, Session, SessionLauncher};

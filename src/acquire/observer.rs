//! Extracts identifier batches from intercepted GraphQL requests.

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::models::{Batch, Identifier};
use crate::session::{InterceptedRequest, Session};
use crate::site::SiteProfile;

/// Why a matching request did not yield a batch. Never surfaced to callers.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("request has no body")]
    NoBody,
    #[error("body is not JSON: {0}")]
    NotJson(#[from] serde_json::Error),
    #[error("field {0} is missing")]
    MissingField(String),
    #[error("field {0} is not an array")]
    NotArray(String),
    #[error("field {0} is empty")]
    Empty(String),
}

/// Filters session traffic down to the identifier-carrying endpoint.
pub struct NetworkObserver<'a> {
    site: &'a SiteProfile,
}

impl<'a> NetworkObserver<'a> {
    pub fn new(site: &'a SiteProfile) -> Self {
        Self { site }
    }

    /// Decode a batch from `request`, or `None` if it is unrelated or malformed.
    pub async fn decode(&self, session: &dyn Session, request: &InterceptedRequest) -> Option<Batch> {
        if !self.site.matches_request(&request.method, &request.url) {
            return None;
        }

        let decoded = match session.post_data(request).await {
            Ok(Some(body)) => decode_payload(&body, &self.site.id_array_pointer),
            Ok(None) => Err(PayloadError::NoBody),
            Err(e) => {
                debug!(request_id = %request.request_id, "Could not read request body: {:#}", e);
                return None;
            }
        };

        match decoded {
            Ok(batch) => {
                debug!(request_id = %request.request_id, size = batch.len(), "Decoded batch");
                Some(batch)
            }
            Err(reason) => {
                debug!(request_id = %request.request_id, %reason, "Ignoring request");
                None
            }
        }
    }
}

/// Pull the identifier array at `pointer` out of a JSON request body.
pub fn decode_payload(body: &str, pointer: &str) -> Result<Batch, PayloadError> {
    let payload: Value = serde_json::from_str(body)?;

    let field = payload
        .pointer(pointer)
        .ok_or_else(|| PayloadError::MissingField(pointer.to_string()))?;

    let entries = field
        .as_array()
        .ok_or_else(|| PayloadError::NotArray(pointer.to_string()))?;

    // Non-string entries are skipped but still occupy a row on the page.
    let identifiers: Vec<Identifier> = entries
        .iter()
        .filter_map(|entry| entry.as_str().map(Identifier::from))
        .collect();

    Batch::with_rows(identifiers, entries.len())
        .ok_or_else(|| PayloadError::Empty(pointer.to_string()))
}

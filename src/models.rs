//! Core data types for list acquisition.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque token for one rated item (e.g. `tt0111161`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Identifier {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Identifiers decoded from a single intercepted API request.
///
/// A batch is never empty; payloads that decode to nothing are not batches.
/// `rows` is how many entries the page asked for, which can exceed the
/// number of usable identifiers when some entries were not strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    identifiers: Vec<Identifier>,
    rows: usize,
}

impl Batch {
    /// Build a batch, returning `None` for an empty list.
    pub fn new(identifiers: Vec<Identifier>) -> Option<Self> {
        let rows = identifiers.len();
        Self::with_rows(identifiers, rows)
    }

    /// Build a batch that stands for `rows` page rows, returning `None` when
    /// the page asked for none.
    pub fn with_rows(identifiers: Vec<Identifier>, rows: usize) -> Option<Self> {
        if rows == 0 {
            None
        } else {
            Some(Self { identifiers, rows })
        }
    }

    /// Entries in the request, usable or not.
    pub fn rows(&self) -> usize {
        self.rows
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

/// Display name of the list owner, if the page shows one.
pub type OwnerLabel = Option<String>;

/// Successful outcome of one acquisition run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquisitionResult {
    pub identifiers: Vec<Identifier>,
    pub owner: OwnerLabel,
}

impl AcquisitionResult {
    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }
}

/// How much of the list to acquire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrabMode {
    /// Keep paginating until a short batch arrives.
    #[default]
    All,
    /// Stop after the first batch, whatever its size.
    FirstBatch,
}

/// Strip every non-alphanumeric character from a user-supplied list owner ID.
///
/// This is normalization only; an ID that sanitizes to an empty string still
/// produces a (useless) URL.
pub fn sanitize_user_id(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

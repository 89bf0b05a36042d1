//! Fixed protocol details of the ratings site.
//!
//! The list page loads its rows lazily: each scroll past the rendered rows
//! fires a POST to the GraphQL endpoint whose `variables.idArray` carries the
//! identifiers of the next batch. The endpoint never signals the end of the
//! list, so a batch shorter than [`PAGE_THRESHOLD`] is the only end marker.

use serde::{Deserialize, Serialize};

/// Maximum number of rows rendered per batch.
pub const PAGE_THRESHOLD: usize = 250;

pub const GRAPHQL_ENDPOINT: &str = "https://api.graphql.imdb.com/";

pub const GRAPHQL_METHOD: &str = "POST";

/// JSON pointer to the identifier array inside the request body.
pub const ID_ARRAY_POINTER: &str = "/variables/idArray";

pub const LIST_URL_TEMPLATE: &str = "https://www.imdb.com/user/{user_id}/ratings/";

/// Both texts are shown together only on a private list.
pub const PRIVATE_LIST_MARKERS: [&str; 2] = ["Private list", "This list is not public"];

/// `data-testid` of the element holding the owner's name.
pub const OWNER_TEST_ID: &str = "list-page-mc-author";

/// URL patterns dropped before they leave the browser.
pub const BLOCKED_URL_PATTERNS: &[&str] = &[
    // Images
    "*.jpg", "*.jpeg", "*.png", "*.gif", "*.webp", "*.svg", "*.ico",
    // Stylesheets
    "*.css",
    // Media
    "*.mp4", "*.webm", "*.m3u8", "*.mp3",
    // Fonts
    "*.woff", "*.woff2", "*.ttf",
    // Telemetry
    "*unagi*.amazon.com*",
];

/// Everything the acquisition core needs to know about the site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteProfile {
    pub endpoint: String,
    pub method: String,
    pub id_array_pointer: String,
    pub page_threshold: usize,
    pub list_url_template: String,
    pub private_markers: [String; 2],
    pub owner_test_id: String,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            endpoint: GRAPHQL_ENDPOINT.to_string(),
            method: GRAPHQL_METHOD.to_string(),
            id_array_pointer: ID_ARRAY_POINTER.to_string(),
            page_threshold: PAGE_THRESHOLD,
            list_url_template: LIST_URL_TEMPLATE.to_string(),
            private_markers: PRIVATE_LIST_MARKERS.map(String::from),
            owner_test_id: OWNER_TEST_ID.to_string(),
        }
    }
}

impl SiteProfile {
    /// List page URL for an already-sanitized user ID.
    pub fn list_url(&self, sanitized_user_id: &str) -> String {
        self.list_url_template
            .replace("{user_id}", sanitized_user_id)
    }

    /// Whether a request is the one carrying identifier batches.
    pub fn matches_request(&self, method: &str, url: &str) -> bool {
        method.eq_ignore_ascii_case(&self.method) && url == self.endpoint
    }
}

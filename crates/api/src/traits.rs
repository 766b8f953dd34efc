use std::fmt;

use async_trait::async_trait;
use serde_json::Value as Json;

use crate::error::ApiError;

/// HTTP verbs used by the client contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        })
    }
}

/// The PingOne Authorize REST surface the reconciler drives.
///
/// Paths are relative to the API base URL and already carry every path
/// parameter, e.g. `/environments/{env}/authorizationRules/{id}`. Bodies and
/// responses are wire documents.
///
/// ## Version tokens
///
/// Every stored document carries an opaque `version`. `update` must reject a
/// body whose `version` is not the one currently stored with a `409`
/// status, and must hand back a document with a fresh `version` on success.
///
/// ## Thread Safety
///
/// One client is shared by every reconciler task, so implementations must be
/// `Send + Sync + 'static` and serialise their own connection handling.
#[async_trait]
pub trait AuthorizeApi: Send + Sync + 'static {
    // ── Single documents ─────────────────────────────────────────────────────

    /// POST `body` to a collection; returns the stored document.
    async fn create(&self, path: &str, body: &Json) -> Result<Json, ApiError>;

    /// GET one document. A missing document is `Status { status: 404, .. }`.
    async fn get(&self, path: &str) -> Result<Json, ApiError>;

    /// PUT a full replacement carrying the last-read `version`.
    async fn update(&self, path: &str, body: &Json) -> Result<Json, ApiError>;

    async fn delete(&self, path: &str) -> Result<(), ApiError>;

    // ── Collections ──────────────────────────────────────────────────────────

    /// Every item of a paged collection, pages concatenated in order.
    async fn list(&self, path: &str) -> Result<Vec<Json>, ApiError>;
}

/// The slice of the management API the error funnel needs.
#[async_trait]
pub trait ManagementApi: Send + Sync + 'static {
    /// `Ok(false)` only when the server positively reports the environment
    /// as missing.
    async fn environment_exists(&self, environment_id: &str) -> Result<bool, ApiError>;
}

//! p1authz-api: the PingOne client contract used by the reconciler.
//!
//! - [`AuthorizeApi`] / [`ManagementApi`] -- the async traits
//! - [`HttpClient`] -- blocking `ureq` transport run on the blocking pool
//! - [`MemoryApi`] -- an in-process server with fault injection, for tests
//! - [`conformance`] -- behaviour every implementation must show

pub mod conformance;
mod config;
mod error;
mod http;
mod memory;
mod traits;

pub use config::{ApiConfig, ACCESS_TOKEN_ENV, API_URL_ENV, DEFAULT_BASE_URL};
pub use error::ApiError;
pub use http::HttpClient;
pub use memory::{Call, MemoryApi, CALL_LOG_LIMIT};
pub use traits::{AuthorizeApi, ManagementApi, Method};

//! p1authz-interchange: translation between host value trees and
//! PingOne Authorize wire documents.
//!
//! - [`expand`] turns a value tree into the JSON body of a request
//! - [`flatten`] turns a response body back into a value tree, applying
//!   the null/empty discipline against the prior tree
//! - [`dispatch`] selects union variants on both sides
//! - [`envelope`] reads and stamps the common entity envelope
//!
//! Both walks are iterative; nesting depth is bounded only by memory.

pub mod dispatch;
pub mod envelope;
pub mod expand;
pub mod flatten;

pub use dispatch::{dispatch_expand, dispatch_flatten};
pub use envelope::{stamp, Envelope};
pub use expand::expand;
pub use flatten::flatten;

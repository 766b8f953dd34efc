//! p1authz-reconcile: Create/Read/Update/Delete/Import of PingOne
//! Authorize entities.
//!
//! - [`Reconciler`] -- the entry points, generic over the API client
//! - [`Outcome`] / [`StateChange`] -- what the host does with its state
//! - [`Diagnostics`] -- structured errors and warnings, tagged with the
//!   shared [`ErrorKind`](p1authz_core::ErrorKind)
//! - [`ReconcileConfig`] -- retry budget and delete poll timings
//!
//! Updates read the current `version` and send it back; a stale version
//! surfaces as `VersionConflict`. Deletes of eventually consistent kinds
//! poll until two consecutive 404s are seen.

mod config;
mod diagnostics;
mod funnel;
mod outcome;
mod poll;
mod reconciler;

pub use config::{DeletePollConfig, ReconcileConfig};
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use outcome::{Outcome, StateChange};
pub use reconciler::Reconciler;
pub use tokio_util::sync::CancellationToken;

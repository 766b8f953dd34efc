//! Error funnel: every API call goes through [`Funnel::call`], which races
//! the call against cancellation, probes the environment on permission
//! and not-found errors, and retries transient failures where the call
//! allows it.

use std::future::Future;
use std::time::Instant;

use p1authz_api::{ApiError, ManagementApi};
use p1authz_core::ErrorKind;
use tokio_util::sync::CancellationToken;

use crate::config::ReconcileConfig;
use crate::diagnostics::Diagnostic;

/// 403 returned while a freshly granted role is still propagating.
const PROPAGATION_403: &str = "The actor attempting to perform the request is not authorized.";

/// How one call is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Policy {
    /// Retry transient failures within `create_read_timeout`.
    pub retry: bool,
    /// Abandon the in-flight request on cancellation. Creates are never
    /// abandoned so the created entity can still be handed back.
    pub interruptible: bool,
}

impl Policy {
    pub const READ: Policy = Policy {
        retry: true,
        interruptible: true,
    };
    pub const CREATE: Policy = Policy {
        retry: true,
        interruptible: false,
    };
    pub const WRITE: Policy = Policy {
        retry: false,
        interruptible: true,
    };
}

/// Why a funnelled call gave up.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Failure {
    Cancelled,
    EnvironmentMissing(String),
    Api(ApiError),
}

impl Failure {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Failure::Api(e) if e.is_not_found())
    }

    /// Diagnostic for a failure of operation `op`. A 404 here is always a
    /// lookup outside Read and comes back as a warning.
    pub fn diagnostic(&self, op: &str) -> Diagnostic {
        let d = match self {
            Failure::Cancelled => Diagnostic::error(
                ErrorKind::Cancelled,
                "Operation cancelled",
                format!("`{}` was cancelled before it completed", op),
            ),
            Failure::EnvironmentMissing(env) => Diagnostic::error(
                ErrorKind::EnvironmentNotFound,
                "environment does not exist",
                format!(
                    "The environment {} referenced by `{}` does not exist or has been deleted",
                    env, op
                ),
            ),
            Failure::Api(e) => {
                let summary = format!("Error when calling `{}`: {}", op, e.message());
                match e {
                    ApiError::NotConfigured(_) => {
                        Diagnostic::error(ErrorKind::ClientNotInitialized, summary, e.to_string())
                    }
                    ApiError::Decode(_) => {
                        Diagnostic::error(ErrorKind::InvalidValue, summary, e.to_string())
                    }
                    _ if e.http_status() == Some(409) => {
                        Diagnostic::error(ErrorKind::VersionConflict, summary, e.to_string())
                    }
                    _ if e.is_not_found() => Diagnostic::warning(
                        ErrorKind::ResourceNotFoundOnOther,
                        "Resource not found",
                        format!(
                            "The resource was not found on `{}` and will be removed from state: {}",
                            op,
                            e.message()
                        ),
                    ),
                    _ if is_retryable(e) => {
                        Diagnostic::error(ErrorKind::Retryable, summary, e.to_string())
                    }
                    _ => Diagnostic::error(ErrorKind::Api, summary, e.to_string()),
                }
            }
        };
        d.with_operation(op)
    }
}

/// Transport failures, throttling, server errors and the role
/// propagation 403.
pub(crate) fn is_retryable(e: &ApiError) -> bool {
    match e {
        ApiError::Transport(_) => true,
        ApiError::Status {
            status, message, ..
        } => match status {
            429 | 500 | 502 | 503 | 504 => true,
            403 => message.starts_with(PROPAGATION_403),
            _ => false,
        },
        _ => false,
    }
}

fn needs_environment_probe(e: &ApiError) -> bool {
    matches!(e.http_status(), Some(400 | 401 | 403 | 404))
}

pub(crate) struct Funnel<'a, M> {
    pub management: &'a M,
    pub config: &'a ReconcileConfig,
    pub cancel: &'a CancellationToken,
}

impl<M: ManagementApi> Funnel<'_, M> {
    /// Run `f` until it succeeds, fails for good, or is cancelled.
    pub async fn call<T, F, Fut>(
        &self,
        op: &str,
        environment_id: &str,
        policy: Policy,
        mut f: F,
    ) -> Result<T, Failure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let started = Instant::now();
        let mut backoff = self.config.retry_initial_backoff;
        let mut attempt: u32 = 1;

        loop {
            if self.cancel.is_cancelled() {
                return Err(Failure::Cancelled);
            }
            let result = if policy.interruptible {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return Err(Failure::Cancelled),
                    r = f() => r,
                }
            } else {
                f().await
            };

            let err = match result {
                Ok(value) => return Ok(value),
                Err(ApiError::Cancelled) => return Err(Failure::Cancelled),
                Err(e) => e,
            };

            if needs_environment_probe(&err) && !self.environment_present(environment_id).await {
                tracing::debug!(op, environment_id, "environment probe reports it missing");
                return Err(Failure::EnvironmentMissing(environment_id.to_string()));
            }

            let budget_left = started.elapsed() + backoff < self.config.create_read_timeout;
            if !(policy.retry && is_retryable(&err) && budget_left) {
                return Err(Failure::Api(err));
            }

            tracing::debug!(op, attempt, backoff_ms = backoff.as_millis() as u64, error = %err, "retrying");
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(Failure::Cancelled),
                _ = tokio::time::sleep(backoff) => {}
            }
            backoff = (backoff * 2).min(self.config.retry_max_backoff);
            attempt += 1;
        }
    }

    /// A failed probe counts as present; only a positive "missing"
    /// overrides the original error.
    async fn environment_present(&self, environment_id: &str) -> bool {
        if environment_id.is_empty() {
            return true;
        }
        match self.management.environment_exists(environment_id).await {
            Ok(exists) => exists,
            Err(e) => {
                tracing::debug!(environment_id, error = %e, "environment probe failed");
                true
            }
        }
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use p1authz_api::MemoryApi;
    use std::sync::atomic::{AtomicU32, Ordering};

    const ENV: &str = "8c6e0b4a-5d2f-4f1e-9a3b-2c7d8e9f0a1b";

    fn unavailable() -> ApiError {
        ApiError::status(503, "SERVICE_UNAVAILABLE", "try later")
    }

    #[test]
    fn classifies_retryable_errors() {
        assert!(is_retryable(&ApiError::Transport("reset".into())));
        assert!(is_retryable(&ApiError::status(429, "TOO_MANY", "slow down")));
        assert!(is_retryable(&unavailable()));
        assert!(is_retryable(&ApiError::status(
            403,
            "ACCESS_FAILED",
            "The actor attempting to perform the request is not authorized. Role assignment pending."
        )));
        assert!(!is_retryable(&ApiError::status(403, "ACCESS_FAILED", "nope")));
        assert!(!is_retryable(&ApiError::status(400, "INVALID_DATA", "bad")));
        assert!(!is_retryable(&ApiError::Decode("eof".into())));
    }

    #[test]
    fn diagnostics_follow_the_taxonomy() {
        let conflict = Failure::Api(ApiError::status(409, "CONFLICT", "stale"));
        let d = conflict.diagnostic("UpdateRule");
        assert_eq!(d.kind, ErrorKind::VersionConflict);
        assert_eq!(d.summary, "Error when calling `UpdateRule`: stale");
        assert_eq!(d.operation.as_deref(), Some("UpdateRule"));

        let gone = Failure::Api(ApiError::status(404, "NOT_FOUND", "missing"));
        assert_eq!(gone.diagnostic("DeleteRule").kind, ErrorKind::ResourceNotFoundOnOther);

        let env = Failure::EnvironmentMissing(ENV.to_string()).diagnostic("GetRule");
        assert_eq!(env.kind, ErrorKind::EnvironmentNotFound);
        assert_eq!(env.summary, "environment does not exist");

        let cfg = Failure::Api(ApiError::NotConfigured("no token".into()));
        assert_eq!(cfg.diagnostic("CreateRule").kind, ErrorKind::ClientNotInitialized);

        let bad = Failure::Api(ApiError::status(400, "INVALID_DATA", "name too short"));
        assert_eq!(bad.diagnostic("CreateRule").kind, ErrorKind::Api);
    }

    #[tokio::test]
    async fn retries_transient_failures_on_reads() {
        let mgmt = MemoryApi::new().with_environment(ENV);
        let config = ReconcileConfig::fast();
        let cancel = CancellationToken::new();
        let funnel = Funnel {
            management: &mgmt,
            config: &config,
            cancel: &cancel,
        };
        let attempts = &AtomicU32::new(0);
        let result = funnel
            .call("GetRule", ENV, Policy::READ, || async move {
                if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(unavailable())
                } else {
                    Ok(7)
                }
            })
            .await;
        assert_eq!(result, Ok(7));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn writes_are_not_retried() {
        let mgmt = MemoryApi::new().with_environment(ENV);
        let config = ReconcileConfig::fast();
        let cancel = CancellationToken::new();
        let funnel = Funnel {
            management: &mgmt,
            config: &config,
            cancel: &cancel,
        };
        let attempts = &AtomicU32::new(0);
        let result: Result<(), Failure> = funnel
            .call("UpdateRule", ENV, Policy::WRITE, || async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(unavailable())
            })
            .await;
        assert_eq!(result, Err(Failure::Api(unavailable())));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_stop_at_the_budget() {
        let mgmt = MemoryApi::new().with_environment(ENV);
        let mut config = ReconcileConfig::fast();
        config.create_read_timeout = std::time::Duration::from_millis(20);
        let cancel = CancellationToken::new();
        let funnel = Funnel {
            management: &mgmt,
            config: &config,
            cancel: &cancel,
        };
        let result: Result<(), Failure> = funnel
            .call("GetRule", ENV, Policy::READ, || async { Err(unavailable()) })
            .await;
        assert_eq!(result, Err(Failure::Api(unavailable())));
    }

    #[tokio::test]
    async fn missing_environment_overrides_the_error() {
        let mgmt = MemoryApi::new();
        let config = ReconcileConfig::fast();
        let cancel = CancellationToken::new();
        let funnel = Funnel {
            management: &mgmt,
            config: &config,
            cancel: &cancel,
        };
        let result: Result<(), Failure> = funnel
            .call("GetRule", ENV, Policy::READ, || async {
                Err(ApiError::status(403, "ACCESS_FAILED", "no access"))
            })
            .await;
        assert_eq!(result, Err(Failure::EnvironmentMissing(ENV.to_string())));
    }

    #[tokio::test]
    async fn present_environment_keeps_the_404() {
        let mgmt = MemoryApi::new().with_environment(ENV);
        let config = ReconcileConfig::fast();
        let cancel = CancellationToken::new();
        let funnel = Funnel {
            management: &mgmt,
            config: &config,
            cancel: &cancel,
        };
        let result: Result<(), Failure> = funnel
            .call("GetRule", ENV, Policy::READ, || async {
                Err(ApiError::status(404, "NOT_FOUND", "gone"))
            })
            .await;
        assert!(result.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn cancellation_stops_before_the_call() {
        let mgmt = MemoryApi::new().with_environment(ENV);
        let config = ReconcileConfig::fast();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let funnel = Funnel {
            management: &mgmt,
            config: &config,
            cancel: &cancel,
        };
        let attempts = &AtomicU32::new(0);
        let result: Result<(), Failure> = funnel
            .call("GetRule", ENV, Policy::READ, || async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;
        assert_eq!(result, Err(Failure::Cancelled));
        assert_eq!(attempts.load(Ordering::SeqCst), 0);
    }
}

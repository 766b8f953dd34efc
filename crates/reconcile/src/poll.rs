//! Delete confirmation: poll GET until the entity is observed absent
//! `continuous_target` times in a row.

use std::time::{Duration, Instant};

use p1authz_api::{ApiError, AuthorizeApi};
use tokio_util::sync::CancellationToken;

use crate::config::DeletePollConfig;
use crate::funnel::is_retryable;

/// How a poll ended.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PollEnd {
    Confirmed,
    TimedOut { last: Observation },
    Failed(ApiError),
    Cancelled,
}

/// What a single GET showed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Observation {
    Present,
    Absent,
    /// A transient error; says nothing about the entity.
    Unclear,
}

impl Observation {
    pub fn as_status(&self) -> &'static str {
        match self {
            Observation::Present => "200",
            Observation::Absent => "404",
            Observation::Unclear => "unknown",
        }
    }
}

/// Poll `path` until absence is confirmed, the timeout elapses, a
/// non-transient error arrives or `cancel` fires.
///
/// Only an unbroken run of 404s concludes; any other observation resets
/// the run.
pub(crate) async fn await_absence<A: AuthorizeApi + ?Sized>(
    api: &A,
    path: &str,
    config: &DeletePollConfig,
    cancel: &CancellationToken,
) -> PollEnd {
    let deadline = Instant::now() + config.timeout;
    let target = config.continuous_target.max(1);
    let mut interval = config.min_interval;
    let mut streak: u32 = 0;

    if !pause(config.delay, cancel).await {
        return PollEnd::Cancelled;
    }

    loop {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return PollEnd::Cancelled,
            r = api.get(path) => r,
        };
        let last = match result {
            Ok(_) => Observation::Present,
            Err(e) if e.is_not_found() => Observation::Absent,
            Err(ApiError::Cancelled) => return PollEnd::Cancelled,
            Err(e) if is_retryable(&e) => {
                tracing::debug!(path, error = %e, "transient error while polling");
                Observation::Unclear
            }
            Err(e) => return PollEnd::Failed(e),
        };
        streak = if last == Observation::Absent { streak + 1 } else { 0 };
        tracing::debug!(path, status = last.as_status(), streak, target, "delete poll");

        if streak >= target {
            return PollEnd::Confirmed;
        }
        if Instant::now() + interval > deadline {
            return PollEnd::TimedOut { last };
        }
        if !pause(interval, cancel).await {
            return PollEnd::Cancelled;
        }
        interval = (interval * 2).min(config.max_interval);
    }
}

/// Sleep unless cancelled first; `false` on cancellation.
async fn pause(d: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(d) => true,
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReconcileConfig;
    use p1authz_api::{MemoryApi, Method};
    use serde_json::json;

    const ENV: &str = "8c6e0b4a-5d2f-4f1e-9a3b-2c7d8e9f0a1b";

    fn rule_path() -> String {
        format!("/environments/{}/authorizationRules/r1", ENV)
    }

    fn not_found() -> ApiError {
        ApiError::status(404, "NOT_FOUND", "gone")
    }

    fn fast() -> DeletePollConfig {
        ReconcileConfig::fast().delete
    }

    #[tokio::test]
    async fn two_consecutive_404s_confirm() {
        let api = MemoryApi::new().with_environment(ENV);
        let path = rule_path();
        api.script(Method::Get, &path, Ok(json!({"id": "r1"})));
        let end = await_absence(&api, &path, &fast(), &CancellationToken::new()).await;
        assert_eq!(end, PollEnd::Confirmed);
        assert_eq!(api.count(Method::Get, &path), 3);
    }

    #[tokio::test]
    async fn a_200_between_404s_resets_the_run() {
        let api = MemoryApi::new().with_environment(ENV);
        let path = rule_path();
        api.script(Method::Get, &path, Err(not_found()));
        api.script(Method::Get, &path, Ok(json!({"id": "r1"})));
        api.script(Method::Get, &path, Err(not_found()));
        api.script(Method::Get, &path, Ok(json!({"id": "r1"})));
        let end = await_absence(&api, &path, &fast(), &CancellationToken::new()).await;
        assert_eq!(end, PollEnd::Confirmed);
        // 404, 200, 404, 200, then the stored 404 twice.
        assert_eq!(api.count(Method::Get, &path), 6);
    }

    #[tokio::test]
    async fn transient_errors_do_not_count_toward_the_run() {
        let api = MemoryApi::new().with_environment(ENV);
        let path = rule_path();
        api.script(Method::Get, &path, Err(not_found()));
        api.script(Method::Get, &path, Err(ApiError::status(502, "BAD_GATEWAY", "")));
        let end = await_absence(&api, &path, &fast(), &CancellationToken::new()).await;
        assert_eq!(end, PollEnd::Confirmed);
        assert_eq!(api.count(Method::Get, &path), 4);
    }

    #[tokio::test]
    async fn times_out_while_the_entity_lingers() {
        let api = MemoryApi::new().with_environment(ENV);
        let collection = format!("/environments/{}/authorizationRules", ENV);
        let id = api.insert(&collection, json!({"name": "stuck"}));
        let path = format!("{}/{}", collection, id);
        let mut config = fast();
        config.timeout = Duration::from_millis(20);
        let end = await_absence(&api, &path, &config, &CancellationToken::new()).await;
        assert_eq!(
            end,
            PollEnd::TimedOut {
                last: Observation::Present
            }
        );
    }

    #[tokio::test]
    async fn hard_errors_end_the_poll() {
        let api = MemoryApi::new().with_environment(ENV);
        let path = rule_path();
        let denied = ApiError::status(403, "ACCESS_FAILED", "no");
        api.script(Method::Get, &path, Err(denied.clone()));
        let end = await_absence(&api, &path, &fast(), &CancellationToken::new()).await;
        assert_eq!(end, PollEnd::Failed(denied));
    }

    #[tokio::test]
    async fn cancellation_returns_promptly() {
        let api = MemoryApi::new().with_environment(ENV);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let end = await_absence(&api, &rule_path(), &DeletePollConfig::default(), &cancel).await;
        assert_eq!(end, PollEnd::Cancelled);
        assert!(api.calls().is_empty());
    }
}

use std::future::Future;

use serde_json::{json, Value as Json};

use super::{create_rule, make_rule, version_of, TestResult};
use crate::AuthorizeApi;

pub(super) async fn run_version_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: AuthorizeApi,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "version",
            "update_changes_version",
            update_changes_version(factory).await,
        ),
        TestResult::from_result(
            "version",
            "update_with_stale_version_conflicts",
            update_with_stale_version_conflicts(factory).await,
        ),
        TestResult::from_result(
            "version",
            "update_without_version_conflicts",
            update_without_version_conflicts(factory).await,
        ),
        TestResult::from_result(
            "version",
            "conflict_does_not_change_document",
            conflict_does_not_change_document(factory).await,
        ),
        TestResult::from_result(
            "version",
            "read_version_is_accepted",
            read_version_is_accepted(factory).await,
        ),
    ]
}

fn update_body(created: &Json, name: &str, version: Option<&str>) -> Json {
    let mut body = make_rule(name);
    body["id"] = created["id"].clone();
    if let Some(v) = version {
        body["version"] = json!(v);
    }
    body
}

// ── 1. Versions move forward ─────────────────────────────────────────────────

async fn update_changes_version<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AuthorizeApi,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let api = factory().await;
    let (path, created) = create_rule(&api, "v").await?;
    let before = version_of(&created)?;
    let updated = api
        .update(&path, &update_body(&created, "v2", Some(before.as_str())))
        .await
        .map_err(|e| format!("update failed: {}", e))?;
    let after = version_of(&updated)?;
    if after == before {
        return Err(format!("version stayed at {}", before));
    }
    Ok(())
}

// ── 2. Stale tokens are rejected ─────────────────────────────────────────────

async fn update_with_stale_version_conflicts<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AuthorizeApi,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let api = factory().await;
    let (path, created) = create_rule(&api, "stale").await?;
    let first = version_of(&created)?;
    api.update(&path, &update_body(&created, "one", Some(first.as_str())))
        .await
        .map_err(|e| format!("first update failed: {}", e))?;
    match api
        .update(&path, &update_body(&created, "two", Some(first.as_str())))
        .await
    {
        Err(e) if e.http_status() == Some(409) => Ok(()),
        other => Err(format!("expected 409 for stale version, got {:?}", other)),
    }
}

async fn update_without_version_conflicts<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AuthorizeApi,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let api = factory().await;
    let (path, created) = create_rule(&api, "none").await?;
    match api.update(&path, &update_body(&created, "x", None)).await {
        Err(e) if e.http_status() == Some(409) => Ok(()),
        other => Err(format!("expected 409 without version, got {:?}", other)),
    }
}

async fn conflict_does_not_change_document<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AuthorizeApi,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let api = factory().await;
    let (path, created) = create_rule(&api, "kept").await?;
    let _ = api
        .update(&path, &update_body(&created, "lost", Some("not-a-version")))
        .await;
    let read = api.get(&path).await.map_err(|e| format!("get failed: {}", e))?;
    if read != created {
        return Err(format!("document changed after conflict: {}", read));
    }
    Ok(())
}

// ── 3. Read-then-write succeeds ──────────────────────────────────────────────

async fn read_version_is_accepted<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AuthorizeApi,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let api = factory().await;
    let (path, created) = create_rule(&api, "rw").await?;
    let mut current = created.clone();
    for i in 0..3 {
        let read = api.get(&path).await.map_err(|e| format!("get failed: {}", e))?;
        let version = version_of(&read)?;
        current = api
            .update(&path, &update_body(&created, &format!("rw{}", i), Some(version.as_str())))
            .await
            .map_err(|e| format!("update {} failed: {}", i, e))?;
    }
    if current["name"] != json!("rw2") {
        return Err(format!("unexpected final document {}", current));
    }
    Ok(())
}

use std::future::Future;

use super::{create_rule, make_rule, rules_path, TestResult};
use crate::AuthorizeApi;

pub(super) async fn run_error_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: AuthorizeApi,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "error",
            "get_missing_is_not_found",
            get_missing_is_not_found(factory).await,
        ),
        TestResult::from_result(
            "error",
            "update_missing_is_not_found",
            update_missing_is_not_found(factory).await,
        ),
        TestResult::from_result(
            "error",
            "delete_missing_is_not_found",
            delete_missing_is_not_found(factory).await,
        ),
        TestResult::from_result(
            "error",
            "delete_twice_is_not_found",
            delete_twice_is_not_found(factory).await,
        ),
        TestResult::from_result(
            "error",
            "unknown_environment_rejected",
            unknown_environment_rejected(factory).await,
        ),
    ]
}

const MISSING_ID: &str = "ffffffff-ffff-4fff-bfff-ffffffffffff";

fn missing_path() -> String {
    format!("{}/{}", rules_path(), MISSING_ID)
}

async fn get_missing_is_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AuthorizeApi,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let api = factory().await;
    match api.get(&missing_path()).await {
        Err(e) if e.is_not_found() => Ok(()),
        other => Err(format!("expected 404, got {:?}", other)),
    }
}

async fn update_missing_is_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AuthorizeApi,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let api = factory().await;
    let mut body = make_rule("ghost");
    body["id"] = MISSING_ID.into();
    body["version"] = "v1".into();
    match api.update(&missing_path(), &body).await {
        Err(e) if e.is_not_found() => Ok(()),
        other => Err(format!("expected 404, got {:?}", other)),
    }
}

async fn delete_missing_is_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AuthorizeApi,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let api = factory().await;
    match api.delete(&missing_path()).await {
        Err(e) if e.is_not_found() => Ok(()),
        other => Err(format!("expected 404, got {:?}", other)),
    }
}

async fn delete_twice_is_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AuthorizeApi,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let api = factory().await;
    let (path, _) = create_rule(&api, "twice").await?;
    api.delete(&path)
        .await
        .map_err(|e| format!("first delete failed: {}", e))?;
    match api.delete(&path).await {
        Err(e) if e.is_not_found() => Ok(()),
        other => Err(format!("expected 404 on second delete, got {:?}", other)),
    }
}

async fn unknown_environment_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AuthorizeApi,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let api = factory().await;
    let path = "/environments/00000000-0000-4000-8000-000000000000/authorizationRules";
    match api.get(&format!("{}/{}", path, MISSING_ID)).await {
        Err(e) if matches!(e.http_status(), Some(400 | 401 | 403 | 404)) => Ok(()),
        other => Err(format!("expected a 4xx for an unknown environment, got {:?}", other)),
    }
}

use std::future::Future;

use serde_json::json;

use super::{create_rule, make_rule, rules_path, version_of, TestResult};
use crate::AuthorizeApi;

pub(super) async fn run_crud_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: AuthorizeApi,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "crud",
            "create_assigns_id_and_version",
            create_assigns_id_and_version(factory).await,
        ),
        TestResult::from_result(
            "crud",
            "create_echoes_body_fields",
            create_echoes_body_fields(factory).await,
        ),
        TestResult::from_result(
            "crud",
            "get_returns_created_document",
            get_returns_created_document(factory).await,
        ),
        TestResult::from_result(
            "crud",
            "update_replaces_document",
            update_replaces_document(factory).await,
        ),
        TestResult::from_result(
            "crud",
            "delete_then_get_is_not_found",
            delete_then_get_is_not_found(factory).await,
        ),
        TestResult::from_result(
            "crud",
            "list_returns_every_item",
            list_returns_every_item(factory).await,
        ),
        TestResult::from_result(
            "crud",
            "list_empty_collection",
            list_empty_collection(factory).await,
        ),
    ]
}

// ── 1. Create assigns server-owned fields ────────────────────────────────────

async fn create_assigns_id_and_version<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AuthorizeApi,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let api = factory().await;
    let (_, doc) = create_rule(&api, "first").await?;
    version_of(&doc)?;
    let (_, other) = create_rule(&api, "second").await?;
    if doc["id"] == other["id"] {
        return Err(format!("two creates returned the same id {}", doc["id"]));
    }
    Ok(())
}

async fn create_echoes_body_fields<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AuthorizeApi,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let api = factory().await;
    let (_, doc) = create_rule(&api, "echo").await?;
    for key in ["name", "effectSettings", "environment"] {
        if doc.get(key) != make_rule("echo").get(key) {
            return Err(format!("{} not echoed: {}", key, doc));
        }
    }
    Ok(())
}

// ── 2. Read ──────────────────────────────────────────────────────────────────

async fn get_returns_created_document<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AuthorizeApi,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let api = factory().await;
    let (path, created) = create_rule(&api, "readable").await?;
    let read = api.get(&path).await.map_err(|e| format!("get failed: {}", e))?;
    if read != created {
        return Err(format!("read {} differs from created {}", read, created));
    }
    Ok(())
}

// ── 3. Update ────────────────────────────────────────────────────────────────

async fn update_replaces_document<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AuthorizeApi,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let api = factory().await;
    let (path, created) = create_rule(&api, "before").await?;
    let mut body = make_rule("after");
    body["id"] = created["id"].clone();
    body["version"] = json!(version_of(&created)?);

    let updated = api
        .update(&path, &body)
        .await
        .map_err(|e| format!("update failed: {}", e))?;
    if updated["name"] != json!("after") {
        return Err(format!("update did not apply: {}", updated));
    }
    let read = api.get(&path).await.map_err(|e| format!("get failed: {}", e))?;
    if read["name"] != json!("after") {
        return Err(format!("read after update returned {}", read));
    }
    Ok(())
}

// ── 4. Delete ────────────────────────────────────────────────────────────────

async fn delete_then_get_is_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AuthorizeApi,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let api = factory().await;
    let (path, _) = create_rule(&api, "doomed").await?;
    api.delete(&path)
        .await
        .map_err(|e| format!("delete failed: {}", e))?;
    match api.get(&path).await {
        Err(e) if e.is_not_found() => Ok(()),
        other => Err(format!("expected 404 after delete, got {:?}", other)),
    }
}

// ── 5. List ──────────────────────────────────────────────────────────────────

async fn list_returns_every_item<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AuthorizeApi,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let api = factory().await;
    let mut ids = Vec::new();
    for name in ["a", "b", "c"] {
        let (_, doc) = create_rule(&api, name).await?;
        ids.push(doc["id"].clone());
    }
    let items = api
        .list(&rules_path())
        .await
        .map_err(|e| format!("list failed: {}", e))?;
    if items.len() != ids.len() {
        return Err(format!("expected {} items, got {}", ids.len(), items.len()));
    }
    for id in &ids {
        if !items.iter().any(|i| &i["id"] == id) {
            return Err(format!("{} missing from listing", id));
        }
    }
    Ok(())
}

async fn list_empty_collection<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AuthorizeApi,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let api = factory().await;
    match api.list(&rules_path()).await {
        Ok(items) if items.is_empty() => Ok(()),
        other => Err(format!("expected empty listing, got {:?}", other)),
    }
}

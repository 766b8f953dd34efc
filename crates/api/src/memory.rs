//! In-process PingOne Authorize server, for tests and local dry runs.
//!
//! Keeps documents keyed by item path, enforces version tokens the way the
//! real service does, and lets tests script replies per `(method, path)` to
//! inject 409s, flapping 404s, transient 5xx and the like. The request log
//! keeps only the most recent [`CALL_LOG_LIMIT`] calls.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value as Json;

use crate::error::ApiError;
use crate::traits::{AuthorizeApi, ManagementApi, Method};

/// Suffix under which the root policies of a policy collection are listed.
const ROOT_SUFFIX: &str = "/root";

/// Calls retained by [`MemoryApi::calls`]; older ones are dropped first.
pub const CALL_LOG_LIMIT: usize = 4096;

type Decorator = Box<dyn Fn(&str, &mut Json) + Send + Sync>;

/// One request seen by the server, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub method: Method,
    pub path: String,
}

struct Stored {
    doc: Json,
    revision: u64,
    root: bool,
}

#[derive(Default)]
struct State {
    environments: BTreeSet<String>,
    documents: BTreeMap<String, Stored>,
    scripted: HashMap<(Method, String), VecDeque<Result<Json, ApiError>>>,
    calls: VecDeque<Call>,
    next_id: u64,
}

impl State {
    fn record(&mut self, method: Method, path: String) {
        if self.calls.len() == CALL_LOG_LIMIT {
            self.calls.pop_front();
        }
        self.calls.push_back(Call { method, path });
    }
}

#[derive(Default)]
pub struct MemoryApi {
    state: Mutex<State>,
    decorator: Option<Decorator>,
}

impl MemoryApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_environment(self, environment_id: &str) -> Self {
        self.add_environment(environment_id);
        self
    }

    /// Run `f(collection, document)` on every stored document before it is
    /// returned, to add the fields the real server computes.
    pub fn with_decorator(mut self, f: impl Fn(&str, &mut Json) + Send + Sync + 'static) -> Self {
        self.decorator = Some(Box::new(f));
        self
    }

    pub fn add_environment(&self, environment_id: &str) {
        self.lock().environments.insert(environment_id.to_string());
    }

    /// Drop an environment and everything stored under it.
    pub fn remove_environment(&self, environment_id: &str) {
        let mut state = self.lock();
        state.environments.remove(environment_id);
        let prefix = format!("/environments/{}/", environment_id);
        state.documents.retain(|path, _| !path.starts_with(&prefix));
    }

    // ── Seeding and inspection ───────────────────────────────────────────────

    /// Store `doc` in `collection` as if it had been created; returns its id.
    pub fn insert(&self, collection: &str, doc: Json) -> String {
        self.store_new(collection, doc, false)
    }

    /// Like [`insert`](Self::insert), but also listed under
    /// `{collection}/root`.
    pub fn insert_root(&self, collection: &str, doc: Json) -> String {
        self.store_new(collection, doc, true)
    }

    pub fn document(&self, path: &str) -> Option<Json> {
        self.lock().documents.get(path).map(|s| s.doc.clone())
    }

    /// Advance a document's version out of band; returns the new token.
    pub fn bump_version(&self, path: &str) -> Option<String> {
        let mut state = self.lock();
        let stored = state.documents.get_mut(path)?;
        stored.revision += 1;
        let version = format!("v{}", stored.revision);
        stored.doc["version"] = Json::String(version.clone());
        Some(version)
    }

    /// Queue a reply for the next `method` request on `path`. Scripted
    /// replies are served in order before the stored data is consulted.
    pub fn script(&self, method: Method, path: &str, reply: Result<Json, ApiError>) {
        self.lock()
            .scripted
            .entry((method, path.to_string()))
            .or_default()
            .push_back(reply);
    }

    /// The retained request log, oldest first.
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.iter().cloned().collect()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.method == method && c.path == path)
            .count()
    }

    // ── Request handling ─────────────────────────────────────────────────────

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn store_new(&self, collection: &str, doc: Json, root: bool) -> String {
        let mut state = self.lock();
        state.next_id += 1;
        let id = resource_id(state.next_id);
        self.store(&mut state, collection, doc, id, root)
    }

    fn store(
        &self,
        state: &mut State,
        collection: &str,
        doc: Json,
        id: String,
        root: bool,
    ) -> String {
        let mut doc = doc;
        if let Some(obj) = doc.as_object_mut() {
            obj.insert("id".to_string(), Json::String(id.clone()));
            obj.insert("version".to_string(), Json::String("v1".to_string()));
        }
        self.decorate(collection, &mut doc);
        state.documents.insert(
            format!("{}/{}", collection, id),
            Stored {
                doc,
                revision: 1,
                root,
            },
        );
        id
    }

    fn decorate(&self, collection: &str, doc: &mut Json) {
        if let Some(f) = &self.decorator {
            f(collection, doc);
        }
    }

    /// Record the call and serve a scripted reply or the environment
    /// check. `None` means the stored data decides.
    fn intercept(&self, method: Method, path: &str) -> Option<Result<Json, ApiError>> {
        let mut state = self.lock();
        state.record(method, path.to_string());
        if let Some(reply) = state
            .scripted
            .get_mut(&(method, path.to_string()))
            .and_then(VecDeque::pop_front)
        {
            tracing::debug!(%method, path, "scripted reply");
            return Some(reply);
        }
        match environment_of(path) {
            Some(env) if state.environments.contains(env) => None,
            _ => Some(Err(ApiError::status(
                403,
                "ACCESS_FAILED",
                "The request could not be completed. You do not have access to this resource.",
            ))),
        }
    }
}

#[async_trait]
impl AuthorizeApi for MemoryApi {
    async fn create(&self, path: &str, body: &Json) -> Result<Json, ApiError> {
        if let Some(reply) = self.intercept(Method::Post, path) {
            return reply;
        }
        if !body.is_object() {
            return Err(invalid_data("request body must be an object"));
        }
        // Assignment collections (role permissions) are keyed by the id the
        // client names; everything else gets a server-assigned id.
        let id = match body.get("id").and_then(Json::as_str) {
            Some(named) => {
                let mut state = self.lock();
                if state.documents.contains_key(&format!("{}/{}", path, named)) {
                    return Err(ApiError::status(
                        409,
                        "UNIQUENESS_VIOLATION",
                        format!("{} is already assigned", named),
                    ));
                }
                self.store(&mut state, path, body.clone(), named.to_string(), false)
            }
            None => self.store_new(path, body.clone(), false),
        };
        self.document(&format!("{}/{}", path, id))
            .ok_or_else(|| not_found(path))
    }

    async fn get(&self, path: &str) -> Result<Json, ApiError> {
        if let Some(reply) = self.intercept(Method::Get, path) {
            return reply;
        }
        self.document(path).ok_or_else(|| not_found(path))
    }

    async fn update(&self, path: &str, body: &Json) -> Result<Json, ApiError> {
        if let Some(reply) = self.intercept(Method::Put, path) {
            return reply;
        }
        let Some((collection, id)) = path.rsplit_once('/') else {
            return Err(not_found(path));
        };
        let mut state = self.lock();
        let Some(stored) = state.documents.get_mut(path) else {
            return Err(not_found(path));
        };
        if body.get("version") != stored.doc.get("version") {
            return Err(ApiError::status(
                409,
                "CONFLICT",
                "The resource has been modified since it was read. Read it again and retry with the current version.",
            ));
        }
        let mut doc = body.clone();
        stored.revision += 1;
        if let Some(obj) = doc.as_object_mut() {
            obj.insert("id".to_string(), Json::String(id.to_string()));
            obj.insert(
                "version".to_string(),
                Json::String(format!("v{}", stored.revision)),
            );
        }
        self.decorate(collection, &mut doc);
        stored.doc = doc.clone();
        Ok(doc)
    }

    async fn delete(&self, path: &str) -> Result<(), ApiError> {
        if let Some(reply) = self.intercept(Method::Delete, path) {
            return reply.map(|_| ());
        }
        match self.lock().documents.remove(path) {
            Some(_) => Ok(()),
            None => Err(not_found(path)),
        }
    }

    async fn list(&self, path: &str) -> Result<Vec<Json>, ApiError> {
        if let Some(reply) = self.intercept(Method::Get, path) {
            return reply.map(|page| page.as_array().cloned().unwrap_or_default());
        }
        let (collection, roots_only) = match path.strip_suffix(ROOT_SUFFIX) {
            Some(c) => (c, true),
            None => (path, false),
        };
        let prefix = format!("{}/", collection);
        let state = self.lock();
        Ok(state
            .documents
            .iter()
            .filter(|(p, s)| {
                p.strip_prefix(&prefix).is_some_and(|rest| !rest.contains('/'))
                    && (!roots_only || s.root)
            })
            .map(|(_, s)| s.doc.clone())
            .collect())
    }
}

#[async_trait]
impl ManagementApi for MemoryApi {
    async fn environment_exists(&self, environment_id: &str) -> Result<bool, ApiError> {
        let mut state = self.lock();
        state.record(Method::Get, format!("/environments/{}", environment_id));
        Ok(state.environments.contains(environment_id))
    }
}

/// 36-character id in PingOne resource-id form.
fn resource_id(n: u64) -> String {
    format!("{:08x}-0000-4000-8000-{:012x}", n, n)
}

fn environment_of(path: &str) -> Option<&str> {
    path.strip_prefix("/environments/")
        .and_then(|rest| rest.split('/').next())
        .filter(|env| !env.is_empty())
}

fn not_found(path: &str) -> ApiError {
    ApiError::status(
        404,
        "NOT_FOUND",
        format!("Unable to find resource at {}", path),
    )
}

fn invalid_data(message: &str) -> ApiError {
    ApiError::status(400, "INVALID_DATA", message)
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ENV: &str = "8c6e0b4a-5d2f-4f1e-9a3b-2c7d8e9f0a1b";

    fn rules() -> String {
        format!("/environments/{}/authorizationRules", ENV)
    }

    #[test]
    fn resource_ids_have_pingone_shape() {
        let id = resource_id(42);
        assert_eq!(id.len(), 36);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() || c == '-'));
    }

    #[test]
    fn environment_is_first_path_segment() {
        assert_eq!(environment_of("/environments/e1/authorizationRules/x"), Some("e1"));
        assert_eq!(environment_of("/environments/"), None);
        assert_eq!(environment_of("/other"), None);
    }

    #[tokio::test]
    async fn scripted_replies_come_first_and_in_order() {
        let api = MemoryApi::new().with_environment(ENV);
        let id = api.insert(&rules(), json!({"name": "r"}));
        let path = format!("{}/{}", rules(), id);
        api.script(Method::Get, &path, Err(ApiError::status(503, "", "busy")));
        api.script(Method::Get, &path, Ok(json!({"stale": true})));

        assert_eq!(api.get(&path).await.unwrap_err().http_status(), Some(503));
        assert_eq!(api.get(&path).await.unwrap(), json!({"stale": true}));
        assert_eq!(api.get(&path).await.unwrap()["name"], json!("r"));
        assert_eq!(api.count(Method::Get, &path), 3);
    }

    #[tokio::test]
    async fn decorator_adds_server_fields() {
        let api = MemoryApi::new()
            .with_environment(ENV)
            .with_decorator(|_, doc| doc["fullName"] = json!("PingOne.User"));
        let doc = api.create(&rules(), &json!({"name": "User"})).await.unwrap();
        assert_eq!(doc["fullName"], json!("PingOne.User"));
        assert_eq!(doc["version"], json!("v1"));
    }

    #[tokio::test]
    async fn root_listing_only_returns_root_documents() {
        let api = MemoryApi::new().with_environment(ENV);
        let policies = format!("/environments/{}/authorizationPolicies", ENV);
        api.insert(&policies, json!({"name": "child"}));
        let root = api.insert_root(&policies, json!({"name": "Policies"}));

        let roots = api.list(&format!("{}/root", policies)).await.unwrap();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0]["id"], json!(root));
        assert_eq!(api.list(&policies).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn removed_environment_forbids_access() {
        let api = MemoryApi::new().with_environment(ENV);
        let id = api.insert(&rules(), json!({"name": "r"}));
        api.remove_environment(ENV);
        let err = api.get(&format!("{}/{}", rules(), id)).await.unwrap_err();
        assert_eq!(err.http_status(), Some(403));
        assert!(!api.environment_exists(ENV).await.unwrap());
    }

    #[tokio::test]
    async fn call_log_keeps_the_most_recent_calls() {
        let api = MemoryApi::new().with_environment(ENV);
        for i in 0..CALL_LOG_LIMIT + 10 {
            let _ = api.get(&format!("{}/{}", rules(), i)).await;
        }
        let calls = api.calls();
        assert_eq!(calls.len(), CALL_LOG_LIMIT);
        assert_eq!(calls[0].path, format!("{}/10", rules()));
        assert_eq!(
            calls.last().map(|c| c.path.clone()),
            Some(format!("{}/{}", rules(), CALL_LOG_LIMIT + 9))
        );

        api.clear_calls();
        assert!(api.calls().is_empty());
        assert!(api.environment_exists(ENV).await.unwrap());
        assert_eq!(api.count(Method::Get, &format!("/environments/{}", ENV)), 1);
    }

    #[tokio::test]
    async fn create_keys_assignments_by_the_named_id() {
        let api = MemoryApi::new().with_environment(ENV);
        let role = format!("/environments/{}/applicationRoles/r1/permissions", ENV);
        let named = resource_id(900);
        let doc = api.create(&role, &json!({"id": named})).await.unwrap();
        assert_eq!(doc["id"], json!(named));
        assert!(api.document(&format!("{}/{}", role, named)).is_some());

        let again = api.create(&role, &json!({"id": named})).await.unwrap_err();
        assert_eq!(again.http_status(), Some(409));
    }
}

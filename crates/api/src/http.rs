//! `ureq`-backed implementation of the client traits.
//!
//! `ureq` is synchronous, so each request runs on tokio's blocking pool.
//! Non-2xx responses are read like any other so the PingOne error body can
//! be decoded into [`ApiError::Status`].

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value as Json;

use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::traits::{AuthorizeApi, ManagementApi, Method};

/// Upper bound on followed `next` links for one listing.
const MAX_PAGES: usize = 1000;

pub struct HttpClient {
    config: ApiConfig,
    agent: ureq::Agent,
}

impl HttpClient {
    pub fn new(config: ApiConfig) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(config.timeout))
            .build()
            .into();
        Self { config, agent }
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    async fn send(
        &self,
        method: Method,
        url: String,
        body: Option<Json>,
    ) -> Result<Option<Json>, ApiError> {
        tracing::debug!(method = %method, url = %url, "request");
        let agent = self.agent.clone();
        let token = self.config.access_token.clone();
        tokio::task::spawn_blocking(move || send_blocking(&agent, method, &url, &token, body.as_ref()))
            .await
            .map_err(|e| ApiError::Transport(format!("task join error: {}", e)))?
    }

    async fn send_expecting(
        &self,
        method: Method,
        path: &str,
        body: Option<&Json>,
    ) -> Result<Json, ApiError> {
        let url = join(&self.config.base_url, path);
        self.send(method, url, body.cloned())
            .await?
            .ok_or_else(|| ApiError::Decode(format!("{} {} returned no body", method, path)))
    }
}

fn send_blocking(
    agent: &ureq::Agent,
    method: Method,
    url: &str,
    token: &str,
    body: Option<&Json>,
) -> Result<Option<Json>, ApiError> {
    let auth = format!("Bearer {}", token);
    let empty = Json::Object(Default::default());
    let result = match method {
        Method::Get => agent.get(url).header("Authorization", &auth).call(),
        Method::Delete => agent.delete(url).header("Authorization", &auth).call(),
        Method::Post => agent
            .post(url)
            .header("Authorization", &auth)
            .header("Content-Type", "application/json")
            .send_json(body.unwrap_or(&empty)),
        Method::Put => agent
            .put(url)
            .header("Authorization", &auth)
            .header("Content-Type", "application/json")
            .send_json(body.unwrap_or(&empty)),
    };
    let response = result.map_err(|e| ApiError::Transport(e.to_string()))?;
    let status = response.status().as_u16();
    let text = response
        .into_body()
        .read_to_string()
        .map_err(|e| ApiError::Decode(e.to_string()))?;

    if !(200..300).contains(&status) {
        return Err(ApiError::from_response(status, &text));
    }
    if text.trim().is_empty() {
        return Ok(None);
    }
    parse_body(&text)
        .map(Some)
        .map_err(|e| ApiError::Decode(e.to_string()))
}

/// Parse a response body with no nesting limit. Condition and processor
/// trees nest deeper than `serde_json`'s default recursion guard allows.
fn parse_body(text: &str) -> Result<Json, serde_json::Error> {
    let mut de = serde_json::Deserializer::from_str(text);
    de.disable_recursion_limit();
    let value = Json::deserialize(serde_stacker::Deserializer::new(&mut de))?;
    de.end()?;
    Ok(value)
}

/// Absolute `next` links are followed as given; relative paths are joined
/// to the base URL.
fn join(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        path.to_string()
    } else {
        format!("{}{}", base.trim_end_matches('/'), path)
    }
}

/// Items of one HAL page: the first array under `_embedded`.
fn embedded_items(page: &Json) -> Vec<Json> {
    page.get("_embedded")
        .and_then(Json::as_object)
        .and_then(|e| e.values().find_map(Json::as_array))
        .cloned()
        .unwrap_or_default()
}

fn next_link(page: &Json) -> Option<String> {
    page.pointer("/_links/next/href")
        .and_then(Json::as_str)
        .map(str::to_string)
}

#[async_trait]
impl AuthorizeApi for HttpClient {
    async fn create(&self, path: &str, body: &Json) -> Result<Json, ApiError> {
        self.send_expecting(Method::Post, path, Some(body)).await
    }

    async fn get(&self, path: &str) -> Result<Json, ApiError> {
        self.send_expecting(Method::Get, path, None).await
    }

    async fn update(&self, path: &str, body: &Json) -> Result<Json, ApiError> {
        self.send_expecting(Method::Put, path, Some(body)).await
    }

    async fn delete(&self, path: &str) -> Result<(), ApiError> {
        let url = join(&self.config.base_url, path);
        self.send(Method::Delete, url, None).await.map(|_| ())
    }

    async fn list(&self, path: &str) -> Result<Vec<Json>, ApiError> {
        let mut items = Vec::new();
        let mut next = Some(join(&self.config.base_url, path));
        let mut pages = 0;
        while let Some(url) = next.take() {
            let page = self.send(Method::Get, url.clone(), None).await?.unwrap_or(Json::Null);
            items.extend(embedded_items(&page));
            pages += 1;
            next = next_link(&page).filter(|n| *n != url);
            if pages >= MAX_PAGES && next.is_some() {
                tracing::warn!(path, pages, "listing truncated");
                break;
            }
        }
        Ok(items)
    }
}

#[async_trait]
impl ManagementApi for HttpClient {
    async fn environment_exists(&self, environment_id: &str) -> Result<bool, ApiError> {
        let url = join(
            self.config.management_url(),
            &format!("/environments/{}", environment_id),
        );
        match self.send(Method::Get, url, None).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

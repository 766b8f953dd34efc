//! Conformance test suite for `AuthorizeApi` implementations.
//!
//! A backend-agnostic suite any client (or fake server) can run to show it
//! honours the contract the reconciler relies on:
//!
//! - **CRUD**: ids and versions assigned on create, documents readable,
//!   replaceable and removable
//! - **Version validation / OCC**: stale `version` tokens rejected with 409
//!   and no state change
//! - **Listing**: collections return every item, root listings only roots
//! - **Errors**: 404 for missing documents, rejection of unknown environments
//!
//! # Usage
//!
//! Call [`run_conformance_suite`] with a factory that builds a fresh, empty
//! API in which [`CONFORMANCE_ENVIRONMENT`] exists:
//!
//! ```ignore
//! use p1authz_api::conformance::{run_conformance_suite, CONFORMANCE_ENVIRONMENT};
//!
//! #[tokio::test]
//! async fn memory_conformance() {
//!     let report = run_conformance_suite(|| async {
//!         MemoryApi::new().with_environment(CONFORMANCE_ENVIRONMENT)
//!     })
//!     .await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod crud;
mod error;
mod version;

use std::fmt;
use std::future::Future;

use serde_json::{json, Value as Json};

use crate::AuthorizeApi;

/// Environment the factory must provision.
pub const CONFORMANCE_ENVIRONMENT: &str = "0c7a9e44-1f0b-4c55-9e9e-5b0f3a6d2c11";

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "crud", "version").
    pub category: String,
    /// Test name (e.g. "update_with_stale_version_conflicts").
    pub name: String,
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn pass(category: &str, name: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(category: &str, name: &str, msg: String) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: false,
            message: Some(msg),
        }
    }

    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::pass(category, name),
            Err(msg) => Self::fail(category, name, msg),
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against an API implementation.
///
/// The `factory` is called once per test so that tests never see each
/// other's documents.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: AuthorizeApi,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(crud::run_crud_tests(&factory).await);
    results.extend(version::run_version_tests(&factory).await);
    results.extend(error::run_error_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn rules_path() -> String {
    format!("/environments/{}/authorizationRules", CONFORMANCE_ENVIRONMENT)
}

fn item_path(collection: &str, doc: &Json) -> Result<String, String> {
    doc.get("id")
        .and_then(Json::as_str)
        .map(|id| format!("{}/{}", collection, id))
        .ok_or_else(|| format!("document has no string id: {}", doc))
}

fn version_of(doc: &Json) -> Result<String, String> {
    doc.get("version")
        .and_then(Json::as_str)
        .map(str::to_string)
        .ok_or_else(|| format!("document has no string version: {}", doc))
}

fn make_rule(name: &str) -> Json {
    json!({
        "environment": {"id": CONFORMANCE_ENVIRONMENT},
        "name": name,
        "enabled": true,
        "condition": {"type": "EMPTY"},
        "effectSettings": {"type": "UNCONDITIONAL_PERMIT"}
    })
}

/// Create a rule and return `(item_path, stored_document)`.
async fn create_rule<S: AuthorizeApi>(api: &S, name: &str) -> Result<(String, Json), String> {
    let collection = rules_path();
    let doc = api
        .create(&collection, &make_rule(name))
        .await
        .map_err(|e| format!("create failed: {}", e))?;
    Ok((item_path(&collection, &doc)?, doc))
}

//! `apply`, `read`, `delete` and `import`: the commands that talk to the
//! API through a [`Reconciler`].

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use p1authz_api::HttpClient;
use p1authz_core::{host, EntityKind, Ty, Value};
use p1authz_reconcile::{CancellationToken, Diagnostic, Outcome, Reconciler, StateChange};
use serde_json::json;

use super::{print_diagnostics, print_json, read_json};
use crate::config::{FileConfig, Settings};
use crate::{report_error, OutputFormat};

type Live = Reconciler<HttpClient, HttpClient>;

pub(crate) enum Action {
    Apply {
        plan: PathBuf,
        state: Option<PathBuf>,
    },
    Read {
        state: PathBuf,
    },
    Delete {
        state: PathBuf,
    },
    Import {
        id: String,
    },
}

pub(crate) fn cmd_lifecycle(
    kind_name: &str,
    action: Action,
    settings: &Settings,
    output: OutputFormat,
    quiet: bool,
) {
    let file = match FileConfig::load(settings.file.as_deref()) {
        Ok(f) => f,
        Err(msg) => {
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };
    let api_config = match file.api_config(settings) {
        Ok(c) => c,
        Err(msg) => {
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };

    let client = Arc::new(HttpClient::new(api_config));
    let reconciler = Live::new(file.reconcile_config()).with_client(client.clone(), client);
    let kind = match reconciler.kind(kind_name) {
        Ok(k) => k,
        Err(d) => finish(kind_name, Outcome::failed(d), output, quiet),
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            report_error(&format!("failed to create tokio runtime: {}", e), output, quiet);
            process::exit(1);
        }
    };
    let outcome = rt.block_on(async {
        let cancel = CancellationToken::new();
        let watcher = tokio::spawn(cancel_on_interrupt(cancel.clone()));
        let outcome = run(&reconciler, kind, action, &cancel, output, quiet).await;
        watcher.abort();
        outcome
    });
    finish(kind.name, outcome, output, quiet)
}

async fn cancel_on_interrupt(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::warn!("interrupted; cancelling");
        cancel.cancel();
    }
}

async fn run(
    reconciler: &Live,
    kind: &EntityKind,
    action: Action,
    cancel: &CancellationToken,
    output: OutputFormat,
    quiet: bool,
) -> Outcome {
    match action {
        Action::Apply { plan, state } => {
            let config = read_json(&plan, output, quiet);
            let plan = match reconciler.plan(kind, &config) {
                Ok(p) => p,
                Err(diagnostics) => return Outcome::unchanged(diagnostics),
            };
            let prior = match state {
                Some(path) => match load_state(reconciler, kind, &path, output, quiet) {
                    Ok(v) => Some(v),
                    Err(d) => return Outcome::failed(d),
                },
                None => None,
            };
            match prior {
                Some(state) if kind.item_id(&state).is_some() => {
                    reconciler.update(kind, &plan, &state, cancel).await
                }
                _ => reconciler.create(kind, &plan, cancel).await,
            }
        }
        Action::Read { state } => match load_state(reconciler, kind, &state, output, quiet) {
            Ok(state) => reconciler.read(kind, &state, cancel).await,
            Err(d) => Outcome::failed(d),
        },
        Action::Delete { state } => match load_state(reconciler, kind, &state, output, quiet) {
            Ok(state) => reconciler.delete(kind, &state, cancel).await,
            Err(d) => Outcome::failed(d),
        },
        Action::Import { id } => reconciler.import(kind, &id, cancel).await,
    }
}

/// Decode a state file against the entity's shape.
fn load_state(
    reconciler: &Live,
    kind: &EntityKind,
    path: &Path,
    output: OutputFormat,
    quiet: bool,
) -> Result<Value, Diagnostic> {
    let json = read_json(path, output, quiet);
    host::from_json(reconciler.registry(), &Ty::Object(kind.shape), &json)
        .map_err(|e| Diagnostic::from(&e))
}

/// Print the outcome and exit: status 1 if any diagnostic is an error.
fn finish(kind: &str, outcome: Outcome, output: OutputFormat, quiet: bool) -> ! {
    let failed = outcome.has_error();
    match output {
        OutputFormat::Text => {
            print_diagnostics(&outcome.diagnostics, quiet);
            match &outcome.state {
                StateChange::Set(value) => print_json(&host::to_json(value)),
                StateChange::Removed => println!("{} removed", kind),
                StateChange::Unchanged => {}
            }
        }
        OutputFormat::Json => {
            let state = outcome.value().map(host::to_json);
            print_json(&json!({
                "state": state,
                "removed": outcome.is_removed(),
                "diagnostics": outcome.diagnostics,
            }));
        }
    }
    process::exit(if failed { 1 } else { 0 })
}

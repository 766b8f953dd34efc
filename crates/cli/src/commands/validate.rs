use std::path::Path;
use std::process;

use p1authz_api::HttpClient;
use p1authz_reconcile::{Diagnostics, ReconcileConfig, Reconciler};
use serde_json::json;

use super::{print_diagnostics, print_json, read_json};
use crate::OutputFormat;

/// Plan a configuration without contacting the API and print the body a
/// create would send.
pub(crate) fn cmd_validate(kind_name: &str, plan_path: &Path, output: OutputFormat, quiet: bool) {
    let config = read_json(plan_path, output, quiet);
    let reconciler = Reconciler::<HttpClient, HttpClient>::new(ReconcileConfig::default());

    let result = reconciler
        .kind(kind_name)
        .map_err(Diagnostics::from)
        .and_then(|kind| reconciler.plan(kind, &config))
        .and_then(|plan| reconciler.wire_body(&plan));

    match (result, output) {
        (Ok(wire), OutputFormat::Text) => {
            if !quiet {
                eprintln!("{}: valid {}", plan_path.display(), kind_name);
            }
            print_json(&wire);
        }
        (Ok(wire), OutputFormat::Json) => {
            print_json(&json!({ "valid": true, "wire": wire }));
        }
        (Err(diagnostics), OutputFormat::Text) => {
            print_diagnostics(&diagnostics, quiet);
            process::exit(1);
        }
        (Err(diagnostics), OutputFormat::Json) => {
            print_json(&json!({ "valid": false, "diagnostics": diagnostics }));
            process::exit(1);
        }
    }
}

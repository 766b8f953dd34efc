pub(crate) mod lifecycle;
pub(crate) mod schema;
pub(crate) mod validate;

use std::path::Path;
use std::process;

use p1authz_core::host;
use p1authz_reconcile::Diagnostics;
use serde_json::Value as Json;

use crate::{report_error, OutputFormat};

/// Read and parse a JSON file, exiting with a reported error on failure.
pub(crate) fn read_json(path: &Path, output: OutputFormat, quiet: bool) -> Json {
    let text = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            let msg = format!("error reading file '{}': {}", path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };
    match host::parse(&text) {
        Ok(v) => v,
        Err(e) => {
            let msg = format!("error parsing JSON in '{}': {}", path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    }
}

/// Text-mode rendering of diagnostics, one block per entry on stderr.
pub(crate) fn print_diagnostics(diagnostics: &Diagnostics, quiet: bool) {
    if quiet {
        return;
    }
    for d in diagnostics.iter() {
        eprintln!("{}", d);
    }
}

pub(crate) fn print_json(value: &Json) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => {
            eprintln!("error serializing output: {}", e);
            process::exit(1);
        }
    }
}

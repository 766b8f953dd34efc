use std::process;

use p1authz_core::{schema, Registry};

use super::print_json;
use crate::{report_error, OutputFormat};

/// Print the registry, or the slice of it one entity kind reaches.
pub(crate) fn cmd_schema(kind: Option<&str>, output: OutputFormat, quiet: bool) {
    let registry = Registry::global();
    let described = match kind {
        None => schema::describe(registry),
        Some(name) => match schema::describe_kind(registry, name) {
            Ok(s) => s,
            Err(_) => {
                report_error(&format!("unknown entity kind '{}'", name), output, quiet);
                process::exit(1);
            }
        },
    };
    match serde_json::to_value(&described) {
        Ok(v) => print_json(&v),
        Err(e) => {
            report_error(&format!("error serializing schema: {}", e), output, quiet);
            process::exit(1);
        }
    }
}

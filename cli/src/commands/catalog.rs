use serde_json::json;

use pulsecheck_core::{CATALOG, CAUSAL_LINKS};

use crate::util::{EXIT_OK, EXIT_USAGE_ERROR, print_json, report_error};

pub fn run(raw: bool) -> i32 {
    let body = json!({
        "issues": CATALOG,
        "causal_links": CAUSAL_LINKS,
    });
    match print_json(&body, raw) {
        Ok(()) => EXIT_OK,
        Err(message) => report_error("output_error", &message, None, EXIT_USAGE_ERROR),
    }
}

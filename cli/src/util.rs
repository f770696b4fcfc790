use serde_json::json;

pub const EXIT_OK: i32 = 0;
pub const EXIT_FIXTURE_ERROR: i32 = 1;
pub const EXIT_USAGE_ERROR: i32 = 4;

/// Print a structured error to stderr and return the exit code to use.
pub fn report_error(kind: &str, message: &str, docs_hint: Option<&str>, code: i32) -> i32 {
    let mut err = json!({
        "error": kind,
        "message": message
    });
    if let Some(hint) = docs_hint {
        err["docs_hint"] = json!(hint);
    }
    eprintln!(
        "{}",
        serde_json::to_string_pretty(&err).unwrap_or_else(|_| err.to_string())
    );
    code
}

/// Read a file path, or stdin when path is "-".
pub fn read_input(path: &str) -> Result<String, String> {
    if path == "-" {
        std::io::read_to_string(std::io::stdin()).map_err(|e| format!("Failed to read stdin: {e}"))
    } else {
        std::fs::read_to_string(path).map_err(|e| format!("Failed to read file '{path}': {e}"))
    }
}

pub fn print_json<T: serde::Serialize>(value: &T, raw: bool) -> Result<(), String> {
    let formatted = if raw {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    }
    .map_err(|e| format!("Failed to serialize output: {e}"))?;
    println!("{formatted}");
    Ok(())
}

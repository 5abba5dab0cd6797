//! Shared HTTP utilities for the user directory workspace.
//!
//! Framework-agnostic response body builders and escaping helpers used by the
//! api-server's JSON API and HTML UI.

// ============================================================================
// JSON Response Helpers (framework-agnostic)
// ============================================================================

/// Create a structured error JSON with a default message based on the code.
///
/// Returns: `{"error": {"code": "<code>", "message": "<default message>"}}`
pub fn json_err(code: &str) -> serde_json::Value {
    let message = match code {
        "not_found" => "Resource not found",
        "bad_request" => "Bad request",
        "invalid_id" => "Invalid user id",
        "validation_failed" => "One or more fields are invalid",
        "conflict" => "Resource already exists",
        "error" | "internal" => "Internal server error",
        _ => code, // Fallback to code as message for unknown codes
    };
    serde_json::json!({"error": {"code": code, "message": message}})
}

/// Create a structured error JSON with a custom message.
///
/// Returns: `{"error": {"code": "<code>", "message": "<message>"}}`
pub fn json_error_with_message(code: &str, message: &str) -> serde_json::Value {
    serde_json::json!({"error": {"code": code, "message": message}})
}

/// Create a validation error JSON listing messages per field.
///
/// Returns: `{"error": {"code": "validation_failed", "message": "...",
/// "fields": {"<field>": ["<message>", ...]}}}`. Fields keep first-seen order
/// of their messages.
pub fn json_validation_error<'a, I>(errors: I) -> serde_json::Value
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut fields = serde_json::Map::new();
    for (field, message) in errors {
        let entry = fields
            .entry(field.to_string())
            .or_insert_with(|| serde_json::Value::Array(Vec::new()));
        if let serde_json::Value::Array(list) = entry {
            list.push(serde_json::Value::String(message.to_string()));
        }
    }
    serde_json::json!({
        "error": {
            "code": "validation_failed",
            "message": "One or more fields are invalid",
            "fields": fields,
        }
    })
}

// ============================================================================
// HTML Helpers
// ============================================================================

/// Escape text for safe inclusion in HTML element content and quoted attributes.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

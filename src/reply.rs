use serde_json::Value;

pub const GREETING: &str = "سلام! من MOBIN هستم. چطور می‌تونم کمکتون کنم؟";
pub const DEFAULT_REPLY: &str = "متوجه شدم. چطور دیگه می‌تونم کمکتون کنم؟";
pub const FILE_REPORT_LABEL: &str = "📋 گزارش فایل:";
pub const ERROR_PREFIX: &str = "خطا: ";

// Lookup order for the reply text of a JSON (non-streamed) answer.
const REPLY_POINTERS: &[&str] = &[
    "/text_response",
    "/backendResponse/text_response",
    "/backendResponse/response",
    "/backendResponse/message",
    "/response",
    "/message",
    "/answer",
];

pub fn upload_fallback(file_name: &str) -> String {
    format!("فایل شما دریافت شد: {file_name}. چطور می‌تونم کمکتون کنم؟")
}

/// Picks the text to show for a JSON reply, appending any file report.
pub fn display_text(value: &Value, fallback: &str) -> String {
    let text = REPLY_POINTERS
        .iter()
        .filter_map(|pointer| value.pointer(pointer).and_then(Value::as_str))
        .find(|text| !text.is_empty())
        .unwrap_or(fallback);

    let report = ["/file_report", "/backendResponse/file_report"]
        .iter()
        .filter_map(|pointer| value.pointer(pointer).and_then(Value::as_str))
        .find(|report| !report.is_empty());

    match report {
        Some(report) => format!("{text}\n\n{FILE_REPORT_LABEL}\n{report}"),
        None => text.to_string(),
    }
}

/// Error message carried by a `{"error": ...}` body, if any.
pub fn error_message(value: &Value) -> Option<String> {
    value.get("error").map(|err| match err {
        Value::String(message) => message.clone(),
        other => other
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .unwrap_or_else(|| other.to_string()),
    })
}

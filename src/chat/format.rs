//! Cleanup of model replies before they are shown

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

struct Patterns {
    json_fence: Regex,
    any_fence: Regex,
    json_word: Regex,
    json_block: Regex,
    key_line: Regex,
    blank_run: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        json_fence: Regex::new(r"(?is)```json.*?```").expect("static regex"),
        any_fence: Regex::new(r"(?s)```.*?```").expect("static regex"),
        json_word: Regex::new(r"(?i)\bjson\b").expect("static regex"),
        json_block: Regex::new(r"(?s)\{.{20,}\}").expect("static regex"),
        key_line: Regex::new(r#"(?m)^\s*"?[a-zA-Z0-9_]+"?\s*:\s*.+$"#).expect("static regex"),
        blank_run: Regex::new(r"\n{3,}").expect("static regex"),
    })
}

/// Drops fenced code blocks, `json` fences first
pub fn strip_code_fences(text: &str) -> String {
    let p = patterns();
    let out = p.json_fence.replace_all(text, "");
    p.any_fence.replace_all(&out, "").into_owned()
}

/// Drops unfenced JSON the model leaked into prose: the bare word `json`,
/// long brace blocks and `key: value` lines.
pub fn strip_inline_json(text: &str) -> String {
    let p = patterns();
    let out = p.json_word.replace_all(text, "");
    let out = p.json_block.replace_all(&out, "");
    p.key_line.replace_all(&out, "").into_owned()
}

pub fn clean_model_text(text: &str) -> String {
    let out = strip_inline_json(&strip_code_fences(text));
    patterns().blank_run.replace_all(&out, "\n\n").trim().to_string()
}

pub(crate) fn non_blank(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

/// Display text of a backend payload: `ui_text`, then `reply`, else the
/// cleaned payload itself.
pub fn pick_ui_text(data: &Value) -> String {
    if let Some(text) = non_blank(data, "ui_text").or_else(|| non_blank(data, "reply")) {
        return text;
    }
    match data {
        Value::Null => String::new(),
        Value::String(s) => clean_model_text(s),
        other => clean_model_text(&other.to_string()),
    }
}

//! Canonicalisation of upstream answers.
//!
//! The upstream may put the useful payload in `answer`, `data.outputs.*` or
//! `outputs.*`, and the payload itself may be a bare JSON array, one fenced
//! code block, several concatenated fenced blocks, or plain text. Everything
//! here is a pure transformation over strings / `serde_json::Value`.

use serde_json::Value;
use tracing::debug;

/// Keys probed inside `outputs`, in precedence order. The first key is the
/// field name the review workflow answers with.
const OUTPUT_KEYS: [&str; 4] = ["审查意见", "answer", "result", "content"];

/// Fence openers with their matching closers, longest first so the greedy
/// match wins.
const FENCES: [(&str, &str); 4] = [
    ("````markdown", "````"),
    ("````json", "````"),
    ("```markdown", "```"),
    ("```json", "```"),
];

/// Strip code fencing from around `text` until a fixpoint, so the cleaning
/// is idempotent. Unclosed fences are left untouched.
pub fn strip_code_fence(text: &str) -> String {
    let mut current = text.trim().to_string();
    loop {
        let stripped = strip_one_fence(&current);
        if stripped == current {
            return current;
        }
        current = stripped;
    }
}

fn strip_one_fence(text: &str) -> String {
    for (opener, closer) in FENCES {
        if let Some(rest) = text.strip_prefix(opener) {
            if let Some(idx) = rest.rfind(closer) {
                return rest[..idx].trim().to_string();
            }
        }
    }
    // Generic block: drop the opener line (language tag included) and the
    // closing fence line.
    if text.starts_with("```") {
        let lines: Vec<&str> = text.lines().collect();
        if lines.len() > 2 {
            let last = lines[lines.len() - 1].trim();
            if last == "```" || last == "````" {
                return lines[1..lines.len() - 1].join("\n").trim().to_string();
            }
        }
    }
    text.trim().to_string()
}

/// Extract the payload string from a full upstream response, walking the
/// precedence list `answer` -> `data.outputs.*` -> `outputs.*`.
pub fn extract_answer(response: &Value) -> Option<String> {
    if let Some(answer) = response.get("answer").and_then(Value::as_str) {
        if !answer.trim().is_empty() {
            return Some(answer.to_string());
        }
    }

    let outputs = response
        .pointer("/data/outputs")
        .or_else(|| response.get("outputs"))?;

    for key in OUTPUT_KEYS {
        if let Some(value) = outputs.get(key) {
            if let Some(found) = adopt_output(key, value) {
                return Some(found);
            }
        }
    }

    // Fall back to the first non-empty string field.
    let object = outputs.as_object()?;
    for (key, value) in object {
        if let Some(text) = value.as_str() {
            if !text.trim().is_empty() {
                debug!(key = %key, "adopted answer from unrecognised outputs field");
                return Some(strip_code_fence(text));
            }
        }
    }
    None
}

fn adopt_output(key: &str, value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => {
            debug!(key = %key, "adopted answer from outputs field");
            Some(strip_code_fence(text))
        }
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
        _ => None,
    }
}

/// Parse an answer string into result rows.
///
/// Order of attempts: bare JSON array, concatenated fenced blocks, a single
/// fenced array. Returns `None` when nothing yields rows.
pub fn parse_result_items(answer: &str) -> Option<Vec<Value>> {
    if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(answer) {
        return Some(items);
    }

    if looks_multi_fenced(answer) {
        let items = parse_fenced_blocks(answer);
        if !items.is_empty() {
            return Some(items);
        }
    }

    match serde_json::from_str::<Value>(&strip_code_fence(answer)) {
        Ok(Value::Array(items)) => Some(items),
        _ => None,
    }
}

fn looks_multi_fenced(answer: &str) -> bool {
    answer.contains("}\n```\n```json\n{") || answer.matches("```json").count() > 1
}

/// Line scanner over concatenated fenced blocks: each block that parses as
/// JSON contributes one row. An unclosed final block is still collected.
fn parse_fenced_blocks(answer: &str) -> Vec<Value> {
    let mut items = Vec::new();
    let mut buffer = String::new();
    let mut in_block = false;

    for raw_line in answer.lines() {
        let line = raw_line.trim();
        if line == "```json" {
            in_block = true;
            buffer.clear();
        } else if line == "```" && in_block {
            in_block = false;
            push_parsed(&mut items, &buffer);
            buffer.clear();
        } else if in_block {
            buffer.push_str(line);
            buffer.push('\n');
        }
    }
    push_parsed(&mut items, &buffer);
    items
}

fn push_parsed(items: &mut Vec<Value>, buffer: &str) {
    if buffer.trim().is_empty() {
        return;
    }
    match serde_json::from_str::<Value>(buffer) {
        Ok(value) => items.push(value),
        Err(e) => debug!(error = %e, "skipping unparseable fenced block"),
    }
}

/// Resolve result rows for pagination: the extracted `answer` first, then
/// the `outputs` of the verbatim `full_response`.
pub fn extract_items(answer: Option<&str>, full_response: Option<&str>) -> Option<Vec<Value>> {
    if let Some(answer) = answer {
        if let Some(items) = parse_result_items(answer) {
            return Some(items);
        }
    }

    let full: Value = serde_json::from_str(full_response?).ok()?;
    let outputs = full.pointer("/data/outputs").or_else(|| full.get("outputs"))?;
    for key in OUTPUT_KEYS {
        match outputs.get(key) {
            Some(Value::String(text)) => {
                if let Ok(Value::Array(items)) =
                    serde_json::from_str::<Value>(&strip_code_fence(text))
                {
                    return Some(items);
                }
            }
            Some(Value::Array(items)) => return Some(items.clone()),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strip_json_fence() {
        assert_eq!(strip_code_fence("```json\n[1,2]\n```"), "[1,2]");
        assert_eq!(strip_code_fence("```\nplain\n```"), "plain");
        assert_eq!(strip_code_fence("````markdown\n# 标题\n````"), "# 标题");
    }

    #[test]
    fn test_strip_leaves_bare_text_alone() {
        assert_eq!(strip_code_fence("[1,2]"), "[1,2]");
        assert_eq!(strip_code_fence("  spaced  "), "spaced");
    }

    #[test]
    fn test_strip_is_idempotent() {
        for input in [
            "```json\n[1,2]\n```",
            "````markdown\n```json\n[]\n```\n````",
            "[1,2]",
            "```json\n{\"unclosed\": true",
            "```json\n{\"sn\":1}\n```\n```json\n{\"sn\":2}\n```",
        ] {
            let once = strip_code_fence(input);
            let twice = strip_code_fence(&once);
            assert_eq!(once, twice, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn test_unclosed_fence_untouched() {
        let input = "```json\n{\"sn\": 1}";
        assert_eq!(strip_code_fence(input), input);
    }

    #[test]
    fn test_extract_answer_prefers_top_level() {
        let response = json!({"answer": "hello", "outputs": {"answer": "other"}});
        assert_eq!(extract_answer(&response).unwrap(), "hello");
    }

    #[test]
    fn test_extract_answer_walks_data_outputs() {
        let response = json!({"data": {"outputs": {"审查意见": "```json\n[{\"sn\":1}]\n```"}}});
        assert_eq!(extract_answer(&response).unwrap(), "[{\"sn\":1}]");
    }

    #[test]
    fn test_extract_answer_key_precedence() {
        let response = json!({"outputs": {"content": "c", "result": "r", "answer": "a"}});
        assert_eq!(extract_answer(&response).unwrap(), "a");
    }

    #[test]
    fn test_extract_answer_first_nonempty_string_fallback() {
        let response = json!({"outputs": {"misc": "", "text": "something"}});
        assert_eq!(extract_answer(&response).unwrap(), "something");
    }

    #[test]
    fn test_extract_answer_empty_response() {
        assert!(extract_answer(&json!({})).is_none());
        assert!(extract_answer(&json!({"answer": "  "})).is_none());
    }

    #[test]
    fn test_parse_bare_array() {
        let items = parse_result_items(r#"[{"sn":1},{"sn":2}]"#).unwrap();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_parse_single_fenced_array() {
        let items = parse_result_items("```json\n[{\"sn\":1}]\n```").unwrap();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn test_parse_two_fenced_blocks() {
        let answer = "```json\n{\"sn\":1,\"sn_data\":\"a\"}\n```\n```json\n{\"sn\":2,\"sn_data\":\"b\"}\n```";
        let items = parse_result_items(answer).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["sn"], 1);
        assert_eq!(items[1]["sn_data"], "b");
    }

    #[test]
    fn test_parse_unclosed_final_block_still_collected() {
        let answer = "```json\n{\"sn\":1}\n```\n```json\n{\"sn\":2}";
        let items = parse_result_items(answer).unwrap();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_parse_plain_text_is_none() {
        assert!(parse_result_items("这不是JSON").is_none());
        assert!(parse_result_items("").is_none());
    }

    #[test]
    fn test_parse_bare_object_is_none() {
        // A single object is not a row list.
        assert!(parse_result_items(r#"{"sn":1}"#).is_none());
    }

    #[test]
    fn test_extract_items_falls_back_to_full_response() {
        let full = json!({
            "data": {"outputs": {"result": "```json\n[{\"sn\":3}]\n```"}}
        })
        .to_string();
        let items = extract_items(Some("not json"), Some(&full)).unwrap();
        assert_eq!(items[0]["sn"], 3);
    }

    #[test]
    fn test_extract_items_accepts_inline_array_output() {
        let full = json!({"outputs": {"answer": [{"sn": 7}]}}).to_string();
        let items = extract_items(None, Some(&full)).unwrap();
        assert_eq!(items[0]["sn"], 7);
    }
}

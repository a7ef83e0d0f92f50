//! Query-parameter validation for the pass-through endpoints, applied
//! before anything is forwarded.

use std::collections::HashMap;

fn clamp_limit(raw: Option<&String>) -> String {
    let limit = raw
        .and_then(|v| v.trim().parse::<i64>().ok())
        .unwrap_or(20);
    let limit = if limit <= 0 {
        20
    } else if limit > 100 {
        100
    } else {
        limit
    };
    limit.to_string()
}

fn push_optional(
    cleaned: &mut Vec<(String, String)>,
    params: &HashMap<String, String>,
    name: &str,
) {
    if let Some(value) = params.get(name) {
        let value = value.trim();
        if !value.is_empty() {
            cleaned.push((name.to_string(), value.to_string()));
        }
    }
}

fn require_user(
    cleaned: &mut Vec<(String, String)>,
    params: &HashMap<String, String>,
    errors: &mut Vec<String>,
) {
    match params.get("user").map(|u| u.trim()).filter(|u| !u.is_empty()) {
        Some(user) => cleaned.push(("user".to_string(), user.to_string())),
        None => errors.push("缺少必需参数: user".to_string()),
    }
}

/// Validate conversation-list parameters: `user` required, `limit` clamped
/// to `[1, 100]` (default 20), `last_id` optional.
pub fn validate_conversation_params(
    params: &HashMap<String, String>,
) -> Result<Vec<(String, String)>, Vec<String>> {
    let mut cleaned = Vec::new();
    let mut errors = Vec::new();

    require_user(&mut cleaned, params, &mut errors);
    cleaned.push(("limit".to_string(), clamp_limit(params.get("limit"))));
    push_optional(&mut cleaned, params, "last_id");

    if errors.is_empty() {
        Ok(cleaned)
    } else {
        Err(errors)
    }
}

/// Validate message-history parameters: `user` required, `limit` clamped,
/// `conversation_id` and `first_id` optional.
pub fn validate_message_params(
    params: &HashMap<String, String>,
) -> Result<Vec<(String, String)>, Vec<String>> {
    let mut cleaned = Vec::new();
    let mut errors = Vec::new();

    require_user(&mut cleaned, params, &mut errors);
    cleaned.push(("limit".to_string(), clamp_limit(params.get("limit"))));
    push_optional(&mut cleaned, params, "conversation_id");
    push_optional(&mut cleaned, params, "first_id");

    if errors.is_empty() {
        Ok(cleaned)
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn get<'a>(cleaned: &'a [(String, String)], name: &str) -> Option<&'a str> {
        cleaned
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_user_is_required() {
        let errors = validate_conversation_params(&params(&[])).unwrap_err();
        assert_eq!(errors, vec!["缺少必需参数: user"]);
        assert!(validate_message_params(&params(&[("user", "  ")])).is_err());
    }

    #[test]
    fn test_limit_defaults_and_clamps() {
        let cleaned = validate_conversation_params(&params(&[("user", "u1")])).unwrap();
        assert_eq!(get(&cleaned, "limit"), Some("20"));

        let cleaned =
            validate_conversation_params(&params(&[("user", "u1"), ("limit", "500")])).unwrap();
        assert_eq!(get(&cleaned, "limit"), Some("100"));

        let cleaned =
            validate_conversation_params(&params(&[("user", "u1"), ("limit", "-3")])).unwrap();
        assert_eq!(get(&cleaned, "limit"), Some("20"));

        let cleaned =
            validate_conversation_params(&params(&[("user", "u1"), ("limit", "abc")])).unwrap();
        assert_eq!(get(&cleaned, "limit"), Some("20"));
    }

    #[test]
    fn test_optional_ids_are_trimmed_and_dropped_when_empty() {
        let cleaned = validate_message_params(&params(&[
            ("user", "u1"),
            ("conversation_id", " c-1 "),
            ("first_id", ""),
        ]))
        .unwrap();
        assert_eq!(get(&cleaned, "conversation_id"), Some("c-1"));
        assert_eq!(get(&cleaned, "first_id"), None);
    }
}

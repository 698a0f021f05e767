//! Common utility functions used across Foreman components

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

/// Generate a unique ID for conversations, requests, and other entities
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generate a short ID for display purposes (8 characters)
pub fn generate_short_id() -> String {
    Uuid::new_v4().to_string()[..8].to_string()
}

/// Get current UTC timestamp as milliseconds
pub fn current_timestamp_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Convert timestamp milliseconds to DateTime
pub fn timestamp_millis_to_datetime(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}

/// Truncate string to specified length with ellipsis
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        "...".to_string()
    } else {
        format!("{}...", &s[..max_len - 3])
    }
}

/// Render a `{{field}}` template against a JSON input.
///
/// `{{input}}` expands to the whole input serialized as JSON; `{{name}}`
/// expands to the top-level field `name` (strings render bare, everything
/// else as JSON). Unknown placeholders are left in place so a bad template
/// is visible in the log rather than silently blanked.
pub fn render_template(template: &str, input: &Value) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let key = after[..end].trim();
                match lookup_placeholder(key, input) {
                    Some(text) => out.push_str(&text),
                    None => {
                        out.push_str("{{");
                        out.push_str(&after[..end]);
                        out.push_str("}}");
                    }
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                return out;
            }
        }
    }
    out.push_str(rest);
    out
}

fn lookup_placeholder(key: &str, input: &Value) -> Option<String> {
    if key == "input" {
        return Some(input.to_string());
    }
    match input.get(key)? {
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_generate_ids() {
        let id1 = generate_id();
        let id2 = generate_id();
        assert_ne!(id1, id2);
        assert_eq!(id1.len(), 36); // UUID length

        let short_id = generate_short_id();
        assert_eq!(short_id.len(), 8);
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("hello", 10), "hello");
        assert_eq!(truncate_string("hello world", 8), "hello...");
        assert_eq!(truncate_string("hi", 1), "...");
    }

    #[test]
    fn test_render_template_fields() {
        let input = json!({"question": "2+2", "count": 3});
        assert_eq!(
            render_template("Solve {{question}} in {{count}} steps", &input),
            "Solve 2+2 in 3 steps"
        );
    }

    #[test]
    fn test_render_template_whole_input() {
        let input = json!({"a": 1});
        assert_eq!(render_template("got {{input}}", &input), "got {\"a\":1}");
    }

    #[test]
    fn test_render_template_unknown_placeholder_kept() {
        let input = json!({});
        assert_eq!(render_template("hi {{missing}}", &input), "hi {{missing}}");
    }

    #[test]
    fn test_timestamp_functions() {
        let millis = current_timestamp_millis();
        assert!(millis > 0);
        assert!(timestamp_millis_to_datetime(millis).is_some());
    }
}

use serde::{Deserialize, Deserializer};
use serde_json::Value;

// ===================================================================
// Hook Input (received via stdin, snake_case JSON)
// ===================================================================

/// The event payload Claude Code hands to the notifier on stdin.
///
/// Every field is optional: the same binary is registered for `Stop`,
/// `Notification` and `PostToolUse` events, and each of them carries a
/// different subset. Fields we don't use (`cwd`, `hook_event_name`,
/// `permission_mode`, ...) are ignored.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct SessionContext {
    #[serde(default, deserialize_with = "lenient_string")]
    pub session_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub transcript_path: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub tool_name: Option<String>,
    /// Raw tool input. Kept untyped so a tool with an unexpected shape
    /// can't reject the whole payload; see the accessors below.
    #[serde(default)]
    pub tool_input: Option<Value>,
    #[serde(default)]
    pub tool_response: Option<Value>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: Option<String>,
    /// Free-text annotation appended after the summary.
    #[serde(default, deserialize_with = "lenient_string")]
    pub message: Option<String>,
    /// Set by Claude Code when the Stop hook is re-invoked while a
    /// previous stop cycle is still in progress.
    #[serde(default, deserialize_with = "lenient_flag")]
    pub stop_hook_active: bool,
}

/// A string field; `null` or any non-string value reads as absent instead
/// of rejecting the payload.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

/// A flag that is set only by a literal `true`; `null` and other values
/// read as unset.
fn lenient_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(matches!(Value::deserialize(deserializer)?, Value::Bool(true)))
}

/// String field of a JSON object, `None` if absent or not a string.
fn str_field<'a>(value: Option<&'a Value>, field: &str) -> Option<&'a str> {
    value.and_then(|v| v.get(field)).and_then(|v| v.as_str())
}

impl SessionContext {
    pub fn tool_input_file_path(&self) -> Option<&str> {
        str_field(self.tool_input.as_ref(), "file_path")
    }

    pub fn tool_input_content(&self) -> Option<&str> {
        str_field(self.tool_input.as_ref(), "content")
    }

    /// `tool_response.filePath` (camelCase, unlike the rest of the payload).
    pub fn tool_response_file_path(&self) -> Option<&str> {
        str_field(self.tool_response.as_ref(), "filePath")
    }

    pub fn tool_success(&self) -> Option<bool> {
        self.tool_response
            .as_ref()
            .and_then(|v| v.get("success"))
            .and_then(|v| v.as_bool())
    }
}

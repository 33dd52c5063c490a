//! The uniform response envelope returned by every endpoint.
//!
//! Wire shape:
//!
//! ```text
//! {
//!   "success": bool,
//!   "messages": [{"type": "info"|"success"|"warn"|"error"|"debug", "message": string}],
//!   "data": any | null,
//!   "data_info"?: { ... }
//! }
//! ```
//!
//! An envelope is created per request, accumulates messages while the request
//! is processed, and is serialised exactly once at the HTTP boundary.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Severity of an envelope message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Info,
    Success,
    #[serde(rename = "warn")]
    Warning,
    Error,
    /// Only kept when the envelope runs in debug mode.
    Debug,
}

/// A single typed message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub message: String,
}

impl Message {
    pub fn new(kind: MessageKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Response envelope.
///
/// `success` starts out `false`; it only becomes `true` through
/// [`Envelope::mark_success`], so any construction path that never reaches a
/// success constructor serialises as a failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    success: bool,
    messages: Vec<Message>,
    data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data_info: Option<Map<String, Value>>,
    /// Debug mode of the process that owns this envelope. Never serialised.
    #[serde(skip)]
    debug: bool,
}

impl Default for Envelope {
    fn default() -> Self {
        Self::new()
    }
}

impl Envelope {
    /// Create an empty, failed envelope with debug messages disabled.
    pub fn new() -> Self {
        Self {
            success: false,
            messages: Vec::new(),
            data: Value::Null,
            data_info: None,
            debug: false,
        }
    }

    /// Create an empty envelope that keeps debug messages when `debug` is set.
    pub fn with_debug(debug: bool) -> Self {
        Self {
            debug,
            ..Self::new()
        }
    }

    /// Whether debug messages are kept.
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Append a message, preserving insertion order.
    ///
    /// Debug messages are dropped unless the envelope is in debug mode, in which
    /// case they are also emitted on the diagnostic log.
    pub fn add_message(&mut self, text: impl Into<String>, kind: MessageKind) {
        let text = text.into();
        if kind == MessageKind::Debug {
            if !self.debug {
                return;
            }
            tracing::debug!(message = %text, "envelope debug message");
        }
        self.messages.push(Message::new(kind, text));
    }

    /// Append several messages in order.
    pub fn add_messages<I, S>(&mut self, messages: I)
    where
        I: IntoIterator<Item = (MessageKind, S)>,
        S: Into<String>,
    {
        for (kind, text) in messages {
            self.add_message(text, kind);
        }
    }

    pub fn set_data(&mut self, data: Value) {
        self.data = data;
    }

    /// Replace the metadata block.
    pub fn set_data_info(&mut self, data_info: Map<String, Value>) {
        self.data_info = Some(data_info);
    }

    /// Insert one metadata key, creating the block if needed.
    pub fn insert_data_info(&mut self, key: impl Into<String>, value: Value) {
        self.data_info
            .get_or_insert_with(Map::new)
            .insert(key.into(), value);
    }

    pub fn mark_success(&mut self) {
        self.success = true;
    }

    pub fn mark_failure(&mut self) {
        self.success = false;
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn data_info(&self) -> Option<&Map<String, Value>> {
        self.data_info.as_ref()
    }

    /// Serialise to the canonical JSON shape.
    pub fn to_value(&self) -> Value {
        let mut out = Map::new();
        out.insert("success".into(), Value::Bool(self.success));
        out.insert(
            "messages".into(),
            Value::Array(
                self.messages
                    .iter()
                    .map(|m| {
                        let mut obj = Map::new();
                        obj.insert("type".into(), kind_value(m.kind));
                        obj.insert("message".into(), Value::String(m.message.clone()));
                        Value::Object(obj)
                    })
                    .collect(),
            ),
        );
        out.insert("data".into(), self.data.clone());
        if let Some(info) = &self.data_info {
            out.insert("data_info".into(), Value::Object(info.clone()));
        }
        Value::Object(out)
    }
}

fn kind_value(kind: MessageKind) -> Value {
    let s = match kind {
        MessageKind::Info => "info",
        MessageKind::Success => "success",
        MessageKind::Warning => "warn",
        MessageKind::Error => "error",
        MessageKind::Debug => "debug",
    };
    Value::String(s.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_envelope_is_a_failure_with_null_data() {
        let env = Envelope::new();
        assert_eq!(
            env.to_value(),
            json!({"success": false, "messages": [], "data": null})
        );
    }

    #[test]
    fn messages_keep_insertion_order() {
        let mut env = Envelope::new();
        env.add_message("first", MessageKind::Warning);
        env.add_message("second", MessageKind::Info);
        env.add_message("third", MessageKind::Error);
        let texts: Vec<_> = env.messages().iter().map(|m| m.message.as_str()).collect();
        assert_eq!(texts, ["first", "second", "third"]);
        assert_eq!(env.to_value()["messages"][0]["type"], "warn");
    }

    #[test]
    fn debug_messages_dropped_outside_debug_mode() {
        let mut env = Envelope::new();
        env.add_message("token not found", MessageKind::Debug);
        assert!(env.messages().is_empty());

        let mut env = Envelope::with_debug(true);
        env.add_message("token not found", MessageKind::Debug);
        assert_eq!(env.messages().len(), 1);
        assert_eq!(env.messages()[0].kind, MessageKind::Debug);
    }

    #[test]
    fn data_info_only_serialised_when_set() {
        let mut env = Envelope::new();
        env.mark_success();
        env.set_data(json!([1, 2]));
        assert!(env.to_value().get("data_info").is_none());

        env.insert_data_info("count", json!(2));
        env.insert_data_info("cache", json!("MISS"));
        assert_eq!(env.to_value()["data_info"], json!({"count": 2, "cache": "MISS"}));
    }

    #[test]
    fn serialised_envelope_parses_back_unchanged() {
        let mut env = Envelope::new();
        env.add_messages([(MessageKind::Success, "saved"), (MessageKind::Info, "note")]);
        env.set_data(json!({"id": "abc", "tags": ["x", "y"]}));
        env.mark_success();

        let text = serde_json::to_string(&env.to_value()).unwrap();
        let parsed: Envelope = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.is_success(), env.is_success());
        assert_eq!(parsed.messages(), env.messages());
        assert_eq!(parsed.data(), env.data());
    }

    #[test]
    fn mark_failure_overrides_success() {
        let mut env = Envelope::new();
        env.mark_success();
        env.mark_failure();
        assert!(!env.is_success());
    }
}

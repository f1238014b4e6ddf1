use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::snapshot::SnapshotId;

/// Key of the single entry used when an argument payload is not a JSON object.
pub const RAW_ARGUMENTS_KEY: &str = "raw";

/// A tool invocation extracted from model output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub tool_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub arguments: Map<String, Value>,
    /// Set when `arguments` is the `{"raw": payload}` fallback.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub raw_arguments: bool,
}

impl ToolCall {
    /// Arguments that were decoded as a JSON object.
    pub fn structured(
        tool_name: impl Into<String>,
        description: Option<String>,
        arguments: Map<String, Value>,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            description,
            arguments,
            raw_arguments: false,
        }
    }

    /// Arguments that could not be decoded; the payload is kept verbatim.
    pub fn raw(tool_name: impl Into<String>, description: Option<String>, payload: &str) -> Self {
        let mut arguments = Map::new();
        arguments.insert(RAW_ARGUMENTS_KEY.into(), Value::String(payload.to_string()));
        Self {
            tool_name: tool_name.into(),
            description,
            arguments,
            raw_arguments: true,
        }
    }

    /// The arguments as a JSON value.
    pub fn arguments_value(&self) -> Value {
        Value::Object(self.arguments.clone())
    }
}

/// A tool call as stored against the `llm_output` snapshot it came from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallRecord {
    pub snapshot_id: SnapshotId,
    pub sequence: u64,
    /// Position of the call within its snapshot's output.
    pub index: usize,
    #[serde(flatten)]
    pub call: ToolCall,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_fallback_shape() {
        let call = ToolCall::raw("image_gen", None, "{not valid json");
        assert!(call.raw_arguments);
        assert_eq!(
            call.arguments_value(),
            serde_json::json!({"raw": "{not valid json"})
        );
    }

    #[test]
    fn test_record_flattens_call() {
        let record = ToolCallRecord {
            snapshot_id: SnapshotId("abc".into()),
            sequence: 4,
            index: 0,
            call: ToolCall::structured(
                "quark_search",
                Some("search".into()),
                serde_json::json!({"search_query": "rust"})
                    .as_object()
                    .cloned()
                    .unwrap(),
            ),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["tool_name"], "quark_search");
        assert_eq!(json["arguments"]["search_query"], "rust");
        assert!(json.get("raw_arguments").is_none());
        let parsed: ToolCallRecord = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, record);
    }
}

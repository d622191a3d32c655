//! Conversation message model.
//!
//! Messages follow the generic tool-result shape used by AI SDK style
//! providers:
//!
//! ```json
//! {"role": "tool", "content": [
//!   {"type": "tool-result", "toolCallId": "call_1", "toolName": "search",
//!    "output": {"type": "json", "value": {"hits": 42}}}
//! ]}
//! ```
//!
//! Block types the core does not understand are kept as raw JSON and
//! round-trip unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// A single conversation message. Identity is positional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Content,
    /// Provider-specific fields, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Message {
    pub fn new(role: Role, content: Content) -> Self {
        Self {
            role,
            content,
            extra: Map::new(),
        }
    }

    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self::new(role, Content::Text(text.into()))
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::text(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::text(Role::Assistant, text)
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::text(Role::System, text)
    }

    /// A `tool` message carrying the given blocks.
    pub fn tool(blocks: Vec<ContentBlock>) -> Self {
        Self::new(Role::Tool, Content::Blocks(blocks))
    }

    /// Whether the message carries non-blank conversational text, either as a
    /// plain string or as a `text` block.
    pub fn has_text_content(&self) -> bool {
        match &self.content {
            Content::Text(text) => !text.trim().is_empty(),
            Content::Null => false,
            Content::Block(block) => block.is_non_empty_text(),
            Content::Blocks(blocks) => blocks.iter().any(ContentBlock::is_non_empty_text),
        }
    }

    /// Mutable access to every content block of the message.
    pub fn blocks_mut(&mut self) -> &mut [ContentBlock] {
        match &mut self.content {
            Content::Text(_) | Content::Null => &mut [],
            Content::Block(block) => std::slice::from_mut(block.as_mut()),
            Content::Blocks(blocks) => blocks.as_mut_slice(),
        }
    }

    /// Every content block of the message.
    pub fn blocks(&self) -> &[ContentBlock] {
        match &self.content {
            Content::Text(_) | Content::Null => &[],
            Content::Block(block) => std::slice::from_ref(block.as_ref()),
            Content::Blocks(blocks) => blocks.as_slice(),
        }
    }
}

/// Message content: plain text, a list of blocks, `null`, or a single block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Blocks(Vec<ContentBlock>),
    /// `"content": null`, as sent on assistant turns that only call tools.
    Null,
    Block(Box<ContentBlock>),
}

/// A content block inside a message.
///
/// Only `text`, `tool-call` and `tool-result` are interpreted; everything
/// else (and any of those that fail to parse) is kept as [`ContentBlock::Other`].
/// Fields the model does not name are kept in `extra` and written back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum ContentBlock {
    Text {
        text: String,
        extra: Map<String, Value>,
    },
    ToolCall(ToolCall),
    ToolResult(ToolResult),
    Other(Value),
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text {
            text: text.into(),
            extra: Map::new(),
        }
    }

    fn is_non_empty_text(&self) -> bool {
        matches!(self, ContentBlock::Text { text, .. } if !text.trim().is_empty())
    }

    pub fn as_tool_result(&self) -> Option<&ToolResult> {
        match self {
            ContentBlock::ToolResult(result) => Some(result),
            _ => None,
        }
    }
}

impl TryFrom<Value> for ContentBlock {
    type Error = std::convert::Infallible;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let block_type = value.get("type").and_then(Value::as_str);
        let parsed = match block_type {
            Some("text") => parse_text_block(&value),
            Some("tool-call") => serde_json::from_value::<ToolCall>(value.clone())
                .ok()
                .map(|mut call| {
                    call.extra.remove("type");
                    ContentBlock::ToolCall(call)
                }),
            Some("tool-result") => serde_json::from_value::<ToolResult>(value.clone())
                .ok()
                .map(|mut result| {
                    result.extra.remove("type");
                    ContentBlock::ToolResult(result)
                }),
            _ => None,
        };
        Ok(parsed.unwrap_or(ContentBlock::Other(value)))
    }
}

fn parse_text_block(value: &Value) -> Option<ContentBlock> {
    let mut extra = value.as_object()?.clone();
    let Some(Value::String(text)) = extra.remove("text") else {
        return None;
    };
    extra.remove("type");
    Some(ContentBlock::Text { text, extra })
}

impl From<ContentBlock> for Value {
    fn from(block: ContentBlock) -> Self {
        match block {
            ContentBlock::Text { text, mut extra } => {
                extra.insert("type".to_string(), Value::String("text".to_string()));
                extra.insert("text".to_string(), Value::String(text));
                Value::Object(extra)
            }
            ContentBlock::ToolCall(call) => tagged("tool-call", &call),
            ContentBlock::ToolResult(result) => tagged("tool-result", &result),
            ContentBlock::Other(value) => value,
        }
    }
}

fn tagged<T: Serialize>(block_type: &str, body: &T) -> Value {
    let mut value = serde_json::to_value(body).unwrap_or(Value::Null);
    if let Value::Object(map) = &mut value {
        map.insert("type".to_string(), Value::String(block_type.to_string()));
    }
    value
}

/// A tool invocation requested by the assistant. `input` and any other
/// provider fields stay in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ToolCall {
    pub fn input(&self) -> Option<&Value> {
        self.extra.get("input")
    }
}

/// The result of a tool invocation. This is the block the engine compacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    pub output: ToolResultOutput,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ToolResult {
    pub fn new(tool_name: impl Into<String>, output: ToolResultOutput) -> Self {
        Self {
            tool_name: Some(tool_name.into()),
            tool_call_id: None,
            output,
            extra: Map::new(),
        }
    }

    pub fn with_call_id(mut self, id: impl Into<String>) -> Self {
        self.tool_call_id = Some(id.into());
        self
    }

    /// The tool name, or `""` when the block carries none.
    pub fn tool_name(&self) -> &str {
        self.tool_name.as_deref().unwrap_or_default()
    }
}

/// Output payload of a tool result.
///
/// `extra` holds fields beside `type` and `value` (provider options and the
/// like). A `text` output written with a `text` field instead of `value` is
/// written back the same way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum ToolResultOutput {
    Text {
        value: String,
        extra: Map<String, Value>,
        text_field: bool,
    },
    Json {
        value: Value,
        extra: Map<String, Value>,
    },
    ErrorText {
        value: String,
        extra: Map<String, Value>,
    },
    ErrorJson {
        value: Value,
        extra: Map<String, Value>,
    },
}

impl ToolResultOutput {
    pub fn text(value: impl Into<String>) -> Self {
        ToolResultOutput::Text {
            value: value.into(),
            extra: Map::new(),
            text_field: false,
        }
    }

    pub fn json(value: Value) -> Self {
        ToolResultOutput::Json {
            value,
            extra: Map::new(),
        }
    }

    pub fn error_text(value: impl Into<String>) -> Self {
        ToolResultOutput::ErrorText {
            value: value.into(),
            extra: Map::new(),
        }
    }

    pub fn error_json(value: Value) -> Self {
        ToolResultOutput::ErrorJson {
            value,
            extra: Map::new(),
        }
    }

    pub fn extra(&self) -> &Map<String, Value> {
        match self {
            ToolResultOutput::Text { extra, .. }
            | ToolResultOutput::Json { extra, .. }
            | ToolResultOutput::ErrorText { extra, .. }
            | ToolResultOutput::ErrorJson { extra, .. } => extra,
        }
    }

    pub fn with_extra(mut self, fields: Map<String, Value>) -> Self {
        match &mut self {
            ToolResultOutput::Text { extra, .. }
            | ToolResultOutput::Json { extra, .. }
            | ToolResultOutput::ErrorText { extra, .. }
            | ToolResultOutput::ErrorJson { extra, .. } => *extra = fields,
        }
        self
    }

    /// The textual rendering used to look for existing references.
    pub fn rendered(&self) -> String {
        match self {
            ToolResultOutput::Text { value, .. } | ToolResultOutput::ErrorText { value, .. } => {
                value.clone()
            }
            ToolResultOutput::Json { value, .. } | ToolResultOutput::ErrorJson { value, .. } => {
                match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                }
            }
        }
    }
}

impl TryFrom<Value> for ToolResultOutput {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let Value::Object(mut extra) = value else {
            return Err("tool result output must be an object".to_string());
        };
        let kind = match extra.remove("type") {
            Some(Value::String(kind)) => kind,
            _ => return Err("tool result output has no type".to_string()),
        };

        match kind.as_str() {
            "text" | "error-text" => {
                let (value, text_field) = match (extra.remove("value"), kind.as_str()) {
                    (Some(Value::String(value)), _) => (value, false),
                    (None, "text") => match extra.remove("text") {
                        Some(Value::String(value)) => (value, true),
                        _ => return Err("text output has no string value".to_string()),
                    },
                    _ => return Err(format!("{} output has no string value", kind)),
                };
                Ok(if kind == "text" {
                    ToolResultOutput::Text {
                        value,
                        extra,
                        text_field,
                    }
                } else {
                    ToolResultOutput::ErrorText { value, extra }
                })
            }
            "json" | "error-json" => {
                let value = extra
                    .remove("value")
                    .ok_or_else(|| format!("{} output has no value", kind))?;
                Ok(if kind == "json" {
                    ToolResultOutput::Json { value, extra }
                } else {
                    ToolResultOutput::ErrorJson { value, extra }
                })
            }
            other => Err(format!("unknown tool result output type '{}'", other)),
        }
    }
}

impl From<ToolResultOutput> for Value {
    fn from(output: ToolResultOutput) -> Self {
        let (kind, field, value, mut extra) = match output {
            ToolResultOutput::Text {
                value,
                extra,
                text_field,
            } => (
                "text",
                if text_field { "text" } else { "value" },
                Value::String(value),
                extra,
            ),
            ToolResultOutput::Json { value, extra } => ("json", "value", value, extra),
            ToolResultOutput::ErrorText { value, extra } => {
                ("error-text", "value", Value::String(value), extra)
            }
            ToolResultOutput::ErrorJson { value, extra } => ("error-json", "value", value, extra),
        };
        extra.insert("type".to_string(), Value::String(kind.to_string()));
        extra.insert(field.to_string(), value);
        Value::Object(extra)
    }
}

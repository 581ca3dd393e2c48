use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    User,
    Assistant,
    #[default]
    #[serde(other)]
    Other,
}

impl EntryKind {
    fn from_label(raw: &str) -> Self {
        match raw {
            "user" => Self::User,
            "assistant" => Self::Assistant,
            _ => Self::Other,
        }
    }
}

/// One typed block inside an array-shaped `content` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Payload of `tool_result` blocks: a string or a nested block list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
}

impl ContentBlock {
    pub fn is_text(&self) -> bool {
        self.kind == "text"
    }

    pub fn is_tool_result(&self) -> bool {
        self.kind == "tool_result"
    }

    /// Plain text carried by a `tool_result` payload.
    pub fn tool_result_text(&self) -> Option<String> {
        match self.content.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Array(items) => {
                let parts: Vec<&str> = items
                    .iter()
                    .filter(|item| item.get("type").and_then(Value::as_str) == Some("text"))
                    .filter_map(|item| item.get("text").and_then(Value::as_str))
                    .collect();
                if parts.is_empty() {
                    None
                } else {
                    Some(parts.join("\n"))
                }
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl Default for Content {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl Content {
    /// Concatenated text of a plain string or of the `text` blocks.
    pub fn text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Blocks(blocks) => blocks
                .iter()
                .filter(|b| b.is_text())
                .filter_map(|b| b.text.as_deref())
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    pub fn blocks(&self) -> &[ContentBlock] {
        match self {
            Self::Text(_) => &[],
            Self::Blocks(blocks) => blocks,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(rename = "type", default)]
    pub kind: EntryKind,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub content: Content,
}

impl LogEntry {
    /// Build an entry from one raw interaction-log record.
    ///
    /// `content` is read from `message.content` when the record nests its
    /// payload, and from a top-level `content` field otherwise.
    pub fn from_record(record: &Value) -> Result<Self, String> {
        let obj = record
            .as_object()
            .ok_or_else(|| "record is not a JSON object".to_string())?;
        let kind = obj
            .get("type")
            .and_then(Value::as_str)
            .map(EntryKind::from_label)
            .ok_or_else(|| "record has no `type`".to_string())?;
        let timestamp = obj
            .get("timestamp")
            .and_then(Value::as_str)
            .ok_or_else(|| "record has no `timestamp`".to_string())?
            .to_string();

        let raw_content = obj
            .get("message")
            .and_then(|m| m.get("content"))
            .or_else(|| obj.get("content"));
        let content = match raw_content {
            None | Some(Value::Null) => Content::default(),
            Some(value) => serde_json::from_value::<Content>(value.clone())
                .map_err(|err| format!("unsupported content shape: {err}"))?,
        };

        Ok(Self {
            kind,
            timestamp,
            content,
        })
    }

    pub fn parse_line(line: &str) -> Result<Self, String> {
        let record: Value = serde_json::from_str(line).map_err(|err| err.to_string())?;
        Self::from_record(&record)
    }
}

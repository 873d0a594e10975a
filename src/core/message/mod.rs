//! Worker message model and the two wire forms workers may speak.
//!
//! Structured workers print one JSON object per line:
//! `{"kind":"result","fields":["a","b"]}`. Legacy workers print
//! `<toolName><"Error: "?><payload>` with tab separated payload fields.
use crate::core::types::MessageKind;
use serde::{Deserialize, Serialize};

/// Marker that classifies a legacy line as an error.
pub const ERROR_MARKER: &str = "Error: ";

/// One item outcome reported by a worker, already attributed to a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultMessage {
    pub tool: String,
    pub kind: MessageKind,
    pub fields: Vec<String>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MessageParseError {
    #[error("empty line")]
    Empty,
    #[error("line is not attributed to tool {0}")]
    Unattributed(String),
    #[error("malformed structured message: {0}")]
    Malformed(String),
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    kind: MessageKind,
    #[serde(default)]
    fields: Vec<String>,
    #[serde(default)]
    tool: Option<String>,
}

impl ResultMessage {
    pub fn result(tool: impl Into<String>, fields: Vec<String>) -> Self {
        ResultMessage {
            tool: tool.into(),
            kind: MessageKind::Result,
            fields,
        }
    }

    pub fn error(tool: impl Into<String>, fields: Vec<String>) -> Self {
        ResultMessage {
            tool: tool.into(),
            kind: MessageKind::Error,
            fields,
        }
    }

    /// Parse a line emitted by a worker of `tool`.
    ///
    /// JSON lines are attributed to `tool` unless they name a different tool.
    /// Legacy lines must contain the tool name; the first occurrence is
    /// stripped and the rest is split on tabs.
    pub fn parse_line(tool: &str, line: &str) -> Result<Self, MessageParseError> {
        let line = line.trim_end_matches(&['\r', '\n'][..]);
        if line.trim().is_empty() {
            return Err(MessageParseError::Empty);
        }

        if line.trim_start().starts_with('{') {
            return Self::parse_structured(tool, line);
        }

        Self::parse_legacy(tool, line)
    }

    fn parse_structured(tool: &str, line: &str) -> Result<Self, MessageParseError> {
        let wire: WireMessage = serde_json::from_str(line)
            .map_err(|e| MessageParseError::Malformed(e.to_string()))?;
        if let Some(named) = wire.tool {
            if named != tool {
                return Err(MessageParseError::Unattributed(tool.to_string()));
            }
        }
        Ok(ResultMessage {
            tool: tool.to_string(),
            kind: wire.kind,
            fields: wire.fields,
        })
    }

    fn parse_legacy(tool: &str, line: &str) -> Result<Self, MessageParseError> {
        if tool.is_empty() {
            return Err(MessageParseError::Unattributed(String::new()));
        }
        let Some(position) = line.find(tool) else {
            return Err(MessageParseError::Unattributed(tool.to_string()));
        };

        let mut payload = String::with_capacity(line.len() - tool.len());
        payload.push_str(&line[..position]);
        payload.push_str(&line[position + tool.len()..]);

        let kind = if line.contains(ERROR_MARKER) {
            MessageKind::Error
        } else {
            MessageKind::Result
        };
        let fields = payload.split('\t').map(str::to_string).collect();

        Ok(ResultMessage {
            tool: tool.to_string(),
            kind,
            fields,
        })
    }

    /// Render as a legacy line, the form the bundled simulator prints by default.
    pub fn to_legacy_line(&self) -> String {
        let body = self.fields.join("\t");
        match self.kind {
            MessageKind::Result => format!("{}{}", self.tool, body),
            MessageKind::Error => format!("{}{}{}", self.tool, ERROR_MARKER, body),
        }
    }

    /// Render as a structured JSON line.
    pub fn to_json_line(&self) -> String {
        serde_json::json!({
            "tool": self.tool,
            "kind": self.kind,
            "fields": self.fields,
        })
        .to_string()
    }

    /// Display row: `"<ordinal>: field | field | ..."`.
    pub fn display_row(&self, ordinal: usize) -> String {
        format!("{}: {}", ordinal, self.fields.join(" | "))
    }
}

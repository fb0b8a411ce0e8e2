//! Conversation records shared by the server pipeline and the chat client.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// Tools the assistant can invoke, with their wire names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
pub enum ToolName {
    #[serde(rename = "getWeather")]
    #[strum(serialize = "getWeather")]
    GetWeather,
    #[serde(rename = "getF1Results")]
    #[strum(serialize = "getF1Results")]
    GetF1Results,
    #[serde(rename = "getStockPrice")]
    #[strum(serialize = "getStockPrice")]
    GetStockPrice,
}

/// Structured tool record attached to an assistant message.
///
/// `result` is either the tool's normalized payload or its unavailable marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInvocation {
    pub tool_name: ToolName,
    pub args: serde_json::Map<String, serde_json::Value>,
    pub result: serde_json::Value,
}

/// One message of a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMessage {
    #[serde(default)]
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_invocations: Vec<ToolInvocation>,
    /// Assistant placeholder that has not received any content yet
    #[serde(default, skip_serializing)]
    pub is_thinking: bool,
}

impl ConversationMessage {
    pub fn user(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::User,
            content: content.into(),
            tool_invocations: Vec::new(),
            is_thinking: false,
        }
    }

    pub fn assistant(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Assistant,
            content: content.into(),
            tool_invocations: Vec::new(),
            is_thinking: false,
        }
    }

    /// Whether this message talks about the weather, in text or as a tool card
    pub fn mentions_weather(&self) -> bool {
        self.content.to_lowercase().contains("weather")
            || self
                .tool_invocations
                .iter()
                .any(|inv| inv.tool_name == ToolName::GetWeather)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_names_use_wire_spelling() {
        assert_eq!(ToolName::GetF1Results.to_string(), "getF1Results");
        assert_eq!(
            serde_json::to_string(&ToolName::GetStockPrice).unwrap(),
            "\"getStockPrice\""
        );
        assert_eq!(
            "getWeather".parse::<ToolName>().unwrap(),
            ToolName::GetWeather
        );
    }

    #[test]
    fn test_request_messages_without_ids_deserialize() {
        let msg: ConversationMessage =
            serde_json::from_str(r#"{"role":"user","content":"hi"}"#).unwrap();
        assert_eq!(msg.role, Role::User);
        assert!(msg.id.is_empty());
        assert!(msg.tool_invocations.is_empty());
        assert!(!msg.is_thinking);
    }

    #[test]
    fn test_weather_mention_via_tool_card() {
        let mut msg = ConversationMessage::assistant("a1", "Here you go:");
        assert!(!msg.mentions_weather());
        msg.tool_invocations.push(ToolInvocation {
            tool_name: ToolName::GetWeather,
            args: serde_json::Map::new(),
            result: serde_json::json!({}),
        });
        assert!(msg.mentions_weather());
    }
}

//! Compaction window boundaries.

use crate::errors::ConfigError;
use crate::message::{Message, Role};
use serde::{Deserialize, Serialize};

/// Controls where the compaction window starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Boundary {
    /// Start right after the most recent user/assistant message with text.
    #[default]
    SinceLastAssistantOrUserText,
    /// Start at the beginning of the conversation.
    EntireConversation,
    /// Keep the first `count` messages intact.
    FirstNMessages { count: usize },
}

impl Boundary {
    /// Index of the first message eligible for compaction (`0..=messages.len()`).
    pub fn window_start(&self, messages: &[Message]) -> usize {
        match self {
            Boundary::EntireConversation => 0,
            Boundary::FirstNMessages { count } => (*count).min(messages.len()),
            Boundary::SinceLastAssistantOrUserText => messages
                .iter()
                .rposition(is_conversational_turn)
                .map(|i| i + 1)
                .unwrap_or(0),
        }
    }
}

fn is_conversational_turn(message: &Message) -> bool {
    matches!(message.role, Role::Assistant | Role::User) && message.has_text_content()
}

impl std::fmt::Display for Boundary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Boundary::SinceLastAssistantOrUserText => write!(f, "since-last-assistant-or-user-text"),
            Boundary::EntireConversation => write!(f, "entire-conversation"),
            Boundary::FirstNMessages { count } => write!(f, "first-n-messages:{}", count),
        }
    }
}

impl std::str::FromStr for Boundary {
    type Err = ConfigError;

    /// Accepts `since-last-assistant-or-user-text`, `entire-conversation`,
    /// and `first-n-messages:<count>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "since-last-assistant-or-user-text" => Ok(Boundary::SinceLastAssistantOrUserText),
            "entire-conversation" => Ok(Boundary::EntireConversation),
            _ => {
                let count = s
                    .strip_prefix("first-n-messages:")
                    .ok_or_else(|| ConfigError::InvalidBoundary(s.to_string()))?;
                let count = count.trim().parse::<usize>().map_err(|_| {
                    ConfigError::InvalidBoundary(format!(
                        "first-n-messages count must be a non-negative integer, got '{}'",
                        count
                    ))
                })?;
                Ok(Boundary::FirstNMessages { count })
            }
        }
    }
}

/// Serialized boundary: either a policy name or
/// `{ type = "first-n-messages", count = N }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BoundarySpec {
    Named(String),
    Typed {
        #[serde(rename = "type")]
        kind: String,
        #[serde(default)]
        count: Option<i64>,
    },
}

impl TryFrom<BoundarySpec> for Boundary {
    type Error = ConfigError;

    fn try_from(spec: BoundarySpec) -> Result<Self, Self::Error> {
        match spec {
            BoundarySpec::Named(name) => name.parse(),
            BoundarySpec::Typed { kind, count } => match (kind.as_str(), count) {
                ("first-n-messages", Some(count)) => usize::try_from(count)
                    .map(|count| Boundary::FirstNMessages { count })
                    .map_err(|_| {
                        ConfigError::InvalidBoundary(format!(
                            "first-n-messages count must be non-negative, got {}",
                            count
                        ))
                    }),
                ("first-n-messages", None) => Err(ConfigError::InvalidBoundary(
                    "first-n-messages requires a count".to_string(),
                )),
                (other, _) => other.parse(),
            },
        }
    }
}

impl From<Boundary> for BoundarySpec {
    fn from(boundary: Boundary) -> Self {
        match boundary {
            Boundary::FirstNMessages { count } => BoundarySpec::Typed {
                kind: "first-n-messages".to_string(),
                count: Some(count as i64),
            },
            other => BoundarySpec::Named(other.to_string()),
        }
    }
}

//! Outcome records persisted once per run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::run::FRAGMENT_TITLE;
use super::state::{FileMap, IterationState};
use crate::id::{generate_fragment_id, generate_message_id};

/// The only text a user sees when a run fails.
pub const APOLOGY_MESSAGE: &str = "Something went wrong. Please try again.";

/// Author of a persisted message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(MessageRole::User),
            "assistant" => Some(MessageRole::Assistant),
            _ => None,
        }
    }
}

/// Kind of a persisted message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Result,
    Error,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Result => "result",
            MessageType::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "result" => Some(MessageType::Result),
            "error" => Some(MessageType::Error),
            _ => None,
        }
    }
}

/// Generated code attached to a successful outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fragment {
    pub id: String,
    pub sandbox_url: String,
    pub title: String,
    pub files: FileMap,
    pub summary: String,
}

/// A message row, optionally owning a fragment.
///
/// Outcome records are assistant messages; user prompts share the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeRecord {
    pub id: String,
    pub conversation_id: String,
    pub role: MessageRole,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub content: String,
    pub fragment: Option<Fragment>,
    pub created_at: DateTime<Utc>,
}

impl OutcomeRecord {
    /// Build the outcome for a finished run from a snapshot of its state.
    ///
    /// A blank summary always yields an `error` record without a fragment.
    pub fn from_state(conversation_id: &str, state: &IterationState, sandbox_url: &str) -> Self {
        if !state.is_complete() {
            return Self::failure(conversation_id);
        }

        let summary = state.summary.trim().to_string();
        Self {
            id: generate_message_id(),
            conversation_id: conversation_id.to_string(),
            role: MessageRole::Assistant,
            message_type: MessageType::Result,
            content: summary.clone(),
            fragment: Some(Fragment {
                id: generate_fragment_id(),
                sandbox_url: sandbox_url.to_string(),
                title: FRAGMENT_TITLE.to_string(),
                files: state.files.clone(),
                summary,
            }),
            created_at: Utc::now(),
        }
    }

    /// The fixed apology outcome.
    pub fn failure(conversation_id: &str) -> Self {
        Self {
            id: generate_message_id(),
            conversation_id: conversation_id.to_string(),
            role: MessageRole::Assistant,
            message_type: MessageType::Error,
            content: APOLOGY_MESSAGE.to_string(),
            fragment: None,
            created_at: Utc::now(),
        }
    }

    /// A user prompt as recorded by the request layer.
    pub fn user_prompt(conversation_id: &str, content: &str) -> Self {
        Self {
            id: generate_message_id(),
            conversation_id: conversation_id.to_string(),
            role: MessageRole::User,
            message_type: MessageType::Result,
            content: content.to_string(),
            fragment: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.message_type == MessageType::Error
    }
}

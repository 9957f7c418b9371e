//! Conversation history replayed to the model at the start of a run.

use serde::{Deserialize, Serialize};

use super::outcome::MessageRole;
use crate::llm::{Message, Role};

/// One prior turn of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: MessageRole,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

fn to_role(role: MessageRole) -> Role {
    match role {
        MessageRole::User => Role::User,
        MessageRole::Assistant => Role::Assistant,
    }
}

/// Build the opening conversation for a run: prior turns (oldest first) then the prompt.
///
/// The request layer persists the prompt before triggering the run, so a trailing
/// user turn equal to the prompt is dropped rather than sent twice. The result
/// starts with a user message and alternates roles; adjacent turns of the same
/// role are joined.
pub fn build_conversation(turns: &[ConversationTurn], prompt: &str) -> Vec<Message> {
    let mut prior: Vec<&ConversationTurn> = turns.iter().collect();
    if let Some(last) = prior.last() {
        if last.role == MessageRole::User && last.content.trim() == prompt.trim() {
            prior.pop();
        }
    }

    let mut merged: Vec<(Role, String)> = Vec::new();
    let entries = prior
        .into_iter()
        .map(|t| (to_role(t.role), t.content.as_str()))
        .chain(std::iter::once((Role::User, prompt)));

    for (role, content) in entries {
        if merged.is_empty() && role == Role::Assistant {
            continue;
        }
        match merged.last_mut() {
            Some((last_role, text)) if *last_role == role => {
                text.push_str("\n\n");
                text.push_str(content);
            }
            _ => merged.push((role, content.to_string())),
        }
    }

    merged
        .into_iter()
        .map(|(role, content)| match role {
            Role::User => Message::user(content),
            Role::Assistant => Message::assistant(content),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_only() {
        let messages = build_conversation(&[], "add a README");
        assert_eq!(messages, vec![Message::user("add a README")]);
    }

    #[test]
    fn test_prior_turns_precede_prompt() {
        let turns = vec![
            ConversationTurn::user("make a todo app"),
            ConversationTurn::assistant("Built a todo app"),
        ];
        let messages = build_conversation(&turns, "add dark mode");

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].text(), "make a todo app");
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[2].text(), "add dark mode");
    }

    #[test]
    fn test_persisted_prompt_is_not_duplicated() {
        let turns = vec![
            ConversationTurn::user("first"),
            ConversationTurn::assistant("done"),
            ConversationTurn::user("second"),
        ];
        let messages = build_conversation(&turns, "second");

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[2].text(), "second");
    }

    #[test]
    fn test_leading_assistant_turns_are_dropped() {
        let turns = vec![
            ConversationTurn::assistant("orphaned reply"),
            ConversationTurn::user("hello"),
            ConversationTurn::assistant("hi"),
        ];
        let messages = build_conversation(&turns, "next");

        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].text(), "hello");
        assert_eq!(messages.len(), 3);
    }

    #[test]
    fn test_adjacent_same_role_turns_are_joined() {
        let turns = vec![
            ConversationTurn::user("attempt one"),
            ConversationTurn::user("attempt two"),
        ];
        let messages = build_conversation(&turns, "attempt three");

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text(), "attempt one\n\nattempt two\n\nattempt three");
    }
}

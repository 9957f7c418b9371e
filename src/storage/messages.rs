//! Message and fragment persistence.

use chrono::DateTime;
use rusqlite::params;

use super::Database;
use crate::domain::{ConversationTurn, FileMap, Fragment, MessageRole, MessageType, OutcomeRecord};
use crate::error::{Result, SandloopError};

/// Durable store for conversation messages and their fragments.
pub trait MessageStore: Send + Sync {
    /// Insert a message together with its fragment, atomically.
    fn insert_message(&self, record: &OutcomeRecord) -> Result<()>;

    /// The latest `limit` turns of a conversation, oldest first.
    fn load_history(&self, conversation_id: &str, limit: usize) -> Result<Vec<ConversationTurn>>;

    /// Every message of a conversation with its fragment, oldest first.
    fn messages(&self, conversation_id: &str) -> Result<Vec<OutcomeRecord>>;
}

impl MessageStore for Database {
    fn insert_message(&self, record: &OutcomeRecord) -> Result<()> {
        if let Some(fragment) = &record.fragment {
            if fragment.summary.trim().is_empty() {
                return Err(SandloopError::Storage(format!(
                    "fragment {} has no summary",
                    fragment.id
                )));
            }
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO messages (id, conversation_id, role, type, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.id,
                record.conversation_id,
                record.role.as_str(),
                record.message_type.as_str(),
                record.content,
                record.created_at.timestamp_millis()
            ],
        )?;

        if let Some(fragment) = &record.fragment {
            tx.execute(
                "INSERT INTO fragments (id, message_id, sandbox_url, title, files, summary)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    fragment.id,
                    record.id,
                    fragment.sandbox_url,
                    fragment.title,
                    serde_json::to_string(&fragment.files)?,
                    fragment.summary
                ],
            )?;
        }

        tx.commit()?;
        log::debug!(
            "Stored {} {} message {} for conversation {}",
            record.role.as_str(),
            record.message_type.as_str(),
            record.id,
            record.conversation_id
        );
        Ok(())
    }

    fn load_history(&self, conversation_id: &str, limit: usize) -> Result<Vec<ConversationTurn>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT role, content FROM messages
             WHERE conversation_id = ?1
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![conversation_id, limit as i64], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut turns = Vec::new();
        for row in rows {
            let (role, content) = row?;
            let role = MessageRole::parse(&role)
                .ok_or_else(|| SandloopError::Storage(format!("unknown role: {}", role)))?;
            turns.push(ConversationTurn { role, content });
        }

        // Stored newest-first; the model needs oldest-first
        turns.reverse();
        Ok(turns)
    }

    fn messages(&self, conversation_id: &str) -> Result<Vec<OutcomeRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT m.id, m.role, m.type, m.content, m.created_at,
                    f.id, f.sandbox_url, f.title, f.files, f.summary
             FROM messages m
             LEFT JOIN fragments f ON f.message_id = m.id
             WHERE m.conversation_id = ?1
             ORDER BY m.created_at, m.rowid",
        )?;

        let rows = stmt.query_map(params![conversation_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, Option<String>>(6)?,
                row.get::<_, Option<String>>(7)?,
                row.get::<_, Option<String>>(8)?,
                row.get::<_, Option<String>>(9)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, role, kind, content, created_at, fid, url, title, files, summary) = row?;

            let fragment = match (fid, url, title, files, summary) {
                (Some(fid), Some(sandbox_url), Some(title), Some(files), Some(summary)) => Some(Fragment {
                    id: fid,
                    sandbox_url,
                    title,
                    files: serde_json::from_str::<FileMap>(&files)?,
                    summary,
                }),
                _ => None,
            };

            records.push(OutcomeRecord {
                id,
                conversation_id: conversation_id.to_string(),
                role: MessageRole::parse(&role)
                    .ok_or_else(|| SandloopError::Storage(format!("unknown role: {}", role)))?,
                message_type: MessageType::parse(&kind)
                    .ok_or_else(|| SandloopError::Storage(format!("unknown message type: {}", kind)))?,
                content,
                fragment,
                created_at: DateTime::from_timestamp_millis(created_at).unwrap_or_default(),
            });
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{APOLOGY_MESSAGE, FileEntry, IterationState};
    use chrono::{Duration, Utc};

    fn result_record(conversation_id: &str) -> OutcomeRecord {
        let mut state = IterationState::new();
        state.merge_files(&[FileEntry::new("README.md", "hi")]);
        state.set_summary("Added README");
        OutcomeRecord::from_state(conversation_id, &state, "https://3000-sbx.sandbox.local")
    }

    #[test]
    fn test_insert_result_with_fragment() {
        let db = Database::open_in_memory().unwrap();
        let record = result_record("conv-1");
        db.insert_message(&record).unwrap();

        let stored = db.messages("conv-1").unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].message_type, MessageType::Result);
        let fragment = stored[0].fragment.as_ref().unwrap();
        assert_eq!(fragment.files["README.md"], "hi");
        assert_eq!(fragment.summary, "Added README");
        assert_eq!(fragment.sandbox_url, "https://3000-sbx.sandbox.local");
    }

    #[test]
    fn test_insert_error_without_fragment() {
        let db = Database::open_in_memory().unwrap();
        db.insert_message(&OutcomeRecord::failure("conv-1")).unwrap();

        let stored = db.messages("conv-1").unwrap();
        assert_eq!(stored.len(), 1);
        assert!(stored[0].is_error());
        assert_eq!(stored[0].content, APOLOGY_MESSAGE);
        assert!(stored[0].fragment.is_none());
    }

    #[test]
    fn test_fragment_without_summary_is_rejected_atomically() {
        let db = Database::open_in_memory().unwrap();
        let mut record = result_record("conv-1");
        if let Some(fragment) = record.fragment.as_mut() {
            fragment.summary = "  ".to_string();
        }

        assert!(db.insert_message(&record).is_err());
        assert!(db.messages("conv-1").unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_fragment_rolls_back_message() {
        let db = Database::open_in_memory().unwrap();
        let first = result_record("conv-1");
        db.insert_message(&first).unwrap();

        // Reusing the fragment id violates the primary key after the message insert
        let mut second = result_record("conv-1");
        if let (Some(a), Some(b)) = (first.fragment.as_ref(), second.fragment.as_mut()) {
            b.id = a.id.clone();
        }
        assert!(db.insert_message(&second).is_err());
        assert_eq!(db.messages("conv-1").unwrap().len(), 1);
    }

    #[test]
    fn test_history_is_oldest_first_and_limited() {
        let db = Database::open_in_memory().unwrap();
        let base = Utc::now();
        for i in 0..6 {
            let mut record = if i % 2 == 0 {
                OutcomeRecord::user_prompt("conv-1", &format!("prompt {}", i))
            } else {
                OutcomeRecord::failure("conv-1")
            };
            record.created_at = base + Duration::seconds(i);
            db.insert_message(&record).unwrap();
        }
        db.insert_message(&OutcomeRecord::user_prompt("conv-2", "elsewhere")).unwrap();

        let history = db.load_history("conv-1", 3).unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].role, MessageRole::Assistant);
        assert_eq!(history[1].content, "prompt 4");
        assert_eq!(history[2].role, MessageRole::Assistant);

        let all = db.load_history("conv-1", 100).unwrap();
        assert_eq!(all.len(), 6);
        assert_eq!(all[0].content, "prompt 0");
    }

    #[test]
    fn test_history_of_unknown_conversation_is_empty() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.load_history("nope", 5).unwrap().is_empty());
    }
}

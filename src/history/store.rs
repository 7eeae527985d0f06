//! Append-only history log.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::history::Message;

/// Ordered, append-only log of turn events.
///
/// Entries are never mutated or removed. Every append takes the write lock
/// once, so a reader always observes a consistent prefix.
#[derive(Debug, Default)]
pub struct HistoryStore {
    messages: RwLock<Vec<Message>>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Message>> {
        // A panicking writer cannot leave a half-written entry behind: push is
        // the only mutation.
        self.messages.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Message>> {
        self.messages.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Append a message to the end of the log.
    pub fn append(&self, message: Message) {
        tracing::trace!("Appending {} message", message.role);
        self.write().push(message);
    }

    /// Snapshot of the whole log.
    pub fn snapshot(&self) -> Vec<Message> {
        self.read().clone()
    }

    /// The last `n` entries rendered as `speaker: content` lines.
    pub fn transcript(&self, n: usize) -> Vec<String> {
        let messages = self.read();
        let start = messages.len().saturating_sub(n);
        messages[start..]
            .iter()
            .map(Message::transcript_line)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::Role;

    #[test]
    fn test_transcript_window() {
        let store = HistoryStore::new();
        for i in 0..10 {
            store.append(Message::user(format!("m{}", i)));
        }

        let window = store.transcript(8);
        assert_eq!(window.len(), 8);
        assert_eq!(window[0], "user: m2");
        assert_eq!(window[7], "user: m9");

        assert_eq!(store.transcript(50).len(), 10);
        assert!(store.transcript(0).is_empty());
    }

    #[test]
    fn test_transcript_lines() {
        let store = HistoryStore::new();
        store.append(Message::user("scan"));
        store.append(Message::assistant("done"));

        assert_eq!(store.transcript(5), vec!["user: scan", "assistant: done"]);
        assert_eq!(store.transcript(1), vec!["assistant: done"]);
    }

    #[test]
    fn test_prefix_is_stable() {
        let store = HistoryStore::new();
        store.append(Message::user("a"));
        store.append(Message::assistant("b"));
        let early = store.snapshot();

        store.append(Message::tool_call(
            "stop_mining",
            serde_json::json!({}),
            serde_json::json!({"ok": true}),
        ));
        store.append(Message::user("c"));
        let later = store.snapshot();

        assert_eq!(later.len(), 4);
        for (a, b) in early.iter().zip(later.iter()) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.content, b.content);
        }
        assert_eq!(later[2].role, Role::Tool);
    }

    #[test]
    fn test_empty_store() {
        let store = HistoryStore::new();
        assert!(store.is_empty());
        assert!(store.transcript(8).is_empty());
    }
}

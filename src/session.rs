use std::path::{Path, PathBuf};

use crate::types::ChatMessage;

const PRUNE_NOTICE: &str =
    "[System: Previous conversation pruned for context. Focus on current task.]";

/// Conversational memory for one assistant session: the ordered transcript
/// plus the workspace root all relative tool paths resolve against. Lives
/// for the process lifetime and is mutated only by the orchestration loop
/// and the host's explicit root setter.
#[derive(Debug)]
pub struct Session {
    transcript: Vec<ChatMessage>,
    workspace_root: PathBuf,
}

impl Session {
    pub fn new(workspace_root: PathBuf) -> Self {
        Self {
            transcript: Vec::new(),
            workspace_root,
        }
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn set_workspace_root(&mut self, root: PathBuf) {
        self.workspace_root = root;
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.transcript.push(message);
    }

    /// Lossy sliding-window compaction: once the transcript grows past
    /// `limit`, keep only a synthetic pruning notice followed by the `keep`
    /// most recent messages. No summarization is attempted.
    pub fn apply_sliding_window(&mut self, limit: usize, keep: usize) {
        if self.transcript.len() <= limit {
            return;
        }
        let tail_start = self.transcript.len().saturating_sub(keep);
        let mut pruned = Vec::with_capacity(keep + 1);
        pruned.push(ChatMessage::user(PRUNE_NOTICE));
        pruned.extend(self.transcript.drain(tail_start..));
        self.transcript = pruned;
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use crate::types::{ChatMessage, Role};

    use super::{Session, PRUNE_NOTICE};

    fn session_with_messages(count: usize) -> Session {
        let mut session = Session::new(PathBuf::from("/tmp/workspace"));
        for i in 0..count {
            session.push(ChatMessage::user(format!("message {i}")));
        }
        session
    }

    #[test]
    fn transcript_at_limit_is_left_untouched() {
        let mut session = session_with_messages(20);
        session.apply_sliding_window(20, 10);
        assert_eq!(session.transcript().len(), 20);
        assert_eq!(session.transcript()[0].content.as_deref(), Some("message 0"));
    }

    #[test]
    fn overflow_prunes_to_notice_plus_most_recent_tail() {
        let mut session = session_with_messages(25);
        session.apply_sliding_window(20, 10);

        let transcript = session.transcript();
        assert_eq!(transcript.len(), 1 + 10);
        assert_eq!(transcript[0].role, Role::User);
        assert_eq!(transcript[0].content.as_deref(), Some(PRUNE_NOTICE));
        // The tail is the newest ten messages, order preserved.
        assert_eq!(transcript[1].content.as_deref(), Some("message 15"));
        assert_eq!(transcript[10].content.as_deref(), Some("message 24"));
    }

    #[test]
    fn workspace_root_can_be_replaced_between_turns() {
        let mut session = Session::new(PathBuf::from("/tmp/a"));
        session.set_workspace_root(PathBuf::from("/tmp/b"));
        assert_eq!(session.workspace_root(), PathBuf::from("/tmp/b").as_path());
    }
}

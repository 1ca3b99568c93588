use serde::Serialize;
use tokio::sync::broadcast;

/// Externally observable side effects, announced for the host UI layer.
///
/// Delivery is fire-and-forget: nothing in the loop waits on consumers, and
/// a send with no live receivers is not an error. The only ordering promise
/// is that `CommandStarted` precedes `CommandFinished` for one invocation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum AgentEvent {
    FileChanged {
        path: String,
        kind: FileChangeKind,
    },
    CommandStarted {
        command: String,
    },
    CommandFinished {
        command: String,
        stdout: String,
        stderr: String,
        error: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileChangeKind {
    Write,
    Replace,
}

#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AgentEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(8));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: AgentEvent) {
        // No receivers is fine; slow receivers lag and lose old events.
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::broadcast;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::completion::CompletionClient;
use crate::config::RuntimeConfig;
use crate::events::{AgentEvent, EventBus};
use crate::session::Session;
use crate::tool_host::ToolHost;
use crate::tool_registry::registry;
use crate::types::{ChatMessage, ToolSpec};

const SYSTEM_PROMPT: &str = "You are Workbench AI, an elite agentic software engineer.\n\
Your goal is to assist the user by planning and executing complex software engineering tasks.\n\
\n\
Capabilities:\n\
- You can navigate the codebase using list_files and grep_search.\n\
- You can read and write files. Use replace_lines for targeted edits when possible.\n\
- You can run terminal commands.\n\
\n\
Operating Guidelines:\n\
1. **Think First**: For complex requests, always start with an implementation plan.\n\
2. **Exploration**: If unsure about the project structure or a specific piece of logic, use list_files or grep_search.\n\
3. **Precision**: Use replace_lines to modify specific parts of a file. This is safer than rewriting the entire file.\n\
4. **Context**: Summarize your progress periodically in your responses.\n\
5. **Error Handling**: If a command or tool fails, analyze the output and attempt a correction.\n\
6. **Paths**: Always use relative paths for tools — they will be resolved relative to the current workspace.";

const ROUND_LIMIT_REPLY: &str = "Max tool call limit reached. Please try a simpler request.";

/// Drives the tool-execution loop for one session.
///
/// The session lives behind a mutex, which makes a turn non-reentrant: a new
/// `send_turn` blocks until the previous turn's loop has finished. Within a
/// turn the loop suspends at exactly two points, the completion call and the
/// tool batch.
pub struct Agent {
    client: Arc<dyn CompletionClient>,
    tools: ToolHost,
    catalog: Vec<ToolSpec>,
    session: Mutex<Session>,
    events: EventBus,
    max_tool_rounds: usize,
    transcript_limit: usize,
    transcript_keep: usize,
}

impl Agent {
    pub fn new(runtime: &RuntimeConfig, client: Arc<dyn CompletionClient>) -> Self {
        let events = EventBus::default();
        Self {
            client,
            tools: ToolHost::new(events.clone()),
            catalog: registry(),
            session: Mutex::new(Session::new(runtime.workspace_root.clone())),
            events,
            max_tool_rounds: runtime.max_tool_rounds,
            transcript_limit: runtime.transcript_limit,
            transcript_keep: runtime.transcript_keep,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.events.subscribe()
    }

    /// Out-of-band workspace root update. Blocks while a turn is running.
    pub async fn set_workspace_root(&self, root: PathBuf) {
        let mut session = self.session.lock().await;
        session.set_workspace_root(root);
    }

    /// Run one user turn to completion: repeated completion calls and tool
    /// batches until the model answers with plain text, the round budget is
    /// exhausted, or the completion service fails.
    ///
    /// A non-empty `workspace_root` replaces the session root before the
    /// turn. Service failures surface as `Err` with the transcript retained,
    /// so a later turn can continue from it; the round limit is a normal
    /// return carrying a fixed advisory reply.
    pub async fn send_turn(&self, user_text: &str, workspace_root: Option<&Path>) -> Result<String> {
        let mut session = self.session.lock().await;

        if let Some(root) = workspace_root {
            if !root.as_os_str().is_empty() {
                session.set_workspace_root(root.to_path_buf());
            }
        }
        let root = session.workspace_root().to_path_buf();

        if !user_text.trim().is_empty() {
            session.push(ChatMessage::user(user_text));
        }
        session.apply_sliding_window(self.transcript_limit, self.transcript_keep);

        let system = system_prompt(&root);
        let mut rounds = 0usize;
        loop {
            if rounds >= self.max_tool_rounds {
                info!(rounds, "tool round budget exhausted, aborting turn");
                return Ok(ROUND_LIMIT_REPLY.to_owned());
            }

            let mut messages = Vec::with_capacity(session.transcript().len() + 1);
            messages.push(ChatMessage::system(system.clone()));
            messages.extend_from_slice(session.transcript());

            let response = self.client.complete(&messages, &self.catalog).await?;
            // Appended unconditionally, even when the reply is only tool
            // calls: every tool-result message must follow the assistant
            // message that requested it.
            session.push(response.clone());

            let calls = response.requested_tool_calls().to_vec();
            if calls.is_empty() {
                debug!(rounds, "turn complete");
                return Ok(response.content.unwrap_or_default());
            }

            rounds += 1;
            info!(round = rounds, tools = calls.len(), "executing tool batch");
            for call in &calls {
                let args = call.parsed_arguments();
                let payload = self.tools.execute(&root, &call.function.name, &args).await;
                session.push(ChatMessage::tool_result(call.id.clone(), &payload));
            }
        }
    }

    #[cfg(test)]
    pub async fn transcript(&self) -> Vec<ChatMessage> {
        self.session.lock().await.transcript().to_vec()
    }
}

fn system_prompt(workspace_root: &Path) -> String {
    format!(
        "{SYSTEM_PROMPT}\n\nCurrent workspace: {}\nAll relative paths you provide to tools are resolved relative to this workspace.",
        workspace_root.display()
    )
}

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde_json::{json, Value};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::events::{AgentEvent, EventBus, FileChangeKind};

const GREP_RESULT_CAP: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolErrorCode {
    InvalidArgs,
    UnsupportedTool,
    PathOutsideRoot,
    Io,
    ExecutionFailed,
}

impl ToolErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidArgs => "invalid_args",
            Self::UnsupportedTool => "unsupported_tool",
            Self::PathOutsideRoot => "path_outside_root",
            Self::Io => "io_error",
            Self::ExecutionFailed => "execution_failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolError {
    pub code: ToolErrorCode,
    pub message: String,
}

impl ToolError {
    fn new(code: ToolErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

type ToolResult<T> = Result<T, ToolError>;

/// Closed set of tool invocations the runtime understands, one variant per
/// registered tool. Adding a tool without wiring its dispatch arm is a
/// compile error.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInvocation {
    WriteFile {
        path: String,
        content: String,
    },
    ReadFile {
        path: String,
    },
    ListFiles {
        path: String,
    },
    GrepSearch {
        directory: String,
        query: String,
    },
    ReplaceLines {
        path: String,
        start_line: usize,
        end_line: usize,
        content: String,
    },
    RunCommand {
        command: String,
    },
}

impl ToolInvocation {
    pub fn parse(tool_name: &str, args: &Value) -> ToolResult<Self> {
        match tool_name {
            "write_file" => Ok(Self::WriteFile {
                path: required_string_arg(args, &["path", "file_path"], "path")?,
                content: required_string_arg(args, &["content"], "content")?,
            }),
            "read_file" => Ok(Self::ReadFile {
                path: required_string_arg(args, &["path", "file_path"], "path")?,
            }),
            "list_files" => Ok(Self::ListFiles {
                path: required_string_arg(args, &["path", "directory"], "path")?,
            }),
            "grep_search" => Ok(Self::GrepSearch {
                directory: required_string_arg(args, &["directory", "dir", "path"], "directory")?,
                query: required_string_arg(args, &["query", "pattern"], "query")?,
            }),
            "replace_lines" => {
                let start_line = required_line_arg(args, &["startLine", "start_line"], "startLine")?;
                let end_line = required_line_arg(args, &["endLine", "end_line"], "endLine")?;
                if start_line == 0 {
                    return Err(ToolError::new(
                        ToolErrorCode::InvalidArgs,
                        "startLine is 1-indexed and must be at least 1",
                    ));
                }
                if end_line < start_line {
                    return Err(ToolError::new(
                        ToolErrorCode::InvalidArgs,
                        format!("endLine ({end_line}) must not precede startLine ({start_line})"),
                    ));
                }
                Ok(Self::ReplaceLines {
                    path: required_string_arg(args, &["path", "file_path"], "path")?,
                    start_line,
                    end_line,
                    content: required_string_arg(args, &["content"], "content")?,
                })
            }
            "run_command" => Ok(Self::RunCommand {
                command: required_string_arg(args, &["command"], "command")?,
            }),
            other => Err(ToolError::new(
                ToolErrorCode::UnsupportedTool,
                format!("unsupported tool `{other}`"),
            )),
        }
    }

    pub fn tool_name(&self) -> &'static str {
        match self {
            Self::WriteFile { .. } => "write_file",
            Self::ReadFile { .. } => "read_file",
            Self::ListFiles { .. } => "list_files",
            Self::GrepSearch { .. } => "grep_search",
            Self::ReplaceLines { .. } => "replace_lines",
            Self::RunCommand { .. } => "run_command",
        }
    }
}

/// Executes tool invocations against a workspace root.
///
/// Every failure is caught at this boundary and rendered into an
/// `{ "error": ..., "code": ... }` payload for the model; nothing below the
/// orchestration loop sees a tool failure as `Err`.
pub struct ToolHost {
    events: EventBus,
}

impl ToolHost {
    pub fn new(events: EventBus) -> Self {
        Self { events }
    }

    pub async fn execute(&self, root: &Path, tool_name: &str, args: &Value) -> Value {
        let invocation = match ToolInvocation::parse(tool_name, args) {
            Ok(invocation) => invocation,
            Err(err) => {
                warn!(tool = tool_name, code = err.code.as_str(), "tool arguments rejected");
                return error_payload(&err);
            }
        };
        debug!(tool = invocation.tool_name(), "executing tool");
        match self.execute_invocation(root, &invocation).await {
            Ok(payload) => payload,
            Err(err) => {
                warn!(
                    tool = invocation.tool_name(),
                    code = err.code.as_str(),
                    "tool failed: {}",
                    err.message
                );
                error_payload(&err)
            }
        }
    }

    async fn execute_invocation(
        &self,
        root: &Path,
        invocation: &ToolInvocation,
    ) -> ToolResult<Value> {
        match invocation {
            ToolInvocation::WriteFile { path, content } => self.write_file(root, path, content),
            ToolInvocation::ReadFile { path } => read_file(root, path),
            ToolInvocation::ListFiles { path } => list_files(root, path),
            ToolInvocation::GrepSearch { directory, query } => grep_search(root, directory, query),
            ToolInvocation::ReplaceLines {
                path,
                start_line,
                end_line,
                content,
            } => self.replace_lines(root, path, *start_line, *end_line, content),
            ToolInvocation::RunCommand { command } => Ok(self.run_command(root, command).await),
        }
    }

    fn write_file(&self, root: &Path, path: &str, content: &str) -> ToolResult<Value> {
        let resolved = resolve_path_inside_root(root, path)?;
        if let Some(parent) = resolved.parent() {
            std::fs::create_dir_all(parent).map_err(|err| {
                ToolError::new(
                    ToolErrorCode::Io,
                    format!("failed creating parent directory {}: {err}", parent.display()),
                )
            })?;
        }
        std::fs::write(&resolved, content.as_bytes()).map_err(|err| {
            ToolError::new(
                ToolErrorCode::Io,
                format!("failed writing file {}: {err}", resolved.display()),
            )
        })?;
        self.events.emit(AgentEvent::FileChanged {
            path: resolved.display().to_string(),
            kind: FileChangeKind::Write,
        });
        Ok(json!({
            "status": "success",
            "path": resolved.display().to_string()
        }))
    }

    fn replace_lines(
        &self,
        root: &Path,
        path: &str,
        start_line: usize,
        end_line: usize,
        content: &str,
    ) -> ToolResult<Value> {
        let resolved = resolve_path_inside_root(root, path)?;
        let original = std::fs::read_to_string(&resolved).map_err(|err| {
            ToolError::new(
                ToolErrorCode::Io,
                format!("failed reading file {}: {err}", resolved.display()),
            )
        })?;

        // Mirror the editor's line model: split on '\n' so a trailing
        // newline survives the rewrite as a final empty segment.
        let mut lines: Vec<&str> = original.split('\n').collect();
        if start_line > lines.len() {
            return Err(ToolError::new(
                ToolErrorCode::InvalidArgs,
                format!(
                    "startLine {start_line} is beyond the end of the file ({} lines)",
                    lines.len()
                ),
            ));
        }
        let end_index = end_line.min(lines.len());
        lines.splice((start_line - 1)..end_index, [content]);
        let updated = lines.join("\n");
        std::fs::write(&resolved, updated.as_bytes()).map_err(|err| {
            ToolError::new(
                ToolErrorCode::Io,
                format!("failed writing file {}: {err}", resolved.display()),
            )
        })?;
        self.events.emit(AgentEvent::FileChanged {
            path: resolved.display().to_string(),
            kind: FileChangeKind::Replace,
        });
        Ok(json!({
            "status": "success",
            "path": resolved.display().to_string(),
            "startLine": start_line,
            "endLine": end_line
        }))
    }

    /// Shell execution never surfaces as a tool error: spawn failures and
    /// nonzero exits are reported inline through the `error` field so the
    /// model can read them on the next round.
    async fn run_command(&self, root: &Path, command: &str) -> Value {
        self.events.emit(AgentEvent::CommandStarted {
            command: command.to_owned(),
        });

        let mut cmd = if cfg!(windows) {
            let mut builder = Command::new("cmd");
            builder.arg("/C").arg(command);
            builder
        } else {
            let mut builder = Command::new("sh");
            builder.arg("-lc").arg(command);
            builder
        };
        cmd.current_dir(root);

        let (stdout, stderr, error) = match cmd.output().await {
            Ok(output) => {
                let stdout = String::from_utf8_lossy(&output.stdout).to_string();
                let stderr = String::from_utf8_lossy(&output.stderr).to_string();
                let error = if output.status.success() {
                    None
                } else {
                    Some(match output.status.code() {
                        Some(code) => format!("command exited with status {code}"),
                        None => "command terminated by signal".to_owned(),
                    })
                };
                (stdout, stderr, error)
            }
            Err(err) => (
                String::new(),
                String::new(),
                Some(format!("failed spawning command: {err}")),
            ),
        };

        self.events.emit(AgentEvent::CommandFinished {
            command: command.to_owned(),
            stdout: stdout.clone(),
            stderr: stderr.clone(),
            error: error.clone(),
        });
        json!({
            "stdout": stdout,
            "stderr": stderr,
            "error": error
        })
    }
}

fn read_file(root: &Path, path: &str) -> ToolResult<Value> {
    let resolved = resolve_path_inside_root(root, path)?;
    let content = std::fs::read_to_string(&resolved).map_err(|err| {
        ToolError::new(
            ToolErrorCode::Io,
            format!("failed reading file {}: {err}", resolved.display()),
        )
    })?;
    Ok(json!({ "content": content }))
}

fn list_files(root: &Path, path: &str) -> ToolResult<Value> {
    let resolved = resolve_path_inside_root(root, path)?;
    let entries = std::fs::read_dir(&resolved).map_err(|err| {
        ToolError::new(
            ToolErrorCode::Io,
            format!("failed listing directory {}: {err}", resolved.display()),
        )
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| {
            ToolError::new(
                ToolErrorCode::Io,
                format!("failed reading directory entry in {}: {err}", resolved.display()),
            )
        })?;
        let is_directory = entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false);
        files.push(json!({
            "name": entry.file_name().to_string_lossy().to_string(),
            "is_directory": is_directory
        }));
    }
    files.sort_by(|a, b| {
        a["name"]
            .as_str()
            .unwrap_or_default()
            .cmp(b["name"].as_str().unwrap_or_default())
    });
    Ok(json!({ "files": files }))
}

/// In-process recursive text search. Replaces the OS search shell-out of the
/// original editor; zero matches and unreadable inputs both yield the
/// `no_results` status rather than an error.
fn grep_search(root: &Path, directory: &str, query: &str) -> ToolResult<Value> {
    let resolved = resolve_path_inside_root(root, directory)?;
    let matcher = Regex::new(query)
        .or_else(|_| Regex::new(&regex::escape(query)))
        .map_err(|err| {
            ToolError::new(ToolErrorCode::InvalidArgs, format!("invalid query: {err}"))
        })?;

    let mut results = Vec::new();
    let mut stack = vec![resolved.clone()];
    'walk: while let Some(current) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&current) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
                continue;
            }
            // Binary or otherwise unreadable files are skipped silently.
            let Ok(text) = std::fs::read_to_string(&path) else {
                continue;
            };
            for (index, line) in text.lines().enumerate() {
                if matcher.is_match(line) {
                    results.push(json!({
                        "path": display_path(&resolved, &path),
                        "line_number": index + 1,
                        "line": line
                    }));
                    if results.len() >= GREP_RESULT_CAP {
                        break 'walk;
                    }
                }
            }
        }
    }

    if results.is_empty() {
        Ok(json!({
            "status": "no_results",
            "message": "No matches found."
        }))
    } else {
        Ok(json!({ "results": results }))
    }
}

fn error_payload(err: &ToolError) -> Value {
    json!({
        "error": err.message,
        "code": err.code.as_str()
    })
}

fn first_string_arg(args: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| args.get(key))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

fn required_string_arg(args: &Value, keys: &[&str], label: &str) -> ToolResult<String> {
    first_string_arg(args, keys).ok_or_else(|| {
        ToolError::new(
            ToolErrorCode::InvalidArgs,
            format!("missing required parameter `{label}`"),
        )
    })
}

fn required_line_arg(args: &Value, keys: &[&str], label: &str) -> ToolResult<usize> {
    let value = keys.iter().filter_map(|key| args.get(key)).next().ok_or_else(|| {
        ToolError::new(
            ToolErrorCode::InvalidArgs,
            format!("missing required parameter `{label}`"),
        )
    })?;
    // Models occasionally quote numbers; accept both shapes.
    let parsed = match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse::<u64>().ok(),
        _ => None,
    };
    parsed.map(|n| n as usize).ok_or_else(|| {
        ToolError::new(
            ToolErrorCode::InvalidArgs,
            format!("parameter `{label}` must be a non-negative integer"),
        )
    })
}

fn display_path(root: &Path, path: &Path) -> String {
    if let Ok(relative) = path.strip_prefix(root) {
        let text = relative.to_string_lossy().to_string();
        if text.is_empty() {
            ".".to_owned()
        } else {
            text.replace('\\', "/")
        }
    } else {
        path.display().to_string()
    }
}

/// Anchor a tool-supplied path under the workspace root and verify the
/// canonical result stays inside it. Escaping paths (absolute or via `..`)
/// are a tool-local failure the model sees, never a silent allow.
pub fn resolve_path_inside_root(root: &Path, raw: &str) -> ToolResult<PathBuf> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ToolError::new(
            ToolErrorCode::InvalidArgs,
            "path must be a non-empty string",
        ));
    }

    let root = canonicalize_with_missing_segments(root)?;
    let candidate = if Path::new(trimmed).is_absolute() {
        PathBuf::from(trimmed)
    } else {
        root.join(trimmed)
    };
    let resolved = canonicalize_with_missing_segments(&candidate)?;
    if !resolved.starts_with(&root) {
        return Err(ToolError::new(
            ToolErrorCode::PathOutsideRoot,
            format!("path `{raw}` escapes workspace root {}", root.display()),
        ));
    }
    Ok(resolved)
}

fn canonicalize_with_missing_segments(path: &Path) -> ToolResult<PathBuf> {
    if let Ok(value) = path.canonicalize() {
        return Ok(value);
    }

    let mut cursor = path.to_path_buf();
    let mut missing = Vec::<OsString>::new();
    loop {
        if cursor.exists() {
            let mut resolved = cursor.canonicalize().map_err(|err| {
                ToolError::new(
                    ToolErrorCode::Io,
                    format!("failed canonicalizing path {}: {err}", cursor.display()),
                )
            })?;
            for part in missing.iter().rev() {
                resolved.push(part);
            }
            return Ok(resolved);
        }

        let file_name = cursor.file_name().ok_or_else(|| {
            ToolError::new(
                ToolErrorCode::Io,
                format!("unable to resolve parent path for {}", path.display()),
            )
        })?;
        missing.push(file_name.to_os_string());
        cursor = cursor.parent().map(Path::to_path_buf).ok_or_else(|| {
            ToolError::new(
                ToolErrorCode::Io,
                format!("unable to resolve parent path for {}", path.display()),
            )
        })?;
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    use serde_json::{json, Value};

    use crate::events::{AgentEvent, EventBus};

    use super::{ToolHost, ToolInvocation};

    fn temp_workspace(tag: &str) -> PathBuf {
        let mut root = std::env::temp_dir();
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        root.push(format!("workbench-rs-tool-host-{tag}-{stamp}"));
        std::fs::create_dir_all(&root).expect("workspace dir");
        root
    }

    fn host() -> ToolHost {
        ToolHost::new(EventBus::default())
    }

    #[tokio::test]
    async fn write_then_read_roundtrips_content() {
        let root = temp_workspace("write-read");
        let host = host();

        let written = host
            .execute(
                &root,
                "write_file",
                &json!({ "path": "notes/hello.txt", "content": "hello workspace" }),
            )
            .await;
        assert_eq!(written["status"], "success");

        let read = host
            .execute(&root, "read_file", &json!({ "path": "notes/hello.txt" }))
            .await;
        assert_eq!(read["content"], "hello workspace");
    }

    #[tokio::test]
    async fn list_files_flags_directories() {
        let root = temp_workspace("list");
        std::fs::create_dir(root.join("sub")).expect("subdir");
        std::fs::write(root.join("a.txt"), "a").expect("file");

        let listed = host().execute(&root, "list_files", &json!({ "path": "." })).await;
        let files = listed["files"].as_array().expect("files array");
        assert_eq!(files.len(), 2);
        assert_eq!(files[0]["name"], "a.txt");
        assert_eq!(files[0]["is_directory"], false);
        assert_eq!(files[1]["name"], "sub");
        assert_eq!(files[1]["is_directory"], true);
    }

    #[tokio::test]
    async fn replace_lines_removes_inclusive_range_and_inserts_block() {
        let root = temp_workspace("replace");
        let file = root.join("six.txt");
        std::fs::write(&file, "l1\nl2\nl3\nl4\nl5\nl6").expect("seed file");
        let host = host();

        let replaced = host
            .execute(
                &root,
                "replace_lines",
                &json!({ "path": "six.txt", "startLine": 3, "endLine": 5, "content": "X" }),
            )
            .await;
        assert_eq!(replaced["status"], "success");
        assert_eq!(
            std::fs::read_to_string(&file).expect("read back"),
            "l1\nl2\nX\nl6"
        );

        // No-op single-line replace restores line 1 exactly.
        let restored = host
            .execute(
                &root,
                "replace_lines",
                &json!({ "path": "six.txt", "startLine": 1, "endLine": 1, "content": "l1" }),
            )
            .await;
        assert_eq!(restored["status"], "success");
        assert_eq!(
            std::fs::read_to_string(&file).expect("read back"),
            "l1\nl2\nX\nl6"
        );
    }

    #[tokio::test]
    async fn replace_lines_rejects_inverted_range() {
        let root = temp_workspace("replace-bad-range");
        std::fs::write(root.join("f.txt"), "a\nb").expect("seed file");

        let rejected = host()
            .execute(
                &root,
                "replace_lines",
                &json!({ "path": "f.txt", "startLine": 4, "endLine": 2, "content": "X" }),
            )
            .await;
        assert_eq!(rejected["code"], "invalid_args");
        assert!(rejected["error"].as_str().is_some());
    }

    #[tokio::test]
    async fn grep_search_caps_results_and_reports_no_results() {
        let root = temp_workspace("grep");
        let mut body = String::new();
        for i in 0..80 {
            body.push_str(&format!("needle line {i}\n"));
        }
        std::fs::write(root.join("haystack.txt"), body).expect("seed file");
        let host = host();

        let found = host
            .execute(
                &root,
                "grep_search",
                &json!({ "directory": ".", "query": "needle" }),
            )
            .await;
        assert_eq!(found["results"].as_array().expect("results").len(), 50);

        let missing = host
            .execute(
                &root,
                "grep_search",
                &json!({ "directory": ".", "query": "no-such-token" }),
            )
            .await;
        assert_eq!(missing["status"], "no_results");
        assert!(missing.get("error").is_none());
    }

    #[tokio::test]
    async fn grep_search_falls_back_to_literal_for_invalid_regex() {
        let root = temp_workspace("grep-literal");
        std::fs::write(root.join("code.txt"), "value = items[0](\n").expect("seed file");

        let found = host()
            .execute(
                &root,
                "grep_search",
                &json!({ "directory": ".", "query": "items[0](" }),
            )
            .await;
        assert_eq!(found["results"].as_array().expect("results").len(), 1);
    }

    #[tokio::test]
    async fn run_command_reports_nonzero_exit_inline() {
        let root = temp_workspace("command");
        let result = host()
            .execute(&root, "run_command", &json!({ "command": "exit 1" }))
            .await;
        assert!(result["error"].as_str().expect("error message").contains("status 1"));
        assert_eq!(result["stdout"], "");
    }

    #[tokio::test]
    async fn run_command_emits_started_then_finished() {
        let root = temp_workspace("command-events");
        let events = EventBus::default();
        let mut rx = events.subscribe();
        let host = ToolHost::new(events);

        let result = host
            .execute(&root, "run_command", &json!({ "command": "echo tracked" }))
            .await;
        assert!(result["error"].is_null());
        assert!(result["stdout"].as_str().expect("stdout").contains("tracked"));

        assert!(matches!(
            rx.recv().await.expect("first event"),
            AgentEvent::CommandStarted { .. }
        ));
        match rx.recv().await.expect("second event") {
            AgentEvent::CommandFinished { error, stdout, .. } => {
                assert!(error.is_none());
                assert!(stdout.contains("tracked"));
            }
            other => panic!("expected command-finished, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn escaping_paths_are_rejected_not_resolved() {
        let root = temp_workspace("escape");
        let host = host();

        let dotdot = host
            .execute(
                &root,
                "read_file",
                &json!({ "path": "../outside-secret.txt" }),
            )
            .await;
        assert_eq!(dotdot["code"], "path_outside_root");

        let absolute = host
            .execute(&root, "write_file", &json!({ "path": "/etc/hosts", "content": "x" }))
            .await;
        assert_eq!(absolute["code"], "path_outside_root");
    }

    #[tokio::test]
    async fn absolute_path_inside_root_is_accepted() {
        let root = temp_workspace("absolute-inside");
        let inside = root.join("inner.txt").display().to_string();
        let written = host()
            .execute(&root, "write_file", &json!({ "path": inside, "content": "ok" }))
            .await;
        assert_eq!(written["status"], "success");
    }

    #[tokio::test]
    async fn unknown_tool_and_missing_args_become_error_payloads() {
        let root = temp_workspace("errors");
        let host = host();

        let unknown = host.execute(&root, "teleport", &json!({})).await;
        assert_eq!(unknown["code"], "unsupported_tool");

        let missing = host.execute(&root, "write_file", &json!({})).await;
        assert_eq!(missing["code"], "invalid_args");
        assert!(missing["error"]
            .as_str()
            .expect("error message")
            .contains("path"));
    }

    #[test]
    fn parse_accepts_quoted_line_numbers() {
        let invocation = ToolInvocation::parse(
            "replace_lines",
            &json!({ "path": "f.txt", "startLine": "2", "endLine": "3", "content": "X" }),
        )
        .expect("parse invocation");
        assert_eq!(
            invocation,
            ToolInvocation::ReplaceLines {
                path: "f.txt".to_owned(),
                start_line: 2,
                end_line: 3,
                content: "X".to_owned(),
            }
        );
    }

    #[tokio::test]
    async fn corpus_cases_match_expected_outcomes() {
        #[derive(Debug, serde::Deserialize)]
        struct Corpus {
            cases: Vec<CorpusCase>,
        }

        #[derive(Debug, serde::Deserialize)]
        struct CorpusCase {
            name: String,
            tool: String,
            args: Value,
            expect: CorpusExpectation,
        }

        #[derive(Debug, serde::Deserialize)]
        struct CorpusExpectation {
            #[serde(default)]
            status: Option<String>,
            #[serde(default, rename = "errorCode")]
            error_code: Option<String>,
            #[serde(default)]
            contains: Option<String>,
        }

        let corpus: Corpus =
            serde_json::from_str(include_str!("../tests/parity/tool-host-corpus.json"))
                .expect("parse corpus");
        let root = temp_workspace("corpus");
        let host = host();

        for case in corpus.cases {
            let payload = host.execute(&root, &case.tool, &case.args).await;
            if let Some(expected_status) = &case.expect.status {
                assert_eq!(
                    payload.get("status").and_then(Value::as_str),
                    Some(expected_status.as_str()),
                    "case {}",
                    case.name
                );
            }
            if let Some(expected_code) = &case.expect.error_code {
                assert_eq!(
                    payload.get("code").and_then(Value::as_str),
                    Some(expected_code.as_str()),
                    "case {}",
                    case.name
                );
            } else {
                assert!(
                    payload.get("error").map(Value::is_null).unwrap_or(true),
                    "case {} unexpectedly failed: {payload}",
                    case.name
                );
            }
            if let Some(fragment) = &case.expect.contains {
                assert!(
                    payload.to_string().contains(fragment),
                    "case {} expected payload containing `{fragment}`; payload={payload}",
                    case.name
                );
            }
        }
    }
}

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            model: default_model(),
            max_tokens: default_max_tokens(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_workspace_root")]
    pub workspace_root: PathBuf,
    /// Tool-call rounds allowed within a single user turn.
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,
    /// Transcript length that triggers the sliding-window prune.
    #[serde(default = "default_transcript_limit")]
    pub transcript_limit: usize,
    /// Most-recent messages kept after a prune.
    #[serde(default = "default_transcript_keep")]
    pub transcript_keep: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            workspace_root: default_workspace_root(),
            max_tool_rounds: default_max_tool_rounds(),
            transcript_limit: default_transcript_limit(),
            transcript_keep: default_transcript_keep(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let mut cfg = if path.exists() {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed reading config file {}", path.display()))?;
            toml::from_str::<Config>(&text)
                .with_context(|| format!("failed parsing TOML config {}", path.display()))?
        } else {
            Self::default()
        };
        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn apply_cli_overrides(
        &mut self,
        base_url: Option<&str>,
        api_key: Option<&str>,
        model: Option<&str>,
        workspace: Option<&Path>,
    ) {
        if let Some(url) = base_url {
            self.completion.base_url = url.to_owned();
        }
        if let Some(key) = api_key {
            self.completion.api_key = Some(key.to_owned());
        }
        if let Some(model) = model {
            self.completion.model = model.to_owned();
        }
        if let Some(root) = workspace {
            self.runtime.workspace_root = root.to_path_buf();
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = env::var("WORKBENCH_RS_BASE_URL") {
            let trimmed = v.trim();
            if !trimmed.is_empty() {
                self.completion.base_url = trimmed.to_owned();
            }
        }
        if let Ok(v) = env::var("WORKBENCH_RS_API_KEY") {
            self.completion.api_key = Some(v);
        } else if self.completion.api_key.is_none() {
            // Legacy variable honored by earlier builds of the assistant.
            if let Ok(v) = env::var("GROQ_API_KEY") {
                self.completion.api_key = Some(v);
            }
        }
        if let Ok(v) = env::var("WORKBENCH_RS_MODEL") {
            let trimmed = v.trim();
            if !trimmed.is_empty() {
                self.completion.model = trimmed.to_owned();
            }
        }
        if let Ok(v) = env::var("WORKBENCH_RS_WORKSPACE") {
            let trimmed = v.trim();
            if !trimmed.is_empty() {
                self.runtime.workspace_root = PathBuf::from(trimmed);
            }
        }
        if let Ok(v) = env::var("WORKBENCH_RS_MAX_TOOL_ROUNDS") {
            if let Ok(n) = v.parse::<usize>() {
                self.runtime.max_tool_rounds = n.max(1);
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.completion.base_url.trim().is_empty() {
            bail!("completion.base_url must not be empty");
        }
        if self.completion.model.trim().is_empty() {
            bail!("completion.model must not be empty");
        }
        if self.completion.max_tokens == 0 {
            bail!("completion.max_tokens must be greater than zero");
        }
        if self.runtime.max_tool_rounds == 0 {
            bail!("runtime.max_tool_rounds must be greater than zero");
        }
        if self.runtime.transcript_keep >= self.runtime.transcript_limit {
            bail!(
                "runtime.transcript_keep ({}) must be smaller than runtime.transcript_limit ({})",
                self.runtime.transcript_keep,
                self.runtime.transcript_limit
            );
        }
        Ok(())
    }
}

fn default_base_url() -> String {
    "https://api.groq.com/openai/v1".to_owned()
}

fn default_model() -> String {
    "llama-3.3-70b-versatile".to_owned()
}

fn default_max_tokens() -> u32 {
    4_096
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_workspace_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_max_tool_rounds() -> usize {
    10
}

fn default_transcript_limit() -> usize {
    20
}

fn default_transcript_keep() -> usize {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_passes_validation() {
        Config::default().validate().expect("defaults valid");
    }

    #[test]
    fn toml_overrides_merge_with_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [completion]
            model = "mixtral-8x7b"

            [runtime]
            max_tool_rounds = 4
            "#,
        )
        .expect("parse config");
        assert_eq!(cfg.completion.model, "mixtral-8x7b");
        assert_eq!(cfg.completion.max_tokens, 4_096);
        assert_eq!(cfg.runtime.max_tool_rounds, 4);
        assert_eq!(cfg.runtime.transcript_limit, 20);
    }

    #[test]
    fn validation_rejects_keep_larger_than_limit() {
        let mut cfg = Config::default();
        cfg.runtime.transcript_keep = 30;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn cli_overrides_replace_completion_settings() {
        let mut cfg = Config::default();
        cfg.apply_cli_overrides(
            Some("http://localhost:8080/v1"),
            Some("test-key"),
            None,
            Some(Path::new("/tmp/project")),
        );
        assert_eq!(cfg.completion.base_url, "http://localhost:8080/v1");
        assert_eq!(cfg.completion.api_key.as_deref(), Some("test-key"));
        assert_eq!(cfg.runtime.workspace_root, PathBuf::from("/tmp/project"));
    }
}

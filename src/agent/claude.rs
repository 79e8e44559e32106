use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::errors::AgentError;
use crate::orchestrator::AgentInvoker;

/// Runs the `claude` CLI in print mode with the prompt on stdin.
#[derive(Debug, Clone)]
pub struct ClaudeAgent {
    pub claude_cmd: String,
    pub model: Option<String>,
    pub skip_permissions: bool,
    pub working_dir: Option<PathBuf>,
}

impl Default for ClaudeAgent {
    fn default() -> Self {
        Self {
            claude_cmd: "claude".to_string(),
            model: None,
            skip_permissions: true,
            working_dir: None,
        }
    }
}

impl ClaudeAgent {
    pub fn with_claude_cmd(mut self, cmd: impl Into<String>) -> Self {
        self.claude_cmd = cmd.into();
        self
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn with_skip_permissions(mut self, skip: bool) -> Self {
        self.skip_permissions = skip;
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    fn flags(&self) -> Vec<String> {
        let mut flags = vec!["--print".to_string()];
        if let Some(ref model) = self.model {
            flags.push("--model".to_string());
            flags.push(model.clone());
        }
        if self.skip_permissions {
            flags.push("--dangerously-skip-permissions".to_string());
        }
        flags
    }

    /// Run one prompt to completion and return stdout.
    ///
    /// The child is killed if the returned future is dropped, so an outer
    /// timeout also stops the process.
    async fn run(&self, prompt: &str) -> Result<String, AgentError> {
        let mut cmd = Command::new(&self.claude_cmd);
        cmd.args(self.flags());
        if let Some(ref dir) = self.working_dir {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(cmd = %self.claude_cmd, prompt_len = prompt.len(), "Spawning agent");
        let mut child = cmd
            .spawn()
            .map_err(|e| AgentError::Provider(format!("Failed to spawn {}: {}", self.claude_cmd, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .await
                .map_err(|e| AgentError::Provider(format!("Failed to write prompt: {}", e)))?;
            stdin
                .shutdown()
                .await
                .map_err(|e| AgentError::Provider(format!("Failed to close stdin: {}", e)))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| AgentError::Provider(format!("Failed to wait for agent: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AgentError::Provider(format!(
                "{} exited with code {}: {}",
                self.claude_cmd,
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

#[async_trait]
impl AgentInvoker for ClaudeAgent {
    async fn review(&self, context: &str) -> Result<String, AgentError> {
        self.run(context).await
    }

    async fn implement(&self, context: &str) -> Result<String, AgentError> {
        self.run(context).await
    }

    fn identity(&self) -> String {
        match self.model {
            Some(ref model) => format!("claude/{}", model),
            None => "claude".to_string(),
        }
    }
}

//! `Command` — the built-in shell-command operator.

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::process::Command as TokioCommand;
use tracing::debug;

use crate::{Operator, OperatorError};

/// Spawns a subprocess; success iff exit status is zero. The operator's
/// output value is the captured stdout, decoded as UTF-8.
pub struct Command {
    cmd: String,
    args: Vec<String>,
}

impl Command {
    pub fn new(cmd: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            cmd: cmd.into(),
            args,
        }
    }
}

#[async_trait]
impl Operator for Command {
    async fn run(&self) -> Result<Value, OperatorError> {
        debug!(cmd = %self.cmd, args = ?self.args, "spawning command");

        let output = TokioCommand::new(&self.cmd)
            .args(&self.args)
            .output()
            .await
            .map_err(|e| OperatorError::Fatal(format!("failed to spawn '{}': {e}", self.cmd)))?;

        if !output.status.success() {
            return Err(OperatorError::Retryable(format!(
                "'{}' exited with {}: {}",
                self.cmd,
                output.status,
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(json!(stdout))
    }
}

use std::collections::BTreeMap;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use tokio::process::Command;
use tracing::debug;

use crate::Reconfigurer;

/// Runs an external command (e.g. `condor_reconfig`) with a hard timeout.
///
/// The child is killed if the timeout expires.
#[derive(Debug, Clone)]
pub struct CommandReconfigurer {
    command: String,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    timeout: Duration,
}

impl CommandReconfigurer {
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            timeout,
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

#[async_trait::async_trait]
impl Reconfigurer for CommandReconfigurer {
    async fn reconfigure(&self) -> Result<()> {
        debug!(command = %self.command, args = ?self.args, "running reconfigure command");

        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .envs(&self.env)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let status = tokio::time::timeout(self.timeout, cmd.status())
            .await
            .map_err(|_| anyhow!("{} timed out after {:?}", self.command, self.timeout))?
            .with_context(|| format!("failed to run {}", self.command))?;

        if !status.success() {
            bail!("{} returned nonzero ({})", self.command, status);
        }
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn zero_exit_succeeds() {
        let r = CommandReconfigurer::new("true", Duration::from_secs(5));
        r.reconfigure().await.unwrap();
    }

    #[tokio::test]
    async fn nonzero_exit_fails() {
        let r = CommandReconfigurer::new("false", Duration::from_secs(5));
        let err = r.reconfigure().await.unwrap_err().to_string();
        assert!(err.contains("nonzero"));
    }

    #[tokio::test]
    async fn env_is_passed_to_child() {
        let mut env = BTreeMap::new();
        env.insert("EXTRA_CFG_D".to_string(), "/etc/condor/atlas.d/".to_string());
        let r = CommandReconfigurer::new("sh", Duration::from_secs(5))
            .with_args(["-c", "test \"$EXTRA_CFG_D\" = /etc/condor/atlas.d/"])
            .with_env(env);
        r.reconfigure().await.unwrap();
    }

    #[tokio::test]
    async fn timeout_is_a_failure() {
        let r = CommandReconfigurer::new("sleep", Duration::from_millis(100)).with_args(["5"]);
        let err = r.reconfigure().await.unwrap_err().to_string();
        assert!(err.contains("timed out"));
    }

    #[tokio::test]
    async fn missing_binary_is_a_failure() {
        let r = CommandReconfigurer::new("/nonexistent/condor_reconfig", Duration::from_secs(1));
        let err = r.reconfigure().await.unwrap_err().to_string();
        assert!(err.contains("failed to run"));
    }
}

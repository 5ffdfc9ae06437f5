//! Change-report mail, delivered through a sendmail-compatible command.

use std::process::Stdio;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use chrono::Local;
use gq_group::GroupDiff;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::{Notifier, StepStatus};

/// Plain-text report body.
pub fn compose_body(host: &str, diff: &GroupDiff, reconfigure: &StepStatus) -> String {
    let closing = match reconfigure {
        StepStatus::Succeeded => {
            "Receipt of this message indicates that the scheduler has been successfully\n\
             reconfigured to use the new quotas indicated above."
                .to_string()
        }
        StepStatus::Skipped => {
            "No scheduler reconfigure was performed; the new quotas take effect at the\n\
             next scheduler reconfigure."
                .to_string()
        }
        StepStatus::Failed(reason) => format!(
            "WARNING: the scheduler reconfigure failed ({reason}); the new quotas are\n\
             published but not yet in effect."
        ),
    };

    format!(
        "\nInfo: {host} has detected a change in the group quota\n\
         database; the changes that were made are:\n\n\
         {}\n\n\
         {closing}\n",
        diff.to_string().trim_end()
    )
}

/// Full RFC 5322 message text for `sendmail -t`.
pub fn compose_message(
    from: &str,
    to: &str,
    subject: &str,
    date_rfc2822: &str,
    body: &str,
) -> Result<String> {
    for (header, value) in [("From", from), ("To", to), ("Subject", subject)] {
        if value.contains('\r') || value.contains('\n') {
            bail!("MAIL_HEADER_INVALID: {header} must be a single line");
        }
        if value.trim().is_empty() {
            bail!("MAIL_HEADER_INVALID: {header} must not be empty");
        }
    }

    Ok(format!(
        "From: {from}\n\
         To: {to}\n\
         Subject: {subject}\n\
         Date: {date_rfc2822}\n\
         MIME-Version: 1.0\n\
         Content-Type: text/plain; charset=utf-8\n\
         Content-Transfer-Encoding: 8bit\n\
         \n\
         {body}"
    ))
}

#[derive(Debug, Clone)]
pub struct SendmailNotifier {
    sender: String,
    command: String,
    args: Vec<String>,
    timeout: Duration,
}

impl SendmailNotifier {
    pub fn new(
        sender: impl Into<String>,
        command: impl Into<String>,
        args: Vec<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            sender: sender.into(),
            command: command.into(),
            args,
            timeout,
        }
    }
}

#[async_trait::async_trait]
impl Notifier for SendmailNotifier {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let message = compose_message(
            &self.sender,
            to,
            subject,
            &Local::now().to_rfc2822(),
            body,
        )?;

        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to run {}", self.command))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("{} stdin unavailable", self.command))?;

        let deliver = async move {
            stdin.write_all(message.as_bytes()).await?;
            stdin.shutdown().await?;
            drop(stdin);
            child.wait_with_output().await
        };

        let output = tokio::time::timeout(self.timeout, deliver)
            .await
            .map_err(|_| anyhow!("{} timed out after {:?}", self.command, self.timeout))?
            .with_context(|| format!("{} I/O failed", self.command))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "{} returned nonzero ({}): {}",
                self.command,
                output.status,
                stderr.trim()
            );
        }
        debug!(to, "change report handed to {}", self.command);
        Ok(())
    }
}

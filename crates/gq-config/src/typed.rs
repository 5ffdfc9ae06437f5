//! Typed configuration schema.
//!
//! Every section is optional in YAML; absent keys take the defaults below.
//! Unknown keys are rejected so a typo never silently falls back to a default.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/gq/update-quotas.yaml";
pub const DEFAULT_DATABASE_URL_ENV: &str = "GQ_DATABASE_URL";

const DEFAULT_LIVE_PATH: &str = "/etc/condor/atlas-group-definitions";
const BACKUP_SUFFIX: &str = ".previous";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QuotaSyncConfig {
    pub publish: PublishConfig,
    pub source: SourceConfig,
    pub reconfig: ReconfigConfig,
    pub mail: MailConfig,
    pub logging: LoggingConfig,
}

impl QuotaSyncConfig {
    /// Range and shape checks serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.publish.live_path.as_os_str().is_empty() {
            bail!("CONFIG_INVALID: publish.live_path must not be empty");
        }
        if self.publish.live_path.file_name().is_none() {
            bail!(
                "CONFIG_INVALID: publish.live_path '{}' does not name a file",
                self.publish.live_path.display()
            );
        }
        if self.publish.backup_path() == self.publish.live_path {
            bail!("CONFIG_INVALID: publish.backup_path must differ from publish.live_path");
        }
        if !is_sql_identifier(&self.source.table) {
            bail!(
                "CONFIG_INVALID: source.table '{}' must match [A-Za-z_][A-Za-z0-9_]*",
                self.source.table
            );
        }
        if self.source.database_url_env.trim().is_empty() {
            bail!("CONFIG_INVALID: source.database_url_env must name an environment variable");
        }
        if self.source.connect_timeout_secs == 0 {
            bail!("CONFIG_INVALID: source.connect_timeout_secs must be > 0");
        }
        if self.source.max_connections == 0 {
            bail!("CONFIG_INVALID: source.max_connections must be > 0");
        }
        if self.reconfig.command.trim().is_empty() {
            bail!("CONFIG_INVALID: reconfig.command must not be empty");
        }
        if self.reconfig.timeout_secs == 0 {
            bail!("CONFIG_INVALID: reconfig.timeout_secs must be > 0");
        }
        if self.mail.sendmail_command.trim().is_empty() {
            bail!("CONFIG_INVALID: mail.sendmail_command must not be empty");
        }
        if self.mail.timeout_secs == 0 {
            bail!("CONFIG_INVALID: mail.timeout_secs must be > 0");
        }
        Ok(())
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`; the table name is spliced into SQL text.
pub fn is_sql_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// ---------------------------------------------------------------------------
// publish
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingLiveFile {
    #[default]
    Empty,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PublishConfig {
    pub live_path: PathBuf,
    /// Defaults to `<live_path>.previous`.
    pub backup_path: Option<PathBuf>,
    pub missing_live_file: MissingLiveFile,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            live_path: PathBuf::from(DEFAULT_LIVE_PATH),
            backup_path: None,
            missing_live_file: MissingLiveFile::Empty,
        }
    }
}

impl PublishConfig {
    pub fn backup_path(&self) -> PathBuf {
        match &self.backup_path {
            Some(p) => p.clone(),
            None => {
                let mut s = self.live_path.clone().into_os_string();
                s.push(BACKUP_SUFFIX);
                PathBuf::from(s)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// source
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    pub table: String,
    /// Name of the environment variable holding the database URL.
    pub database_url_env: String,
    pub connect_timeout_secs: u64,
    pub max_connections: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            table: "atlas_group_quotas".to_string(),
            database_url_env: DEFAULT_DATABASE_URL_ENV.to_string(),
            connect_timeout_secs: 3,
            max_connections: 2,
        }
    }
}

// ---------------------------------------------------------------------------
// reconfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReconfigConfig {
    pub command: String,
    pub args: Vec<String>,
    /// Extra environment for the child process.
    pub env: BTreeMap<String, String>,
    pub timeout_secs: u64,
}

impl Default for ReconfigConfig {
    fn default() -> Self {
        let mut env = BTreeMap::new();
        env.insert("EXTRA_CFG_D".to_string(), "/etc/condor/atlas.d/".to_string());
        Self {
            command: "/usr/sbin/condor_reconfig".to_string(),
            args: Vec::new(),
            env,
            timeout_secs: 60,
        }
    }
}

// ---------------------------------------------------------------------------
// mail
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MailConfig {
    pub sender: String,
    pub sendmail_command: String,
    pub sendmail_args: Vec<String>,
    pub subject: String,
    /// Host named in the message body; defaults to `$HOSTNAME` or `localhost`.
    pub host_label: Option<String>,
    pub timeout_secs: u64,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            sender: "root@localhost".to_string(),
            sendmail_command: "/usr/sbin/sendmail".to_string(),
            sendmail_args: vec!["-t".to_string(), "-oi".to_string()],
            subject: "Group quotas changed".to_string(),
            host_label: None,
            timeout_secs: 30,
        }
    }
}

impl MailConfig {
    pub fn host_label(&self) -> String {
        if let Some(label) = self.host_label.as_deref().filter(|s| !s.trim().is_empty()) {
            return label.to_string();
        }
        match std::env::var("HOSTNAME") {
            Ok(h) if !h.trim().is_empty() => h,
            _ => "localhost".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Append to this file instead of stderr.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backup_path_defaults_next_to_live() {
        let p = PublishConfig {
            live_path: PathBuf::from("/srv/groups.conf"),
            ..PublishConfig::default()
        };
        assert_eq!(p.backup_path(), PathBuf::from("/srv/groups.conf.previous"));
    }

    #[test]
    fn sql_identifier_rules() {
        assert!(is_sql_identifier("atlas_group_quotas"));
        assert!(is_sql_identifier("_t1"));
        assert!(!is_sql_identifier("1table"));
        assert!(!is_sql_identifier("groups; drop table x"));
        assert!(!is_sql_identifier(""));
    }

    #[test]
    fn explicit_host_label_wins() {
        let m = MailConfig {
            host_label: Some("batch01".to_string()),
            ..MailConfig::default()
        };
        assert_eq!(m.host_label(), "batch01");
    }

    #[test]
    fn defaults_validate() {
        QuotaSyncConfig::default().validate().unwrap();
    }
}

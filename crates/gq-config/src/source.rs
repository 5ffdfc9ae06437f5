//! Runtime resolution of the source database URL.
//!
//! # Contract
//! - YAML stores only the env var NAME (`source.database_url_env`).
//! - The binary calls [`resolve_source`] once at startup and passes the
//!   result to the database layer.
//! - `Debug` redacts the URL; errors name the variable, never its value.

use anyhow::{bail, Result};

use crate::SourceConfig;

#[derive(Clone)]
pub struct ResolvedSource {
    pub env_var: String,
    pub database_url: String,
}

impl std::fmt::Debug for ResolvedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSource")
            .field("env_var", &self.env_var)
            .field("database_url", &"<REDACTED>")
            .finish()
    }
}

/// Resolve from the process environment.
pub fn resolve_source(cfg: &SourceConfig) -> Result<ResolvedSource> {
    resolve_source_with(cfg, |name| std::env::var(name).ok())
}

/// Resolve through an arbitrary lookup (tests avoid mutating the process env).
pub fn resolve_source_with<F>(cfg: &SourceConfig, lookup: F) -> Result<ResolvedSource>
where
    F: Fn(&str) -> Option<String>,
{
    let var = cfg.database_url_env.trim();
    match lookup(var) {
        Some(v) if !v.trim().is_empty() => Ok(ResolvedSource {
            env_var: var.to_string(),
            database_url: v.trim().to_string(),
        }),
        _ => bail!(
            "SOURCE_URL_MISSING: required env var '{}' (database url) is not set or empty",
            var
        ),
    }
}

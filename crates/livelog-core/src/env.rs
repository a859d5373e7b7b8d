//! Environment overrides, applied once when a session is created.
//!
//! When a host process (e.g. a pipeline runner) drives the training script it
//! exports `DVCLIVE_PATH` together with the flags below. If `DVCLIVE_PATH` is
//! absent the environment is ignored entirely.

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::info;

use crate::error::{LiveError, Result};
use crate::models::LiveConfig;

pub const DVCLIVE_PATH: &str = "DVCLIVE_PATH";
pub const DVCLIVE_SUMMARY: &str = "DVCLIVE_SUMMARY";
pub const DVCLIVE_HTML: &str = "DVCLIVE_HTML";
pub const DVCLIVE_RESUME: &str = "DVCLIVE_RESUME";
pub const DVC_CHECKPOINT: &str = "DVC_CHECKPOINT";
/// Project root used to place the checkpoint signal file.
pub const DVC_ROOT: &str = "DVC_ROOT";

/// Frozen copy of the environment variables, taken once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    /// Snapshot of the current process environment.
    pub fn capture() -> Self {
        std::env::vars().collect()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EnvSnapshot {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Merge `env` into `explicit`.
///
/// Fails with [`LiveError::ConfigMismatch`] when `DVCLIVE_PATH` disagrees with
/// an explicitly passed path, and with [`LiveError::InvalidOption`] when the
/// merged configuration asks to resume without a summary to resume from.
pub fn resolve(explicit: LiveConfig, env: &EnvSnapshot) -> Result<LiveConfig> {
    let mut config = explicit;

    if let Some(env_path) = env.get(DVCLIVE_PATH) {
        let env_path = PathBuf::from(env_path);
        if let Some(path) = &config.path {
            if *path != env_path {
                return Err(LiveError::ConfigMismatch {
                    explicit: path.clone(),
                    env: env_path,
                });
            }
        }

        let from_env = LiveConfig {
            path: Some(env_path),
            summary: flag(env, DVCLIVE_SUMMARY)?,
            html: flag(env, DVCLIVE_HTML)?,
            checkpoint: flag(env, DVC_CHECKPOINT)?,
            resume: flag(env, DVCLIVE_RESUME)?,
        };

        if config.path != from_env.path {
            info!(path = %from_env.dir().display(), "Overriding path with value provided by DVC");
        }
        for (field, old, new) in [
            ("summary", config.summary, from_env.summary),
            ("html", config.html, from_env.html),
            ("checkpoint", config.checkpoint, from_env.checkpoint),
            ("resume", config.resume, from_env.resume),
        ] {
            if old != new {
                info!(field, value = new, "Overriding {} with value provided by DVC", field);
            }
        }
        config = from_env;
    }

    if config.resume && !config.summary {
        return Err(LiveError::InvalidOption(
            "`resume` can't be used without `summary`".to_string(),
        ));
    }
    Ok(config)
}

/// Integer flag: absent means off, any non-zero integer means on.
fn flag(env: &EnvSnapshot, var: &str) -> Result<bool> {
    let Some(raw) = env.get(var) else {
        return Ok(false);
    };
    raw.trim()
        .parse::<i64>()
        .map(|v| v != 0)
        .map_err(|_| LiveError::InvalidEnvFlag {
            var: var.to_string(),
            value: raw.to_string(),
        })
}

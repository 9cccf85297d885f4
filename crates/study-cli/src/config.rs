//! Host configuration
//!
//! Layered, last wins:
//! - optional TOML file
//! - `STUDY_*` environment variables
//! - command-line flags (applied by the binary)

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Where allocations come from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// In-process balancer over a memory store
    #[default]
    Local,
    /// Remote assignment service over HTTP
    Networked,
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "networked" | "network" | "remote" => Ok(Self::Networked),
            other => bail!("unknown mode '{other}' (expected local or networked)"),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Local => "local",
            Self::Networked => "networked",
        })
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => bail!("unknown log format '{other}' (expected text or json)"),
        }
    }
}

/// Host settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Allocation source
    pub mode: Mode,

    /// Study served or built (defaults to the definition's id)
    pub study_id: Option<String>,

    /// Assign endpoint for networked mode
    pub assign_url: Option<String>,

    /// Submit endpoint for networked mode
    pub submit_url: Option<String>,

    /// Per-request timeout for the HTTP client
    pub request_timeout_secs: u64,

    /// Log output format
    pub log_format: LogFormat,

    /// Listen address for `serve`
    pub bind_addr: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Local,
            study_id: None,
            assign_url: None,
            submit_url: None,
            request_timeout_secs: 10,
            log_format: LogFormat::Text,
            bind_addr: "127.0.0.1:8000".to_string(),
        }
    }
}

/// Environment variables read by [`HostConfig::apply_env`]
pub const ENV_VARS: [&str; 5] = [
    "STUDY_MODE",
    "STUDY_ASSIGN_URL",
    "STUDY_SUBMIT_URL",
    "STUDY_ID",
    "STUDY_LOG_FORMAT",
];

impl HostConfig {
    /// Parse a TOML document
    ///
    /// # Errors
    /// Malformed TOML or unknown enum values
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("invalid host configuration")
    }

    /// File (when given) then environment
    ///
    /// # Errors
    /// Unreadable or malformed file, or a bad environment value
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                Self::from_toml_str(&content)
                    .with_context(|| format!("in {}", path.display()))?
            }
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    /// Override from the process environment
    ///
    /// # Errors
    /// A mode or log format that does not parse
    pub fn apply_env(&mut self) -> Result<()> {
        let vars = ENV_VARS
            .iter()
            .filter_map(|name| std::env::var(name).ok().map(|v| (*name, v)));
        self.apply_vars(vars)
    }

    /// Override from `(name, value)` pairs; unknown names are ignored
    ///
    /// # Errors
    /// A mode or log format that does not parse
    pub fn apply_vars<'a, I>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a str, String)>,
    {
        for (name, value) in vars {
            if value.trim().is_empty() {
                continue;
            }
            match name {
                "STUDY_MODE" => self.mode = value.parse()?,
                "STUDY_ASSIGN_URL" => self.assign_url = Some(value),
                "STUDY_SUBMIT_URL" => self.submit_url = Some(value),
                "STUDY_ID" => self.study_id = Some(value),
                "STUDY_LOG_FORMAT" => self.log_format = value.parse()?,
                _ => {}
            }
        }
        Ok(())
    }

    /// Check cross-field requirements
    ///
    /// # Errors
    /// Networked mode without both endpoint URLs
    pub fn validate(&self) -> Result<()> {
        if self.mode == Mode::Networked {
            let missing: Vec<&str> = [
                ("assign_url", &self.assign_url),
                ("submit_url", &self.submit_url),
            ]
            .into_iter()
            .filter(|(_, url)| url.as_deref().map_or(true, |u| u.trim().is_empty()))
            .map(|(name, _)| name)
            .collect();
            if !missing.is_empty() {
                bail!("networked mode requires {}", missing.join(" and "));
            }
        }
        Ok(())
    }

    /// HTTP request timeout
    #[inline]
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

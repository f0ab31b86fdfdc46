//! Store configuration file.
//!
//! The `config` file at the store root is a list of `key=value` lines. `#`
//! starts a comment line. `version` and `algo` are required; every other key
//! is kept for the filter and textconv drivers:
//!
//! ```text
//! version=1
//! algo=blake3-256
//! filter.upper.smudge=tr a-z A-Z
//! filter.upper.required=true
//! diff.hex.textconv=xxd
//! ```

use crate::error::{Error, Result};
use crate::hash::Algorithm;
use std::collections::BTreeMap;

/// Supported config format version.
pub const CONFIG_VERSION: &str = "1";

/// Parsed store configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    algorithm: Algorithm,
    values: BTreeMap<String, String>,
}

impl Config {
    /// A fresh config for a new store.
    pub fn new(algorithm: Algorithm) -> Self {
        Self {
            algorithm,
            values: BTreeMap::new(),
        }
    }

    /// Parse config file contents.
    pub fn parse(content: &str) -> Result<Self> {
        let mut version = None;
        let mut algo = None;
        let mut values = BTreeMap::new();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(Error::invalid_config(format!("expected key=value: {}", line)));
            };
            let (key, value) = (key.trim(), value.trim());
            match key {
                "version" => version = Some(value),
                "algo" => algo = Some(value),
                _ => {
                    values.insert(key.to_string(), value.to_string());
                }
            }
        }

        if version != Some(CONFIG_VERSION) {
            return Err(Error::invalid_config(format!(
                "Unsupported config version: {:?}",
                version
            )));
        }

        let algo = algo.ok_or_else(|| Error::invalid_config("Missing algo in config"))?;
        Ok(Self {
            algorithm: Algorithm::parse(algo)?,
            values,
        })
    }

    /// Render the config back to its file form.
    pub fn render(&self) -> String {
        let mut out = format!(
            "version={}\nalgo={}\n",
            CONFIG_VERSION,
            self.algorithm.as_str()
        );
        for (key, value) in &self.values {
            out.push_str(&format!("{}={}\n", key, value));
        }
        out
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Look up an arbitrary key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Set an arbitrary key.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Smudge command of a working-tree filter driver.
    pub fn smudge_command(&self, driver: &str) -> Option<&str> {
        self.get(&format!("filter.{}.smudge", driver))
            .filter(|cmd| !cmd.is_empty())
    }

    /// Whether a failing smudge command of `driver` is fatal.
    pub fn filter_required(&self, driver: &str) -> bool {
        self.get(&format!("filter.{}.required", driver))
            .is_some_and(parse_bool)
    }

    /// Textconv command of a diff driver.
    pub fn textconv_command(&self, driver: &str) -> Option<&str> {
        self.get(&format!("diff.{}.textconv", driver))
            .filter(|cmd| !cmd.is_empty())
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "true" | "yes" | "on" | "1"
    )
}

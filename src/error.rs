use std::{io, path::PathBuf};

use thiserror::Error;

/// A pattern whose source is not a valid regular expression.
#[derive(Error, Debug, Clone)]
#[error("{}pattern `{value}` does not compile: {source}", rule_prefix(.rule))]
pub struct PatternError {
    /// Index of the owning rule, when known.
    pub rule: Option<usize>,
    pub value: String,
    #[source]
    pub source: regex::Error,
}

fn rule_prefix(rule: &Option<usize>) -> String {
    match rule {
        Some(idx) => format!("rule #{idx}: "),
        None => String::new(),
    }
}

impl PatternError {
    pub fn in_rule(mut self, rule: usize) -> Self {
        self.rule = Some(rule);
        self
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("no config at {}", .0.display())]
    Absent(PathBuf),
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed config from {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("malformed settings in {}: {source}", .path.display())]
    Settings {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("cannot write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Error, Debug)]
pub enum LaunchError {
    /// The rule set resolved to an empty identifier, typically an unset `default_app`.
    #[error("no application configured for {url}")]
    NoMatchingApplication { url: String },
    #[error("application `{0}` not found")]
    AppNotFound(String),
    #[error("failed to start `{app}`: {source}")]
    Spawn {
        app: String,
        #[source]
        source: io::Error,
    },
}

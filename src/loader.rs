use std::{
    fs, io,
    path::{Path, PathBuf},
};

use crate::{error::ConfigError, rule::Config};

const BUNDLED: &str = include_str!("../assets/config.json");

pub fn parse(bytes: &[u8]) -> Result<Config, ConfigError> {
    parse_from(bytes, "<bytes>")
}

fn parse_from(bytes: &[u8], origin: &str) -> Result<Config, ConfigError> {
    serde_json::from_slice(bytes).map_err(|source| ConfigError::Parse {
        origin: origin.to_owned(),
        source,
    })
}

pub fn serialize(config: &Config) -> Vec<u8> {
    // plain strings and vectors only, serialization cannot fail
    serde_json::to_vec_pretty(config).unwrap_or_default()
}

/// `$XDG_CONFIG_HOME/linkroute/config.json`
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(crate::APP_DIR).join("config.json"))
}

/// Somewhere a config document can be read from.
pub trait ConfigSource {
    fn describe(&self) -> String;

    fn read(&self) -> Result<Vec<u8>, ConfigError>;

    fn load(&self) -> Result<Config, ConfigError> {
        parse_from(&self.read()?, &self.describe())
    }
}

/// Somewhere a config document can be written to.
pub trait ConfigSink {
    fn write(&self, bytes: &[u8]) -> Result<(), ConfigError>;
}

#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigSource for FileSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn read(&self) -> Result<Vec<u8>, ConfigError> {
        fs::read(&self.path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => ConfigError::Absent(self.path.clone()),
            _ => ConfigError::Read {
                path: self.path.clone(),
                source,
            },
        })
    }
}

impl ConfigSink for FileSource {
    fn write(&self, bytes: &[u8]) -> Result<(), ConfigError> {
        let wrap = |source| ConfigError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(wrap)?;
        }
        fs::write(&self.path, bytes).map_err(wrap)
    }
}

/// The config shipped inside the binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct BundledSource;

impl ConfigSource for BundledSource {
    fn describe(&self) -> String {
        "bundled config".to_owned()
    }

    fn read(&self) -> Result<Vec<u8>, ConfigError> {
        Ok(BUNDLED.as_bytes().to_vec())
    }
}

/// First source that yields a non-empty config wins, otherwise the empty config.
pub fn load_config(sources: &[&dyn ConfigSource]) -> Config {
    for source in sources {
        let origin = source.describe();
        match source.load() {
            Ok(config) if config.is_empty() => {
                tracing::info!(%origin, "config is empty, trying next source");
            }
            Ok(config) => {
                tracing::info!(%origin, rules = config.rules.len(), "using config");
                return config;
            }
            Err(e @ ConfigError::Absent(_)) => tracing::info!(%origin, "{}", e),
            Err(e) => tracing::warn!(%origin, "{}", e),
        }
    }
    tracing::warn!("no usable config, every link goes nowhere");
    Config::default()
}

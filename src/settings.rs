use std::{fs, io, path::PathBuf};

use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    error::ConfigError,
    loader::{self, BundledSource, FileSource},
    station::Sources,
};

/// Daemon settings, `$XDG_CONFIG_HOME/linkroute/linkroute.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub log_level: String,
    /// Also log to the systemd journal.
    pub journald: bool,
    /// Rule document, defaults to [`loader::user_config_path`].
    pub config: Option<PathBuf>,
    /// Ask sway for the focused window when a link comes without a source.
    pub detect_source: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            journald: false,
            config: None,
            detect_source: true,
        }
    }
}

impl Settings {
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(crate::APP_DIR).join("linkroute.toml"))
    }

    /// Reads the settings file, a missing file means defaults.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::path() {
            Some(path) => Self::load_from(path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: PathBuf) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => return Err(ConfigError::Read { path, source }),
        };
        toml::from_str(&content).map_err(|source| ConfigError::Settings { path, source })
    }

    pub fn level(&self) -> LevelFilter {
        self.log_level.parse().unwrap_or(LevelFilter::INFO)
    }

    pub fn config_path(&self) -> Option<PathBuf> {
        self.config.clone().or_else(loader::user_config_path)
    }

    /// User document first, then the bundled one.
    pub fn config_sources(&self) -> Sources {
        let mut sources: Sources = Vec::with_capacity(2);
        if let Some(path) = self.config_path() {
            sources.push(Box::new(FileSource::new(path)));
        }
        sources.push(Box::new(BundledSource));
        sources
    }
}

/// Installs the process subscriber, logs go to stderr and optionally journald.
pub fn init_tracing(settings: &Settings) -> color_eyre::Result<()> {
    let journald = if settings.journald {
        Some(tracing_journald::layer()?)
    } else {
        None
    };
    tracing_subscriber::registry()
        .with(settings.level())
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(journald)
        .try_init()?;
    Ok(())
}

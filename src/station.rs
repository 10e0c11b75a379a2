use std::sync::Arc;

use zbus::{dbus_interface, fdo};

use crate::{
    dispatch::{ApplicationLauncher, Dispatcher, UrlEvent},
    focus,
    loader::{self, BundledSource, ConfigSource, FileSource},
    settings::Settings,
    store::RuleStore,
};

pub type Sources = Vec<Box<dyn ConfigSource + Send + Sync>>;

/// Object served at [`crate::PATH`].
pub struct Station {
    dispatcher: Dispatcher,
    sources: Sources,
    detect_source: bool,
}

impl Station {
    pub fn new(settings: &Settings, launcher: Box<dyn ApplicationLauncher>) -> Self {
        let sources = settings.config_sources();
        let store = Arc::new(RuleStore::default());
        store.reload(&borrow(&sources));
        Self {
            dispatcher: Dispatcher::new(store, launcher),
            sources,
            detect_source: settings.detect_source,
        }
    }

    pub fn store(&self) -> &Arc<RuleStore> {
        self.dispatcher.store()
    }

    async fn source_app(&self, given: String) -> Option<String> {
        if !given.is_empty() {
            return Some(given);
        }
        if self.detect_source {
            focus::detect_source().await
        } else {
            None
        }
    }
}

/// Views boxed sources the way [`RuleStore::reload`] takes them.
pub fn borrow(sources: &Sources) -> Vec<&dyn ConfigSource> {
    sources.iter().map(|s| &**s as &dyn ConfigSource).collect()
}

#[dbus_interface(name = "moe.gyara.linkroute")]
impl Station {
    async fn ping(&self) -> String {
        format!("linkroute {} at your service", env!("CARGO_PKG_VERSION"))
    }

    /// Empty `source_app` means "ask the compositor".
    async fn open(&self, url: String, source_app: String) -> fdo::Result<String> {
        let event = UrlEvent::new(url, self.source_app(source_app).await);
        tracing::info!(url = %event.url, source = ?event.source_app, "open");
        self.dispatcher.dispatch(&event).map_err(|e| {
            tracing::error!(url = %event.url, "{}", e);
            fdo::Error::Failed(e.to_string())
        })
    }

    /// Empty `source_app` means unknown.
    async fn resolve(&self, url: String, source_app: String) -> String {
        let source_app = Some(source_app).filter(|app| !app.is_empty());
        let snapshot = self.store().snapshot();
        let resolution = snapshot.explain(&url, source_app.as_deref());
        match resolution.rule {
            Some(idx) => format!("{} (rule #{idx})", resolution.app),
            None => format!("{} (default)", resolution.app),
        }
    }

    /// Empty `path` reads the configured sources again.
    async fn reload_config(&self, path: String) -> String {
        let errors = if path.is_empty() {
            self.store().reload(&borrow(&self.sources))
        } else {
            let file = FileSource::new(&path);
            self.store().reload(&[&file, &BundledSource])
        };
        let snapshot = self.store().snapshot();
        let mut summary = format!(
            "{} rules, default app `{}`",
            snapshot.config().rules.len(),
            snapshot.config().default_app
        );
        for e in errors {
            summary.push('\n');
            summary.push_str(&e.to_string());
        }
        summary
    }

    async fn dump_config(&self) -> String {
        let bytes = loader::serialize(self.store().snapshot().config());
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

#[cfg(test)]
mod test {
    use std::{
        path::PathBuf,
        sync::{Arc, Mutex},
    };

    use futures::executor::block_on;

    use super::Station;
    use crate::{
        dispatch::ApplicationLauncher,
        error::LaunchError,
        loader::{self, ConfigSink, FileSource},
        rule::{Config, Rule},
        settings::Settings,
    };

    #[derive(Default, Clone)]
    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl ApplicationLauncher for Recorder {
        fn launch(&self, app: &str, url: &str) -> Result<(), LaunchError> {
            self.0.lock().unwrap().push(format!("{app} {url}"));
            Ok(())
        }
    }

    fn temp_config(name: &str, config: &Config) -> color_eyre::Result<PathBuf> {
        let path = std::env::temp_dir()
            .join(format!("linkroute-station-{}-{name}", std::process::id()))
            .join("config.json");
        FileSource::new(&path).write(&loader::serialize(config))?;
        Ok(path)
    }

    #[test]
    fn serve() -> color_eyre::Result<()> {
        let first = Config::new("firefox", vec![Rule::new("mpv").with_url("youtube"), Rule::new("chat").with_source("Slack")]);
        let path = temp_config("first", &first)?;
        let settings = Settings {
            config: Some(path.clone()),
            detect_source: false,
            ..Settings::default()
        };
        let recorder = Recorder::default();
        let station = Station::new(&settings, Box::new(recorder.clone()));

        assert_eq!(block_on(station.open("https://youtube.com/x".to_owned(), String::new()))?, "mpv");
        assert_eq!(block_on(station.open("https://a.b".to_owned(), "Slack".to_owned()))?, "chat");
        assert_eq!(*recorder.0.lock().unwrap(), ["mpv https://youtube.com/x", "chat https://a.b"]);

        assert_eq!(block_on(station.resolve("https://a.b".to_owned(), String::new())), "firefox (default)");
        assert_eq!(block_on(station.resolve("https://a.b".to_owned(), "Slack".to_owned())), "chat (rule #1)");

        let second = Config::new("chromium", vec![Rule::new("broken").with_url("(")]);
        let other = temp_config("second", &second)?;
        let summary = block_on(station.reload_config(other.display().to_string()));
        assert!(summary.starts_with("1 rules, default app `chromium`\nrule #0: pattern `(`"));
        assert_eq!(loader::parse(block_on(station.dump_config()).as_bytes())?, second);

        // empty path goes back to the configured sources
        block_on(station.reload_config(String::new()));
        assert_eq!(station.store().draft(), first);

        for file in [path, other] {
            if let Some(dir) = file.parent() {
                std::fs::remove_dir_all(dir)?;
            }
        }
        Ok(())
    }

    #[test]
    fn open_without_default() -> color_eyre::Result<()> {
        let path = temp_config("empty", &Config::default())?;
        let settings = Settings {
            config: Some(path.clone()),
            detect_source: false,
            ..Settings::default()
        };
        let station = Station::new(&settings, Box::new(Recorder::default()));
        if let Some(dir) = path.parent() {
            std::fs::remove_dir_all(dir)?;
        }
        // the bundled config takes over from an empty user config
        assert!(!station.store().draft().is_empty());

        let mut draft = station.store().draft();
        draft.default_app.clear();
        draft.rules.clear();
        station.store().commit(draft);
        assert!(block_on(station.open("https://a.b".to_owned(), String::new())).is_err());
        Ok(())
    }
}

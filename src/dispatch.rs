use std::{
    env,
    path::{Path, PathBuf},
    process::{Command, Stdio},
    sync::Arc,
};

use crate::{error::LaunchError, store::RuleStore};

/// A link someone asked to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlEvent {
    pub url: String,
    /// App id of the window the link came from, when known.
    pub source_app: Option<String>,
}

impl UrlEvent {
    pub fn new(url: impl Into<String>, source_app: Option<String>) -> Self {
        Self {
            url: url.into(),
            source_app: source_app.filter(|app| !app.is_empty()),
        }
    }
}

pub trait UrlEventSource {
    fn next_event(&mut self) -> Option<UrlEvent>;
}

impl<I: Iterator<Item = UrlEvent>> UrlEventSource for I {
    fn next_event(&mut self) -> Option<UrlEvent> {
        self.next()
    }
}

pub trait ApplicationLauncher: Send + Sync {
    fn launch(&self, app: &str, url: &str) -> Result<(), LaunchError>;
}

pub struct Dispatcher {
    store: Arc<RuleStore>,
    launcher: Box<dyn ApplicationLauncher>,
}

impl Dispatcher {
    pub fn new(store: Arc<RuleStore>, launcher: Box<dyn ApplicationLauncher>) -> Self {
        Self { store, launcher }
    }

    pub fn store(&self) -> &Arc<RuleStore> {
        &self.store
    }

    /// Resolves and launches, returning the app that got the link.
    pub fn dispatch(&self, event: &UrlEvent) -> Result<String, LaunchError> {
        let app = self.store.resolve(&event.url, event.source_app.as_deref());
        if app.is_empty() {
            return Err(LaunchError::NoMatchingApplication { url: event.url.clone() });
        }
        self.launcher.launch(&app, &event.url)?;
        Ok(app)
    }

    /// Dispatches until the source runs dry, returns how many links were opened.
    pub fn run(&self, source: &mut dyn UrlEventSource) -> usize {
        let mut opened = 0;
        while let Some(event) = source.next_event() {
            match self.dispatch(&event) {
                Ok(app) => {
                    tracing::info!(url = %event.url, %app, "opened");
                    opened += 1;
                }
                Err(e) => tracing::error!(url = %event.url, "{}", e),
            }
        }
        opened
    }
}

/// Starts the app as a detached child process.
///
/// `app` is a command line split on whitespace. A `%u` or `%U` argument is replaced by the url,
/// otherwise the url goes last, the way desktop entries spell it.
#[derive(Debug, Default, Clone)]
pub struct ExecLauncher {
    /// Overrides `$PATH` for lookups.
    search_path: Option<Vec<PathBuf>>,
}

impl ExecLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search_path(search_path: Vec<PathBuf>) -> Self {
        Self {
            search_path: Some(search_path),
        }
    }

    pub fn command_line(app: &str, url: &str) -> Vec<String> {
        let mut args: Vec<String> = app.split_whitespace().map(str::to_owned).collect();
        let mut substituted = false;
        for arg in args.iter_mut().skip(1) {
            if arg == "%u" || arg == "%U" {
                *arg = url.to_owned();
                substituted = true;
            }
        }
        if !substituted {
            args.push(url.to_owned());
        }
        args
    }

    fn locate(&self, program: &str) -> Option<PathBuf> {
        if program.contains('/') {
            let path = Path::new(program);
            return path.is_file().then(|| path.to_path_buf());
        }
        let dirs = match &self.search_path {
            Some(dirs) => dirs.clone(),
            None => env::var_os("PATH").map(|p| env::split_paths(&p).collect()).unwrap_or_default(),
        };
        dirs.into_iter().map(|dir| dir.join(program)).find(|path| path.is_file())
    }
}

impl ApplicationLauncher for ExecLauncher {
    fn launch(&self, app: &str, url: &str) -> Result<(), LaunchError> {
        if app.trim().is_empty() {
            return Err(LaunchError::AppNotFound(app.to_owned()));
        }
        let args = Self::command_line(app, url);
        let path = self.locate(&args[0]).ok_or_else(|| LaunchError::AppNotFound(args[0].clone()))?;
        tracing::debug!(program = %path.display(), args = ?&args[1..], "spawning");
        let mut child = Command::new(path)
            .args(&args[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| LaunchError::Spawn {
                app: app.to_owned(),
                source,
            })?;
        // reap it so long-lived daemons do not pile up zombies
        std::thread::spawn(move || child.wait());
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::sync::{Arc, Mutex};

    use super::{ApplicationLauncher, Dispatcher, ExecLauncher, UrlEvent};
    use crate::{
        error::LaunchError,
        rule::{Config, Rule},
        store::RuleStore,
    };

    #[derive(Default, Clone)]
    struct Recorder(Arc<Mutex<Vec<(String, String)>>>);

    impl ApplicationLauncher for Recorder {
        fn launch(&self, app: &str, url: &str) -> Result<(), LaunchError> {
            if app == "missing" {
                return Err(LaunchError::AppNotFound(app.to_owned()));
            }
            self.0.lock().unwrap().push((app.to_owned(), url.to_owned()));
            Ok(())
        }
    }

    fn dispatcher(config: Config) -> (Dispatcher, Recorder) {
        let recorder = Recorder::default();
        let store = Arc::new(RuleStore::new(config));
        (Dispatcher::new(store, Box::new(recorder.clone())), recorder)
    }

    #[test]
    fn dispatch() -> color_eyre::Result<()> {
        let config = Config::new("firefox", vec![Rule::new("mpv").with_url("youtube")]);
        let (dispatcher, recorder) = dispatcher(config);
        assert_eq!(dispatcher.dispatch(&UrlEvent::new("https://youtube.com/x", None))?, "mpv");
        assert_eq!(dispatcher.dispatch(&UrlEvent::new("https://a.b", None))?, "firefox");
        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec![
                ("mpv".to_owned(), "https://youtube.com/x".to_owned()),
                ("firefox".to_owned(), "https://a.b".to_owned())
            ]
        );
        Ok(())
    }

    #[test]
    fn empty_default_never_launches() {
        let (dispatcher, recorder) = dispatcher(Config::default());
        let err = dispatcher.dispatch(&UrlEvent::new("https://a.b", None)).unwrap_err();
        assert!(matches!(err, LaunchError::NoMatchingApplication { url } if url == "https://a.b"));
        assert!(recorder.0.lock().unwrap().is_empty());
    }

    #[test]
    fn missing_app_is_not_rerouted() {
        let config = Config::new("firefox", vec![Rule::new("missing").with_url("x")]);
        let (dispatcher, recorder) = dispatcher(config);
        let err = dispatcher.dispatch(&UrlEvent::new("https://x.y", None)).unwrap_err();
        assert!(matches!(err, LaunchError::AppNotFound(app) if app == "missing"));
        assert!(recorder.0.lock().unwrap().is_empty());
    }

    #[test]
    fn run() {
        let config = Config::new("", vec![Rule::new("chat").with_source("Slack")]);
        let (dispatcher, recorder) = dispatcher(config);
        let mut events = vec![
            UrlEvent::new("https://1", Some("Slack".to_owned())),
            UrlEvent::new("https://2", None),
            UrlEvent::new("https://3", Some(String::new())),
            UrlEvent::new("https://4", Some("Slack".to_owned())),
        ]
        .into_iter();
        assert_eq!(dispatcher.run(&mut events), 2);
        assert_eq!(recorder.0.lock().unwrap().len(), 2);
    }

    #[test]
    fn command_line() {
        assert_eq!(ExecLauncher::command_line("firefox", "https://a"), ["firefox", "https://a"]);
        assert_eq!(
            ExecLauncher::command_line("chromium --new-window %u --incognito", "https://a"),
            ["chromium", "--new-window", "https://a", "--incognito"]
        );
        assert_eq!(ExecLauncher::command_line("  mpv   --fs ", "u"), ["mpv", "--fs", "u"]);
    }

    #[test]
    fn unknown_program() {
        let launcher = ExecLauncher::with_search_path(vec![]);
        assert!(matches!(
            launcher.launch("firefox", "https://a"),
            Err(LaunchError::AppNotFound(app)) if app == "firefox"
        ));
        assert!(matches!(
            launcher.launch("/nonexistent/bin/firefox", "https://a"),
            Err(LaunchError::AppNotFound(_))
        ));
        assert!(matches!(launcher.launch("", "https://a"), Err(LaunchError::AppNotFound(_))));
    }
}

use std::sync::{Arc, Mutex, MutexGuard};

use arc_swap::ArcSwap;
use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};

use crate::{
    error::{ConfigError, PatternError},
    loader::{self, ConfigSink, ConfigSource},
    matcher::Matcher,
    rule::{Config, PatternCache},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigEvent {
    /// An edited draft went live.
    Committed { rules: usize, broken: usize },
    /// Sources were read again.
    Reloaded { rules: usize, broken: usize },
}

/// Owns the live rule snapshot. Readers get an `Arc<Matcher>` that never changes under them,
/// writers build a whole new one and swap it in.
pub struct RuleStore {
    live: ArcSwap<Matcher>,
    cache: Mutex<PatternCache>,
    observers: Mutex<Vec<UnboundedSender<ConfigEvent>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // the guarded data stays consistent even if a holder panicked
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Default for RuleStore {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl RuleStore {
    pub fn new(config: Config) -> Self {
        let mut cache = PatternCache::new();
        let matcher = Matcher::new(config, &mut cache);
        Self {
            live: ArcSwap::from_pointee(matcher),
            cache: Mutex::new(cache),
            observers: Mutex::new(Vec::new()),
        }
    }

    pub fn snapshot(&self) -> Arc<Matcher> {
        self.live.load_full()
    }

    pub fn resolve(&self, url: &str, source_app: Option<&str>) -> String {
        self.live.load().resolve(url, source_app).to_owned()
    }

    /// Copy of the live config to edit.
    pub fn draft(&self) -> Config {
        self.live.load().config().clone()
    }

    pub fn commit(&self, draft: Config) -> Vec<PatternError> {
        let (rules, broken, errors) = self.publish(draft);
        self.notify(ConfigEvent::Committed { rules, broken });
        errors
    }

    pub fn reload(&self, sources: &[&dyn ConfigSource]) -> Vec<PatternError> {
        let config = loader::load_config(sources);
        let (rules, broken, errors) = self.publish(config);
        self.notify(ConfigEvent::Reloaded { rules, broken });
        errors
    }

    pub fn save(&self, sink: &dyn ConfigSink) -> Result<(), ConfigError> {
        sink.write(&loader::serialize(self.live.load().config()))
    }

    pub fn subscribe(&self) -> UnboundedReceiver<ConfigEvent> {
        let (tx, rx) = unbounded();
        lock(&self.observers).push(tx);
        rx
    }

    fn publish(&self, config: Config) -> (usize, usize, Vec<PatternError>) {
        let matcher = {
            let mut cache = lock(&self.cache);
            let matcher = Matcher::new(config, &mut cache);
            cache.retain(matcher.config().rules.iter().flat_map(|r| r.url_patterns.iter().chain(&r.app_patterns)));
            matcher
        };
        let rules = matcher.config().rules.len();
        let errors = matcher.errors().to_vec();
        for e in &errors {
            tracing::warn!("{}", e);
        }
        self.live.store(Arc::new(matcher));
        (rules, errors.len(), errors)
    }

    fn notify(&self, event: ConfigEvent) {
        tracing::debug!(?event, "config published");
        lock(&self.observers).retain(|tx| tx.unbounded_send(event.clone()).is_ok());
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::{ConfigEvent, RuleStore};
    use crate::{
        loader::{ConfigSink, ConfigSource},
        error::ConfigError,
        rule::{Config, Rule},
    };

    struct Memory(&'static str);

    impl ConfigSource for Memory {
        fn describe(&self) -> String {
            "memory".to_owned()
        }

        fn read(&self) -> Result<Vec<u8>, ConfigError> {
            Ok(self.0.as_bytes().to_vec())
        }
    }

    #[derive(Default)]
    struct Captured(std::sync::Mutex<Vec<u8>>);

    impl ConfigSink for Captured {
        fn write(&self, bytes: &[u8]) -> Result<(), ConfigError> {
            self.0.lock().unwrap().extend_from_slice(bytes);
            Ok(())
        }
    }

    #[test]
    fn draft_is_invisible_until_commit() {
        let store = RuleStore::new(Config::new("A", vec![]));
        let before = store.snapshot();

        let mut draft = store.draft();
        draft.push_rule().add_url_pattern("example");
        draft.rules[0].app = "B".to_owned();
        assert_eq!(store.resolve("https://example.com", None), "A");

        assert!(store.commit(draft).is_empty());
        assert_eq!(store.resolve("https://example.com", None), "B");
        // readers holding the old snapshot keep it
        assert_eq!(before.resolve("https://example.com", None), "A");
        assert!(!Arc::ptr_eq(&before, &store.snapshot()));
    }

    #[test]
    fn observers() {
        let store = RuleStore::default();
        let mut rx = store.subscribe();
        let dropped = store.subscribe();
        drop(dropped);

        let errors = store.commit(Config::new("A", vec![Rule::new("B").with_url("(")]));
        assert_eq!(errors.len(), 1);
        assert_eq!(
            rx.try_next().ok().flatten(),
            Some(ConfigEvent::Committed { rules: 1, broken: 1 })
        );

        store.reload(&[&Memory(r#"{ "default_app": "C" }"#)]);
        assert_eq!(
            rx.try_next().ok().flatten(),
            Some(ConfigEvent::Reloaded { rules: 0, broken: 0 })
        );
        assert_eq!(store.resolve("x", None), "C");
        assert_eq!(store.observers.lock().unwrap().len(), 1);
    }

    #[test]
    fn cache_survives_reload() {
        let store = RuleStore::new(Config::new("A", vec![Rule::new("B").with_url("one").with_url("two")]));
        assert_eq!(store.cache.lock().unwrap().len(), 2);

        store.commit(Config::new("A", vec![Rule::new("B").with_url("two"), Rule::new("C").with_url("two")]));
        assert_eq!(store.cache.lock().unwrap().len(), 1);
    }

    #[test]
    fn save() -> color_eyre::Result<()> {
        let config = Config::new("A", vec![Rule::new("B").with_source("kitty")]);
        let store = RuleStore::new(config.clone());
        let sink = Captured::default();
        store.save(&sink)?;
        let bytes = sink.0.lock().unwrap().clone();
        assert_eq!(crate::loader::parse(&bytes)?, config);
        Ok(())
    }
}

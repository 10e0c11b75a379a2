use regex::Regex;

use crate::{
    error::PatternError,
    rule::{Config, Pattern, PatternCache},
};

/// Compiled side of a rule.
#[derive(Debug)]
enum Gate {
    /// Source list was empty, holds for anything.
    Any,
    /// Holds when one of the regexes is found. May be empty when every pattern failed to compile.
    OneOf(Vec<Regex>),
}

impl Gate {
    fn compile(idx: usize, patterns: &[Pattern], cache: &mut PatternCache, errors: &mut Vec<PatternError>) -> Self {
        if patterns.is_empty() {
            return Self::Any;
        }
        let mut regexes = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            match cache.get(pattern) {
                Ok(re) => regexes.push(re),
                Err(e) => {
                    let e = e.in_rule(idx);
                    tracing::error!(rule = idx, pattern = %pattern.value, "skipping pattern: {}", e.source);
                    errors.push(e);
                }
            }
        }
        Self::OneOf(regexes)
    }

    fn holds(&self, candidate: &str) -> bool {
        match self {
            Self::Any => true,
            Self::OneOf(regexes) => regexes.iter().any(|re| re.is_match(candidate)),
        }
    }

    fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }
}

#[derive(Debug)]
struct CompiledRule {
    url: Gate,
    source: Gate,
}

/// Outcome of a lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution<'a> {
    pub app: &'a str,
    /// Index of the rule that fired, `None` for the default app.
    pub rule: Option<usize>,
}

/// Immutable, compiled view of one [`Config`].
#[derive(Debug)]
pub struct Matcher {
    config: Config,
    compiled: Vec<CompiledRule>,
    errors: Vec<PatternError>,
}

impl Matcher {
    pub fn new(config: Config, cache: &mut PatternCache) -> Self {
        let mut errors = Vec::new();
        let compiled = config
            .rules
            .iter()
            .enumerate()
            .map(|(idx, rule)| CompiledRule {
                url: Gate::compile(idx, &rule.url_patterns, cache, &mut errors),
                source: Gate::compile(idx, &rule.app_patterns, cache, &mut errors),
            })
            .collect();
        tracing::debug!(rules = config.rules.len(), broken = errors.len(), "rules compiled");
        Self {
            config,
            compiled,
            errors,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Patterns dropped while compiling.
    pub fn errors(&self) -> &[PatternError] {
        &self.errors
    }

    pub fn resolve(&self, url: &str, source_app: Option<&str>) -> &str {
        self.explain(url, source_app).app
    }

    pub fn explain(&self, url: &str, source_app: Option<&str>) -> Resolution<'_> {
        for (idx, (rule, compiled)) in self.config.rules.iter().zip(&self.compiled).enumerate() {
            let source_ok = match source_app {
                _ if compiled.source.is_any() => true,
                Some(app) => compiled.source.holds(app),
                // an app affinity needs an app identity
                None => false,
            };
            if !source_ok {
                continue;
            }
            if compiled.url.holds(url) {
                tracing::info!(rule = idx, app = %rule.app, url, "matched");
                return Resolution {
                    app: &rule.app,
                    rule: Some(idx),
                };
            }
        }
        tracing::info!(app = %self.config.default_app, url, "default app");
        Resolution {
            app: &self.config.default_app,
            rule: None,
        }
    }
}

impl From<Config> for Matcher {
    fn from(config: Config) -> Self {
        Self::new(config, &mut PatternCache::new())
    }
}

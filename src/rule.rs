use serde::{Deserialize, Serialize};

use crate::error::PatternError;

mod pattern;

pub use pattern::{matches, Pattern, PatternCache};

/// # Rule
/// app ("firefox --new-window") <= url_patterns ["youtube\.com"], app_patterns ["Slack"]
/// Both sides must hold, an empty side always holds. First rule to hold wins.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Rule {
    pub app: String,
    #[serde(rename = "urlPatterns", alias = "patterns", default)]
    pub url_patterns: Vec<Pattern>,
    #[serde(rename = "appPatterns", default)]
    pub app_patterns: Vec<Pattern>,
}

impl Rule {
    pub fn new(app: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            ..Self::default()
        }
    }

    pub fn with_url(mut self, pattern: impl Into<Pattern>) -> Self {
        self.add_url_pattern(pattern);
        self
    }

    pub fn with_source(mut self, pattern: impl Into<Pattern>) -> Self {
        self.add_app_pattern(pattern);
        self
    }

    /// Address of the rule in an editor, not used for matching.
    pub fn id(&self) -> String {
        let mut id = self.app.clone();
        for pattern in self.url_patterns.iter().chain(&self.app_patterns) {
            id.push_str(pattern.id());
        }
        id
    }

    pub fn add_url_pattern(&mut self, pattern: impl Into<Pattern>) {
        self.url_patterns.push(pattern.into());
    }

    pub fn add_app_pattern(&mut self, pattern: impl Into<Pattern>) {
        self.app_patterns.push(pattern.into());
    }

    /// Drops every pattern with the given id from both lists.
    pub fn remove_pattern(&mut self, id: &str) -> bool {
        let before = self.url_patterns.len() + self.app_patterns.len();
        self.url_patterns.retain(|p| p.id() != id);
        self.app_patterns.retain(|p| p.id() != id);
        before != self.url_patterns.len() + self.app_patterns.len()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub default_app: String,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl Config {
    pub fn new(default_app: impl Into<String>, rules: Vec<Rule>) -> Self {
        Self {
            default_app: default_app.into(),
            rules,
        }
    }

    /// Unset config, loaders move on to the next source when they see one.
    pub fn is_empty(&self) -> bool {
        self.default_app.is_empty() && self.rules.is_empty()
    }

    /// Appends a rule that targets the current default app.
    pub fn push_rule(&mut self) -> &mut Rule {
        self.rules.push(Rule::new(self.default_app.clone()));
        let last = self.rules.len() - 1;
        &mut self.rules[last]
    }

    /// Compiles every pattern and reports all failures, not only the first.
    pub fn validate(&self) -> Vec<PatternError> {
        self.rules
            .iter()
            .enumerate()
            .flat_map(|(idx, rule)| {
                rule.url_patterns
                    .iter()
                    .chain(&rule.app_patterns)
                    .filter_map(move |p| p.compile().err().map(|e| e.in_rule(idx)))
            })
            .collect()
    }
}

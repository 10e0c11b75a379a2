use std::collections::HashMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::PatternError;

/// Regex source matched anywhere inside the candidate, anchors must be spelled out.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(from = "PatternRepr")]
pub struct Pattern {
    pub value: String,
}

/// Oldest configs stored patterns as bare strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum PatternRepr {
    Bare(String),
    Tagged { value: String },
}

impl From<PatternRepr> for Pattern {
    fn from(repr: PatternRepr) -> Self {
        match repr {
            PatternRepr::Bare(value) | PatternRepr::Tagged { value } => Self { value },
        }
    }
}

impl From<&str> for Pattern {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Pattern {
    fn from(value: String) -> Self {
        Self { value }
    }
}

impl Pattern {
    pub fn new(value: impl Into<String>) -> Self {
        Self { value: value.into() }
    }

    pub fn id(&self) -> &str {
        &self.value
    }

    pub fn compile(&self) -> Result<Regex, PatternError> {
        Regex::new(&self.value).map_err(|source| PatternError {
            rule: None,
            value: self.value.clone(),
            source,
        })
    }
}

/// One-shot match without a cache. A pattern that does not compile never matches.
pub fn matches(candidate: &str, pattern: &Pattern) -> bool {
    match pattern.compile() {
        Ok(re) => re.is_match(candidate),
        Err(e) => {
            tracing::error!(pattern = %pattern.value, "{}", e);
            false
        }
    }
}

/// Compiled patterns keyed by source, failures included so they are not retried.
#[derive(Default, Debug)]
pub struct PatternCache {
    compiled: HashMap<String, Result<Regex, regex::Error>>,
}

impl PatternCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, pattern: &Pattern) -> Result<Regex, PatternError> {
        let entry = self
            .compiled
            .entry(pattern.value.clone())
            .or_insert_with(|| Regex::new(&pattern.value));
        // Regex clones share the compiled program.
        entry.clone().map_err(|source| PatternError {
            rule: None,
            value: pattern.value.clone(),
            source,
        })
    }

    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }

    /// Forgets sources no longer referenced by `keep`.
    pub fn retain<'a>(&mut self, keep: impl IntoIterator<Item = &'a Pattern>) {
        let keep: std::collections::HashSet<&str> = keep.into_iter().map(|p| p.value.as_str()).collect();
        self.compiled.retain(|value, _| keep.contains(value.as_str()));
    }
}

//! Validated configuration for the related-records pipeline.

use std::env;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Built-in English stop list
pub const DEFAULT_STOP_WORDS: &[&str] = &[
    "able", "about", "across", "after", "all", "almost", "also", "among", "and", "any", "are",
    "because", "been", "but", "can", "cannot", "could", "dear", "did", "does", "either", "else",
    "ever", "every", "for", "from", "get", "got", "had", "has", "have", "her", "hers", "him",
    "his", "how", "however", "into", "its", "just", "least", "let", "like", "likely", "may",
    "might", "most", "must", "neither", "nor", "not", "off", "often", "only", "other", "our",
    "own", "rather", "said", "say", "says", "she", "should", "since", "some", "than", "that",
    "the", "their", "them", "then", "there", "these", "they", "this", "tis", "too", "twas",
    "wants", "was", "were", "what", "when", "where", "which", "while", "who", "whom", "why",
    "will", "with", "would", "yet", "you", "your",
];

pub const DEFAULT_FIELDS: &[&str] = &["title", "excerpt", "content"];
pub const DEFAULT_RECORD_LIMIT: usize = 100;
pub const DEFAULT_NAMESPACE: &str = "related";
pub const DEFAULT_DEDICATED_CACHE: &str = "comparison";
pub const DEFAULT_CACHE: &str = "default";

pub const ENV_FIELDS: &str = "RELATED_FIELDS";
pub const ENV_LIMIT: &str = "RELATED_LIMIT";
pub const ENV_STOP_WORDS: &str = "RELATED_STOP_WORDS";
pub const ENV_NAMESPACE: &str = "RELATED_CACHE_NAMESPACE";

/// SimilarityConfig
/// Everything the pipeline reads from its environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityConfig {
    /// Record fields concatenated into the token bag
    pub fields: Vec<String>,
    /// Maximum number of records pulled into a dataset, `None` pulls everything
    pub record_limit: Option<usize>,
    pub stop_words: Vec<String>,
    /// Prefix of every cache key written by the pipeline
    pub cache_namespace: String,
    /// Name of the dedicated similarity cache backend
    pub dedicated_cache: String,
    /// Name of the general purpose fallback cache backend
    pub default_cache: String,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            fields: DEFAULT_FIELDS.iter().map(|f| f.to_string()).collect(),
            record_limit: Some(DEFAULT_RECORD_LIMIT),
            stop_words: DEFAULT_STOP_WORDS.iter().map(|w| w.to_string()).collect(),
            cache_namespace: DEFAULT_NAMESPACE.to_string(),
            dedicated_cache: DEFAULT_DEDICATED_CACHE.to_string(),
            default_cache: DEFAULT_CACHE.to_string(),
        }
    }
}

impl SimilarityConfig {
    /// Defaults overlaid with `RELATED_*` environment variables, validated
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Same as `from_env` with an injectable variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(fields) = lookup(ENV_FIELDS) {
            config.fields = split_list(&fields);
        }
        if let Some(limit) = lookup(ENV_LIMIT) {
            config.record_limit = parse_limit(&limit)?;
        }
        if let Some(words) = lookup(ENV_STOP_WORDS) {
            config.stop_words = split_list(&words);
        }
        if let Some(namespace) = lookup(ENV_NAMESPACE) {
            config.cache_namespace = namespace.trim().to_string();
        }
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fields.is_empty() {
            return Err(ConfigError::NoFields);
        }
        if self.fields.iter().any(|f| f.trim().is_empty()) {
            return Err(ConfigError::EmptyField);
        }
        if self.record_limit == Some(0) {
            return Err(ConfigError::ZeroLimit);
        }
        if self.cache_namespace.trim().is_empty() {
            return Err(ConfigError::EmptyNamespace);
        }
        Ok(())
    }

    /// Cache key of the vector space
    pub fn vectors_key(&self) -> String {
        format!("{}:vectors", self.cache_namespace)
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_record_limit(mut self, limit: Option<usize>) -> Self {
        self.record_limit = limit;
        self
    }

    pub fn with_stop_words<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stop_words = words.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.cache_namespace = namespace.into();
        self
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// `none`, `all` or an empty value mean no limit
fn parse_limit(raw: &str) -> Result<Option<usize>, ConfigError> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("none") || raw.eq_ignore_ascii_case("all") {
        return Ok(None);
    }
    raw.parse::<usize>()
        .map(Some)
        .map_err(|e| ConfigError::Env {
            var: ENV_LIMIT.to_string(),
            reason: e.to_string(),
        })
}

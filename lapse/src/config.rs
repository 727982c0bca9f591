//! Client configuration: where the API lives and how patient to be with it.

use std::time::Duration;

use url::Url;

use crate::interface::LapseError;

/// Public Word Lapse API
pub const DEFAULT_API_URL: &str = "https://api-wl.greenelab.com";
/// Quiet period after the last keystroke before a search fires
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);
/// The cache probe is cosmetic; give up on it quickly
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
/// Uncached results are computed on demand by the server (job timeout is 800s)
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(900);

const ENV_API_URL: &str = "WORD_LAPSE_API";
const ENV_DEBOUNCE_MS: &str = "WORD_LAPSE_DEBOUNCE_MS";
const ENV_PROBE_TIMEOUT_MS: &str = "WORD_LAPSE_PROBE_TIMEOUT_MS";
const ENV_REQUEST_TIMEOUT_SECS: &str = "WORD_LAPSE_REQUEST_TIMEOUT_SECS";
const ENV_CORPUS: &str = "WORD_LAPSE_CORPUS";

#[derive(Debug, Clone, PartialEq)]
pub struct LapseConfig {
    pub api_url: Url,
    pub debounce: Duration,
    pub probe_timeout: Duration,
    pub request_timeout: Duration,
    /// Corpus used when a query does not name one
    pub default_corpus: Option<String>,
}

impl Default for LapseConfig {
    fn default() -> Self {
        Self {
            api_url: Url::parse(DEFAULT_API_URL).expect("default API URL is valid"),
            debounce: DEFAULT_DEBOUNCE,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            default_corpus: None,
        }
    }
}

impl LapseConfig {
    /// Defaults overridden by `WORD_LAPSE_*` environment variables.
    pub fn from_env() -> Result<Self, LapseError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, LapseError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(api) = lookup(ENV_API_URL) {
            config = config.with_api_url(&api)?;
        }
        if let Some(ms) = lookup(ENV_DEBOUNCE_MS) {
            config.debounce = Duration::from_millis(parse_number(ENV_DEBOUNCE_MS, &ms)?);
        }
        if let Some(ms) = lookup(ENV_PROBE_TIMEOUT_MS) {
            config.probe_timeout = Duration::from_millis(parse_number(ENV_PROBE_TIMEOUT_MS, &ms)?);
        }
        if let Some(secs) = lookup(ENV_REQUEST_TIMEOUT_SECS) {
            config.request_timeout =
                Duration::from_secs(parse_number(ENV_REQUEST_TIMEOUT_SECS, &secs)?);
        }
        if let Some(corpus) = lookup(ENV_CORPUS) {
            let corpus = corpus.trim();
            config.default_corpus = (!corpus.is_empty()).then(|| corpus.to_string());
        }

        Ok(config)
    }

    /// Replace the API base URL. A trailing slash is dropped so endpoint
    /// paths join predictably.
    pub fn with_api_url(mut self, api_url: &str) -> Result<Self, LapseError> {
        let trimmed = api_url.trim().trim_end_matches('/');
        let url = Url::parse(trimmed)
            .map_err(|e| LapseError::InvalidInput(format!("API URL '{}': {}", api_url, e)))?;
        if url.cannot_be_a_base() {
            return Err(LapseError::InvalidInput(format!(
                "API URL '{}' cannot be a base URL",
                api_url
            )));
        }
        self.api_url = url;
        Ok(self)
    }
}

fn parse_number(key: &str, value: &str) -> Result<u64, LapseError> {
    value
        .trim()
        .parse()
        .map_err(|_| LapseError::InvalidInput(format!("{} must be a whole number, got '{}'", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = LapseConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, LapseConfig::default());
        assert_eq!(config.debounce, Duration::from_secs(1));
        assert_eq!(config.api_url.as_str(), "https://api-wl.greenelab.com/");
    }

    #[test]
    fn test_env_overrides() {
        let config = LapseConfig::from_lookup(lookup(&[
            ("WORD_LAPSE_API", "http://localhost:8000/"),
            ("WORD_LAPSE_DEBOUNCE_MS", "250"),
            ("WORD_LAPSE_PROBE_TIMEOUT_MS", "100"),
            ("WORD_LAPSE_REQUEST_TIMEOUT_SECS", "30"),
            ("WORD_LAPSE_CORPUS", "abstracts"),
        ]))
        .unwrap();

        assert_eq!(config.api_url.as_str(), "http://localhost:8000/");
        assert_eq!(config.debounce, Duration::from_millis(250));
        assert_eq!(config.probe_timeout, Duration::from_millis(100));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.default_corpus.as_deref(), Some("abstracts"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = LapseConfig::from_lookup(lookup(&[("WORD_LAPSE_DEBOUNCE_MS", "soon")])).unwrap_err();
        assert!(matches!(err, LapseError::InvalidInput(_)));

        let err = LapseConfig::from_lookup(lookup(&[("WORD_LAPSE_API", "not a url")])).unwrap_err();
        assert!(matches!(err, LapseError::InvalidInput(_)));
    }

    #[test]
    fn test_blank_corpus_means_none() {
        let config = LapseConfig::from_lookup(lookup(&[("WORD_LAPSE_CORPUS", "  ")])).unwrap();
        assert_eq!(config.default_corpus, None);
    }
}

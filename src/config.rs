//! Configuration parsing and validation for modelfall.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::Path;
use std::time::Duration;

use crate::router::Provider;

/// Default Gemini API base URL.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Default Mistral API base URL.
pub const DEFAULT_MISTRAL_BASE_URL: &str = "https://api.mistral.ai";

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub fallback: FallbackConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "127.0.0.1:8080")
    #[serde(default = "default_listen")]
    pub listen: String,
}

fn default_listen() -> String {
    "127.0.0.1:8080".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

/// Outbound HTTP client configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl HttpConfig {
    /// Build the shared HTTP client used by both provider adapters.
    pub fn build_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .build()
    }
}

/// Fixed sampling parameters sent with every generation request.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct GenerationConfig {
    /// Output token cap
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    /// Only honored by Gemini
    #[serde(default = "default_top_k")]
    pub top_k: u32,
}

fn default_max_output_tokens() -> u32 {
    8192
}

fn default_temperature() -> f32 {
    0.7
}

fn default_top_p() -> f32 {
    0.95
}

fn default_top_k() -> u32 {
    40
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_output_tokens: default_max_output_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            top_k: default_top_k(),
        }
    }
}

/// Fallback executor configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FallbackConfig {
    /// Delay between attempts in milliseconds
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    /// Deadline for the whole fallback sequence in seconds (unbounded if absent)
    pub deadline_secs: Option<u64>,
    /// Reject selections that do not resolve to a catalog model
    #[serde(default)]
    pub strict_models: bool,
}

fn default_backoff_ms() -> u64 {
    crate::fallback::retry::DEFAULT_BACKOFF.as_millis() as u64
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            backoff_ms: default_backoff_ms(),
            deadline_secs: None,
            strict_models: false,
        }
    }
}

impl FallbackConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }
}

/// API key wrapper that redacts in Debug/Display/Serialize and zeroizes on drop.
///
/// The inner `SecretString` ensures the key value is:
/// - Zeroized in memory when dropped
/// - Never exposed via Debug or Display
/// - Only accessible via `.expose_secret()` (grep-auditable)
#[derive(Clone)]
pub struct ApiKey(SecretString);

impl ApiKey {
    /// Access the raw key value. Every call site is auditable via `grep expose_secret`.
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.0.expose_secret().trim().is_empty()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl std::fmt::Display for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl Serialize for ApiKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("[REDACTED]")
    }
}

impl<'de> serde::Deserialize<'de> for ApiKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(|s| ApiKey(SecretString::from(s)))
    }
}

impl From<String> for ApiKey {
    fn from(s: String) -> Self {
        ApiKey(SecretString::from(s))
    }
}

impl From<&str> for ApiKey {
    fn from(s: &str) -> Self {
        ApiKey(SecretString::from(s))
    }
}

/// How a provider's API key was resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum KeySource {
    /// Key was a literal string in config (no ${} references)
    Literal,
    /// Key contained ${VAR} references expanded from environment
    EnvExpanded,
    /// Key was auto-discovered from convention env var (holds var name)
    Convention(String),
    /// No key available; callers must supply one per request
    None,
}

impl std::fmt::Display for KeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeySource::Literal => write!(f, "config-literal"),
            KeySource::EnvExpanded => write!(f, "env-expanded"),
            KeySource::Convention(var) => write!(f, "convention ({})", var),
            KeySource::None => write!(f, "none"),
        }
    }
}

/// Per-provider endpoint and credential settings.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProviderSettings {
    /// Base URL override (scheme and host, no API path)
    pub base_url: Option<String>,
    /// Default API key, used when a caller does not supply one
    pub api_key: Option<ApiKey>,
}

/// Settings for both supported providers.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub gemini: ProviderSettings,
    #[serde(default)]
    pub mistral: ProviderSettings,
}

impl ProvidersConfig {
    pub fn settings(&self, provider: Provider) -> &ProviderSettings {
        match provider {
            Provider::Gemini => &self.gemini,
            Provider::Mistral => &self.mistral,
        }
    }

    fn settings_mut(&mut self, provider: Provider) -> &mut ProviderSettings {
        match provider {
            Provider::Gemini => &mut self.gemini,
            Provider::Mistral => &mut self.mistral,
        }
    }

    /// Effective base URL for a provider, without a trailing slash.
    pub fn base_url(&self, provider: Provider) -> String {
        let url = match (&self.settings(provider).base_url, provider) {
            (Some(url), _) => url.as_str(),
            (None, Provider::Gemini) => DEFAULT_GEMINI_BASE_URL,
            (None, Provider::Mistral) => DEFAULT_MISTRAL_BASE_URL,
        };
        url.trim_end_matches('/').to_string()
    }

    /// Configured default key for a provider, if any.
    pub fn api_key(&self, provider: Provider) -> Option<&ApiKey> {
        self.settings(provider).api_key.as_ref()
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level used when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Parse configuration from a TOML string.
    pub fn parse_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        for provider in Provider::ALL {
            if let Some(url) = &self.providers.settings(provider).base_url {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(ConfigError::Validation(format!(
                        "Provider '{}' base_url must start with http:// or https://, got '{}'",
                        provider, url
                    )));
                }
            }
        }

        if self.generation.max_output_tokens == 0 {
            return Err(ConfigError::Validation(
                "generation.max_output_tokens must be greater than zero".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(ConfigError::Validation(format!(
                "generation.temperature must be within 0.0..=2.0, got {}",
                self.generation.temperature
            )));
        }

        if !(0.0..=1.0).contains(&self.generation.top_p) {
            return Err(ConfigError::Validation(format!(
                "generation.top_p must be within 0.0..=1.0, got {}",
                self.generation.top_p
            )));
        }

        if self.fallback.deadline_secs == Some(0) {
            return Err(ConfigError::Validation(
                "fallback.deadline_secs must be greater than zero when set".to_string(),
            ));
        }

        if self.http.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "http.timeout_secs must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable '{var}' not set for provider '{provider}': {message}")]
    EnvVar {
        var: String,
        provider: String,
        message: String,
    },
}

fn read_config_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })
}

/// Raw provider settings deserialized directly from TOML.
/// api_key is `Option<String>` so it may contain `${VAR}` references not yet expanded.
#[derive(Deserialize, Default)]
pub struct RawProviderSettings {
    base_url: Option<String>,
    api_key: Option<String>,
}

/// Raw provider table deserialized directly from TOML.
#[derive(Deserialize, Default)]
pub struct RawProvidersConfig {
    #[serde(default)]
    gemini: RawProviderSettings,
    #[serde(default)]
    mistral: RawProviderSettings,
}

impl RawProvidersConfig {
    fn take(&mut self, provider: Provider) -> RawProviderSettings {
        match provider {
            Provider::Gemini => std::mem::take(&mut self.gemini),
            Provider::Mistral => std::mem::take(&mut self.mistral),
        }
    }
}

/// Raw configuration deserialized directly from TOML.
/// Provider api_key values may contain `${VAR}` references not yet expanded.
#[derive(Deserialize, Default)]
pub struct RawConfig {
    #[serde(default)]
    server: ServerConfig,
    #[serde(default)]
    http: HttpConfig,
    #[serde(default)]
    generation: GenerationConfig,
    #[serde(default)]
    fallback: FallbackConfig,
    #[serde(default)]
    providers: RawProvidersConfig,
    #[serde(default)]
    logging: LoggingConfig,
}

/// Expand all `${VAR}` references in a string using a custom lookup function.
///
/// The closure-based design makes this testable without touching global env state.
/// Fails on first missing variable, unclosed `${`, or empty variable name.
fn expand_env_vars_with<F>(
    input: &str,
    provider_name: &str,
    lookup: F,
) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if !input.contains("${") {
        return Ok(input.to_string());
    }

    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        // The input may be a secret; only name the provider in the message.
        let end = after.find('}').ok_or_else(|| ConfigError::EnvVar {
            var: "<unclosed>".to_string(),
            provider: provider_name.to_string(),
            message: "Unclosed '${' in api_key value".to_string(),
        })?;

        let var_name = &after[..end];
        if var_name.is_empty() {
            return Err(ConfigError::EnvVar {
                var: "".to_string(),
                provider: provider_name.to_string(),
                message: "Empty variable name in '${}' reference".to_string(),
            });
        }

        let value = lookup(var_name).ok_or_else(|| ConfigError::EnvVar {
            var: var_name.to_string(),
            provider: provider_name.to_string(),
            message: format!(
                "Environment variable '{}' is not set (referenced in provider '{}')",
                var_name, provider_name
            ),
        })?;

        result.push_str(&value);
        rest = &after[end + 1..];
    }

    result.push_str(rest);
    Ok(result)
}

/// Expand all `${VAR}` references in a string using real environment variables.
fn expand_env_vars(input: &str, provider_name: &str) -> Result<String, ConfigError> {
    expand_env_vars_with(input, provider_name, |name| std::env::var(name).ok())
}

/// Derive the convention-based env var name for a provider.
///
/// - Gemini -> "MODELFALL_GEMINI_API_KEY"
/// - Mistral -> "MODELFALL_MISTRAL_API_KEY"
pub fn convention_env_var_name(provider: Provider) -> String {
    format!("MODELFALL_{}_API_KEY", provider.as_str().to_uppercase())
}

/// Try convention-based env var lookup for a provider's API key.
fn convention_key_lookup(provider: Provider) -> Option<(String, String)> {
    let var_name = convention_env_var_name(provider);
    std::env::var(&var_name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(|value| (var_name, value))
}

impl Config {
    /// Convert raw (deserialized) config to final config with env var expansion.
    ///
    /// For each provider:
    /// - If `api_key` contains `${VAR}`: expand from environment, source = `EnvExpanded`
    /// - If `api_key` is a literal string: wrap directly, source = `Literal`
    /// - If `api_key` is absent: try convention lookup (`MODELFALL_<NAME>_API_KEY`),
    ///   source = `Convention(var_name)` or `KeySource::None`
    pub fn from_raw(mut raw: RawConfig) -> Result<(Self, Vec<(Provider, KeySource)>), ConfigError> {
        let mut providers = ProvidersConfig::default();
        let mut key_sources = Vec::with_capacity(Provider::ALL.len());

        for provider in Provider::ALL {
            let rp = raw.providers.take(provider);

            let (api_key, source) = match rp.api_key {
                Some(ref raw_key) if raw_key.contains("${") => {
                    let expanded = expand_env_vars(raw_key, provider.as_str())?;
                    (Some(ApiKey::from(expanded)), KeySource::EnvExpanded)
                }
                Some(ref raw_key) => (Some(ApiKey::from(raw_key.as_str())), KeySource::Literal),
                None => match convention_key_lookup(provider) {
                    Some((var_name, value)) => {
                        (Some(ApiKey::from(value)), KeySource::Convention(var_name))
                    }
                    None => (None, KeySource::None),
                },
            };

            key_sources.push((provider, source));

            let settings = providers.settings_mut(provider);
            settings.base_url = rp.base_url;
            settings.api_key = api_key;
        }

        let config = Config {
            server: raw.server,
            http: raw.http,
            generation: raw.generation,
            fallback: raw.fallback,
            providers,
            logging: raw.logging,
        };

        Ok((config, key_sources))
    }

    /// Load configuration from a TOML file with environment variable expansion.
    ///
    /// Returns the config and per-provider key source information.
    pub fn from_file_with_env(
        path: impl AsRef<Path>,
    ) -> Result<(Self, Vec<(Provider, KeySource)>), ConfigError> {
        let content = read_config_file(path.as_ref())?;
        Self::parse_str_with_env(&content)
    }

    /// Parse a TOML string with environment variable expansion.
    pub fn parse_str_with_env(
        content: &str,
    ) -> Result<(Self, Vec<(Provider, KeySource)>), ConfigError> {
        let raw: RawConfig = toml::from_str(content).map_err(ConfigError::Parse)?;
        let (config, key_sources) = Self::from_raw(raw)?;
        config.validate()?;

        Ok((config, key_sources))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let config = Config::parse_str("").unwrap();
        assert_eq!(config.server.listen, "127.0.0.1:8080");
        assert_eq!(config.fallback.backoff(), Duration::from_secs(1));
        assert_eq!(config.fallback.deadline(), None);
        assert!(!config.fallback.strict_models);
        assert_eq!(config.generation.max_output_tokens, 8192);
        assert_eq!(
            config.providers.base_url(Provider::Gemini),
            DEFAULT_GEMINI_BASE_URL
        );
        assert_eq!(
            config.providers.base_url(Provider::Mistral),
            DEFAULT_MISTRAL_BASE_URL
        );
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            [server]
            listen = "0.0.0.0:9000"

            [http]
            timeout_secs = 30
            connect_timeout_secs = 5

            [generation]
            max_output_tokens = 4096
            temperature = 0.4
            top_p = 0.9
            top_k = 20

            [fallback]
            backoff_ms = 250
            deadline_secs = 90
            strict_models = true

            [providers.gemini]
            base_url = "http://localhost:9001/"
            api_key = "gemini-literal"

            [providers.mistral]
            base_url = "http://localhost:9002"

            [logging]
            level = "debug"
        "#;

        let config = Config::parse_str(toml).unwrap();
        assert_eq!(config.server.listen, "0.0.0.0:9000");
        assert_eq!(config.http.timeout_secs, 30);
        assert_eq!(config.generation.top_k, 20);
        assert_eq!(config.fallback.backoff(), Duration::from_millis(250));
        assert_eq!(config.fallback.deadline(), Some(Duration::from_secs(90)));
        assert!(config.fallback.strict_models);
        assert_eq!(
            config.providers.base_url(Provider::Gemini),
            "http://localhost:9001"
        );
        assert_eq!(
            config
                .providers
                .api_key(Provider::Gemini)
                .unwrap()
                .expose_secret(),
            "gemini-literal"
        );
        assert!(config.providers.api_key(Provider::Mistral).is_none());
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let toml = r#"
            [providers.mistral]
            base_url = "api.mistral.ai"
        "#;
        let err = Config::parse_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("mistral"));
    }

    #[test]
    fn test_invalid_sampling_rejected() {
        let err = Config::parse_str("[generation]\ntemperature = 3.5").unwrap_err();
        assert!(err.to_string().contains("temperature"));

        let err = Config::parse_str("[generation]\nmax_output_tokens = 0").unwrap_err();
        assert!(err.to_string().contains("max_output_tokens"));
    }

    #[test]
    fn test_zero_deadline_rejected() {
        let err = Config::parse_str("[fallback]\ndeadline_secs = 0").unwrap_err();
        assert!(err.to_string().contains("deadline_secs"));
    }

    #[test]
    fn test_api_key_debug_redaction() {
        let key = ApiKey::from("AIzaSy-super-secret");
        let debug_output = format!("{:?}", key);
        assert_eq!(debug_output, "[REDACTED]");
        assert!(!debug_output.contains("super-secret"));
    }

    #[test]
    fn test_api_key_display_redaction() {
        let key = ApiKey::from("AIzaSy-super-secret");
        let display_output = format!("{}", key);
        assert_eq!(display_output, "[REDACTED]");
    }

    #[test]
    fn test_api_key_serialize_redaction() {
        let key = ApiKey::from("real-secret-value");
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"[REDACTED]\"");
    }

    #[test]
    fn test_api_key_deserialize_from_string() {
        let key: ApiKey = serde_json::from_str("\"my-secret-key\"").unwrap();
        assert_eq!(key.expose_secret(), "my-secret-key");
    }

    #[test]
    fn test_api_key_is_empty() {
        assert!(ApiKey::from("  ").is_empty());
        assert!(!ApiKey::from("k").is_empty());
    }

    #[test]
    fn test_provider_settings_debug_redaction() {
        let config = Config::parse_str("[providers.gemini]\napi_key = \"AIzaLeakMe\"").unwrap();
        let debug = format!("{:?}", config);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("AIzaLeakMe"));
    }

    // ── Expansion tests (using expand_env_vars_with, no global env state) ──

    #[test]
    fn test_expand_single_var() {
        let lookup = |name: &str| match name {
            "MY_KEY" => Some("AIzaExpanded".to_string()),
            _ => None,
        };
        let result = expand_env_vars_with("${MY_KEY}", "gemini", lookup).unwrap();
        assert_eq!(result, "AIzaExpanded");
    }

    #[test]
    fn test_expand_mixed_literal_and_var() {
        let lookup = |name: &str| match name {
            "KEY" => Some("resolved".to_string()),
            _ => None,
        };
        let result = expand_env_vars_with("prefix-${KEY}-suffix", "gemini", lookup).unwrap();
        assert_eq!(result, "prefix-resolved-suffix");
    }

    #[test]
    fn test_expand_no_vars_passthrough() {
        let lookup = |_: &str| -> Option<String> { panic!("should not be called") };
        let result = expand_env_vars_with("literal-value", "gemini", lookup).unwrap();
        assert_eq!(result, "literal-value");
    }

    #[test]
    fn test_expand_missing_var_fails() {
        let lookup = |_: &str| None;
        let err = expand_env_vars_with("${MISSING}", "mistral", lookup)
            .unwrap_err()
            .to_string();
        assert!(err.contains("MISSING"), "Error should name the variable");
        assert!(err.contains("mistral"), "Error should name the provider");
    }

    #[test]
    fn test_expand_unclosed_brace_does_not_echo_value() {
        let lookup = |_: &str| -> Option<String> { panic!("should not be called") };
        let err = expand_env_vars_with("sk-secret${UNCLOSED", "mistral", lookup)
            .unwrap_err()
            .to_string();
        assert!(err.to_lowercase().contains("unclosed"));
        assert!(!err.contains("sk-secret"));
    }

    #[test]
    fn test_expand_empty_var_name_fails() {
        let lookup = |_: &str| -> Option<String> { panic!("should not be called") };
        let err = expand_env_vars_with("${}", "gemini", lookup)
            .unwrap_err()
            .to_string()
            .to_lowercase();
        assert!(err.contains("empty"));
    }

    #[test]
    fn test_convention_env_var_name() {
        assert_eq!(
            convention_env_var_name(Provider::Gemini),
            "MODELFALL_GEMINI_API_KEY"
        );
        assert_eq!(
            convention_env_var_name(Provider::Mistral),
            "MODELFALL_MISTRAL_API_KEY"
        );
    }

    #[test]
    fn test_from_raw_literal_key() {
        let raw: RawConfig =
            toml::from_str("[providers.gemini]\napi_key = \"literal-key-value\"").unwrap();
        let (config, key_sources) = Config::from_raw(raw).unwrap();

        assert_eq!(key_sources[0], (Provider::Gemini, KeySource::Literal));
        assert_eq!(
            config
                .providers
                .api_key(Provider::Gemini)
                .unwrap()
                .expose_secret(),
            "literal-key-value"
        );
    }

    #[test]
    fn test_from_raw_env_expanded_key() {
        // Unique var name to avoid parallel test interference
        let var_name = "TEST_MODELFALL_UNIT_EXPAND_KEY";
        unsafe { std::env::set_var(var_name, "mistral-expanded") };

        let raw: RawConfig = toml::from_str(&format!(
            "[providers.mistral]\napi_key = \"${{{}}}\"",
            var_name
        ))
        .unwrap();
        let (config, key_sources) = Config::from_raw(raw).unwrap();

        assert_eq!(key_sources[1], (Provider::Mistral, KeySource::EnvExpanded));
        assert_eq!(
            config
                .providers
                .api_key(Provider::Mistral)
                .unwrap()
                .expose_secret(),
            "mistral-expanded"
        );

        unsafe { std::env::remove_var(var_name) };
    }

    #[test]
    fn test_from_raw_missing_env_var_fails() {
        let var_name = "TEST_MODELFALL_UNIT_DEFINITELY_MISSING";
        unsafe { std::env::remove_var(var_name) };

        let raw: RawConfig = toml::from_str(&format!(
            "[providers.gemini]\napi_key = \"${{{}}}\"",
            var_name
        ))
        .unwrap();
        let err = Config::from_raw(raw).unwrap_err().to_string();
        assert!(err.contains(var_name), "Error should name the variable: {}", err);
        assert!(err.contains("gemini"), "Error should name the provider: {}", err);
    }
}

use std::time::Duration;

const DEFAULT_API_BASE: &str = "http://localhost:8000";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(480);

/// Configuration for the caption service client.
///
/// Use [`ClientConfig::builder()`] for ergonomic construction,
/// [`ClientConfig::from_env()`] to read the `CAPTION_*` variables, or
/// [`ClientConfig::default()`] for a local backend on port 8000.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the caption service, without a trailing slash.
    pub api_base: String,

    /// Per-request timeout. Vision models can take minutes on large images.
    pub timeout: Duration,

    /// Model preferred when reconciling a freshly loaded model list.
    pub default_model: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            timeout: DEFAULT_TIMEOUT,
            default_model: String::new(),
        }
    }
}

impl ClientConfig {
    /// Start building a config with the builder pattern.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Read `CAPTION_API_BASE`, `CAPTION_TIMEOUT_SECS` and `CAPTION_DEFAULT_MODEL`.
    ///
    /// Missing variables keep their defaults; a timeout that does not parse
    /// is logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut builder = Self::builder();

        if let Some(base) = lookup("CAPTION_API_BASE").filter(|v| !v.trim().is_empty()) {
            builder = builder.with_api_base(base);
        }

        if let Some(raw) = lookup("CAPTION_TIMEOUT_SECS") {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => builder = builder.with_timeout(Duration::from_secs(secs)),
                _ => tracing::warn!(value = %raw, "ignoring invalid CAPTION_TIMEOUT_SECS"),
            }
        }

        if let Some(model) = lookup("CAPTION_DEFAULT_MODEL") {
            builder = builder.with_default_model(model);
        }

        builder.build()
    }
}

/// Builder for [`ClientConfig`].
#[derive(Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set the caption service base URL. A trailing `/` is dropped.
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.config.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the preferred model name.
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.config.default_model = model.into().trim().to_string();
        self
    }

    /// Build the final [`ClientConfig`].
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.api_base, "http://localhost:8000");
        assert_eq!(config.timeout, Duration::from_secs(480));
        assert!(config.default_model.is_empty());
    }

    #[test]
    fn test_builder_normalizes_base() {
        let config = ClientConfig::builder()
            .with_api_base("http://gpu-box:9000/")
            .with_default_model("  llava ")
            .with_timeout(Duration::from_secs(5))
            .build();
        assert_eq!(config.api_base, "http://gpu-box:9000");
        assert_eq!(config.default_model, "llava");
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_from_lookup() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            ("CAPTION_API_BASE", "http://10.0.0.2:8000/"),
            ("CAPTION_TIMEOUT_SECS", "30"),
            ("CAPTION_DEFAULT_MODEL", "minicpm-v"),
        ]));
        assert_eq!(config.api_base, "http://10.0.0.2:8000");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.default_model, "minicpm-v");
    }

    #[test]
    fn test_from_lookup_bad_timeout_keeps_default() {
        let config = ClientConfig::from_lookup(lookup_from(&[("CAPTION_TIMEOUT_SECS", "soon")]));
        assert_eq!(config.timeout, Duration::from_secs(480));
        assert_eq!(config.api_base, "http://localhost:8000");
    }
}

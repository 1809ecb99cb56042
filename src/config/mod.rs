//! Configuration loaded from the environment.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

/// Global default config (lazy-initialized from env).
static DEFAULT_CONFIG: OnceLock<TinyConfig> = OnceLock::new();

/// Environment variable controlling the bounded-concurrency cap.
pub const SEMAPHORE_LIMIT_VAR: &str = "TINY_SEMAPHORE_LIMIT";

/// Default number of concurrent tasks when the cap is not configured.
pub const DEFAULT_SEMAPHORE_LIMIT: usize = 5;

/// Process-level configuration: provider API keys, base URL overrides,
/// and the concurrency cap.
///
/// Provider adapters read their credentials from here; the core itself
/// only consumes [`TinyConfig::semaphore_limit`].
#[derive(Debug, Clone)]
pub struct TinyConfig {
    api_keys: Arc<RwLock<HashMap<String, String>>>,
    base_urls: Arc<RwLock<HashMap<String, String>>>,
    semaphore_limit: usize,
}

impl Default for TinyConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TinyConfig {
    /// Create an empty config with the default concurrency cap.
    pub fn new() -> Self {
        Self {
            api_keys: Arc::new(RwLock::new(HashMap::new())),
            base_urls: Arc::new(RwLock::new(HashMap::new())),
            semaphore_limit: DEFAULT_SEMAPHORE_LIMIT,
        }
    }

    /// Load from environment variables.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        let mut config = Self::new();

        let env_mappings = [
            ("OPENAI_API_KEY", "openai"),
            ("GEMINI_API_KEY", "gemini"),
            ("MISTRALAI_API_KEY", "mistral"),
            ("BRAVE_API_KEY", "brave"),
        ];

        for (env_var, provider) in &env_mappings {
            if let Ok(key) = std::env::var(env_var) {
                config.set_api_key(provider, key);
            }
        }

        let url_mappings = [
            ("OPENAI_BASE_URL", "openai"),
            ("GEMINI_BASE_URL", "gemini"),
            ("MISTRALAI_BASE_URL", "mistral"),
        ];

        for (env_var, provider) in &url_mappings {
            if let Ok(url) = std::env::var(env_var) {
                config.set_base_url(provider, url);
            }
        }

        if let Some(limit) = std::env::var(SEMAPHORE_LIMIT_VAR)
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|v| *v > 0)
        {
            config.semaphore_limit = limit;
        }

        config
    }

    /// Get (or create) the global default config.
    pub fn global() -> &'static TinyConfig {
        DEFAULT_CONFIG.get_or_init(Self::from_env)
    }

    pub fn set_api_key(&self, provider: &str, key: String) {
        self.api_keys
            .write()
            .unwrap()
            .insert(provider.to_string(), key);
    }

    pub fn get_api_key(&self, provider: &str) -> Option<String> {
        self.api_keys.read().unwrap().get(provider).cloned()
    }

    pub fn set_base_url(&self, provider: &str, url: String) {
        self.base_urls
            .write()
            .unwrap()
            .insert(provider.to_string(), url);
    }

    pub fn get_base_url(&self, provider: &str) -> Option<String> {
        self.base_urls.read().unwrap().get(provider).cloned()
    }

    /// Maximum number of concurrent tasks for bounded parallel batches.
    pub fn semaphore_limit(&self) -> usize {
        self.semaphore_limit
    }

    /// Check if a provider has credentials configured.
    pub fn has_credentials(&self, provider: &str) -> bool {
        self.get_api_key(provider).is_some()
    }
}

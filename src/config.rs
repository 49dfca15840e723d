//! Service configuration: TOML file with environment overrides.

use crate::task::ExecutorConfig;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration. Every section has working defaults, so an
/// absent config file yields a runnable local setup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CriticConfig {
    pub server: ServerConfig,
    pub github: GitHubConfig,
    pub ollama: OllamaConfig,
    pub task: TaskConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    pub api_url: String,
    /// Default credential; a per-submission token takes precedence.
    pub token: Option<String>,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".to_string(),
            token: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3".to_string(),
            timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    pub max_attempts: u32,
    pub retry_base_secs: u64,
    pub retry_max_secs: u64,
    pub soft_time_limit_secs: u64,
    pub hard_time_limit_secs: u64,
    pub workers: usize,
    pub result_ttl_secs: u64,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_base_secs: 60,
            retry_max_secs: 600,
            soft_time_limit_secs: 1500,
            hard_time_limit_secs: 1800,
            workers: 4,
            result_ttl_secs: 24 * 60 * 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 3600,
        }
    }
}

impl CriticConfig {
    /// Load from a TOML file if it exists, otherwise start from defaults.
    /// Environment variables are applied on top either way.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) if path.exists() => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config at {}", path.display()))?;
                toml::from_str(&raw)
                    .with_context(|| format!("invalid config at {}", path.display()))?
            }
            _ => Self::default(),
        };
        config.apply_env_from(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Apply environment overrides from an injectable lookup.
    pub fn apply_env_from(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(token) = get("CRITIC_GITHUB_TOKEN") {
            self.github.token = Some(token);
        }
        if let Some(url) = get("CRITIC_OLLAMA_URL") {
            self.ollama.base_url = url;
        }
        if let Some(model) = get("CRITIC_OLLAMA_MODEL") {
            self.ollama.model = model;
        }
        if let Some(port) = get("CRITIC_PORT")
            && let Ok(port) = port.parse()
        {
            self.server.port = port;
        }
    }

    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            max_attempts: self.task.max_attempts.max(1),
            retry_base_delay: Duration::from_secs(self.task.retry_base_secs),
            retry_max_delay: Duration::from_secs(self.task.retry_max_secs),
            soft_time_limit: Duration::from_secs(self.task.soft_time_limit_secs),
            hard_time_limit: Duration::from_secs(self.task.hard_time_limit_secs),
            workers: self.task.workers,
            result_ttl: Duration::from_secs(self.task.result_ttl_secs),
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }

    pub fn ollama_timeout(&self) -> Duration {
        Duration::from_secs(self.ollama.timeout_secs)
    }
}

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use sandloop::{AnthropicConfig, LocalSandboxConfig, ModelSettings, WorkflowConfig};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log filter used when RUST_LOG is unset, e.g. `info` or `sandloop=debug`
    pub log_level: Option<String>,
    pub llm: LlmConfig,
    pub sandbox: SandboxConfig,
    pub network: NetworkConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 8192,
            temperature: 0.1,
            timeout_ms: 300000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    pub template_id: String,
    pub root_dir: PathBuf,
    pub templates_dir: Option<PathBuf>,
    pub idle_timeout_ms: u64,
    pub command_timeout_ms: u64,
    pub host_domain: String,
    pub preview_port: u16,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            template_id: "default".to_string(),
            root_dir: data_dir().join("sandboxes"),
            templates_dir: None,
            idle_timeout_ms: 1800000,
            command_timeout_ms: 120000,
            host_domain: "sandbox.local".to_string(),
            preview_port: 3000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub max_iterations: u32,
    pub history_limit: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            max_iterations: 15,
            history_limit: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: data_dir().join("sandloop.db"),
        }
    }
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sandloop")
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        if let Some(config_dir) = dirs::config_dir() {
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        // No config file found, use defaults
        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    pub fn anthropic(&self) -> AnthropicConfig {
        AnthropicConfig {
            model: self.llm.model.clone(),
            max_tokens: self.llm.max_tokens,
            temperature: self.llm.temperature,
            timeout: Duration::from_millis(self.llm.timeout_ms),
        }
    }

    /// Filter for env_logger: RUST_LOG wins over the configured level.
    pub fn log_filter(&self, rust_log: Option<&str>) -> Option<String> {
        rust_log
            .filter(|f| !f.trim().is_empty())
            .or(self.log_level.as_deref())
            .map(str::to_string)
    }

    pub fn local_sandbox(&self) -> LocalSandboxConfig {
        LocalSandboxConfig {
            root_dir: self.sandbox.root_dir.clone(),
            templates_dir: self.sandbox.templates_dir.clone(),
            idle_timeout: Duration::from_millis(self.sandbox.idle_timeout_ms),
            command_timeout: Duration::from_millis(self.sandbox.command_timeout_ms),
            host_domain: self.sandbox.host_domain.clone(),
        }
    }

    pub fn workflow(&self) -> WorkflowConfig {
        WorkflowConfig {
            template_id: self.sandbox.template_id.clone(),
            preview_port: self.sandbox.preview_port,
            max_iterations: self.network.max_iterations,
            history_limit: self.network.history_limit,
            model: ModelSettings {
                model: Some(self.llm.model.clone()),
                max_tokens: self.llm.max_tokens,
                temperature: self.llm.temperature,
            },
        }
    }
}

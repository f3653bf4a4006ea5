use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::agent::task::DEFAULT_VIDEO_URL;

/// Overrides `agent.base_url` when set.
pub const BASE_URL_ENV: &str = "OLLAMA_BASE_URL";
/// Supplies the hosted-provider credential when `agent.api_key` is empty.
pub const API_KEY_ENV: &str = "GOOGLE_API_KEY";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub agent: AgentConfig,
    pub task: TaskConfig,
    pub output: OutputConfig,
}

/// Model backend the agent process talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// Self-hosted Ollama server reached through `base_url`.
    Ollama,
    /// Hosted Gemini API; needs an API key.
    Gemini,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ollama => write!(f, "ollama"),
            Self::Gemini => write!(f, "gemini"),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Program and arguments of the browser agent runtime.
    pub command: Vec<String>,
    pub provider: Provider,
    pub model: String,
    pub base_url: String,
    /// Extra endpoints tried when `base_url` does not answer.
    pub fallback_urls: Vec<String>,
    /// Hosted provider key (or set GOOGLE_API_KEY).
    pub api_key: String,
    pub timeout_secs: u64,
    pub use_vision: bool,
    pub max_actions_per_step: u32,
    /// Keep the agent's execution history next to the transcript.
    pub save_history: bool,
    pub probe_attempts: u32,
    pub probe_delay_ms: u64,
}

impl fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentConfig")
            .field("command", &self.command)
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("fallback_urls", &self.fallback_urls)
            .field("api_key", &"[REDACTED]")
            .field("timeout_secs", &self.timeout_secs)
            .field("use_vision", &self.use_vision)
            .field("max_actions_per_step", &self.max_actions_per_step)
            .field("save_history", &self.save_history)
            .field("probe_attempts", &self.probe_attempts)
            .field("probe_delay_ms", &self.probe_delay_ms)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    pub video_url: String,
    /// Appended to the built-in task plan.
    pub extra_instructions: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,
    /// File name prefix; artifacts are `<prefix>_<MMDD_HH-mm-ss>.json`.
    pub prefix: String,
    /// Segments echoed to the log after a successful run.
    pub preview_segments: usize,
}

// --- Default implementations ---

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            command: vec!["python".to_string(), "agent.py".to_string()],
            provider: Provider::Ollama,
            model: "gemma3:12b".to_string(),
            base_url: "http://host.docker.internal:11434".to_string(),
            fallback_urls: Vec::new(),
            api_key: String::new(),
            timeout_secs: 1800,
            use_vision: false,
            max_actions_per_step: 1,
            save_history: true,
            probe_attempts: 3,
            probe_delay_ms: 2000,
        }
    }
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            video_url: DEFAULT_VIDEO_URL.to_string(),
            extra_instructions: String::new(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(".execution-artifacts"),
            prefix: "transcriptions".to_string(),
            preview_segments: 5,
        }
    }
}

impl AgentConfig {
    /// Apply environment overrides. `lookup` is `std::env::var` in production.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(BASE_URL_ENV).filter(|v| !v.trim().is_empty()) {
            tracing::debug!("Using {} from environment", BASE_URL_ENV);
            self.base_url = url.trim().to_string();
        }
        if self.api_key.is_empty() {
            if let Some(key) = lookup(API_KEY_ENV).filter(|v| !v.trim().is_empty()) {
                self.api_key = key.trim().to_string();
            }
        }
    }

    /// Fail early when the selected provider cannot be used.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.command.is_empty() {
            anyhow::bail!("Agent command not configured. Set [agent] command in tubescribe.toml");
        }
        if self.provider == Provider::Gemini && self.api_key.is_empty() {
            anyhow::bail!(
                "{} environment variable not set. Set it or [agent] api_key before running with provider \"gemini\"",
                API_KEY_ENV
            );
        }
        if self.provider == Provider::Ollama && self.base_url.trim().is_empty() {
            anyhow::bail!("Ollama base URL not configured. Set [agent] base_url or {}", BASE_URL_ENV);
        }
        Ok(())
    }
}

// --- Config loading ---

impl Config {
    /// Load config and return the resolved file path (if any).
    pub fn load_with_path(path: Option<&Path>) -> anyhow::Result<(Self, Option<PathBuf>)> {
        // 1. Check explicit path
        if let Some(p) = path {
            let content = std::fs::read_to_string(p).map_err(|e| {
                anyhow::anyhow!("Failed to read config file {}: {}", p.display(), e)
            })?;
            let config: Config = toml::from_str(&content)?;
            return Ok((config, Some(p.to_path_buf())));
        }

        // 2. Check beside the executable
        if let Ok(exe_path) = std::env::current_exe() {
            let beside_exe = exe_path.parent().map(|p| p.join("tubescribe.toml"));
            if let Some(p) = beside_exe {
                if p.exists() {
                    let content = std::fs::read_to_string(&p)?;
                    let config: Config = toml::from_str(&content)?;
                    return Ok((config, Some(p)));
                }
            }
        }

        // 3. Check platform config directory
        if let Some(platform_config) = Self::platform_path() {
            if platform_config.exists() {
                let content = std::fs::read_to_string(&platform_config)?;
                let config: Config = toml::from_str(&content)?;
                return Ok((config, Some(platform_config)));
            }
        }

        // 4. Fall back to defaults
        tracing::info!("No config file found, using defaults");
        Ok((Config::default(), None))
    }

    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        Self::load_with_path(path).map(|(config, _)| config)
    }

    /// `<config dir>/tubescribe/config.toml`, e.g. `~/.config/tubescribe/config.toml`.
    pub fn platform_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("tubescribe").join("config.toml"))
    }

    /// Generate a default config file with all fields and inline documentation.
    pub fn generate_default_commented() -> String {
        format!(
r#"# tubescribe configuration

[agent]
# Browser agent runtime to launch. The task text is written to its stdin and
# its stdout is taken as the run's final result.
command = ["python", "agent.py"]
# Model backend passed to the agent: "ollama" (self-hosted) or "gemini" (hosted).
provider = "ollama"
# Model name passed to the agent.
model = "gemma3:12b"
# Ollama server address (or set OLLAMA_BASE_URL environment variable).
base_url = "http://host.docker.internal:11434"
# Additional Ollama addresses tried in order if base_url does not answer.
fallback_urls = []
# Gemini API key (or set GOOGLE_API_KEY environment variable).
# api_key = ""
# Kill the agent if it has not finished after this many seconds.
timeout_secs = 1800
# Whether the agent may send screenshots to the model.
use_vision = false
# Upper bound on browser actions the agent takes per planning step.
max_actions_per_step = 1
# Save the agent's execution history next to the transcript.
save_history = true
# How many times each endpoint is probed, and the pause between probes.
probe_attempts = 3
probe_delay_ms = 2000

[task]
# Video whose transcript should be extracted.
video_url = "{video_url}"
# Extra instructions appended to the built-in task plan.
extra_instructions = ""

[output]
# Directory where transcripts and raw diagnostics are written.
directory = ".execution-artifacts"
# File name prefix. Each run writes <prefix>_<MMDD_HH-mm-ss>.json
# (or .raw.txt when the result could not be recovered).
prefix = "transcriptions"
# Number of recovered segments echoed to the log.
preview_segments = 5
"#,
            video_url = DEFAULT_VIDEO_URL
        )
    }
}

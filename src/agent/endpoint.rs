use std::time::Duration;

use anyhow::Result;
use url::Url;

use crate::config::AgentConfig;

/// Addresses where a self-hosted Ollama server usually answers, tried after
/// anything configured explicitly.
pub const WELL_KNOWN_OLLAMA_URLS: &[&str] = &[
    "http://localhost:11434",
    "http://host.docker.internal:11434",
];

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Ordered, deduplicated endpoint candidates. Unparseable entries are skipped
/// with a warning.
pub fn candidate_urls(primary: &str, fallbacks: &[String]) -> Vec<Url> {
    let mut candidates: Vec<Url> = Vec::new();

    let configured = std::iter::once(primary).chain(fallbacks.iter().map(String::as_str));
    for raw in configured.chain(WELL_KNOWN_OLLAMA_URLS.iter().copied()) {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        match Url::parse(raw) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {
                if !candidates.contains(&url) {
                    candidates.push(url);
                }
            }
            Ok(url) => tracing::warn!("Ignoring endpoint with unsupported scheme: {}", url),
            Err(e) => tracing::warn!("Ignoring invalid endpoint {:?}: {}", raw, e),
        }
    }

    candidates
}

/// Base URL in the form the agent runtime expects, without a trailing slash.
pub fn display_base(url: &Url) -> String {
    url.as_str().trim_end_matches('/').to_string()
}

/// Checks which model endpoint is reachable before an agent run is started.
pub struct EndpointProber {
    client: reqwest::blocking::Client,
    attempts: u32,
    delay: Duration,
}

impl EndpointProber {
    pub fn new(attempts: u32, delay: Duration) -> Result<Self> {
        // Model servers sit on the local network; never route probes via a proxy.
        let client = reqwest::blocking::Client::builder()
            .timeout(PROBE_TIMEOUT)
            .no_proxy()
            .build()?;
        Ok(Self {
            client,
            attempts: attempts.max(1),
            delay,
        })
    }

    pub fn from_config(config: &AgentConfig) -> Result<Self> {
        Self::new(
            config.probe_attempts,
            Duration::from_millis(config.probe_delay_ms),
        )
    }

    /// One `GET <base>/api/tags`; any 2xx counts as reachable.
    pub fn probe(&self, base: &Url) -> bool {
        let url = format!("{}/api/tags", display_base(base));
        match self.client.get(&url).send() {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                tracing::debug!("{} answered HTTP {}", url, response.status().as_u16());
                false
            }
            Err(e) => {
                tracing::debug!("{} unreachable: {}", url, e);
                false
            }
        }
    }

    /// First candidate that answers, probing each up to `attempts` times.
    pub fn resolve(&self, candidates: &[Url]) -> Result<Url> {
        for candidate in candidates {
            for attempt in 1..=self.attempts {
                if self.probe(candidate) {
                    tracing::info!("Model endpoint reachable: {}", display_base(candidate));
                    return Ok(candidate.clone());
                }
                tracing::warn!(
                    "Endpoint {} not reachable (attempt {}/{})",
                    display_base(candidate),
                    attempt,
                    self.attempts
                );
                if attempt < self.attempts {
                    std::thread::sleep(self.delay);
                }
            }
        }

        let tried = candidates
            .iter()
            .map(display_base)
            .collect::<Vec<_>>()
            .join(", ");
        anyhow::bail!("No model endpoint reachable (tried: {})", tried)
    }
}

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;

use crate::agent::endpoint::{candidate_urls, display_base, EndpointProber};
use crate::agent::{AgentRunner, AgentTask, CommandAgent};
use crate::config::{AgentConfig, Config, Provider};
use crate::recovery::persist::write_atomic;
use crate::recovery::{
    list_artifacts, persist, recover, ArtifactKind, ArtifactPaths, RawAgentResult,
    RecoveryOutcome,
};

/// Full pipeline: resolve the model endpoint, run the agent once, recover
/// and persist whatever it returned.
pub fn run_pipeline(config: &Config, video_override: Option<&str>) -> Result<()> {
    config.agent.validate()?;

    let base_url = resolve_base_url(&config.agent)?;
    let agent = CommandAgent::new(&config.agent, base_url)?;

    let video_url = video_override.unwrap_or(&config.task.video_url);
    let task = AgentTask::for_video(video_url, &config.task.extra_instructions);

    tracing::info!("Extracting transcript for {}", video_url);
    run_with_agent(&agent, &task, config)?;
    Ok(())
}

fn resolve_base_url(agent: &AgentConfig) -> Result<String> {
    match agent.provider {
        Provider::Ollama => {
            let candidates = candidate_urls(&agent.base_url, &agent.fallback_urls);
            let prober = EndpointProber::from_config(agent)?;
            let url = prober.resolve(&candidates)?;
            Ok(display_base(&url))
        }
        Provider::Gemini => Ok(agent.base_url.clone()),
    }
}

/// Run `agent` once and hand its result to recovery.
///
/// Returns `None` when the agent failed or produced no result; that is
/// reported in the log and no transcript artifact is written.
pub fn run_with_agent(
    agent: &dyn AgentRunner,
    task: &AgentTask,
    config: &Config,
) -> Result<Option<(RecoveryOutcome, PathBuf)>> {
    let paths = ArtifactPaths::for_run(
        &config.output.directory,
        &config.output.prefix,
        Local::now().naive_local(),
    );

    let run = match agent.run(task) {
        Ok(run) => run,
        Err(e) => {
            tracing::error!("Agent run failed: {:#}", e);
            return Ok(None);
        }
    };

    if config.agent.save_history {
        if let Some(history) = &run.history {
            let content = serde_json::to_string_pretty(history)?;
            write_atomic(&paths.history, content.as_bytes())?;
            tracing::info!("Agent history saved to {}", paths.history.display());
        }
    }

    let Some(raw) = run.result else {
        tracing::error!("No result returned from agent");
        return Ok(None);
    };

    let outcome = recover(raw);
    let path = persist(&outcome, &paths.transcript, config.output.preview_segments)?;
    report(&outcome, &path);
    Ok(Some((outcome, path)))
}

/// Recover from a saved raw result instead of running the agent.
pub fn run_recover(config: &Config, input: &Path) -> Result<(RecoveryOutcome, PathBuf)> {
    let bytes = if input == Path::new("-") {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .context("Failed to read raw result from stdin")?;
        buf
    } else {
        std::fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?
    };
    let raw = String::from_utf8_lossy(&bytes).into_owned();

    let paths = ArtifactPaths::for_run(
        &config.output.directory,
        &config.output.prefix,
        Local::now().naive_local(),
    );

    let outcome = recover(RawAgentResult::Text(raw));
    let path = persist(&outcome, &paths.transcript, config.output.preview_segments)?;
    report(&outcome, &path);
    Ok((outcome, path))
}

fn report(outcome: &RecoveryOutcome, path: &Path) {
    match outcome {
        RecoveryOutcome::Success(set) => {
            println!("Recovered {} transcriptions: {}", set.len(), path.display());
        }
        RecoveryOutcome::Failure { reason, .. } => {
            println!(
                "No transcript recovered ({}); raw result kept at {}",
                reason.code(),
                path.display()
            );
        }
    }
}

/// List artifacts from previous runs.
pub fn show_status(output_dir: &Path, prefix: &str) -> Result<()> {
    let entries = list_artifacts(output_dir, prefix)?;

    println!("tubescribe status:");
    println!("  Output dir: {}", output_dir.display());

    if entries.is_empty() {
        println!("  No artifacts found.");
        return Ok(());
    }

    let transcripts = entries
        .iter()
        .filter(|e| e.kind == ArtifactKind::Transcript)
        .count();
    let diagnostics = entries
        .iter()
        .filter(|e| e.kind == ArtifactKind::Diagnostic)
        .count();
    println!("  Transcripts: {}", transcripts);
    println!("  Failed runs: {}", diagnostics);
    println!();

    for entry in &entries {
        let detail = match entry.kind {
            ArtifactKind::Transcript => segment_count(&entry.path)
                .map(|n| format!("{n} segments"))
                .unwrap_or_else(|| "unreadable".to_string()),
            _ => format!("{:.1} KB", entry.size as f64 / 1024.0),
        };
        println!("{:<12} {:<48} {}", entry.kind, entry.name, detail);
    }

    Ok(())
}

fn segment_count(path: &Path) -> Option<usize> {
    let content = std::fs::read_to_string(path).ok()?;
    match recover(RawAgentResult::Text(content)) {
        RecoveryOutcome::Success(set) => Some(set.len()),
        RecoveryOutcome::Failure { .. } => None,
    }
}

/// Write the commented default config to `path`, or the platform config
/// location when no path is given.
pub fn init_config(path: Option<&Path>, force: bool) -> Result<PathBuf> {
    let target = match path {
        Some(p) => p.to_path_buf(),
        None => Config::platform_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?,
    };

    if target.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {} (use --force to overwrite)",
            target.display()
        );
    }

    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(&target, Config::generate_default_commented())
        .with_context(|| format!("Failed to write {}", target.display()))?;

    println!("Config written to {}", target.display());
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentRun;
    use tempfile::TempDir;

    struct FixedAgent(Result<AgentRun, String>);

    impl AgentRunner for FixedAgent {
        fn name(&self) -> &str {
            "fixed"
        }

        fn run(&self, _task: &AgentTask) -> Result<AgentRun> {
            self.0.clone().map_err(anyhow::Error::msg)
        }
    }

    fn config_in(dir: &Path) -> Config {
        let mut config = Config::default();
        config.output.directory = dir.to_path_buf();
        config
    }

    fn files_in(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .map(|rd| {
                rd.map(|e| e.unwrap().file_name().to_string_lossy().to_string())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }

    fn task() -> AgentTask {
        AgentTask::for_video("https://example.com/v", "")
    }

    #[test]
    fn test_agent_failure_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let agent = FixedAgent(Err("browser crashed".to_string()));
        let result = run_with_agent(&agent, &task(), &config_in(tmp.path())).unwrap();
        assert!(result.is_none());
        assert!(files_in(tmp.path()).is_empty());
    }

    #[test]
    fn test_no_result_writes_only_history() {
        let tmp = TempDir::new().unwrap();
        let agent = FixedAgent(Ok(AgentRun {
            result: None,
            history: Some(serde_json::json!({"steps": []})),
        }));
        let result = run_with_agent(&agent, &task(), &config_in(tmp.path())).unwrap();
        assert!(result.is_none());
        let files = files_in(tmp.path());
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with(".history.json"));
    }

    #[test]
    fn test_history_not_saved_when_disabled() {
        let tmp = TempDir::new().unwrap();
        let mut config = config_in(tmp.path());
        config.agent.save_history = false;
        let agent = FixedAgent(Ok(AgentRun {
            result: Some(RawAgentResult::Text("nothing useful".into())),
            history: Some(serde_json::json!({"steps": []})),
        }));
        run_with_agent(&agent, &task(), &config).unwrap();
        let files = files_in(tmp.path());
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with(".raw.txt"));
    }

    #[test]
    fn test_successful_run_writes_transcript() {
        let tmp = TempDir::new().unwrap();
        let agent = FixedAgent(Ok(AgentRun {
            result: Some(RawAgentResult::Text(
                r#"Done: {"transcriptions": [{"timestamp": "0:10", "transcribed_text": "World"}]}"#
                    .into(),
            )),
            history: None,
        }));
        let (outcome, path) = run_with_agent(&agent, &task(), &config_in(tmp.path()))
            .unwrap()
            .unwrap();
        assert!(outcome.is_success());
        assert!(path.exists());
        assert!(path.to_string_lossy().ends_with(".json"));
    }

    #[test]
    fn test_recover_from_file() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("saved.raw.txt");
        std::fs::write(
            &input,
            r#"{"transcriptions": [{"timestamp": "0:00", "transcribed_text": "Hello"}]}"#,
        )
        .unwrap();
        let out = tmp.path().join("out");

        let (outcome, path) = run_recover(&config_in(&out), &input).unwrap();
        assert!(outcome.is_success());
        assert!(path.starts_with(&out));
    }

    #[test]
    fn test_recover_from_file_with_invalid_utf8() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("saved.raw.txt");
        let mut bytes = br#"{"transcriptions": [{"timestamp": "0:00", "transcribed_text": "caf"#.to_vec();
        bytes.push(0xff);
        bytes.extend_from_slice(br#""}]}"#);
        std::fs::write(&input, bytes).unwrap();
        let out = tmp.path().join("out");

        let (outcome, _) = run_recover(&config_in(&out), &input).unwrap();
        let RecoveryOutcome::Success(set) = outcome else {
            panic!("expected success");
        };
        assert_eq!(set.segments()[0].text, "caf\u{fffd}");
    }

    #[test]
    fn test_recover_missing_file_errors() {
        let tmp = TempDir::new().unwrap();
        let result = run_recover(&config_in(tmp.path()), &tmp.path().join("missing.txt"));
        assert!(result.is_err());
    }

    #[test]
    fn test_show_status_empty_and_missing_dir() {
        let tmp = TempDir::new().unwrap();
        show_status(tmp.path(), "transcriptions").unwrap();
        show_status(&tmp.path().join("nonexistent"), "transcriptions").unwrap();
    }

    #[test]
    fn test_show_status_with_artifacts() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("transcriptions_0216_14-30-00.json"),
            r#"{"transcriptions": [{"timestamp": "0:00", "transcribed_text": "Hello"}]}"#,
        )
        .unwrap();
        std::fs::write(tmp.path().join("transcriptions_0216_14-40-00.raw.txt"), "nope").unwrap();
        assert_eq!(
            segment_count(&tmp.path().join("transcriptions_0216_14-30-00.json")),
            Some(1)
        );
        show_status(tmp.path(), "transcriptions").unwrap();
    }

    #[test]
    fn test_init_config_writes_and_refuses_overwrite() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("conf").join("tubescribe.toml");

        let written = init_config(Some(&target), false).unwrap();
        assert_eq!(written, target);
        let parsed = Config::load(Some(&target)).unwrap();
        assert_eq!(parsed.output.prefix, "transcriptions");

        let err = init_config(Some(&target), false).unwrap_err();
        assert!(err.to_string().contains("--force"));
        init_config(Some(&target), true).unwrap();
    }

    #[test]
    fn test_run_pipeline_gemini_without_key_is_setup_error() {
        let mut config = Config::default();
        config.agent.provider = Provider::Gemini;
        assert!(run_pipeline(&config, None).is_err());
    }
}

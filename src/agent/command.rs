use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde_json::Value;

use crate::agent::backend::{AgentRun, AgentRunner, AgentTask};
use crate::config::{AgentConfig, Provider};
use crate::recovery::RawAgentResult;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Runs the browser agent runtime as a child process.
///
/// The task text goes to the child's stdin and its settings are exported as
/// `TUBESCRIBE_*` environment variables. Whatever the child prints on stdout
/// is the run's final result; stderr is passed through to the terminal.
pub struct CommandAgent {
    program: String,
    args: Vec<String>,
    provider: Provider,
    model: String,
    base_url: String,
    api_key: String,
    use_vision: bool,
    max_actions_per_step: u32,
    timeout: Duration,
}

impl std::fmt::Debug for CommandAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandAgent")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl CommandAgent {
    /// `base_url` is the model endpoint already resolved by the caller.
    pub fn new(config: &AgentConfig, base_url: String) -> Result<Self> {
        let (program, args) = config
            .command
            .split_first()
            .context("Agent command not configured. Set [agent] command in tubescribe.toml")?;

        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            provider: config.provider,
            model: config.model.clone(),
            base_url,
            api_key: config.api_key.clone(),
            use_vision: config.use_vision,
            max_actions_per_step: config.max_actions_per_step,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }
}

impl AgentRunner for CommandAgent {
    fn name(&self) -> &str {
        &self.program
    }

    fn run(&self, task: &AgentTask) -> Result<AgentRun> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .env("TUBESCRIBE_PROVIDER", self.provider.to_string())
            .env("TUBESCRIBE_MODEL", &self.model)
            .env("TUBESCRIBE_BASE_URL", &self.base_url)
            .env("TUBESCRIBE_START_URL", &task.start_url)
            .env("TUBESCRIBE_USE_VISION", self.use_vision.to_string())
            .env(
                "TUBESCRIBE_MAX_ACTIONS_PER_STEP",
                self.max_actions_per_step.to_string(),
            )
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        if !self.api_key.is_empty() {
            command.env(crate::config::API_KEY_ENV, &self.api_key);
        }

        tracing::info!(
            "Launching agent: {} {} (provider: {}, model: {})",
            self.program,
            self.args.join(" "),
            self.provider,
            self.model
        );

        let mut child = command
            .spawn()
            .with_context(|| format!("Failed to start agent command `{}`", self.program))?;

        if let Some(mut stdin) = child.stdin.take() {
            let instructions = task.instructions.clone();
            // A child that never reads stdin must not stall the deadline loop.
            std::thread::spawn(move || {
                if let Err(e) = stdin.write_all(instructions.as_bytes()) {
                    // The runtime may ignore stdin and exit before we finish writing.
                    if e.kind() != std::io::ErrorKind::BrokenPipe {
                        tracing::warn!("Failed to send task to agent: {}", e);
                    }
                }
            });
        }

        let mut stdout = child
            .stdout
            .take()
            .context("Agent stdout was not captured")?;
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = tx.send(stdout.read_to_end(&mut buf).map(|_| buf));
        });

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                anyhow::bail!("Agent timed out after {}s", self.timeout.as_secs());
            }
            std::thread::sleep(POLL_INTERVAL);
        };

        // Processes left behind by the agent can keep stdout open after it exits.
        let remaining = deadline.saturating_duration_since(Instant::now());
        let output = match rx.recv_timeout(remaining) {
            Ok(read) => read.context("Failed to read agent output")?,
            Err(RecvTimeoutError::Timeout) => anyhow::bail!(
                "Agent timed out after {}s waiting for its output to close",
                self.timeout.as_secs()
            ),
            Err(RecvTimeoutError::Disconnected) => {
                anyhow::bail!("Agent output reader stopped without a result")
            }
        };

        if !status.success() {
            anyhow::bail!("Agent exited with {}", status);
        }

        tracing::info!("Agent finished ({} bytes of output)", output.len());
        Ok(parse_agent_output(&String::from_utf8_lossy(&output)))
    }
}

/// Interpret the agent's stdout.
///
/// A JSON object carrying `final_result` is the runtime's history envelope:
/// `final_result` is the result and the remaining keys are the history.
/// Anything else is the result text itself. Blank output means no result.
pub fn parse_agent_output(stdout: &str) -> AgentRun {
    if stdout.trim().is_empty() {
        return AgentRun::default();
    }

    if let Ok(Value::Object(mut envelope)) = serde_json::from_str::<Value>(stdout) {
        if let Some(final_result) = envelope.remove("final_result") {
            let result = match final_result {
                Value::Null => None,
                Value::String(text) if text.trim().is_empty() => None,
                Value::String(text) => Some(RawAgentResult::Text(text)),
                other => Some(RawAgentResult::Structured(other)),
            };
            let history = (!envelope.is_empty()).then_some(Value::Object(envelope));
            return AgentRun { result, history };
        }
    }

    AgentRun {
        result: Some(RawAgentResult::Text(stdout.to_string())),
        history: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_blank_output_is_no_result() {
        let run = parse_agent_output("  \n");
        assert!(run.result.is_none());
        assert!(run.history.is_none());
    }

    #[test]
    fn test_plain_text_is_raw_result() {
        let run = parse_agent_output("Sure! {\"transcriptions\": []}\n");
        assert_eq!(
            run.result,
            Some(RawAgentResult::Text("Sure! {\"transcriptions\": []}\n".into()))
        );
    }

    #[test]
    fn test_transcript_json_without_envelope_is_text() {
        let out = r#"{"transcriptions": []}"#;
        let run = parse_agent_output(out);
        assert_eq!(run.result, Some(RawAgentResult::Text(out.into())));
        assert!(run.history.is_none());
    }

    #[test]
    fn test_envelope_with_string_result() {
        let out = r#"{"final_result": "{\"transcriptions\": []}", "steps": [1, 2]}"#;
        let run = parse_agent_output(out);
        assert_eq!(
            run.result,
            Some(RawAgentResult::Text(r#"{"transcriptions": []}"#.into()))
        );
        assert_eq!(run.history, Some(json!({"steps": [1, 2]})));
    }

    #[test]
    fn test_envelope_with_structured_result() {
        let out = r#"{"final_result": {"transcriptions": []}}"#;
        let run = parse_agent_output(out);
        assert_eq!(
            run.result,
            Some(RawAgentResult::Structured(json!({"transcriptions": []})))
        );
        assert!(run.history.is_none());
    }

    #[test]
    fn test_envelope_with_null_result() {
        let run = parse_agent_output(r#"{"final_result": null, "errors": ["boom"]}"#);
        assert!(run.result.is_none());
        assert_eq!(run.history, Some(json!({"errors": ["boom"]})));
    }

    #[test]
    fn test_new_rejects_empty_command() {
        let config = AgentConfig {
            command: Vec::new(),
            ..Default::default()
        };
        assert!(CommandAgent::new(&config, String::new()).is_err());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = AgentConfig {
            api_key: "agent-secret".to_string(),
            ..Default::default()
        };
        let agent = CommandAgent::new(&config, "http://localhost:11434".into()).unwrap();
        let debug_output = format!("{:?}", agent);
        assert!(!debug_output.contains("agent-secret"));
        assert!(debug_output.contains("[REDACTED]"));
    }

    #[cfg(unix)]
    fn shell_agent(script: &str, timeout_secs: u64) -> CommandAgent {
        let config = AgentConfig {
            command: vec!["sh".to_string(), "-c".to_string(), script.to_string()],
            model: "test-model".to_string(),
            timeout_secs,
            ..Default::default()
        };
        CommandAgent::new(&config, "http://localhost:11434".into()).unwrap()
    }

    #[cfg(unix)]
    #[test]
    fn test_run_captures_stdout() {
        let agent = shell_agent("echo 'Result: {\"transcriptions\": []}'", 30);
        let task = AgentTask::for_video("https://example.com/v", "");
        let run = agent.run(&task).unwrap();
        assert_eq!(
            run.result,
            Some(RawAgentResult::Text("Result: {\"transcriptions\": []}\n".into()))
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_run_sends_task_on_stdin_and_settings_in_env() {
        let agent = shell_agent(
            "read first; printf '%s|%s|%s' \"$TUBESCRIBE_MODEL\" \"$TUBESCRIBE_START_URL\" \"$first\"",
            30,
        );
        let task = AgentTask {
            start_url: "https://example.com/v".to_string(),
            instructions: "do the thing\nsecond line".to_string(),
        };
        let run = agent.run(&task).unwrap();
        assert_eq!(
            run.result,
            Some(RawAgentResult::Text(
                "test-model|https://example.com/v|do the thing".into()
            ))
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_run_nonzero_exit_is_error() {
        let agent = shell_agent("echo partial; exit 3", 30);
        let task = AgentTask::for_video("https://example.com/v", "");
        let err = agent.run(&task).unwrap_err();
        assert!(err.to_string().contains("exited"));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_times_out() {
        let agent = shell_agent("exec sleep 5", 0);
        let task = AgentTask::for_video("https://example.com/v", "");
        let err = agent.run(&task).unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_times_out_when_background_process_holds_stdout() {
        let agent = shell_agent("sleep 6 & echo done", 1);
        let task = AgentTask::for_video("https://example.com/v", "");
        let started = Instant::now();
        let err = agent.run(&task).unwrap_err();
        assert!(err.to_string().contains("timed out"), "{err}");
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_times_out_when_agent_ignores_large_task() {
        let agent = shell_agent("exec sleep 6", 1);
        let task = AgentTask {
            start_url: "https://example.com/v".to_string(),
            instructions: "x".repeat(4 * 1024 * 1024),
        };
        let started = Instant::now();
        let err = agent.run(&task).unwrap_err();
        assert!(err.to_string().contains("timed out"), "{err}");
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_run_missing_program_is_error() {
        let config = AgentConfig {
            command: vec!["tubescribe-no-such-agent-binary".to_string()],
            ..Default::default()
        };
        let agent = CommandAgent::new(&config, String::new()).unwrap();
        let task = AgentTask::for_video("https://example.com/v", "");
        let err = agent.run(&task).unwrap_err();
        assert!(err.to_string().contains("Failed to start agent command"));
    }
}

//! Subprocess agent transport.
//!
//! Invokes a configurable external command, feeds the prompt through the
//! child's stdin, and returns its stdout. The command string is tokenized
//! shell-style so multi-word commands with flags ("claudebox -p") work.

use super::{Agent, AgentError};
use std::io::{Read, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// Default command used when no override is configured.
pub const DEFAULT_AGENT_COMMAND: &str = "claude";

const TIMEOUT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Agent implementation that shells out to an external CLI tool.
pub struct CommandAgent {
    command: String,
    timeout: Option<Duration>,
}

impl CommandAgent {
    /// Creates an agent around the given command string, e.g. "claude" or
    /// "claudebox -p" for containerized execution.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            timeout: None,
        }
    }

    /// Bounds every query; an expired deadline kills the child and surfaces
    /// as a timeout error. The agent's runtime is otherwise unbounded.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl Agent for CommandAgent {
    fn query(&self, prompt: &str, cwd: Option<&Path>) -> Result<String, AgentError> {
        let argv = split_command(&self.command)?;

        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| AgentError::Spawn(e.to_string()))?;

        // The prompt can be large; writing it from a separate thread avoids a
        // deadlock when the child fills its stdout pipe before draining stdin.
        let stdin = child.stdin.take();
        let prompt_owned = prompt.to_string();
        let writer = std::thread::spawn(move || {
            if let Some(mut stdin) = stdin {
                let _ = stdin.write_all(prompt_owned.as_bytes());
            }
        });

        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();
        let stdout_reader = std::thread::spawn(move || read_pipe(stdout_pipe));
        let stderr_reader = std::thread::spawn(move || read_pipe(stderr_pipe));

        let status = match self.timeout {
            None => child
                .wait()
                .map_err(|e| AgentError::Spawn(e.to_string()))?,
            Some(timeout) => {
                let deadline = Instant::now() + timeout;
                loop {
                    match child.try_wait() {
                        Ok(Some(status)) => break status,
                        Ok(None) => {
                            if Instant::now() >= deadline {
                                let _ = child.kill();
                                let _ = child.wait();
                                return Err(AgentError::Timeout {
                                    seconds: timeout.as_secs(),
                                });
                            }
                            std::thread::sleep(TIMEOUT_POLL_INTERVAL);
                        }
                        Err(e) => return Err(AgentError::Spawn(e.to_string())),
                    }
                }
            }
        };

        let _ = writer.join();
        let stdout = stdout_reader.join().unwrap_or_default();
        let stderr = stderr_reader.join().unwrap_or_default();

        if !status.success() {
            return Err(AgentError::NonZeroExit {
                status: status.code(),
                stderr: String::from_utf8_lossy(&stderr).to_string(),
            });
        }

        let output = String::from_utf8(stdout)
            .map_err(|_| AgentError::InvalidOutput("stdout is not valid UTF-8".to_string()))?;
        Ok(output.trim().to_string())
    }
}

fn read_pipe(pipe: Option<impl Read>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf);
    }
    buf
}

/// Splits a command string into an argument vector, honoring single and
/// double quotes and backslash escapes outside single quotes.
fn split_command(command: &str) -> Result<Vec<String>, AgentError> {
    let mut argv = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut chars = command.chars();

    while let Some(c) = chars.next() {
        match c {
            ' ' | '\t' => {
                if in_token {
                    argv.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            '\'' => {
                in_token = true;
                for inner in chars.by_ref() {
                    if inner == '\'' {
                        break;
                    }
                    current.push(inner);
                }
            }
            '"' => {
                in_token = true;
                while let Some(inner) = chars.next() {
                    match inner {
                        '"' => break,
                        '\\' => {
                            if let Some(escaped) = chars.next() {
                                current.push(escaped);
                            }
                        }
                        other => current.push(other),
                    }
                }
            }
            '\\' => {
                in_token = true;
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            other => {
                in_token = true;
                current.push(other);
            }
        }
    }
    if in_token {
        argv.push(current);
    }

    if argv.is_empty() {
        return Err(AgentError::Spawn("agent command is empty".to_string()));
    }
    Ok(argv)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_plain_command() {
        assert_eq!(split_command("claude").unwrap(), vec!["claude"]);
    }

    #[test]
    fn splits_command_with_flags() {
        assert_eq!(
            split_command("claudebox -p --model sonnet").unwrap(),
            vec!["claudebox", "-p", "--model", "sonnet"]
        );
    }

    #[test]
    fn honors_quotes() {
        assert_eq!(
            split_command(r#"runner --name "spec compiler" -v"#).unwrap(),
            vec!["runner", "--name", "spec compiler", "-v"]
        );
        assert_eq!(
            split_command("runner 'two words'").unwrap(),
            vec!["runner", "two words"]
        );
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(matches!(
            split_command("   "),
            Err(AgentError::Spawn(_))
        ));
    }

    #[test]
    fn query_returns_trimmed_stdout() {
        let agent = CommandAgent::new("echo hello world");
        let output = agent.query("ignored", None).expect("query");
        assert_eq!(output, "hello world");
    }

    #[test]
    fn query_reads_prompt_from_stdin() {
        let agent = CommandAgent::new("cat");
        let output = agent.query("  the prompt  ", None).expect("query");
        assert_eq!(output, "the prompt");
    }

    #[test]
    fn nonzero_exit_carries_stderr() {
        let agent = CommandAgent::new("sh -c 'echo boom >&2; exit 3'");
        match agent.query("ignored", None) {
            Err(AgentError::NonZeroExit { status, stderr }) => {
                assert_eq!(status, Some(3));
                assert!(stderr.contains("boom"));
            }
            other => panic!("unexpected result: {:?}", other.map_err(|e| e.to_string())),
        }
    }

    #[test]
    fn missing_binary_is_a_spawn_error() {
        let agent = CommandAgent::new("definitely-not-a-real-binary-2931");
        assert!(matches!(
            agent.query("ignored", None),
            Err(AgentError::Spawn(_))
        ));
    }

    #[test]
    fn timeout_kills_slow_agent() {
        let agent =
            CommandAgent::new("sleep 5").with_timeout(Duration::from_millis(200));
        assert!(matches!(
            agent.query("ignored", None),
            Err(AgentError::Timeout { .. })
        ));
    }
}

//! The external agent boundary.
//!
//! Everything the system knows about the LLM collaborator is the `Agent`
//! trait: send a prompt, optionally bound to a working directory the agent
//! may write files into, and get the textual reply back. Concrete transports
//! (subprocess, HTTP) and test doubles are interchangeable behind it.

mod command_agent;
mod http_agent;

pub use command_agent::{CommandAgent, DEFAULT_AGENT_COMMAND};
pub use http_agent::HttpAgent;

use std::fmt;
use std::path::Path;

/// Errors that can occur while invoking the agent.
#[derive(Debug)]
pub enum AgentError {
    /// The agent process could not be started.
    Spawn(String),
    /// The agent process terminated abnormally.
    NonZeroExit {
        status: Option<i32>,
        stderr: String,
    },
    /// The agent did not answer within the configured time budget.
    Timeout { seconds: u64 },
    /// The agent replied, but not in a usable form.
    InvalidOutput(String),
    /// The HTTP transport failed.
    Http(String),
    /// The HTTP agent's environment configuration is incomplete.
    MissingConfig(String),
}

impl AgentError {
    /// Short tag used when a failure is folded into result metadata.
    pub fn kind(&self) -> &'static str {
        match self {
            AgentError::Spawn(_) => "SpawnError",
            AgentError::NonZeroExit { .. } => "AgentProcessError",
            AgentError::Timeout { .. } => "TimeoutError",
            AgentError::InvalidOutput(_) => "InvalidOutputError",
            AgentError::Http(_) => "HttpError",
            AgentError::MissingConfig(_) => "MissingConfigError",
        }
    }
}

impl fmt::Display for AgentError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AgentError::Spawn(detail) => {
                write!(f, "failed to start agent process: {}", detail)
            }
            AgentError::NonZeroExit { status, stderr } => {
                let status = status
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "terminated by signal".to_string());
                write!(f, "agent process failed (exit status {}): {}", status, stderr.trim())
            }
            AgentError::Timeout { seconds } => {
                write!(f, "agent did not respond within {} second(s)", seconds)
            }
            AgentError::InvalidOutput(detail) => {
                write!(f, "agent returned invalid output: {}", detail)
            }
            AgentError::Http(detail) => write!(f, "agent request failed: {}", detail),
            AgentError::MissingConfig(name) => {
                write!(f, "agent configuration incomplete: {} is not set", name)
            }
        }
    }
}

impl std::error::Error for AgentError {}

/// Contract for LLM agents that can process prompts.
///
/// When `cwd` is given, any files the agent writes while handling the prompt
/// must land relative to that directory; the return value is the agent's
/// full textual reply with surrounding whitespace stripped.
pub trait Agent: Send + Sync {
    fn query(&self, prompt: &str, cwd: Option<&Path>) -> Result<String, AgentError>;
}

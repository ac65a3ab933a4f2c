//! HTTP agent transport.
//!
//! Speaks the same request/response protocol as the subprocess runner, moved
//! onto HTTP: POST `{model, prompt}`, expect `{success, output, error}`.
//! Configuration comes from the constructor or from the environment
//! (`AGENTC_ENDPOINT`, `AGENTC_MODEL`, `AGENTC_API_KEY`), with `.env`
//! loading via dotenvy.
//!
//! This transport has no working-directory channel: the remote service
//! cannot write files on the local machine, so `cwd` is ignored. Pipelines
//! that rely on the agent writing artifacts to disk need a command agent.

use super::{Agent, AgentError};
use std::path::Path;

const ENDPOINT_VAR: &str = "AGENTC_ENDPOINT";
const MODEL_VAR: &str = "AGENTC_MODEL";
const API_KEY_VAR: &str = "AGENTC_API_KEY";

pub struct HttpAgent {
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl HttpAgent {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            model: model.into(),
            api_key,
        }
    }

    /// Builds an agent from the environment, loading `.env` first.
    pub fn from_env() -> Result<Self, AgentError> {
        dotenvy::dotenv().ok();

        let endpoint = std::env::var(ENDPOINT_VAR)
            .map_err(|_| AgentError::MissingConfig(ENDPOINT_VAR.to_string()))?;
        let model = std::env::var(MODEL_VAR)
            .map_err(|_| AgentError::MissingConfig(MODEL_VAR.to_string()))?;
        let api_key = std::env::var(API_KEY_VAR).ok();

        Ok(Self::new(endpoint, model, api_key))
    }
}

impl Agent for HttpAgent {
    fn query(&self, prompt: &str, _cwd: Option<&Path>) -> Result<String, AgentError> {
        let endpoint = self.endpoint.clone();
        let api_key = self.api_key.clone();
        let request = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
        });

        // The blocking client must not run on an async runtime thread; the
        // CLI entry points are async, so the round-trip gets its own thread.
        let handle = std::thread::spawn(move || -> Result<serde_json::Value, AgentError> {
            let client = reqwest::blocking::Client::new();
            let mut builder = client.post(&endpoint).json(&request);
            if let Some(key) = &api_key {
                builder = builder.bearer_auth(key);
            }

            let response = builder.send().map_err(|e| AgentError::Http(e.to_string()))?;
            if !response.status().is_success() {
                return Err(AgentError::Http(format!(
                    "endpoint returned status {}",
                    response.status()
                )));
            }
            response
                .json::<serde_json::Value>()
                .map_err(|e| AgentError::InvalidOutput(e.to_string()))
        });

        let response = handle
            .join()
            .map_err(|_| AgentError::Http("agent request thread panicked".to_string()))??;

        if !response["success"].as_bool().unwrap_or(false) {
            let error = response["error"].as_str().unwrap_or("unknown error");
            return Err(AgentError::InvalidOutput(format!(
                "agent reported failure: {}",
                error
            )));
        }

        let output = response["output"]
            .as_str()
            .ok_or_else(|| AgentError::InvalidOutput("no output field in response".to_string()))?;

        Ok(output.trim().to_string())
    }
}

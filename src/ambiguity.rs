//! Ambiguity detection for module specifications.
//!
//! The checker asks the agent to review one module's spec and parses the
//! constrained textual protocol of its reply back into structured findings.
//! Findings are data, not errors: they gate compilation but are reported,
//! cached, and rendered like any other value.

use crate::agent::{Agent, AgentError};
use crate::spec::{Module, render_test_list};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// How severe a finding is; anything unrecognized in an agent reply is
/// treated as an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Error,
    Warning,
}

impl Severity {
    fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "warning" => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

/// One defect found in a module's specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ambiguity {
    pub module_name: String,
    pub location: String,
    pub issue: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl fmt::Display for Ambiguity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let glyph = match self.severity {
            Severity::Warning => "⚠️",
            Severity::Error => "❌",
        };
        write!(f, "{} {}.{}: {}", glyph, self.module_name, self.location, self.issue)?;
        if !self.suggestions.is_empty() {
            write!(f, "\n  Suggestions:")?;
            for suggestion in &self.suggestions {
                write!(f, "\n    - {}", suggestion)?;
            }
        }
        Ok(())
    }
}

/// Checks module specifications for ambiguities through the agent.
pub struct AmbiguityChecker {
    agent: Arc<dyn Agent>,
}

impl AmbiguityChecker {
    pub fn new(agent: Arc<dyn Agent>) -> Self {
        Self { agent }
    }

    pub fn check(&self, module: &Module) -> Result<Vec<Ambiguity>, AgentError> {
        let prompt = build_check_prompt(module);
        let response = self.agent.query(&prompt, None)?;
        Ok(parse_ambiguities(&response, module.name()))
    }
}

fn build_check_prompt(module: &Module) -> String {
    let deps = if module.dependencies().is_empty() {
        "  (none)".to_string()
    } else {
        module
            .dependencies()
            .iter()
            .map(|dep| format!("  - {}: {}", dep.name(), dep.purpose()))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        r#"Ambiguity check on module specification.

Module Specification:
---
Name: {name}
Purpose: {purpose}

Dependencies:
{deps}

Tests/Examples:
{tests}
---

Check for ambiguities that would make it impossible to implement correctly:

IMPORTANT: Only flag ambiguities that actually matter for correctness:
- Missing critical information (e.g., unclear what algorithm to use, missing edge case handling)
- Tests that contradict the purpose statement
- Genuinely ambiguous behavior (e.g., what should happen when X?)

DO NOT flag:
- Implementation details like function names (infer from module name)
- Minor style choices (case sensitivity, error message wording)
- Things that have obvious reasonable defaults
- Pedantic edge cases not relevant to the core functionality

For each REAL ambiguity:

AMBIGUITY:
Location: <location>
Issue: <description>
Severity: <error|warning>
Suggestions:
- <suggestion>

If NO significant ambiguities: NO_AMBIGUITIES
"#,
        name = module.name(),
        purpose = module.purpose(),
        deps = deps,
        tests = render_test_list(module.tests()),
    )
}

/// Parses the agent's reply. Defensive by construction: malformed lines are
/// dropped or defaulted, and the checked module's name overrides whatever
/// the agent claimed.
fn parse_ambiguities(response: &str, module_name: &str) -> Vec<Ambiguity> {
    if response.contains("NO_AMBIGUITIES") {
        return Vec::new();
    }

    let mut findings = Vec::new();
    let mut current: Option<Ambiguity> = None;

    for line in response.lines() {
        let line = line.trim();

        if line.starts_with("AMBIGUITY:") {
            if let Some(finding) = current.take() {
                findings.push(finding);
            }
            current = Some(Ambiguity {
                module_name: module_name.to_string(),
                location: String::new(),
                issue: String::new(),
                severity: Severity::Error,
                suggestions: Vec::new(),
            });
        } else if let Some(rest) = line.strip_prefix("Location:") {
            if let Some(finding) = current.as_mut() {
                finding.location = rest.trim().to_string();
            }
        } else if let Some(rest) = line.strip_prefix("Issue:") {
            if let Some(finding) = current.as_mut() {
                finding.issue = rest.trim().to_string();
            }
        } else if let Some(rest) = line.strip_prefix("Severity:") {
            if let Some(finding) = current.as_mut() {
                finding.severity = Severity::parse(rest);
            }
        } else if let Some(rest) = line.strip_prefix('-') {
            if let Some(finding) = current.as_mut() {
                finding.suggestions.push(rest.trim().to_string());
            }
        }
    }

    if let Some(finding) = current.take() {
        findings.push(finding);
    }

    findings
}

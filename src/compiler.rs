//! Compilation of module specifications to executable code.
//!
//! A compile attempt is a linear pipeline: ambiguity gate (unless forced),
//! recursive dependency compilation in declared order, then one code
//! generation round-trip through the agent. The agent writes implementation
//! and test files into the working directory itself; the reply text is
//! recorded as "the code" without further interpretation. Every internal
//! failure is folded into a `status = Error` result at the attempt boundary
//! — `compile` never returns `Err` and never panics.

use crate::agent::{Agent, AgentError};
use crate::ambiguity::{Ambiguity, AmbiguityChecker};
use crate::language;
use crate::spec::{Module, render_test_list};
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

/// Terminal state of one compile attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileStatus {
    Ambiguous,
    Compiled,
    Error,
}

impl fmt::Display for CompileStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CompileStatus::Ambiguous => write!(f, "ambiguous"),
            CompileStatus::Compiled => write!(f, "compiled"),
            CompileStatus::Error => write!(f, "error"),
        }
    }
}

/// Which pipeline pass produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompilePass {
    AmbiguityCheck,
    CodeGeneration,
}

/// The few metadata fields a result actually carries, as a closed record.
#[derive(Debug, Clone, Default)]
pub struct ResultMetadata {
    pub pass: Option<CompilePass>,
    pub target_language: Option<String>,
    pub dependencies: Vec<String>,
    pub error_kind: Option<String>,
}

/// Outcome of one compile attempt; exactly one terminal state.
#[derive(Debug, Clone)]
pub struct CompilationResult {
    pub status: CompileStatus,
    pub ambiguities: Vec<Ambiguity>,
    pub code: Option<String>,
    pub metadata: ResultMetadata,
    pub error: Option<String>,
}

impl CompilationResult {
    fn ambiguous(ambiguities: Vec<Ambiguity>) -> Self {
        Self {
            status: CompileStatus::Ambiguous,
            ambiguities,
            code: None,
            metadata: ResultMetadata {
                pass: Some(CompilePass::AmbiguityCheck),
                ..ResultMetadata::default()
            },
            error: None,
        }
    }

    fn compiled(code: String, target_language: &str, dependencies: Vec<String>) -> Self {
        Self {
            status: CompileStatus::Compiled,
            ambiguities: Vec::new(),
            code: Some(code),
            metadata: ResultMetadata {
                pass: Some(CompilePass::CodeGeneration),
                target_language: Some(target_language.to_string()),
                dependencies,
                error_kind: None,
            },
            error: None,
        }
    }

    fn error(error: CompileError) -> Self {
        Self {
            status: CompileStatus::Error,
            ambiguities: Vec::new(),
            code: None,
            metadata: ResultMetadata {
                error_kind: Some(error.kind().to_string()),
                ..ResultMetadata::default()
            },
            error: Some(error.to_string()),
        }
    }
}

/// Internal failure of a compile attempt, folded into the result at the
/// attempt boundary.
#[derive(Debug)]
enum CompileError {
    Agent(AgentError),
    Dependency {
        name: String,
        status: CompileStatus,
        detail: Option<String>,
    },
    Cycle {
        chain: Vec<String>,
    },
}

impl CompileError {
    fn kind(&self) -> &'static str {
        match self {
            CompileError::Agent(e) => e.kind(),
            CompileError::Dependency { .. } => "DependencyError",
            CompileError::Cycle { .. } => "CycleError",
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CompileError::Agent(e) => write!(f, "{}", e),
            CompileError::Dependency {
                name,
                status,
                detail,
            } => {
                write!(f, "Dependency {} failed to compile: {}", name, status)?;
                if let Some(detail) = detail {
                    write!(f, " ({})", detail)?;
                }
                Ok(())
            }
            CompileError::Cycle { chain } => {
                write!(f, "cyclic dependency: {}", chain.join(" -> "))
            }
        }
    }
}

/// Compiles module specifications to executable code through the agent.
pub struct LlmCompiler {
    agent: Arc<dyn Agent>,
    checker: AmbiguityChecker,
    cwd: Option<PathBuf>,
}

impl LlmCompiler {
    /// The working directory, when given, is the agent's side-effect
    /// channel: generated implementation and test files land there, as do
    /// the per-module compile transcripts.
    pub fn new(agent: Arc<dyn Agent>, cwd: Option<PathBuf>) -> Self {
        let checker = AmbiguityChecker::new(agent.clone());
        Self {
            agent,
            checker,
            cwd,
        }
    }

    /// Runs one compile attempt for the module and, recursively, its
    /// dependencies. `force` skips the ambiguity gate everywhere.
    pub fn compile(&self, module: &Module, target_language: &str, force: bool) -> CompilationResult {
        let mut stack = Vec::new();
        self.compile_attempt(module, target_language, force, &mut stack)
    }

    fn compile_attempt(
        &self,
        module: &Module,
        target_language: &str,
        force: bool,
        stack: &mut Vec<String>,
    ) -> CompilationResult {
        match self.compile_inner(module, target_language, force, stack) {
            Ok(result) => result,
            Err(e) => CompilationResult::error(e),
        }
    }

    fn compile_inner(
        &self,
        module: &Module,
        target_language: &str,
        force: bool,
        stack: &mut Vec<String>,
    ) -> Result<CompilationResult, CompileError> {
        // The recursive walk carries a visited stack so a cyclic graph fails
        // with a named chain instead of recursing without bound.
        if stack.iter().any(|name| name == module.name()) {
            let mut chain = stack.clone();
            chain.push(module.name().to_string());
            return Err(CompileError::Cycle { chain });
        }

        // Pass 1: ambiguity gate. Findings end the attempt before any code
        // generation happens.
        if !force {
            let ambiguities = self.checker.check(module).map_err(CompileError::Agent)?;
            if !ambiguities.is_empty() {
                return Ok(CompilationResult::ambiguous(ambiguities));
            }
        }

        stack.push(module.name().to_string());
        let outcome = self.compile_dependencies_then_generate(module, target_language, force, stack);
        stack.pop();
        outcome
    }

    fn compile_dependencies_then_generate(
        &self,
        module: &Module,
        target_language: &str,
        force: bool,
        stack: &mut Vec<String>,
    ) -> Result<CompilationResult, CompileError> {
        // Pass 2: dependencies, depth-first, in declared order. The first
        // one that does not come back compiled aborts the whole attempt. A
        // detected cycle propagates as-is so the root result names the chain.
        let mut dependency_code = Vec::new();
        for dep in module.dependencies() {
            let dep_result = match self.compile_inner(dep, target_language, force, stack) {
                Ok(result) => result,
                Err(e @ CompileError::Cycle { .. }) => return Err(e),
                Err(e) => CompilationResult::error(e),
            };
            if dep_result.status != CompileStatus::Compiled {
                return Err(CompileError::Dependency {
                    name: dep.name().to_string(),
                    status: dep_result.status,
                    detail: dep_result.error,
                });
            }
            dependency_code.push((
                dep.name().to_string(),
                dep_result.code.unwrap_or_default(),
            ));
        }

        // Pass 3: code generation for this module.
        let prompt = build_generation_prompt(module, &dependency_code, target_language);
        match self.agent.query(&prompt, self.cwd.as_deref()) {
            Ok(response) => {
                self.write_log(module, &prompt, Ok(&response));
                let dependencies = dependency_code.into_iter().map(|(name, _)| name).collect();
                Ok(CompilationResult::compiled(
                    response.trim().to_string(),
                    target_language,
                    dependencies,
                ))
            }
            Err(e) => {
                self.write_log(module, &prompt, Err(&e));
                Err(CompileError::Agent(e))
            }
        }
    }

    /// Appends a human-readable transcript next to the generated files. Log
    /// failures are reported but never change the attempt's outcome.
    fn write_log(&self, module: &Module, prompt: &str, outcome: Result<&str, &AgentError>) {
        let Some(cwd) = &self.cwd else {
            return;
        };

        let log_file = cwd.join(format!("COMPILE_{}.log", module.name()));
        let status = if outcome.is_ok() { "SUCCESS" } else { "FAILED" };
        let rule = "-".repeat(60);

        let mut content = format!(
            "Compilation Log for {name}\n{heavy}\nStatus: {status}\nTime: {time}\n\n\
             Module Specification:\n{rule}\nName: {name}\nPurpose: {purpose}\n\n\
             Tests: {test_count} test case(s)\nDependencies: {deps:?}\n\n\
             Prompt Sent to Agent:\n{rule}\n{prompt}\n\n",
            name = module.name(),
            heavy = "=".repeat(60),
            status = status,
            time = chrono::Utc::now().to_rfc3339(),
            rule = rule,
            purpose = module.purpose(),
            test_count = module.tests().len(),
            deps = module.dependency_names(),
            prompt = prompt,
        );

        match outcome {
            Ok(response) => {
                content.push_str(&format!("Agent Response:\n{}\n{}\n", rule, response));
            }
            Err(error) => {
                content.push_str(&format!(
                    "Error:\n{}\n{}: {}\n",
                    rule,
                    error.kind(),
                    error
                ));
            }
        }
        content.push_str(&format!("\n{}\nEnd of compilation log\n", rule));

        if let Err(e) = fs::write(&log_file, content) {
            eprintln!(
                "Failed to write compile log {}: {}",
                log_file.display(),
                e
            );
        }
    }
}

fn build_generation_prompt(
    module: &Module,
    dependency_code: &[(String, String)],
    target_language: &str,
) -> String {
    let tests = if module.tests().is_empty() {
        String::new()
    } else {
        format!(
            "\n\nTests (your code must pass these):\n{}",
            render_test_list(module.tests())
        )
    };

    let deps = if dependency_code.is_empty() {
        String::new()
    } else {
        let blocks = dependency_code
            .iter()
            .map(|(name, code)| format!("\n--- Dependency: {} ---\n{}\n", name, code))
            .collect::<String>();
        format!("\n\nDependency Code (available for use):\n{}", blocks)
    };

    format!(
        r#"You are tasked with implementing a {language} module.

Module Specification:
---
Name: {name}
Purpose: {purpose}{tests}{deps}
---

Your task:
1. Follow the language-specific instructions below for environment setup and tooling
2. Write the implementation
3. Write tests that verify ALL the test cases above
4. Run the tests iteratively until they all pass
5. FAIL FAST: Let errors surface immediately. Do NOT add try-except blocks or default values unless explicitly specified in the purpose

Work iteratively - write code, run tests, fix failures, repeat until all tests pass.

{instructions}"#,
        language = target_language,
        name = module.name(),
        purpose = module.purpose(),
        tests = tests,
        deps = deps,
        instructions = language::generation_instructions(target_language),
    )
}

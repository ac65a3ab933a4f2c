//! Decompilation: existing code → module specifications.
//!
//! The agent first infers an initial spec from the gathered source files and
//! writes it to the output path itself; the loop then alternates ambiguity
//! checks and whole-file refinement rewrites until the spec comes back clean
//! or the iteration budget runs out. Exhausting the budget is a degraded
//! success, not a failure: the last-written spec is returned with a warning.

use crate::agent::{Agent, AgentError};
use crate::ambiguity::{Ambiguity, AmbiguityChecker};
use crate::spec::{LoadError, load_spec_file};
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const DEFAULT_MAX_ITERATIONS: usize = 5;

const SOURCE_EXTENSIONS: &[&str] = &[
    "rs", "py", "js", "ts", "go", "java", "rb", "c", "h", "cpp",
];

const SKIPPED_DIRS: &[&str] = &[
    "target",
    "node_modules",
    "__pycache__",
    "venv",
    "dist",
    "build",
];

/// Errors raised by the decompile loop.
#[derive(Debug)]
pub enum DecompileError {
    NoSourceFiles { dir: PathBuf },
    NoModules { path: PathBuf },
    Agent(AgentError),
    Load(LoadError),
    Io { path: PathBuf, detail: String },
}

impl fmt::Display for DecompileError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DecompileError::NoSourceFiles { dir } => {
                write!(f, "no source files found in {}", dir.display())
            }
            DecompileError::NoModules { path } => {
                write!(
                    f,
                    "generated spec {} does not define any modules",
                    path.display()
                )
            }
            DecompileError::Agent(e) => write!(f, "{}", e),
            DecompileError::Load(e) => write!(f, "{}", e),
            DecompileError::Io { path, detail } => {
                write!(f, "failed to read {}: {}", path.display(), detail)
            }
        }
    }
}

impl std::error::Error for DecompileError {}

impl From<AgentError> for DecompileError {
    fn from(e: AgentError) -> Self {
        DecompileError::Agent(e)
    }
}

/// Turns a code directory into module specifications through the agent,
/// refined to a fixed point or an iteration budget.
pub struct Decompiler {
    agent: Arc<dyn Agent>,
    checker: AmbiguityChecker,
    max_iterations: usize,
}

impl Decompiler {
    pub fn new(agent: Arc<dyn Agent>, max_iterations: usize) -> Self {
        let checker = AmbiguityChecker::new(agent.clone());
        Self {
            agent,
            checker,
            max_iterations,
        }
    }

    /// Runs the full loop and returns the final spec file contents.
    pub fn decompile(&self, code_dir: &Path, output_file: &Path) -> Result<String, DecompileError> {
        let files = gather_source_files(code_dir)?;
        if files.is_empty() {
            return Err(DecompileError::NoSourceFiles {
                dir: code_dir.to_path_buf(),
            });
        }

        // The agent runs in the parent of the code directory so relative
        // paths in the emitted spec resolve correctly.
        let agent_cwd = code_dir.parent().unwrap_or(code_dir);

        println!(
            "Generating initial specification from {} source file(s)...",
            files.len()
        );
        let prompt = build_initial_prompt(&files, output_file);
        // The reply is discarded: the artifact is the file the agent wrote.
        self.agent.query(&prompt, Some(agent_cwd))?;

        for iteration in 1..=self.max_iterations {
            println!(
                "Checking specification (iteration {}/{})...",
                iteration, self.max_iterations
            );

            let modules = match load_spec_file(output_file) {
                Ok(modules) => modules,
                Err(LoadError::NoModules { path }) => {
                    return Err(DecompileError::NoModules { path });
                }
                Err(e) => return Err(DecompileError::Load(e)),
            };

            let mut findings: BTreeMap<String, Vec<Ambiguity>> = BTreeMap::new();
            for module in &modules {
                let found = self.checker.check(module)?;
                if !found.is_empty() {
                    findings.insert(module.name().to_string(), found);
                }
            }

            if findings.is_empty() {
                println!("✓ Specification passes ambiguity checks");
                return read_spec(output_file);
            }

            println!(
                "Found ambiguities in {} module(s), refining...",
                findings.len()
            );
            let current = read_spec(output_file)?;
            let prompt = build_refinement_prompt(&current, output_file, &findings);
            self.agent.query(&prompt, Some(agent_cwd))?;
        }

        println!(
            "⚠ Specification still has ambiguities after {} iteration(s); returning best effort",
            self.max_iterations
        );
        read_spec(output_file)
    }
}

fn read_spec(path: &Path) -> Result<String, DecompileError> {
    fs::read_to_string(path).map_err(|e| DecompileError::Io {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })
}

/// Collects source files under `code_dir`, relative path plus contents,
/// sorted by path so prompts are deterministic. Build artifact directories,
/// hidden directories, and test files are skipped.
fn gather_source_files(code_dir: &Path) -> Result<Vec<(String, String)>, DecompileError> {
    let test_name =
        Regex::new(r"^test_|_test$|\.test$|^tests$").expect("valid test-name regex");

    let mut files = Vec::new();
    let mut stack = vec![code_dir.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let entries = fs::read_dir(&dir).map_err(|e| DecompileError::Io {
            path: dir.clone(),
            detail: e.to_string(),
        })?;

        for entry in entries {
            let entry = entry.map_err(|e| DecompileError::Io {
                path: dir.clone(),
                detail: e.to_string(),
            })?;
            let path = entry.path();
            let name = match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => name.to_string(),
                None => continue,
            };

            if path.is_dir() {
                if name.starts_with('.') || SKIPPED_DIRS.contains(&name.as_str()) {
                    continue;
                }
                stack.push(path);
                continue;
            }

            match path.extension().and_then(|e| e.to_str()) {
                Some(ext) if SOURCE_EXTENSIONS.contains(&ext) => {}
                _ => continue,
            }

            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default();
            if test_name.is_match(stem) {
                continue;
            }

            let content = fs::read_to_string(&path).map_err(|e| DecompileError::Io {
                path: path.clone(),
                detail: e.to_string(),
            })?;
            let relative = path
                .strip_prefix(code_dir)
                .unwrap_or(&path)
                .to_string_lossy()
                .to_string();
            files.push((relative, content));
        }
    }

    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}

fn spec_format_example() -> &'static str {
    r#"modules:
  - name: module_name
    purpose: |
      Specific multi-sentence description of what this module does.
      Cover behavior, inputs, outputs, and edge cases.
    dependencies: [other_module_name]
    tests:
      - description: what this example verifies
        inputs: {key: value}
        outputs: {key: value}
      - "a free-text behavioral assertion""#
}

fn build_initial_prompt(files: &[(String, String)], output_file: &Path) -> String {
    let files_str = files
        .iter()
        .map(|(path, content)| format!("\n--- {} ---\n{}\n", path, content))
        .collect::<String>();

    format!(
        r#"Analyze the following code and generate module specifications for it.

Code Files:
{files}

Your task:
1. Analyze the code to understand its purpose and behavior
2. Identify the main modules/components (there may be one or multiple)
3. Write a YAML spec file to {output} defining every module

The spec file format:

```yaml
{format}
```

For each module you must specify:
- name: the module name (infer from code structure)
- purpose: a specific multi-sentence description of what it does
- dependencies: names of other modules in this spec it depends on (if any)
- tests: comprehensive test cases covering main functionality and edge cases

IMPORTANT:
- Infer the purpose from the code implementation
- Focus on WHAT the code does, not HOW it's implemented
- Tests should describe expected behavior, not implementation details
- Be specific enough that the spec could be implemented without reading the original code

Write the complete spec file to {output} now."#,
        files = files_str,
        format = spec_format_example(),
        output = output_file.display(),
    )
}

fn build_refinement_prompt(
    current_spec: &str,
    output_file: &Path,
    findings: &BTreeMap<String, Vec<Ambiguity>>,
) -> String {
    let mut issues = String::new();
    for (module_name, ambiguities) in findings {
        issues.push_str(&format!("\nModule: {}\n", module_name));
        for finding in ambiguities {
            issues.push_str(&format!(
                "- Location: {}\n  Issue: {}\n",
                finding.location, finding.issue
            ));
            for suggestion in &finding.suggestions {
                issues.push_str(&format!("  Suggestion: {}\n", suggestion));
            }
        }
    }

    format!(
        r#"The following spec file has ambiguities that must be resolved.

Current spec ({output}):
---
{spec}
---

Ambiguities found:
{issues}

Your task:
1. Rewrite the ENTIRE spec file at {output} in place (not a diff)
2. Resolve every listed issue
3. Make purposes more specific where they were vague
4. Add missing test cases where tests were incomplete
5. Keep the same YAML format

Write the complete corrected spec file to {output} now."#,
        output = output_file.display(),
        spec = current_spec,
        issues = issues,
    )
}

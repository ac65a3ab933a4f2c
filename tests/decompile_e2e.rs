//! End-to-end decompile loop scenarios against a scripted agent double.
//!
//! The double mirrors how the real agent behaves: generation and refinement
//! prompts make it write a spec file to the requested path (the reply text
//! is discarded), while check prompts get textual verdicts from a queue.

use agentc::agent::{Agent, AgentError};
use agentc::decompiler::{DEFAULT_MAX_ITERATIONS, Decompiler, DecompileError};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

const CHECK_MARKER: &str = "Ambiguity check on module specification";

struct SpecWritingAgent {
    spec_file: PathBuf,
    /// Spec contents written on the initial generation call and on each
    /// refinement call, in order.
    spec_versions: Mutex<VecDeque<String>>,
    /// Replies to ambiguity check prompts, in order.
    check_responses: Mutex<VecDeque<String>>,
    check_calls: Mutex<usize>,
    write_calls: Mutex<usize>,
}

impl SpecWritingAgent {
    fn new(spec_file: &Path, spec_versions: Vec<&str>, check_responses: Vec<&str>) -> Arc<Self> {
        Arc::new(Self {
            spec_file: spec_file.to_path_buf(),
            spec_versions: Mutex::new(
                spec_versions.into_iter().map(|s| s.to_string()).collect(),
            ),
            check_responses: Mutex::new(
                check_responses.into_iter().map(|s| s.to_string()).collect(),
            ),
            check_calls: Mutex::new(0),
            write_calls: Mutex::new(0),
        })
    }

    fn check_calls(&self) -> usize {
        *self.check_calls.lock().unwrap()
    }

    fn write_calls(&self) -> usize {
        *self.write_calls.lock().unwrap()
    }
}

impl Agent for SpecWritingAgent {
    fn query(&self, prompt: &str, _cwd: Option<&Path>) -> Result<String, AgentError> {
        if prompt.contains(CHECK_MARKER) {
            *self.check_calls.lock().unwrap() += 1;
            let response = self
                .check_responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected extra check call");
            return Ok(response);
        }

        *self.write_calls.lock().unwrap() += 1;
        let version = self
            .spec_versions
            .lock()
            .unwrap()
            .pop_front()
            .expect("unexpected extra generation/refinement call");
        fs::write(&self.spec_file, version)
            .map_err(|e| AgentError::InvalidOutput(e.to_string()))?;
        Ok("spec written".to_string())
    }
}

fn temp_root(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time ok")
        .as_nanos();
    std::env::temp_dir().join(format!("agentc_decompile_e2e_{}_{}", prefix, nanos))
}

fn code_dir_with_source(root: &Path) -> PathBuf {
    let code = root.join("project");
    fs::create_dir_all(&code).expect("mkdir");
    fs::write(
        code.join("calculator.py"),
        "def add(a, b):\n    return a + b\n",
    )
    .expect("write");
    code
}

const SPEC_V1: &str = r#"
modules:
  - name: calculator
    purpose: does math
"#;

const SPEC_V2: &str = r#"
modules:
  - name: calculator
    purpose: adds two floating point numbers and returns their sum
    tests:
      - inputs: {a: 10, b: 5}
        outputs: {result: 15.0}
"#;

const AMBIGUOUS: &str =
    "AMBIGUITY:\nLocation: purpose\nIssue: operation set is undefined\nSeverity: error\nSuggestions:\n- enumerate the supported operations";

#[test]
fn clean_first_pass_returns_generated_spec_without_refining() {
    let root = temp_root("clean");
    let code = code_dir_with_source(&root);
    let spec_file = root.join("spec.yaml");

    let agent = SpecWritingAgent::new(&spec_file, vec![SPEC_V2], vec!["NO_AMBIGUITIES"]);
    let decompiler = Decompiler::new(agent.clone(), DEFAULT_MAX_ITERATIONS);

    let artifact = decompiler.decompile(&code, &spec_file).expect("decompile");

    // Exactly one generation call, one check pass, no refinement.
    assert_eq!(agent.write_calls(), 1);
    assert_eq!(agent.check_calls(), 1);
    assert_eq!(artifact, fs::read_to_string(&spec_file).unwrap());
    assert_eq!(artifact, SPEC_V2);

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn one_refinement_reaches_the_fixed_point() {
    let root = temp_root("refine_once");
    let code = code_dir_with_source(&root);
    let spec_file = root.join("spec.yaml");

    let agent = SpecWritingAgent::new(
        &spec_file,
        vec![SPEC_V1, SPEC_V2],
        vec![AMBIGUOUS, "NO_AMBIGUITIES"],
    );
    let decompiler = Decompiler::new(agent.clone(), DEFAULT_MAX_ITERATIONS);

    let artifact = decompiler.decompile(&code, &spec_file).expect("decompile");

    // Initial generation plus one refinement; two check passes.
    assert_eq!(agent.write_calls(), 2);
    assert_eq!(agent.check_calls(), 2);
    assert_eq!(artifact, SPEC_V2);

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn budget_exhaustion_returns_best_effort_instead_of_failing() {
    let root = temp_root("exhausted");
    let code = code_dir_with_source(&root);
    let spec_file = root.join("spec.yaml");

    let max_iterations = 3;
    // Every check keeps reporting the same finding; the loop must stop after
    // max_iterations refinements and hand back the last written file.
    let agent = SpecWritingAgent::new(
        &spec_file,
        vec![SPEC_V1, SPEC_V1, SPEC_V1, SPEC_V2],
        vec![AMBIGUOUS; max_iterations],
    );
    let decompiler = Decompiler::new(agent.clone(), max_iterations);

    let artifact = decompiler.decompile(&code, &spec_file).expect("decompile");

    // One initial generation + exactly max_iterations refinement calls.
    assert_eq!(agent.write_calls(), 1 + max_iterations);
    assert_eq!(agent.check_calls(), max_iterations);
    assert_eq!(artifact, SPEC_V2);

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn spec_without_modules_is_a_descriptive_error() {
    let root = temp_root("no_modules");
    let code = code_dir_with_source(&root);
    let spec_file = root.join("spec.yaml");

    let agent = SpecWritingAgent::new(&spec_file, vec!["modules: []"], vec![]);
    let decompiler = Decompiler::new(agent, DEFAULT_MAX_ITERATIONS);

    match decompiler.decompile(&code, &spec_file) {
        Err(DecompileError::NoModules { path }) => assert_eq!(path, spec_file),
        other => panic!(
            "unexpected outcome: {:?}",
            other.map_err(|e| e.to_string())
        ),
    }

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn empty_code_directory_never_reaches_the_agent() {
    let root = temp_root("empty_dir");
    let code = root.join("empty");
    fs::create_dir_all(&code).expect("mkdir");
    let spec_file = root.join("spec.yaml");

    let agent = SpecWritingAgent::new(&spec_file, vec![], vec![]);
    let decompiler = Decompiler::new(agent.clone(), DEFAULT_MAX_ITERATIONS);

    assert!(matches!(
        decompiler.decompile(&code, &spec_file),
        Err(DecompileError::NoSourceFiles { .. })
    ));
    assert_eq!(agent.write_calls(), 0);
    assert_eq!(agent.check_calls(), 0);

    let _ = fs::remove_dir_all(&root);
}

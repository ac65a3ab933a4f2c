//! Module specification model.
//!
//! A `Module` is the unit of compilation: a named piece of intended behavior
//! described in natural language, with references to the modules it depends
//! on and the examples it must satisfy. Instances are built once from a spec
//! source and never mutated afterwards; dependents share them through `Arc`.

mod loader;

pub use loader::{LoadError, load_spec_file, parse_spec_source};

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Errors raised when a module specification fails validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecError {
    MissingName,
    MissingPurpose,
}

impl fmt::Display for SpecError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SpecError::MissingName => write!(f, "Module must have a name"),
            SpecError::MissingPurpose => write!(f, "Module must have a purpose"),
        }
    }
}

impl std::error::Error for SpecError {}

/// One test a module must satisfy.
///
/// The structured form carries an inputs mapping and an expected-outputs
/// mapping plus an optional description. A plain free-text assertion is the
/// degenerate case: only the description is set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestCase {
    description: Option<String>,
    inputs: BTreeMap<String, serde_json::Value>,
    outputs: BTreeMap<String, serde_json::Value>,
}

impl TestCase {
    /// Builds a structured example test.
    pub fn example(
        description: Option<String>,
        inputs: BTreeMap<String, serde_json::Value>,
        outputs: BTreeMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            description,
            inputs,
            outputs,
        }
    }

    /// Builds a free-text assertion: a test with only a description.
    pub fn assertion(text: impl Into<String>) -> Self {
        Self {
            description: Some(text.into()),
            inputs: BTreeMap::new(),
            outputs: BTreeMap::new(),
        }
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn inputs(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.inputs
    }

    pub fn outputs(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.outputs
    }

    /// Renders the test as prompt text, 1-based index first.
    pub fn render(&self, index: usize) -> String {
        let mut out = format!("Test {}:", index);
        if let Some(description) = &self.description {
            out.push(' ');
            out.push_str(description);
        }
        if !self.inputs.is_empty() {
            out.push_str(&format!("\n  Inputs: {}", render_mapping(&self.inputs)));
        }
        if !self.outputs.is_empty() {
            out.push_str(&format!(
                "\n  Expected Outputs: {}",
                render_mapping(&self.outputs)
            ));
        }
        out
    }
}

fn render_mapping(mapping: &BTreeMap<String, serde_json::Value>) -> String {
    serde_json::to_string(mapping).unwrap_or_else(|_| "{}".to_string())
}

/// Renders a module's test list the way both the ambiguity-check and the
/// code-generation prompts expect it, with an explicit marker when no tests
/// were provided.
pub fn render_test_list(tests: &[TestCase]) -> String {
    if tests.is_empty() {
        return "(none provided)".to_string();
    }
    tests
        .iter()
        .enumerate()
        .map(|(i, test)| test.render(i + 1))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// A module specification that can be compiled to executable code.
///
/// Kept intentionally minimal: the ambiguity checker forces the purpose and
/// tests to become specific enough that compilation is unambiguous.
#[derive(Debug, Clone)]
pub struct Module {
    name: String,
    purpose: String,
    dependencies: Vec<Arc<Module>>,
    tests: Vec<TestCase>,
    // Freezing metadata: representable but not acted on yet.
    frozen: bool,
    frozen_code: Option<String>,
    frozen_hash: Option<String>,
}

impl Module {
    /// Validates and constructs a module. Fails immediately when the name or
    /// the purpose is empty, naming the missing field.
    pub fn new(name: impl Into<String>, purpose: impl Into<String>) -> Result<Self, SpecError> {
        let name = name.into();
        let purpose = purpose.into();
        if name.is_empty() {
            return Err(SpecError::MissingName);
        }
        if purpose.is_empty() {
            return Err(SpecError::MissingPurpose);
        }
        Ok(Self {
            name,
            purpose,
            dependencies: Vec::new(),
            tests: Vec::new(),
            frozen: false,
            frozen_code: None,
            frozen_hash: None,
        })
    }

    pub fn with_dependencies(mut self, dependencies: Vec<Arc<Module>>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn with_tests(mut self, tests: Vec<TestCase>) -> Self {
        self.tests = tests;
        self
    }

    pub fn with_frozen(
        mut self,
        frozen: bool,
        frozen_code: Option<String>,
        frozen_hash: Option<String>,
    ) -> Self {
        self.frozen = frozen;
        self.frozen_code = frozen_code;
        self.frozen_hash = frozen_hash;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn purpose(&self) -> &str {
        &self.purpose
    }

    pub fn dependencies(&self) -> &[Arc<Module>] {
        &self.dependencies
    }

    /// Declared dependency names, in declaration order.
    pub fn dependency_names(&self) -> Vec<String> {
        self.dependencies.iter().map(|d| d.name.clone()).collect()
    }

    pub fn tests(&self) -> &[TestCase] {
        &self.tests
    }

    pub fn frozen(&self) -> bool {
        self.frozen
    }

    pub fn frozen_code(&self) -> Option<&str> {
        self.frozen_code.as_deref()
    }

    pub fn frozen_hash(&self) -> Option<&str> {
        self.frozen_hash.as_deref()
    }
}

// Graph-node identity is by name: a compilation run requires names to be
// unique, and dependents only ever refer to a module by it.
impl PartialEq for Module {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Module {}

impl std::hash::Hash for Module {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn module_requires_name() {
        let result = Module::new("", "does something");
        assert_eq!(result.unwrap_err(), SpecError::MissingName);
    }

    #[test]
    fn module_requires_purpose() {
        let result = Module::new("calculator", "");
        assert_eq!(result.unwrap_err(), SpecError::MissingPurpose);
    }

    #[test]
    fn missing_field_is_named_in_the_error() {
        assert_eq!(
            Module::new("", "p").unwrap_err().to_string(),
            "Module must have a name"
        );
        assert_eq!(
            Module::new("n", "").unwrap_err().to_string(),
            "Module must have a purpose"
        );
    }

    #[test]
    fn fields_round_trip_unchanged() {
        let dep = Arc::new(Module::new("validator", "validates input rows").unwrap());
        let test = TestCase::example(
            Some("adds two numbers".to_string()),
            BTreeMap::from([
                ("a".to_string(), json!(10)),
                ("b".to_string(), json!(5)),
            ]),
            BTreeMap::from([("result".to_string(), json!(15.0))]),
        );
        let module = Module::new("calculator", "adds two numbers")
            .unwrap()
            .with_dependencies(vec![dep.clone()])
            .with_tests(vec![test.clone()]);

        assert_eq!(module.name(), "calculator");
        assert_eq!(module.purpose(), "adds two numbers");
        assert_eq!(module.dependency_names(), vec!["validator".to_string()]);
        assert_eq!(module.tests(), &[test]);
        assert!(!module.frozen());
        assert_eq!(module.frozen_code(), None);
        assert_eq!(module.frozen_hash(), None);
    }

    #[test]
    fn frozen_metadata_is_stored_but_inert() {
        let module = Module::new("pinned", "already compiled elsewhere")
            .unwrap()
            .with_frozen(true, Some("fn main() {}".to_string()), Some("abc123".to_string()));
        assert!(module.frozen());
        assert_eq!(module.frozen_code(), Some("fn main() {}"));
        assert_eq!(module.frozen_hash(), Some("abc123"));
    }

    #[test]
    fn equality_is_by_name() {
        let a = Module::new("shared", "one description").unwrap();
        let b = Module::new("shared", "a different description").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn assertion_test_renders_description_only() {
        let test = TestCase::assertion("rejects empty input");
        assert_eq!(test.render(1), "Test 1: rejects empty input");
    }

    #[test]
    fn example_test_renders_inputs_and_outputs() {
        let test = TestCase::example(
            None,
            BTreeMap::from([("a".to_string(), json!(1))]),
            BTreeMap::from([("result".to_string(), json!(2))]),
        );
        let rendered = test.render(3);
        assert!(rendered.starts_with("Test 3:"));
        assert!(rendered.contains("Inputs: {\"a\":1}"));
        assert!(rendered.contains("Expected Outputs: {\"result\":2}"));
    }

    #[test]
    fn empty_test_list_renders_marker() {
        assert_eq!(render_test_list(&[]), "(none provided)");
    }
}

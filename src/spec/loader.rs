//! Spec-file loading.
//!
//! Spec sources are declarative YAML documents rather than executable code;
//! the loader deserializes the document and resolves dependency names into a
//! shared module graph. Resolution runs in passes so declaration order does
//! not matter, and anything left unresolved is reported as an unknown name
//! or a cycle.

use super::{Module, SpecError, TestCase};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Errors raised while loading a spec file.
#[derive(Debug)]
pub enum LoadError {
    Read { path: PathBuf, detail: String },
    Parse { path: PathBuf, detail: String },
    NoModules { path: PathBuf },
    DuplicateModule { name: String },
    UnknownDependency { module: String, dependency: String },
    DependencyCycle { names: Vec<String> },
    Invalid { name: String, source: SpecError },
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LoadError::Read { path, detail } => {
                write!(f, "failed to read spec file {}: {}", path.display(), detail)
            }
            LoadError::Parse { path, detail } => {
                write!(f, "failed to parse spec file {}: {}", path.display(), detail)
            }
            LoadError::NoModules { path } => {
                write!(f, "no modules found in spec file {}", path.display())
            }
            LoadError::DuplicateModule { name } => {
                write!(f, "duplicate module name '{}' in spec file", name)
            }
            LoadError::UnknownDependency { module, dependency } => {
                write!(
                    f,
                    "module '{}' depends on unknown module '{}'",
                    module, dependency
                )
            }
            LoadError::DependencyCycle { names } => {
                write!(f, "dependency cycle among modules: {}", names.join(", "))
            }
            LoadError::Invalid { name, source } => {
                write!(f, "invalid module '{}': {}", name, source)
            }
        }
    }
}

impl std::error::Error for LoadError {}

#[derive(Debug, Deserialize)]
struct RawSpec {
    modules: Vec<RawModule>,
}

#[derive(Debug, Deserialize)]
struct RawModule {
    #[serde(default)]
    name: String,
    #[serde(default)]
    purpose: String,
    #[serde(default)]
    dependencies: Vec<String>,
    #[serde(default)]
    tests: Vec<RawTest>,
    #[serde(default)]
    frozen: bool,
    #[serde(default)]
    frozen_code: Option<String>,
    #[serde(default)]
    frozen_hash: Option<String>,
}

/// A test entry is either a bare string (free-text assertion) or a structured
/// example with inputs and expected outputs.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTest {
    Assertion(String),
    Example {
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        inputs: BTreeMap<String, serde_json::Value>,
        #[serde(default)]
        outputs: BTreeMap<String, serde_json::Value>,
    },
}

impl RawTest {
    fn into_test_case(self) -> TestCase {
        match self {
            RawTest::Assertion(text) => TestCase::assertion(text),
            RawTest::Example {
                description,
                inputs,
                outputs,
            } => TestCase::example(description, inputs, outputs),
        }
    }
}

/// Loads every module defined in a YAML spec file, in declaration order.
pub fn load_spec_file(path: &Path) -> Result<Vec<Arc<Module>>, LoadError> {
    let source = fs::read_to_string(path).map_err(|e| LoadError::Read {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    parse_spec_source(&source, path)
}

/// Parses spec source text. The path is only used for error messages.
pub fn parse_spec_source(source: &str, path: &Path) -> Result<Vec<Arc<Module>>, LoadError> {
    let raw: RawSpec = serde_yaml::from_str(source).map_err(|e| LoadError::Parse {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;

    if raw.modules.is_empty() {
        return Err(LoadError::NoModules {
            path: path.to_path_buf(),
        });
    }

    let declared_order: Vec<String> = raw.modules.iter().map(|m| m.name.clone()).collect();

    let mut seen = std::collections::HashSet::new();
    for name in &declared_order {
        if !seen.insert(name.clone()) {
            return Err(LoadError::DuplicateModule { name: name.clone() });
        }
    }

    let mut pending: Vec<RawModule> = raw.modules;
    let mut resolved: HashMap<String, Arc<Module>> = HashMap::new();
    let declared = declared_order.clone();

    // Resolve in passes: a module becomes constructible once all of its
    // dependencies are. Anything never constructible is an unknown name or
    // part of a cycle.
    while !pending.is_empty() {
        let mut progressed = false;
        let mut still_pending = Vec::new();

        for module in pending {
            if let Some(missing) = module
                .dependencies
                .iter()
                .find(|dep| !declared.contains(*dep))
            {
                return Err(LoadError::UnknownDependency {
                    module: module.name.clone(),
                    dependency: missing.clone(),
                });
            }

            if module.dependencies.iter().all(|d| resolved.contains_key(d)) {
                let deps = module
                    .dependencies
                    .iter()
                    .map(|d| resolved[d].clone())
                    .collect();
                let tests = module
                    .tests
                    .into_iter()
                    .map(RawTest::into_test_case)
                    .collect();
                let name = module.name.clone();
                let built = Module::new(module.name, module.purpose)
                    .map_err(|source| LoadError::Invalid { name, source })?
                    .with_dependencies(deps)
                    .with_tests(tests)
                    .with_frozen(module.frozen, module.frozen_code, module.frozen_hash);
                resolved.insert(built.name().to_string(), Arc::new(built));
                progressed = true;
            } else {
                still_pending.push(module);
            }
        }

        if !progressed {
            let mut names: Vec<String> =
                still_pending.into_iter().map(|m| m.name).collect();
            names.sort();
            return Err(LoadError::DependencyCycle { names });
        }
        pending = still_pending;
    }

    Ok(declared_order
        .into_iter()
        .map(|name| resolved[&name].clone())
        .collect())
}

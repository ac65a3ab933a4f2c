//! Content-addressed cache of ambiguity check results.
//!
//! Keys are SHA-256 digests of the fields that affect ambiguity checking:
//! the module's own name, its purpose, its dependency names (names only —
//! a dependency's internal changes deliberately do not invalidate
//! dependents), and its tests. The table lives in a single JSON file and is
//! rewritten in full on every `set`, via a temp-file rename so a crashed
//! writer cannot leave a torn table behind.

use crate::ambiguity::Ambiguity;
use crate::spec::Module;
use anyhow::{Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

const CACHE_FILE: &str = ".ambiguity_cache.json";

#[derive(Serialize)]
struct HashedTest<'a> {
    description: Option<&'a str>,
    inputs: &'a BTreeMap<String, serde_json::Value>,
    outputs: &'a BTreeMap<String, serde_json::Value>,
}

#[derive(Serialize)]
struct HashedSpec<'a> {
    name: &'a str,
    purpose: &'a str,
    dependencies: Vec<&'a str>,
    tests: Vec<HashedTest<'a>>,
}

/// Computes the cache key for a module's current field values.
///
/// The serialized form has a fixed field order and sorted mapping keys, so
/// the digest is stable across runs and attribute enumeration order.
pub fn content_hash(module: &Module) -> String {
    let record = HashedSpec {
        name: module.name(),
        purpose: module.purpose(),
        dependencies: module.dependencies().iter().map(|d| d.name()).collect(),
        tests: module
            .tests()
            .iter()
            .map(|t| HashedTest {
                description: t.description(),
                inputs: t.inputs(),
                outputs: t.outputs(),
            })
            .collect(),
    };

    let canonical = serde_json::to_string(&record).unwrap_or_else(|_| "{}".to_string());
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

/// Persistent hash → findings table.
pub struct AmbiguityCache {
    cache_file: PathBuf,
    table: HashMap<String, Vec<Ambiguity>>,
}

impl AmbiguityCache {
    /// Opens the cache under `cache_dir`, creating the directory if needed
    /// and loading any existing table. A corrupt table is discarded with a
    /// warning rather than failing the run: the cache is an optimization.
    pub fn new(cache_dir: &Path) -> Result<Self> {
        fs::create_dir_all(cache_dir).with_context(|| {
            format!("Failed to create cache directory {}", cache_dir.display())
        })?;

        let cache_file = cache_dir.join(CACHE_FILE);
        let table = if cache_file.exists() {
            let content = fs::read_to_string(&cache_file)
                .with_context(|| format!("Failed to read cache file {}", cache_file.display()))?;
            match serde_json::from_str(&content) {
                Ok(table) => table,
                Err(e) => {
                    eprintln!(
                        "Warning: discarding unreadable cache file {}: {}",
                        cache_file.display(),
                        e
                    );
                    HashMap::new()
                }
            }
        } else {
            HashMap::new()
        };

        Ok(Self { cache_file, table })
    }

    /// Returns the stored result for the module's current hash: `Some(vec![])`
    /// means previously checked clean, `None` means never checked.
    pub fn get(&self, module: &Module) -> Option<Vec<Ambiguity>> {
        self.table.get(&content_hash(module)).cloned()
    }

    /// Stores a check result under the module's current hash and persists
    /// the full table before returning.
    pub fn set(&mut self, module: &Module, ambiguities: &[Ambiguity]) -> Result<()> {
        self.table
            .insert(content_hash(module), ambiguities.to_vec());
        self.save()
    }

    fn save(&self) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.table)
            .context("Failed to serialize ambiguity cache")?;

        let tmp_file = self.cache_file.with_extension("json.tmp");
        fs::write(&tmp_file, content)
            .with_context(|| format!("Failed to write cache file {}", tmp_file.display()))?;
        fs::rename(&tmp_file, &self.cache_file)
            .with_context(|| format!("Failed to replace cache file {}", self.cache_file.display()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ambiguity::Severity;
    use crate::spec::TestCase;
    use std::sync::Arc;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(prefix: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time ok")
            .as_nanos();
        std::env::temp_dir().join(format!("agentc_cache_{}_{}", prefix, nanos))
    }

    fn module(name: &str, purpose: &str) -> Module {
        Module::new(name, purpose).unwrap()
    }

    fn finding(module_name: &str) -> Ambiguity {
        Ambiguity {
            module_name: module_name.to_string(),
            location: "tests".to_string(),
            issue: "missing subtract case".to_string(),
            severity: Severity::Warning,
            suggestions: vec!["add one".to_string()],
        }
    }

    #[test]
    fn get_returns_none_when_never_checked() {
        let dir = temp_dir("miss");
        let cache = AmbiguityCache::new(&dir).expect("cache");
        assert_eq!(cache.get(&module("m", "p")), None);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn set_then_get_round_trips() {
        let dir = temp_dir("roundtrip");
        let mut cache = AmbiguityCache::new(&dir).expect("cache");
        let m = module("calculator", "adds two numbers");

        cache.set(&m, &[finding("calculator")]).expect("set");
        assert_eq!(cache.get(&m), Some(vec![finding("calculator")]));

        // A clean result is an empty list, distinct from "never checked".
        cache.set(&m, &[]).expect("set");
        assert_eq!(cache.get(&m), Some(vec![]));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn cache_persists_across_instances() {
        let dir = temp_dir("persist");
        let m = module("calculator", "adds two numbers");
        {
            let mut cache = AmbiguityCache::new(&dir).expect("cache");
            cache.set(&m, &[finding("calculator")]).expect("set");
        }
        let reopened = AmbiguityCache::new(&dir).expect("cache");
        assert_eq!(reopened.get(&m), Some(vec![finding("calculator")]));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn corrupt_cache_file_starts_empty() {
        let dir = temp_dir("corrupt");
        fs::create_dir_all(&dir).expect("mkdir");
        fs::write(dir.join(CACHE_FILE), "{not json").expect("write");

        let cache = AmbiguityCache::new(&dir).expect("cache");
        assert_eq!(cache.get(&module("m", "p")), None);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn hash_is_stable_for_equal_specs() {
        let a = module("calculator", "adds two numbers");
        let b = module("calculator", "adds two numbers");
        assert_eq!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn hash_changes_with_own_fields() {
        let base = module("calculator", "adds two numbers");
        let renamed = module("calc", "adds two numbers");
        let repurposed = module("calculator", "multiplies two numbers");
        let retested = module("calculator", "adds two numbers")
            .with_tests(vec![TestCase::assertion("adds 2 and 3")]);

        let base_hash = content_hash(&base);
        assert_ne!(base_hash, content_hash(&renamed));
        assert_ne!(base_hash, content_hash(&repurposed));
        assert_ne!(base_hash, content_hash(&retested));
    }

    #[test]
    fn hash_uses_dependency_names_only() {
        let dep_v1 = Arc::new(module("validator", "validates operands"));
        let dep_v2 = Arc::new(
            module("validator", "a completely rewritten purpose")
                .with_tests(vec![TestCase::assertion("rejects NaN")]),
        );
        let dep_renamed = Arc::new(module("sanitizer", "validates operands"));

        let with_v1 = module("calculator", "adds").with_dependencies(vec![dep_v1]);
        let with_v2 = module("calculator", "adds").with_dependencies(vec![dep_v2]);
        let with_renamed = module("calculator", "adds").with_dependencies(vec![dep_renamed]);

        // Shallow invalidation: internals of a dependency do not matter,
        // its name does.
        assert_eq!(content_hash(&with_v1), content_hash(&with_v2));
        assert_ne!(content_hash(&with_v1), content_hash(&with_renamed));
    }

    #[test]
    fn hash_is_sensitive_to_dependency_order() {
        let a = Arc::new(module("a", "first"));
        let b = Arc::new(module("b", "second"));
        let ab = module("top", "p").with_dependencies(vec![a.clone(), b.clone()]);
        let ba = module("top", "p").with_dependencies(vec![b, a]);
        assert_ne!(content_hash(&ab), content_hash(&ba));
    }
}

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

mod progress;

use agentc::agent::{Agent, CommandAgent, HttpAgent};
use agentc::ambiguity::{Ambiguity, AmbiguityChecker};
use agentc::cache::AmbiguityCache;
use agentc::compiler::{CompileStatus, LlmCompiler};
use agentc::decompiler::Decompiler;
use agentc::language;
use agentc::spec::load_spec_file;
use progress::ProgressIndicator;

#[derive(Clone, Copy)]
pub struct Config {
    pub verbose: bool,
}

/// Agent selection for one run.
pub struct AgentOptions {
    pub command: String,
    pub timeout_secs: Option<u64>,
    pub http: bool,
}

/// The only place a concrete agent is constructed; everything downstream
/// takes the trait object it is handed.
pub fn build_agent(options: &AgentOptions) -> Result<Arc<dyn Agent>> {
    if options.http {
        let agent = HttpAgent::from_env().context("Failed to configure HTTP agent")?;
        return Ok(Arc::new(agent));
    }

    let mut agent = CommandAgent::new(options.command.clone());
    if let Some(secs) = options.timeout_secs {
        agent = agent.with_timeout(Duration::from_secs(secs));
    }
    Ok(Arc::new(agent))
}

pub async fn compile_spec(
    spec_file: PathBuf,
    output_dir: Option<PathBuf>,
    force: bool,
    target_language: String,
    agent_options: AgentOptions,
    config: &Config,
) -> Result<()> {
    if !spec_file.exists() {
        anyhow::bail!("Spec file {} does not exist", spec_file.display());
    }

    let output_dir = output_dir.unwrap_or_else(|| {
        spec_file
            .parent()
            .unwrap_or(Path::new("."))
            .join("compiled_src")
    });
    fs::create_dir_all(&output_dir).with_context(|| {
        format!("Failed to create output directory {}", output_dir.display())
    })?;

    println!("Loading modules from {}...", spec_file.display());
    let modules = load_spec_file(&spec_file)
        .with_context(|| format!("Failed to load spec file {}", spec_file.display()))?;
    println!(
        "Found {} module(s): {}",
        modules.len(),
        modules
            .iter()
            .map(|m| m.name().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let agent = build_agent(&agent_options)?;
    let compiler = LlmCompiler::new(agent.clone(), Some(output_dir.clone()));

    // Phase 1: gate every module on ambiguity findings before generating
    // anything, with cached results keyed by spec content.
    if !force {
        println!("\nPhase 1: Checking all modules for ambiguities...");
        let checker = AmbiguityChecker::new(agent.clone());
        let mut cache = AmbiguityCache::new(&output_dir)
            .with_context(|| format!("Failed to open cache in {}", output_dir.display()))?;

        let mut flagged: Vec<(String, Vec<Ambiguity>)> = Vec::new();
        for module in &modules {
            match cache.get(module) {
                Some(cached) => {
                    println!("  Checking {}... (cached)", module.name());
                    if !cached.is_empty() {
                        flagged.push((module.name().to_string(), cached));
                    }
                }
                None => {
                    println!("  Checking {}...", module.name());
                    let ambiguities = checker
                        .check(module)
                        .with_context(|| format!("Ambiguity check failed for {}", module.name()))?;
                    cache.set(module, &ambiguities)?;
                    if !ambiguities.is_empty() {
                        flagged.push((module.name().to_string(), ambiguities));
                    }
                }
            }
        }

        if !flagged.is_empty() {
            println!("\n✗ Found ambiguities in {} module(s):\n", flagged.len());
            for (module_name, ambiguities) in &flagged {
                println!("Module: {}", module_name);
                for finding in ambiguities {
                    println!("  {}\n", finding);
                }
            }
            anyhow::bail!(
                "Found ambiguities in {} module(s); resolve them or rerun with --force",
                flagged.len()
            );
        }

        println!("✓ All modules passed ambiguity checks\n");
    }

    // Phase 2: compile. The gate already ran, so every attempt is forced.
    println!("Phase 2: Compiling modules...");
    let mut progress = ProgressIndicator::new(modules.len());
    for module in &modules {
        progress.start_item(module.name());
        let result = compiler.compile(module, &target_language, true);

        match result.status {
            CompileStatus::Compiled => {
                progress.complete_item(module.name(), true);
                match language::source_file_name(module.name(), &target_language) {
                    Some(file_name) => {
                        let output_file = output_dir.join(&file_name);
                        if output_file.exists() {
                            println!("✓ {} compiled → {}", module.name(), output_file.display());
                        } else {
                            println!(
                                "⚠ {} compilation finished but {} was not written",
                                module.name(),
                                output_file.display()
                            );
                        }
                    }
                    None => {
                        if config.verbose {
                            println!("✓ {} compiled", module.name());
                        }
                    }
                }
            }
            CompileStatus::Ambiguous => {
                progress.complete_item(module.name(), false);
                for finding in &result.ambiguities {
                    println!("  {}", finding);
                }
                progress.finish();
                anyhow::bail!("{} is still ambiguous", module.name());
            }
            CompileStatus::Error => {
                progress.complete_item(module.name(), false);
                progress.finish();
                anyhow::bail!(
                    "{} compilation error: {}",
                    module.name(),
                    result.error.unwrap_or_else(|| "unknown error".to_string())
                );
            }
        }
    }
    progress.finish();

    Ok(())
}

pub async fn decompile_dir(
    code_dir: PathBuf,
    output: Option<PathBuf>,
    max_iterations: usize,
    agent_options: AgentOptions,
    config: &Config,
) -> Result<()> {
    if !code_dir.exists() {
        anyhow::bail!("{} does not exist", code_dir.display());
    }
    if !code_dir.is_dir() {
        anyhow::bail!("{} is not a directory", code_dir.display());
    }

    let output_file = output.unwrap_or_else(|| code_dir.join("spec.yaml"));

    if config.verbose {
        println!(
            "Decompiling {} (max {} refinement iteration(s))",
            code_dir.display(),
            max_iterations
        );
    }

    let agent = build_agent(&agent_options)?;
    let decompiler = Decompiler::new(agent, max_iterations);

    decompiler
        .decompile(&code_dir, &output_file)
        .map_err(|e| anyhow::anyhow!("Decompilation failed: {}", e))?;

    println!("✓ Generated spec file → {}", output_file.display());
    Ok(())
}

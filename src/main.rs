use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

use agentc::agent::DEFAULT_AGENT_COMMAND;
use agentc::decompiler::DEFAULT_MAX_ITERATIONS;

#[derive(Parser)]
#[command(name = "agentc")]
#[command(about = "Compiles natural-language module specifications to code through an LLM agent", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true, help = "Enable verbose output")]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Compile a spec file into generated code")]
    Compile {
        #[arg(help = "YAML spec file containing module definitions")]
        file: PathBuf,

        #[arg(
            long,
            help = "Output directory (default: compiled_src/ next to the spec file)"
        )]
        output_dir: Option<PathBuf>,

        #[arg(long, help = "Skip ambiguity checking")]
        force: bool,

        #[arg(
            long,
            default_value = "python",
            help = "Target language for generated code"
        )]
        target_language: String,

        #[arg(
            long,
            default_value = DEFAULT_AGENT_COMMAND,
            help = "Command used to invoke the agent (e.g. 'claudebox -p' for containerized execution)"
        )]
        agent_command: String,

        #[arg(long, help = "Timeout in seconds for each agent call")]
        timeout_secs: Option<u64>,

        #[arg(long, help = "Use the HTTP agent configured via AGENTC_* environment variables")]
        http: bool,
    },

    #[command(about = "Decompile a code directory into a spec file")]
    Decompile {
        #[arg(help = "Directory containing code to decompile")]
        code_dir: PathBuf,

        #[arg(
            long,
            short,
            help = "Output spec file (default: spec.yaml in the code directory)"
        )]
        output: Option<PathBuf>,

        #[arg(
            long,
            default_value_t = DEFAULT_MAX_ITERATIONS,
            help = "Maximum refinement iterations before returning best effort"
        )]
        max_iterations: usize,

        #[arg(
            long,
            default_value = DEFAULT_AGENT_COMMAND,
            help = "Command used to invoke the agent"
        )]
        agent_command: String,

        #[arg(long, help = "Timeout in seconds for each agent call")]
        timeout_secs: Option<u64>,

        #[arg(long, help = "Use the HTTP agent configured via AGENTC_* environment variables")]
        http: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = cli::Config {
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Compile {
            file,
            output_dir,
            force,
            target_language,
            agent_command,
            timeout_secs,
            http,
        } => {
            let agent_options = cli::AgentOptions {
                command: agent_command,
                timeout_secs,
                http,
            };
            cli::compile_spec(file, output_dir, force, target_language, agent_options, &config)
                .await?;
        }
        Commands::Decompile {
            code_dir,
            output,
            max_iterations,
            agent_command,
            timeout_secs,
            http,
        } => {
            let agent_options = cli::AgentOptions {
                command: agent_command,
                timeout_secs,
                http,
            };
            cli::decompile_dir(code_dir, output, max_iterations, agent_options, &config).await?;
        }
    }

    Ok(())
}

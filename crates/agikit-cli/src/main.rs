use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod completion;
mod dispatch;
mod flows;
mod options;
mod prompts;
mod render;

use completion::CompletionShell;

pub(crate) const KIT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[command(name = "agikit", version)]
#[command(about = "Installs and updates agi-agent-kit skill packs", long_about = None)]
struct Cli {
    /// Skill pack: core, medium, full or custom.
    #[arg(long, global = true)]
    pack: Option<String>,
    /// Target directory (defaults to the current directory).
    #[arg(long, global = true)]
    path: Option<PathBuf>,
    /// Install once under the home directory and link every platform to it.
    #[arg(long, global = true)]
    global: bool,
    #[arg(long, global = true)]
    no_symlinks: bool,
    /// Never prompt; take defaults.
    #[arg(
        long = "non-interactive",
        visible_aliases = ["ci", "yes"],
        global = true
    )]
    non_interactive: bool,
    /// Domains for the custom pack: indices, ranges (3-5), ids or "all".
    #[arg(long, global = true)]
    domains: Option<String>,
    #[arg(long, env = "AGIKIT_TEMPLATES", global = true)]
    templates: Option<PathBuf>,
    #[arg(long, env = "AGIKIT_CONFIG", global = true)]
    config: Option<PathBuf>,
    /// Write MEMORY_ENABLED=false into the environment file.
    #[arg(long, global = true)]
    no_memory: bool,
    #[arg(long, env = "QDRANT_URL", global = true)]
    qdrant_url: Option<String>,
    #[arg(long, env = "OLLAMA_URL", global = true)]
    ollama_url: Option<String>,
    #[arg(long, env = "QDRANT_API_KEY", hide_env_values = true, global = true)]
    qdrant_api_key: Option<String>,
    /// Skip the Python environment, platform wizard and memory check.
    #[arg(long, global = true)]
    skip_setup: bool,
    #[arg(long, global = true)]
    plain: bool,
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Commands {
    /// Install skills into the target (default).
    Init,
    /// Refresh an existing installation, keeping user files.
    Update,
    /// Print a shell completion script.
    Completions {
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // --help and --version come through here too.
            let code = if err.use_stderr() { 1 } else { 0 };
            let _ = err.print();
            return ExitCode::from(code);
        }
    };

    init_tracing(cli.verbose);

    match dispatch::run_cli(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let filter = if verbose {
        tracing_subscriber::EnvFilter::new(level)
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

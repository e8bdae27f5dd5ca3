use agikit_installer::run_process;
use anyhow::Result;

use crate::completion::write_completions_script;
use crate::flows::{run_install_flow, FlowOutcome};
use crate::options::{resolve_run_options, RunCommand, RunEnvironment};
use crate::prompts::TerminalPrompter;
use crate::render::{current_output_style, TerminalRenderer};
use crate::{Cli, Commands};

pub(crate) fn run_cli(cli: Cli) -> Result<()> {
    let command = match cli.command.unwrap_or(Commands::Init) {
        Commands::Completions { shell } => {
            let mut stdout = std::io::stdout().lock();
            return write_completions_script(shell, &mut stdout);
        }
        Commands::Init => RunCommand::Init,
        Commands::Update => RunCommand::Update,
    };

    let env = RunEnvironment::capture()?;
    let options = resolve_run_options(&cli, command, &env)?;
    tracing::debug!(
        root = %options.layout.root().display(),
        scope = options.scope.as_str(),
        pack = ?options.pack,
        non_interactive = options.non_interactive,
        "resolved run options"
    );

    let renderer = TerminalRenderer::from_style(current_output_style(cli.plain));
    let mut prompter = TerminalPrompter;
    match run_install_flow(&options, &mut prompter, renderer, run_process)? {
        FlowOutcome::Completed(outcome) => {
            tracing::debug!(decision = outcome.decision.as_str(), "install finished");
        }
        FlowOutcome::Cancelled => {}
    }
    Ok(())
}

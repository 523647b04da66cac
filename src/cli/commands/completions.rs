//! `relcheck completions` command - Generate shell completions

use clap::CommandFactory;
use clap_complete::Shell;
use miette::Result;
use std::process::ExitCode;

use crate::cli::Cli;

#[derive(clap::Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

pub fn run(args: CompletionsArgs) -> Result<ExitCode> {
    let mut cmd = Cli::command();
    clap_complete::generate(args.shell, &mut cmd, "relcheck", &mut std::io::stdout());
    Ok(ExitCode::SUCCESS)
}

use clap::Parser;
use miette::Result;
use relcheck::cli::{logging, Cli, Commands};
use std::process::ExitCode;

fn main() -> Result<ExitCode> {
    // Install miette's fancy error handler for readable diagnostics
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    logging::init(cli.global.verbose);

    match cli.command {
        Commands::Restricted(args) => relcheck::cli::commands::restricted::run(args, &cli.global),
        Commands::Drift(args) => relcheck::cli::commands::drift::run(args),
        Commands::Completions(args) => relcheck::cli::commands::completions::run(args),
    }
}

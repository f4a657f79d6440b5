// Entrypoint for the CLI application.
// - Keeps `main` small: parse arguments, set up logging, run one command.
// - Usage text is only shown for argument errors; everything after
//   validation is reported as a plain error.

use std::process;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use upctl::cli::{execute_command, Cli};
use upctl::{exitcode, UpError};

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.debug);

    match run(&cli) {
        Ok(message) => println!("{}", message),
        Err(err) => {
            let up_err = err.downcast_ref::<UpError>();
            if up_err.is_some_and(UpError::is_usage) {
                print_usage(cli.command.name());
            }
            eprintln!("Error: {}", err);
            process::exit(up_err.map_or(exitcode::SOFTWARE, UpError::exit_code));
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<String> {
    Ok(execute_command(cli, env!("CARGO_PKG_VERSION"))?)
}

fn print_usage(subcommand: &str) {
    let mut cmd = Cli::command();
    if let Some(sub) = cmd.find_subcommand_mut(subcommand) {
        eprintln!("{}", sub.render_usage());
    }
}

fn setup_logging(debug: bool) {
    // reqwest's verbose connection log is emitted at trace level
    let default = if debug { "upctl=debug,reqwest=trace" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(debug)
        .with_env_filter(filter)
        .init();
}

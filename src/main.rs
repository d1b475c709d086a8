//! synthtest CLI — synthesize and assert on infrastructure constructs.

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "synthtest",
    version,
    about = "Synthesize-and-assert harness for infrastructure constructs"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: synthtest::cli::Commands,
}

fn main() {
    let cli = Cli::parse();
    synthtest::cli::init_tracing(cli.verbose);
    if let Err(e) = synthtest::cli::dispatch(cli.command) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

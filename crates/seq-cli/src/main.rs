use clap::Parser;
use seq_cli::cli_args::{Cli, Mode};
use seq_cli::session;
use seq_core::SequenceError;

fn main() {
    let cli = Cli::parse();
    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {}", error);
            1
        }
    };
    std::process::exit(exit_code);
}

fn run(cli: Cli) -> Result<i32, SequenceError> {
    match cli.command {
        Mode::Run(args) => session::run_sequence(&args),
        Mode::Step(args) => session::step_sequence(&args),
    }
}

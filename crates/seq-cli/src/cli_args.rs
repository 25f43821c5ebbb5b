use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "seq-cli")]
#[command(about = "Headless test sequence runner")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Mode,
}

#[derive(Debug, Subcommand)]
pub enum Mode {
    /// Run a sequence file to completion.
    Run(RunArgs),
    /// Step through a sequence one action at a time.
    Step(StepArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[arg(long = "sequence")]
    pub sequence: String,
    #[arg(long = "tests-dir")]
    pub tests_dir: Option<String>,
    #[arg(long = "config")]
    pub config: Option<String>,
}

#[derive(Debug, Args)]
pub struct StepArgs {
    #[arg(long = "sequence")]
    pub sequence: String,
    #[arg(long = "tests-dir")]
    pub tests_dir: Option<String>,
    #[arg(long = "config")]
    pub config: Option<String>,
}

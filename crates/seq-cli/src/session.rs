use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use seq_core::{load_sequence, SequenceError};
use seq_engine::{CompositeRegistry, SequenceEngine};
use seq_fns::example_registry;
use seq_loader::ScriptRegistry;

use crate::cli_args::{RunArgs, StepArgs};
use crate::config::{ToolConfig, DEFAULT_CONFIG_FILE};
use crate::console::ConsoleSink;

struct Session {
    engine: SequenceEngine,
    sink: Arc<ConsoleSink>,
    config: ToolConfig,
    config_path: PathBuf,
    sequence_path: String,
}

pub fn run_sequence(args: &RunArgs) -> Result<i32, SequenceError> {
    let mut session = open_session(&args.sequence, args.tests_dir.as_deref(), args.config.as_deref())?;
    session.engine.run_all();
    finish_session(session)
}

pub fn step_sequence(args: &StepArgs) -> Result<i32, SequenceError> {
    let mut session = open_session(&args.sequence, args.tests_dir.as_deref(), args.config.as_deref())?;
    session.engine.reset_execution();

    println!("commands: <enter> step, r reset, q quit");
    loop {
        if session
            .engine
            .execution_index()
            .map_or(false, |index| index >= session.engine.steps().len())
        {
            println!("[END]");
            break;
        }
        let raw = prompt_input("> ")?;
        match raw.as_str() {
            "" | "n" => session.engine.step_run(),
            "r" => session.engine.reset_execution(),
            "q" => break,
            _ => println!("commands: <enter> step, r reset, q quit"),
        }
    }
    finish_session(session)
}

fn open_session(
    sequence_path: &str,
    tests_dir: Option<&str>,
    config_path: Option<&str>,
) -> Result<Session, SequenceError> {
    let config_path = PathBuf::from(config_path.unwrap_or(DEFAULT_CONFIG_FILE));
    let config = match ToolConfig::load(&config_path) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("warning: {}; using default configuration", error);
            ToolConfig::default()
        }
    };

    let tests_dir = tests_dir
        .map(str::to_string)
        .unwrap_or_else(|| config.test_directory.clone());
    let scripts = ScriptRegistry::scan(Path::new(&tests_dir)).map_err(|error| {
        SequenceError::new(
            "CLI_TESTS_SCAN",
            format!("Failed to scan test modules: {}", error),
        )
    })?;
    for note in scripts.skipped() {
        eprintln!("warning: {}", note);
    }

    let mut registry = CompositeRegistry::new();
    registry.push(Arc::new(example_registry()));
    registry.push(Arc::new(scripts));

    let raw = fs::read_to_string(sequence_path).map_err(|error| {
        SequenceError::new(
            "CLI_SEQUENCE_READ",
            format!("Failed to read sequence {}: {}", sequence_path, error),
        )
    })?;
    let steps = load_sequence(&raw)?;

    let sink = Arc::new(ConsoleSink::new());
    let mut engine = SequenceEngine::new(Arc::new(registry), sink.clone());
    engine.set_steps(steps);

    Ok(Session {
        engine,
        sink,
        config,
        config_path,
        sequence_path: sequence_path.to_string(),
    })
}

fn finish_session(mut session: Session) -> Result<i32, SequenceError> {
    session.config.last_sequence_file = session.sequence_path;
    if let Err(error) = session.config.save(&session.config_path) {
        eprintln!("warning: {}", error);
    }
    Ok(if session.sink.failures() > 0 { 1 } else { 0 })
}

fn prompt_input(prefix: &str) -> Result<String, SequenceError> {
    print!("{}", prefix);
    io::stdout()
        .flush()
        .map_err(|error| SequenceError::new("CLI_IO", error.to_string()))?;
    let mut input = String::new();
    io::stdin()
        .read_line(&mut input)
        .map_err(|error| SequenceError::new("CLI_IO", error.to_string()))?;
    Ok(input.trim_end_matches(&['\r', '\n'][..]).to_string())
}

//! Run-to-completion and step-by-step execution of the same sequence must
//! produce the same observable transitions: interpreter messages, per-step
//! statuses, and final step outputs.

use std::sync::Arc;

use seq_core::{ControlKind, SeqValue, SequenceError, Step};
use seq_engine::{
    FnRegistry, ParamSpec, ParamType, RecordingSink, SequenceEngine, SinkEvent,
};

fn registry() -> Arc<FnRegistry> {
    let mut registry = FnRegistry::new();
    registry.register(
        "calc",
        "add",
        vec![
            ParamSpec::new("a", ParamType::Int),
            ParamSpec::new("b", ParamType::Int),
        ],
        vec!["sum".to_string()],
        |args| {
            let a = args.get("a").and_then(SeqValue::as_number).unwrap_or(0.0);
            let b = args.get("b").and_then(SeqValue::as_number).unwrap_or(0.0);
            Ok(Some(SeqValue::Number(a + b)))
        },
    );
    registry.register(
        "checks",
        "in_range",
        vec![
            ParamSpec::new("num", ParamType::Int),
            ParamSpec::new("start", ParamType::Int),
            ParamSpec::new("end", ParamType::Int),
        ],
        Vec::new(),
        |args| {
            let read = |name: &str| args.get(name).and_then(SeqValue::as_number).unwrap_or(0.0);
            Ok(Some(SeqValue::Bool(
                read("start") <= read("num") && read("num") <= read("end"),
            )))
        },
    );
    registry.register("checks", "explode", Vec::new(), Vec::new(), |_| {
        Err(SequenceError::new("CHECKS_EXPLODE", "deliberate failure"))
    });
    Arc::new(registry)
}

/// Interpreter-level messages both modes must emit identically; progress
/// notices and run banners are mode-specific and excluded.
fn action_messages(sink: &RecordingSink) -> Vec<String> {
    sink.outputs()
        .into_iter()
        .filter(|message| {
            message.starts_with("IF condition")
                || message.starts_with("FOR over")
                || message.starts_with("invoking")
                || message.starts_with("skipping unknown function")
                || message == "passed"
                || message == "failed"
                || message.starts_with("error:")
                || message == "BREAK"
        })
        .collect()
}

fn compound_sequence() -> Vec<Step> {
    vec![
        Step::control(ControlKind::For)
            .with_param("var", "i")
            .with_param("iterable", "3"),
        Step::control(ControlKind::If).with_param("condition", "${@i} >= 1"),
        Step::function("calc", "add")
            .with_param("a", "${@i}")
            .with_param("b", "10"),
        Step::control(ControlKind::Break),
        Step::control(ControlKind::End),
        Step::control(ControlKind::End),
        Step::function("nowhere", "nothing"),
        Step::function("checks", "explode"),
        Step::function("calc", "add")
            .with_param("a", "5")
            .with_param("b", "5"),
    ]
}

fn run_all_mode(steps: Vec<Step>) -> (SequenceEngine, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::new());
    let mut engine = SequenceEngine::new(registry(), sink.clone());
    engine.set_steps(steps);
    engine.run_all();
    (engine, sink)
}

fn step_mode(steps: Vec<Step>) -> (SequenceEngine, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::new());
    let mut engine = SequenceEngine::new(registry(), sink.clone());
    engine.set_steps(steps);
    engine.reset_execution();
    for _ in 0..1_000usize {
        if engine
            .execution_index()
            .map_or(false, |index| index >= engine.steps().len())
        {
            return (engine, sink);
        }
        engine.step_run();
    }
    panic!("step mode should finish");
}

#[test]
fn step_mode_matches_full_run_on_a_compound_sequence() {
    let steps = compound_sequence();
    let (full_engine, full_sink) = run_all_mode(steps.clone());
    let (step_engine, step_sink) = step_mode(steps);

    assert_eq!(
        action_messages(&full_sink),
        action_messages(&step_sink),
        "both modes must report the same actions in the same order"
    );
    assert_eq!(full_sink.statuses(), step_sink.statuses());

    for (full_step, stepped_step) in full_engine.steps().iter().zip(step_engine.steps()) {
        assert_eq!(full_step.outputs, stepped_step.outputs);
    }
}

#[test]
fn end_to_end_loop_scenario_binds_and_records() {
    // [for(var=i, iterable=3), add(a=${@i}, b=1), end]
    let steps = vec![
        Step::control(ControlKind::For)
            .with_param("var", "i")
            .with_param("iterable", "3"),
        Step::function("calc", "add")
            .with_param("a", "${@i}")
            .with_param("b", "1"),
        Step::control(ControlKind::End),
    ];

    let sink = Arc::new(RecordingSink::new());
    let mut engine = SequenceEngine::new(registry(), sink.clone());
    engine.set_steps(steps);
    engine.run_all();

    // Three invocations of add, each passing.
    assert_eq!(sink.statuses(), vec![(1, true), (1, true), (1, true)]);

    // Snapshots show i cycling 0 -> 1 -> 2.
    let mut cycle = Vec::new();
    for event in sink.events() {
        if let SinkEvent::Vars(vars) = event {
            if let Some(value) = vars.get("i") {
                if cycle.last() != Some(value) {
                    cycle.push(value.clone());
                }
            }
        }
    }
    assert_eq!(
        cycle,
        vec![
            SeqValue::Number(0.0),
            SeqValue::Number(1.0),
            SeqValue::Number(2.0)
        ]
    );

    // The result is recorded under both the reserved key and the predicted
    // name; the final iteration's value wins.
    assert_eq!(
        engine.steps()[1].outputs.get("return"),
        Some(&SeqValue::Number(3.0))
    );
    assert_eq!(
        engine.steps()[1].outputs.get("sum"),
        Some(&SeqValue::Number(3.0))
    );

    // After the loop no snapshot carries the loop variable.
    let last_vars = sink
        .events()
        .into_iter()
        .rev()
        .find_map(|event| match event {
            SinkEvent::Vars(vars) => Some(vars),
            _ => None,
        })
        .expect("run should emit snapshots");
    assert!(!last_vars.contains_key("i"));
}

#[test]
fn map_results_merge_into_outputs_in_both_modes() {
    let mut mapping = FnRegistry::new();
    mapping.register("probe", "stats", Vec::new(), Vec::new(), |_| {
        let mut entries = std::collections::BTreeMap::new();
        entries.insert("min".to_string(), SeqValue::Number(1.0));
        entries.insert("max".to_string(), SeqValue::Number(9.0));
        Ok(Some(SeqValue::Map(entries)))
    });
    let registry = Arc::new(mapping);

    let steps = vec![
        Step::function("probe", "stats"),
        Step::function("probe", "stats"),
    ];

    for stepped in [false, true] {
        let sink = Arc::new(RecordingSink::new());
        let mut engine = SequenceEngine::new(registry.clone(), sink.clone());
        engine.set_steps(steps.clone());
        if stepped {
            engine.reset_execution();
            engine.step_run();
            engine.step_run();
        } else {
            engine.run_all();
        }

        for step in engine.steps() {
            assert_eq!(step.outputs.get("min"), Some(&SeqValue::Number(1.0)));
            assert_eq!(step.outputs.get("max"), Some(&SeqValue::Number(9.0)));
            assert!(step.outputs.get("return").is_none());
        }
        assert_eq!(sink.statuses(), vec![(0, true), (1, true)]);
    }
}

use seq_core::{ControlKind, SeqValue, Step, StepKind};

use crate::engine::{SequenceEngine, Vars};
use crate::eval::eval_expression;
use crate::registry::{CallArgs, ParamSpec, ParamType};

/// Result of executing a contiguous index range. `Broke` replaces the usual
/// unwinding trick for `break`: it travels up the recursion until a `for`
/// handler absorbs it, or the top-level caller treats it as a finished run.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum BlockOutcome {
    Completed {
        next_index: usize,
        vars: Vars,
        actions: usize,
    },
    Broke {
        vars: Vars,
        actions: usize,
    },
}

fn budget_reached(budget: Option<usize>, actions: usize) -> bool {
    budget.map_or(false, |limit| actions >= limit)
}

fn remaining(budget: Option<usize>, actions: usize) -> Option<usize> {
    budget.map(|limit| limit.saturating_sub(actions))
}

impl SequenceEngine {
    /// Scans forward from an `if`/`for` header counting nesting depth and
    /// returns the index of the `end` that brings it back to zero. The two
    /// header kinds share one counter; pairing is not validated.
    pub(crate) fn find_matching_end(&self, start: usize) -> Option<usize> {
        let mut depth = 0i32;
        for (offset, step) in self.steps[start..].iter().enumerate() {
            match step.control_kind() {
                Some(ControlKind::If) | Some(ControlKind::For) => depth += 1,
                Some(ControlKind::End) => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(start + offset);
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// Executes steps in `start..=end`. With a budget, returns as soon as
    /// that many actions are done, at an index from which a later call can
    /// resume; the stepper depends on that contract.
    pub(crate) fn run_block(
        &mut self,
        start: usize,
        end: usize,
        mut vars: Vars,
        budget: Option<usize>,
    ) -> BlockOutcome {
        let mut actions = 0usize;
        let mut i = start;

        while i <= end && i < self.steps.len() {
            let step = self.steps[i].clone();
            match &step.kind {
                StepKind::Control(ControlKind::If) => {
                    let matching = self.find_matching_end(i);
                    if matching.is_none() {
                        self.warn_unmatched(i, ControlKind::If);
                    }
                    let raw = step.params.get("condition").cloned().unwrap_or_default();
                    let condition = self.eval_condition(&raw, &vars);
                    self.output(&format!("IF condition ({}) -> {}", raw, condition));
                    self.watch(&vars);
                    actions += 1;
                    if budget_reached(budget, actions) {
                        return BlockOutcome::Completed {
                            next_index: i + 1,
                            vars,
                            actions,
                        };
                    }

                    if !condition {
                        i = matching.map(|index| index + 1).unwrap_or(i + 1);
                        continue;
                    }

                    let Some(matching) = matching.filter(|index| *index > i) else {
                        i += 1;
                        continue;
                    };
                    match self.run_block(i + 1, matching - 1, vars, remaining(budget, actions)) {
                        BlockOutcome::Completed {
                            vars: inner_vars,
                            actions: inner_actions,
                            ..
                        } => {
                            actions += inner_actions;
                            vars = inner_vars;
                            i = matching + 1;
                            if budget_reached(budget, actions) {
                                return BlockOutcome::Completed {
                                    next_index: i,
                                    vars,
                                    actions,
                                };
                            }
                        }
                        BlockOutcome::Broke {
                            vars: inner_vars,
                            actions: inner_actions,
                        } => {
                            return BlockOutcome::Broke {
                                vars: inner_vars,
                                actions: actions + inner_actions,
                            };
                        }
                    }
                }
                StepKind::Control(ControlKind::For) => {
                    let matching = self.find_matching_end(i);
                    if matching.is_none() {
                        self.warn_unmatched(i, ControlKind::For);
                    }
                    let raw = step.params.get("iterable").cloned().unwrap_or_default();
                    let var_name = step
                        .params
                        .get("var")
                        .cloned()
                        .unwrap_or_else(|| "_loop".to_string());
                    let iterator = self.materialize_iterable(&raw, &vars);
                    self.output(&format!(
                        "FOR over {} -> {}",
                        raw,
                        SeqValue::Array(iterator.clone()).to_text()
                    ));
                    self.watch(&vars);
                    actions += 1;
                    if budget_reached(budget, actions) {
                        return BlockOutcome::Completed {
                            next_index: i + 1,
                            vars,
                            actions,
                        };
                    }

                    let Some(matching) = matching.filter(|index| *index > i) else {
                        i += 1;
                        continue;
                    };
                    for value in iterator {
                        let mut body_vars = vars.clone();
                        body_vars.insert(var_name.clone(), value);
                        match self.run_block(
                            i + 1,
                            matching - 1,
                            body_vars,
                            remaining(budget, actions),
                        ) {
                            BlockOutcome::Completed {
                                actions: inner_actions,
                                ..
                            } => {
                                // Loop-scoped bindings stay in the body; the
                                // only vars that survive a loop travel out
                                // through a break.
                                actions += inner_actions;
                            }
                            BlockOutcome::Broke {
                                vars: break_vars,
                                actions: inner_actions,
                            } => {
                                actions += inner_actions;
                                vars = break_vars;
                                if budget_reached(budget, actions) {
                                    return BlockOutcome::Completed {
                                        next_index: matching + 1,
                                        vars,
                                        actions,
                                    };
                                }
                                break;
                            }
                        }
                    }
                    i = matching + 1;
                }
                StepKind::Control(ControlKind::Break) => {
                    actions += 1;
                    self.output("BREAK");
                    self.watch(&vars);
                    return BlockOutcome::Broke { vars, actions };
                }
                StepKind::Control(ControlKind::End) => {
                    i += 1;
                }
                StepKind::Function { module, function } => {
                    let Some(specs) = self.registry.parameters(module, function) else {
                        self.output(&format!(
                            "skipping unknown function: {}.{}",
                            module, function
                        ));
                        self.watch(&vars);
                        i += 1;
                        continue;
                    };

                    self.output(&format!("invoking {}.{} ...", module, function));
                    self.watch(&vars);

                    let args = self.bind_arguments(&step, &specs, &vars);
                    let registry = self.registry.clone();
                    let success = match registry.call(module, function, &args) {
                        Ok(outcome) => {
                            let success =
                                outcome.as_ref().map(SeqValue::is_truthy).unwrap_or(true);
                            self.record_outputs(i, module, function, outcome);
                            self.output(if success { "passed" } else { "failed" });
                            success
                        }
                        Err(error) => {
                            self.output(&format!("error: {}", error));
                            false
                        }
                    };
                    self.status(i, success);
                    self.watch(&vars);
                    actions += 1;
                    if budget_reached(budget, actions) {
                        return BlockOutcome::Completed {
                            next_index: i + 1,
                            vars,
                            actions,
                        };
                    }
                    i += 1;
                }
            }
        }

        BlockOutcome::Completed {
            next_index: i,
            vars,
            actions,
        }
    }

    /// Condition coercion: an already-boolean resolution stands; anything
    /// else goes through the whitelisted evaluator, and an expression that
    /// fails to evaluate counts as false rather than aborting the run.
    pub(crate) fn eval_condition(&self, raw: &str, vars: &Vars) -> bool {
        match self.resolve(vars, raw) {
            SeqValue::Bool(value) => value,
            other => eval_expression(&other.to_text(), vars)
                .map(|value| value.is_truthy())
                .unwrap_or(false),
        }
    }

    /// Iterable classification: a whole number N becomes 0..N-1, an array is
    /// used as-is, and anything else gets one evaluation attempt before
    /// defaulting to empty.
    pub(crate) fn materialize_iterable(&self, raw: &str, vars: &Vars) -> Vec<SeqValue> {
        let resolved = self.resolve(vars, raw);
        if let Some(count) = resolved.as_integer() {
            return range_values(count);
        }
        match resolved {
            SeqValue::Array(items) => items,
            other => match eval_expression(&other.to_text(), vars) {
                Ok(SeqValue::Array(items)) => items,
                _ => Vec::new(),
            },
        }
    }

    /// Binds each declared parameter in order: raw string, reference
    /// resolution, then per-type coercion. Coercion failures keep the
    /// resolved value and log a warning instead of aborting.
    pub(crate) fn bind_arguments(
        &self,
        step: &Step,
        specs: &[ParamSpec],
        vars: &Vars,
    ) -> CallArgs {
        let mut args = CallArgs::new();
        for spec in specs {
            let raw = step.params.get(&spec.name).cloned().unwrap_or_default();
            let resolved = self.resolve(vars, &raw);
            let value = match spec.ty {
                ParamType::Bool => SeqValue::Bool(coerce_bool(&resolved)),
                ParamType::Int => match coerce_number(&resolved) {
                    Some(number) => SeqValue::Number(number.trunc()),
                    None => {
                        self.output(&format!(
                            "parameter '{}' could not be coerced to int; passing resolved value",
                            spec.name
                        ));
                        resolved
                    }
                },
                ParamType::Float => match coerce_number(&resolved) {
                    Some(number) => SeqValue::Number(number),
                    None => {
                        self.output(&format!(
                            "parameter '{}' could not be coerced to float; passing resolved value",
                            spec.name
                        ));
                        resolved
                    }
                },
                ParamType::Other => resolved,
            };
            args.insert(spec.name.clone(), value);
        }
        args
    }

    /// Map results merge into the step's outputs; a bare value is stored
    /// under `return` and mirrored under every predicted output name, so
    /// references by name work even for plain-value functions.
    fn record_outputs(
        &mut self,
        index: usize,
        module: &str,
        function: &str,
        outcome: Option<SeqValue>,
    ) {
        let Some(value) = outcome else {
            return;
        };
        if let SeqValue::Map(entries) = value {
            let outputs = &mut self.steps[index].outputs;
            for (key, entry) in entries {
                outputs.insert(key, entry);
            }
            return;
        }

        let predicted = self.registry.predicted_outputs(module, function);
        let outputs = &mut self.steps[index].outputs;
        outputs.insert("return".to_string(), value.clone());
        for name in predicted {
            outputs.insert(name, value.clone());
        }
    }
}

fn coerce_bool(value: &SeqValue) -> bool {
    if let Some(flag) = value.as_bool() {
        return flag;
    }
    matches!(
        value.to_text().to_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

fn coerce_number(value: &SeqValue) -> Option<f64> {
    match value {
        SeqValue::Number(number) => Some(*number),
        SeqValue::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
        SeqValue::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn range_values(count: i64) -> Vec<SeqValue> {
    if count <= 0 {
        return Vec::new();
    }
    (0..count).map(|value| SeqValue::Number(value as f64)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::SinkEvent;
    use crate::test_support::{engine_with, sequence_for_add_loop};
    use seq_core::Step;

    #[test]
    fn matching_end_pairs_nested_blocks() {
        let (engine, _sink) = engine_with(vec![
            Step::control(ControlKind::For),  // 0
            Step::control(ControlKind::If),   // 1
            Step::function("calc", "add"),    // 2
            Step::control(ControlKind::End),  // 3 closes 1
            Step::control(ControlKind::End),  // 4 closes 0
        ]);
        assert_eq!(engine.find_matching_end(0), Some(4));
        assert_eq!(engine.find_matching_end(1), Some(3));
    }

    #[test]
    fn matching_end_returns_none_when_unmatched() {
        let (engine, _sink) = engine_with(vec![
            Step::control(ControlKind::If),
            Step::function("calc", "add"),
        ]);
        assert_eq!(engine.find_matching_end(0), None);
    }

    #[test]
    fn for_over_integer_runs_body_in_order() {
        let (mut engine, sink) = engine_with(sequence_for_add_loop("3"));
        engine.run_all();

        // Three invocations, all passing, at the call step index.
        assert_eq!(sink.statuses(), vec![(1, true), (1, true), (1, true)]);

        // Runtime-variable snapshots show `i` cycling 0 -> 1 -> 2.
        let mut seen = Vec::new();
        for event in sink.events() {
            if let SinkEvent::Vars(vars) = event {
                if let Some(value) = vars.get("i") {
                    if seen.last() != Some(value) {
                        seen.push(value.clone());
                    }
                }
            }
        }
        assert_eq!(
            seen,
            vec![
                SeqValue::Number(0.0),
                SeqValue::Number(1.0),
                SeqValue::Number(2.0)
            ]
        );

        // The last body result stays on the call step.
        assert_eq!(
            engine.steps()[1].outputs.get("sum"),
            Some(&SeqValue::Number(3.0))
        );
        assert_eq!(
            engine.steps()[1].outputs.get("return"),
            Some(&SeqValue::Number(3.0))
        );
    }

    #[test]
    fn for_over_empty_iterable_skips_body() {
        let (mut engine, sink) = engine_with(sequence_for_add_loop("0"));
        engine.run_all();
        assert!(sink.statuses().is_empty());
    }

    #[test]
    fn if_false_jumps_past_matching_end() {
        let (mut engine, sink) = engine_with(vec![
            Step::control(ControlKind::If).with_param("condition", "1 > 2"),
            Step::function("calc", "add")
                .with_param("a", "1")
                .with_param("b", "1"),
            Step::control(ControlKind::End),
            Step::function("calc", "add")
                .with_param("a", "2")
                .with_param("b", "2"),
        ]);
        engine.run_all();
        assert_eq!(sink.statuses(), vec![(3, true)]);
    }

    #[test]
    fn break_terminates_nearest_loop_only() {
        let (mut engine, sink) = engine_with(vec![
            Step::control(ControlKind::For)
                .with_param("var", "i")
                .with_param("iterable", "5"),
            Step::function("calc", "add")
                .with_param("a", "${@i}")
                .with_param("b", "1"),
            Step::control(ControlKind::Break),
            Step::control(ControlKind::End),
            Step::function("calc", "add")
                .with_param("a", "9")
                .with_param("b", "0"),
        ]);
        engine.run_all();
        // One body pass, then the trailing call after the loop's end.
        assert_eq!(sink.statuses(), vec![(1, true), (4, true)]);
    }

    #[test]
    fn top_level_break_finishes_run_with_note() {
        let (mut engine, sink) = engine_with(vec![
            Step::control(ControlKind::Break),
            Step::function("calc", "add")
                .with_param("a", "1")
                .with_param("b", "1"),
        ]);
        engine.run_all();
        assert!(sink.statuses().is_empty());
        assert!(sink
            .outputs()
            .iter()
            .any(|message| message.contains("break outside of any loop")));
    }

    #[test]
    fn unknown_function_is_skipped_without_status() {
        let (mut engine, sink) = engine_with(vec![
            Step::function("nowhere", "nothing"),
            Step::function("calc", "add")
                .with_param("a", "1")
                .with_param("b", "1"),
        ]);
        engine.run_all();
        assert_eq!(sink.statuses(), vec![(1, true)]);
        assert!(sink
            .outputs()
            .iter()
            .any(|message| message.contains("skipping unknown function: nowhere.nothing")));
    }

    #[test]
    fn falsy_result_and_error_both_fail_the_step() {
        let (mut engine, sink) = engine_with(vec![
            Step::function("checks", "always_false"),
            Step::function("checks", "explode"),
            Step::function("checks", "unit"),
        ]);
        engine.run_all();
        assert_eq!(sink.statuses(), vec![(0, false), (1, false), (2, true)]);
        assert!(sink
            .outputs()
            .iter()
            .any(|message| message.starts_with("error: ")));
    }

    #[test]
    fn malformed_condition_counts_as_false() {
        let (mut engine, sink) = engine_with(vec![
            Step::control(ControlKind::If).with_param("condition", "@@nonsense@@"),
            Step::function("calc", "add")
                .with_param("a", "1")
                .with_param("b", "1"),
            Step::control(ControlKind::End),
        ]);
        engine.run_all();
        assert!(sink.statuses().is_empty());
    }

    #[test]
    fn unmatched_if_warns_and_extends_to_sequence_end() {
        let (mut engine, sink) = engine_with(vec![
            Step::control(ControlKind::If).with_param("condition", "true"),
            Step::function("calc", "add")
                .with_param("a", "1")
                .with_param("b", "1"),
        ]);
        engine.run_all();
        assert_eq!(sink.statuses(), vec![(1, true)]);
        assert!(sink
            .outputs()
            .iter()
            .any(|message| message.starts_with("warning: 'if' at step 1")));
    }

    #[test]
    fn bool_coercion_accepts_truthy_tokens() {
        let (engine, _sink) = engine_with(Vec::new());

        let step = Step::function("checks", "flag").with_param("enabled", "YES");
        let specs = vec![ParamSpec::new("enabled", ParamType::Bool)];
        let args = engine.bind_arguments(&step, &specs, &Vars::new());
        assert_eq!(args.get("enabled"), Some(&SeqValue::Bool(true)));

        let step = Step::function("checks", "flag").with_param("enabled", "off");
        let args = engine.bind_arguments(&step, &specs, &Vars::new());
        assert_eq!(args.get("enabled"), Some(&SeqValue::Bool(false)));
    }

    #[test]
    fn numeric_coercion_falls_back_with_warning() {
        let (engine, sink) = engine_with(Vec::new());
        let step = Step::function("calc", "add").with_param("a", "not-a-number");
        let specs = vec![ParamSpec::new("a", ParamType::Int)];
        let args = engine.bind_arguments(&step, &specs, &Vars::new());
        assert_eq!(args.get("a"), Some(&SeqValue::from("not-a-number")));
        assert!(sink
            .outputs()
            .iter()
            .any(|message| message.contains("could not be coerced to int")));
    }

    #[test]
    fn missing_param_binds_empty_string() {
        let (engine, _sink) = engine_with(Vec::new());
        let step = Step::function("calc", "add");
        let specs = vec![ParamSpec::new("note", ParamType::Other)];
        let args = engine.bind_arguments(&step, &specs, &Vars::new());
        assert_eq!(args.get("note"), Some(&SeqValue::from("")));
    }
}

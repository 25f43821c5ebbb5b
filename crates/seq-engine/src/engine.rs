use std::collections::BTreeMap;
use std::sync::Arc;

use seq_core::{ControlKind, SeqValue, Step};

use crate::block::BlockOutcome;
use crate::registry::StepRegistry;
use crate::resolve::resolve_references;
use crate::sink::EventSink;
use crate::stepper::ExecState;

/// Runtime-variable scope, visible to sequences via `${@name}` references.
pub type Vars = BTreeMap<String, SeqValue>;

/// Interprets one sequence of steps against a function registry, either in
/// one run or one action at a time. Owns the execution cursor; the step list
/// itself is edited externally between runs and treated as frozen during
/// one.
pub struct SequenceEngine {
    pub(crate) steps: Vec<Step>,
    pub(crate) registry: Arc<dyn StepRegistry>,
    pub(crate) sink: Arc<dyn EventSink>,
    pub(crate) exec: Option<ExecState>,
}

impl SequenceEngine {
    pub fn new(registry: Arc<dyn StepRegistry>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            steps: Vec::new(),
            registry,
            sink,
            exec: None,
        }
    }

    pub fn set_steps(&mut self, steps: Vec<Step>) {
        self.steps = steps;
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// The resumable cursor of an active step session, for external markers.
    pub fn execution_index(&self) -> Option<usize> {
        self.exec.as_ref().map(|state| state.index)
    }

    /// Runs the whole sequence to completion. A `break` that reaches the top
    /// level ends the run with a note, never an error.
    pub fn run_all(&mut self) {
        if self.steps.is_empty() {
            self.output("sequence is empty; nothing to run");
            return;
        }

        self.output("starting sequence run");
        let last = self.steps.len() - 1;
        match self.run_block(0, last, Vars::new(), None) {
            BlockOutcome::Completed { .. } => self.output("sequence run finished"),
            BlockOutcome::Broke { .. } => {
                self.output("break outside of any loop; run stopped");
            }
        }
    }

    /// Rebuilds an empty execution state and clears every step's outputs, so
    /// stale results cannot be referenced by the next session. Idempotent.
    pub fn reset_execution(&mut self) {
        self.exec = Some(ExecState::default());
        for step in &mut self.steps {
            step.outputs.clear();
        }
        self.watch(&Vars::new());
        self.output("execution reset; cleared runtime variables and step outputs");
    }

    /// Drops the whole sequence. Params and outputs are cleared first so any
    /// externally cached references go blank rather than stale.
    pub fn clear_sequence(&mut self) {
        for step in &mut self.steps {
            step.params.clear();
            step.outputs.clear();
        }
        self.steps.clear();
        self.exec = None;
        self.watch(&Vars::new());
    }

    /// Resolves references in `raw` against this sequence and the given
    /// scope, exactly as the interpreter would at call time.
    pub fn resolve(&self, vars: &Vars, raw: &str) -> SeqValue {
        resolve_references(&self.steps, vars, raw)
    }

    pub(crate) fn output(&self, message: &str) {
        self.sink.on_output(message);
    }

    pub(crate) fn watch(&self, vars: &Vars) {
        self.sink.on_vars(vars);
    }

    pub(crate) fn status(&self, step_index: usize, success: bool) {
        self.sink.on_status(step_index, success);
    }

    pub(crate) fn warn_unmatched(&self, index: usize, kind: ControlKind) {
        self.output(&format!(
            "warning: '{}' at step {} has no matching 'end'; treating the rest of the sequence as its block",
            kind.name(),
            index + 1
        ));
    }
}

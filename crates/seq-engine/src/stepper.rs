use seq_core::ControlKind;

use crate::block::BlockOutcome;
use crate::engine::{SequenceEngine, Vars};

/// Bookkeeping for one active `for` loop during step-wise execution. The
/// end index is resolved once via block matching and never recomputed.
#[derive(Debug, Clone)]
pub(crate) struct LoopFrame {
    pub start: usize,
    pub end: usize,
    pub iterator: Vec<seq_core::SeqValue>,
    pub position: usize,
    pub var_name: String,
}

/// Ephemeral interpreter state for a step session, rebuilt on reset.
#[derive(Debug, Clone, Default)]
pub(crate) struct ExecState {
    pub index: usize,
    pub vars: Vars,
    pub loop_stack: Vec<LoopFrame>,
}

fn find_enclosing_frame(loop_stack: &[LoopFrame], index: usize) -> Option<usize> {
    loop_stack
        .iter()
        .rposition(|frame| frame.start < index && index <= frame.end)
}

impl SequenceEngine {
    /// Advances the sequence by exactly one action. Driving this repeatedly
    /// until the end yields the same state transitions as `run_all` on the
    /// same sequence. Every transition ends with a fresh variable snapshot
    /// and a progress notice.
    pub fn step_run(&mut self) {
        let state = self.exec.take().unwrap_or_default();
        let (state, notice) = self.advance_one(state);
        self.watch(&state.vars);
        self.output(&notice);
        self.exec = Some(state);
    }

    fn advance_one(&mut self, mut state: ExecState) -> (ExecState, String) {
        let Some(last) = self.steps.len().checked_sub(1) else {
            return (state, "sequence is empty; nothing to step".to_string());
        };
        let index = state.index;
        if index > last {
            return (
                state,
                "already at the end of the sequence; reset execution to start over".to_string(),
            );
        }

        let step = self.steps[index].clone();

        // A `for` header: materialize the iterable now, enter (or re-enter)
        // the loop, bind the loop variable. This is a control action, not a
        // run_block call.
        if step.control_kind() == Some(ControlKind::For) {
            let matching = self.find_matching_end(index);
            if matching.is_none() {
                self.warn_unmatched(index, ControlKind::For);
            }
            let raw = step.params.get("iterable").cloned().unwrap_or_default();
            let var_name = step
                .params
                .get("var")
                .cloned()
                .unwrap_or_else(|| "_loop".to_string());
            let iterator = self.materialize_iterable(&raw, &state.vars);
            let is_reentry = state
                .loop_stack
                .iter()
                .any(|frame| frame.start == index);
            if !is_reentry {
                // Same header report the full run emits, so both modes show
                // the same sequence of messages.
                self.output(&format!(
                    "FOR over {} -> {}",
                    raw,
                    seq_core::SeqValue::Array(iterator.clone()).to_text()
                ));
            }

            if iterator.is_empty() {
                state.index = matching.map(|end| end + 1).unwrap_or(index + 1);
                let next = state.index;
                return (
                    state,
                    format!(
                        "empty iterable; skipping for block, next index {}",
                        next
                    ),
                );
            }

            let Some(end) = matching else {
                // No matching end: the body runs once as straight-line code,
                // with the loop variable bound to the first element.
                state.vars.insert(var_name.clone(), iterator[0].clone());
                state.index = index + 1;
                let next = state.index;
                return (
                    state,
                    format!(
                        "entering for: set {} = {}, next index {}",
                        var_name,
                        iterator[0].to_text(),
                        next
                    ),
                );
            };

            let frame_index = match state
                .loop_stack
                .iter()
                .position(|frame| frame.start == index)
            {
                Some(existing) => existing,
                None => {
                    state.loop_stack.push(LoopFrame {
                        start: index,
                        end,
                        iterator,
                        position: 0,
                        var_name,
                    });
                    state.loop_stack.len() - 1
                }
            };

            let frame = &state.loop_stack[frame_index];
            if frame.position >= frame.iterator.len() {
                // A stale frame (sequence edited mid-session); drop it and
                // move past the loop instead of indexing out of range.
                let frame = state.loop_stack.remove(frame_index);
                state.vars.remove(&frame.var_name);
                state.index = frame.end + 1;
                let next = state.index;
                return (state, format!("loop finished, next index {}", next));
            }
            let value = frame.iterator[frame.position].clone();
            let bound_name = frame.var_name.clone();
            state.vars.insert(bound_name.clone(), value.clone());
            state.index = index + 1;
            let next = state.index;
            return (
                state,
                format!(
                    "entering for: set {} = {}, next index {}",
                    bound_name,
                    value.to_text(),
                    next
                ),
            );
        }

        // An `if` header: evaluate, report, and jump.
        if step.control_kind() == Some(ControlKind::If) {
            let matching = self.find_matching_end(index);
            if matching.is_none() {
                self.warn_unmatched(index, ControlKind::If);
            }
            let raw = step.params.get("condition").cloned().unwrap_or_default();
            let condition = self.eval_condition(&raw, &state.vars);
            self.output(&format!("IF condition ({}) -> {}", raw, condition));

            if condition {
                state.index = index + 1;
                let next = state.index;
                return (
                    state,
                    format!(
                        "condition true, entering if block, next index {}",
                        next
                    ),
                );
            }
            state.index = matching.map(|end| end + 1).unwrap_or(index + 1);
            let next = state.index;
            return (
                state,
                format!(
                    "condition false, skipping if block, next index {}",
                    next
                ),
            );
        }

        // A `break`: pop the nearest enclosing frame, or ignore.
        if step.control_kind() == Some(ControlKind::Break) {
            self.output("BREAK");
            if let Some(frame_index) = find_enclosing_frame(&state.loop_stack, index) {
                let frame = state.loop_stack.remove(frame_index);
                state.index = frame.end + 1;
                let next = state.index;
                return (
                    state,
                    format!("break inside loop, jumping to index {}", next),
                );
            }
            state.index = index + 1;
            return (state, "break outside of any loop; ignored".to_string());
        }

        // Inside an active loop frame: run one bounded action against the
        // frame's range, then decide whether the body finished an iteration.
        if let Some(frame_index) = find_enclosing_frame(&state.loop_stack, index) {
            let frame_end = state.loop_stack[frame_index].end;
            match self.run_block(index, frame_end, state.vars.clone(), Some(1)) {
                BlockOutcome::Completed {
                    next_index,
                    vars,
                    actions,
                } => {
                    state.vars = vars;
                    if next_index > frame_end {
                        let frame = &mut state.loop_stack[frame_index];
                        frame.position += 1;
                        if frame.position < frame.iterator.len() {
                            let value = frame.iterator[frame.position].clone();
                            let name = frame.var_name.clone();
                            let start = frame.start;
                            state.vars.insert(name.clone(), value.clone());
                            state.index = start + 1;
                            let next = state.index;
                            return (
                                state,
                                format!(
                                    "loop advanced: set {} = {}, next index {}",
                                    name,
                                    value.to_text(),
                                    next
                                ),
                            );
                        }
                        // Normal exhaustion takes the loop variable out of
                        // scope; only a break carries it onward.
                        let frame = state.loop_stack.remove(frame_index);
                        state.vars.remove(&frame.var_name);
                        state.index = frame.end + 1;
                        let next = state.index;
                        return (state, format!("loop finished, next index {}", next));
                    }
                    state.index = next_index;
                    let next = state.index;
                    return (
                        state,
                        format!("completed {} action(s), next index {}", actions, next),
                    );
                }
                BlockOutcome::Broke { vars, .. } => {
                    state.vars = vars;
                    let frame = state.loop_stack.remove(frame_index);
                    state.index = frame.end + 1;
                    let next = state.index;
                    return (
                        state,
                        format!("break inside loop, jumping to index {}", next),
                    );
                }
            }
        }

        // Plain step outside any active loop.
        match self.run_block(index, last, state.vars.clone(), Some(1)) {
            BlockOutcome::Completed {
                next_index,
                vars,
                actions,
            } => {
                state.index = next_index;
                state.vars = vars;
                let next = state.index;
                (
                    state,
                    format!("completed {} action(s), next index {}", actions, next),
                )
            }
            BlockOutcome::Broke { vars, .. } => {
                state.index = index + 1;
                state.vars = vars;
                (state, "break outside of any loop; ignored".to_string())
            }
        }
    }
}

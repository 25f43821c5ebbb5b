use std::collections::BTreeMap;

use regex::Regex;
use seq_core::{SeqValue, Step};

use crate::eval::parse_literal;

type Vars = BTreeMap<String, SeqValue>;

/// Resolves reference placeholders in a raw parameter string.
///
/// `${#N:key}` reads step N (1-based over the full sequence): its outputs
/// first, then its params, then empty. `${@name}` reads the current runtime
/// variables. Substitution is textual and left-to-right, all step
/// references first, then all variable references. The result is then
/// parsed as a literal; text that is not a literal is returned as a
/// string unchanged, which is what lets plain text pass through.
pub fn resolve_references(steps: &[Step], vars: &Vars, raw: &str) -> SeqValue {
    let step_pattern =
        Regex::new(r"\$\{#(\d+):([^}]+)\}").expect("step reference regex must compile");
    let var_pattern = Regex::new(r"\$\{@([^}]+)\}").expect("variable reference regex must compile");

    let with_steps = step_pattern.replace_all(raw, |captures: &regex::Captures| {
        let index = captures[1].parse::<usize>().ok();
        let key = &captures[2];
        match index {
            Some(number) if number >= 1 && number <= steps.len() => {
                let step = &steps[number - 1];
                if let Some(value) = step.outputs.get(key) {
                    value.to_text()
                } else {
                    step.params.get(key).cloned().unwrap_or_default()
                }
            }
            _ => String::new(),
        }
    });

    let with_vars = var_pattern.replace_all(&with_steps, |captures: &regex::Captures| {
        vars.get(&captures[1])
            .map(SeqValue::to_text)
            .unwrap_or_default()
    });

    match parse_literal(&with_vars) {
        Some(value) => value,
        None => SeqValue::String(with_vars.into_owned()),
    }
}

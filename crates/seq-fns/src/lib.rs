//! Ready-made native test functions for sequences: a calculator module, a
//! couple of value checks, and boolean logic. These are the builtins the
//! runner registers alongside any script-defined modules.

use seq_core::{SeqValue, SequenceError};
use seq_engine::{CallArgs, FnRegistry, ParamSpec, ParamType};

fn number_arg(args: &CallArgs, name: &str) -> f64 {
    args.get(name).and_then(SeqValue::as_number).unwrap_or(0.0)
}

fn bool_arg(args: &CallArgs, name: &str) -> bool {
    args.get(name).and_then(SeqValue::as_bool).unwrap_or(false)
}

fn text_arg(args: &CallArgs, name: &str) -> String {
    args.get(name).map(SeqValue::to_text).unwrap_or_default()
}

fn two_ints(a: &str, b: &str) -> Vec<ParamSpec> {
    vec![
        ParamSpec::new(a, ParamType::Int),
        ParamSpec::new(b, ParamType::Int),
    ]
}

/// Builds the builtin registry: `calc.{add,subtract,multiply,divide}`,
/// `checks.{string_contains,in_range}` and `logic.boolean_logic`.
pub fn example_registry() -> FnRegistry {
    let mut registry = FnRegistry::new();

    registry.register(
        "calc",
        "add",
        two_ints("a", "b"),
        vec!["sum".to_string()],
        |args| {
            Ok(Some(SeqValue::Number(
                number_arg(args, "a") + number_arg(args, "b"),
            )))
        },
    );
    registry.register(
        "calc",
        "subtract",
        two_ints("a", "b"),
        vec!["sub".to_string()],
        |args| {
            Ok(Some(SeqValue::Number(
                number_arg(args, "a") - number_arg(args, "b"),
            )))
        },
    );
    registry.register(
        "calc",
        "multiply",
        two_ints("a", "b"),
        vec!["mul".to_string()],
        |args| {
            Ok(Some(SeqValue::Number(
                number_arg(args, "a") * number_arg(args, "b"),
            )))
        },
    );
    registry.register(
        "calc",
        "divide",
        two_ints("a", "b"),
        vec!["div".to_string()],
        |args| {
            let divisor = number_arg(args, "b");
            if divisor == 0.0 {
                return Err(SequenceError::new(
                    "CALC_DIVIDE_BY_ZERO",
                    "Divisor must not be zero.",
                ));
            }
            Ok(Some(SeqValue::Number(number_arg(args, "a") / divisor)))
        },
    );

    registry.register(
        "checks",
        "string_contains",
        vec![
            ParamSpec::new("needle", ParamType::Other),
            ParamSpec::new("haystack", ParamType::Other),
        ],
        Vec::new(),
        |args| {
            Ok(Some(SeqValue::Bool(
                text_arg(args, "haystack").contains(&text_arg(args, "needle")),
            )))
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
            let num = number_arg(args, "num");
            Ok(Some(SeqValue::Bool(
                number_arg(args, "start") <= num && num <= number_arg(args, "end"),
            )))
        },
    );

    registry.register(
        "logic",
        "boolean_logic",
        vec![
            ParamSpec::new("a", ParamType::Bool),
            ParamSpec::new("b", ParamType::Bool),
        ],
        Vec::new(),
        |args| Ok(Some(SeqValue::Bool(bool_arg(args, "a") && bool_arg(args, "b")))),
    );

    registry
}

use std::collections::BTreeMap;

use regex::Regex;
use rhai::{Dynamic, Engine, FnAccess, Scope};
use seq_core::{SeqValue, SequenceError};
use seq_engine::{CallArgs, ParamSpec, ParamType};

use crate::bridge::{dynamic_to_value, value_to_dynamic};
use crate::LoaderError;

#[derive(Debug, Clone)]
struct FunctionInfo {
    params: Vec<String>,
    predicted: Vec<String>,
}

/// One compiled test module. The source is kept and recompiled per call; a
/// script engine is cheap to build and the compiled form does not need to
/// live across threads that way.
#[derive(Debug, Clone)]
pub struct ScriptModule {
    name: String,
    source: String,
    functions: BTreeMap<String, FunctionInfo>,
}

impl ScriptModule {
    /// Compiles `source` once to validate it and harvest function metadata.
    /// Parameter names come from the compiled functions; predicted output
    /// names are a best-effort scrape of each function's return statements.
    pub fn parse(name: impl Into<String>, source: impl Into<String>) -> Result<Self, LoaderError> {
        let name = name.into();
        let source = source.into();

        let engine = Engine::new();
        let ast = engine.compile(&source).map_err(|error| LoaderError::Compile {
            name: name.clone(),
            message: error.to_string(),
        })?;

        let predictions = predict_return_names(&source);
        let mut functions = BTreeMap::new();
        for metadata in ast.iter_functions() {
            if metadata.access == FnAccess::Private {
                continue;
            }
            let function_name = metadata.name.to_string();
            let predicted = predictions
                .get(&function_name)
                .cloned()
                .unwrap_or_default();
            functions.insert(
                function_name,
                FunctionInfo {
                    params: metadata
                        .params
                        .iter()
                        .map(|param| (*param).to_string())
                        .collect(),
                    predicted,
                },
            );
        }

        Ok(Self {
            name,
            source,
            functions,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn function_names(&self) -> Vec<String> {
        self.functions.keys().cloned().collect()
    }

    /// Script parameters carry no type annotations, so every parameter is
    /// declared `Other` and receives the resolved value unchanged.
    pub fn parameters(&self, function: &str) -> Option<Vec<ParamSpec>> {
        self.functions.get(function).map(|info| {
            info.params
                .iter()
                .map(|name| ParamSpec::new(name.clone(), ParamType::Other))
                .collect()
        })
    }

    pub fn predicted_outputs(&self, function: &str) -> Vec<String> {
        self.functions
            .get(function)
            .map(|info| info.predicted.clone())
            .unwrap_or_default()
    }

    /// Invokes a script function with named args bound positionally in
    /// declaration order. A missing arg becomes an empty string, matching
    /// how the interpreter binds absent parameters.
    pub fn call(&self, function: &str, args: &CallArgs) -> Result<Option<SeqValue>, SequenceError> {
        let info = self.functions.get(function).ok_or_else(|| {
            SequenceError::new(
                "REGISTRY_FUNCTION_UNKNOWN",
                format!("Function \"{}.{}\" is not registered.", self.name, function),
            )
        })?;

        let engine = Engine::new();
        let ast = engine.compile(&self.source).map_err(|error| {
            SequenceError::new(
                "SCRIPT_COMPILE",
                format!("Module \"{}\" failed to compile: {}", self.name, error),
            )
        })?;

        let positional: Vec<Dynamic> = info
            .params
            .iter()
            .map(|name| {
                args.get(name)
                    .map(value_to_dynamic)
                    .unwrap_or_else(|| Dynamic::from(String::new()))
            })
            .collect();

        let mut scope = Scope::new();
        let result: Dynamic = engine
            .call_fn(&mut scope, &ast, function, positional)
            .map_err(|error| {
                SequenceError::new(
                    "SCRIPT_CALL",
                    format!("{}.{} raised: {}", self.name, function, error),
                )
            })?;

        if result.is_unit() {
            return Ok(None);
        }
        dynamic_to_value(result).map(Some)
    }
}

/// Scrapes `return name;` identifiers and `return #{ key: ... };` map keys
/// per function. Purely textual and best-effort, mirroring how predicted
/// outputs are meant to be used: as aliases, never as truth.
fn predict_return_names(source: &str) -> BTreeMap<String, Vec<String>> {
    let header =
        Regex::new(r"fn\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(").expect("function header regex must compile");
    let return_ident =
        Regex::new(r"return\s+([A-Za-z_][A-Za-z0-9_]*)\s*;").expect("return regex must compile");
    let return_map = Regex::new(r"return\s+#\{([^}]*)\}").expect("map return regex must compile");
    let map_key =
        Regex::new(r#"(?:"([^"]+)"|([A-Za-z_][A-Za-z0-9_]*))\s*:"#).expect("map key regex must compile");

    let headers: Vec<(String, usize)> = header
        .captures_iter(source)
        .filter_map(|captures| {
            let name = captures.get(1)?.as_str().to_string();
            let start = captures.get(0)?.start();
            Some((name, start))
        })
        .collect();

    let mut predictions = BTreeMap::new();
    for (position, (name, start)) in headers.iter().enumerate() {
        let end = headers
            .get(position + 1)
            .map(|(_, next_start)| *next_start)
            .unwrap_or(source.len());
        let body = &source[*start..end];

        let mut names = Vec::new();
        for captures in return_ident.captures_iter(body) {
            let ident = captures[1].to_string();
            if ident != "true" && ident != "false" && !names.contains(&ident) {
                names.push(ident);
            }
        }
        for captures in return_map.captures_iter(body) {
            for key in map_key.captures_iter(&captures[1]) {
                let key = key
                    .get(1)
                    .or_else(|| key.get(2))
                    .map(|m| m.as_str().to_string());
                if let Some(key) = key {
                    if !names.contains(&key) {
                        names.push(key);
                    }
                }
            }
        }

        if !names.is_empty() {
            predictions.insert(name.clone(), names);
        }
    }

    predictions
}

use std::collections::BTreeMap;
use std::sync::Arc;

use seq_core::{SeqValue, SequenceError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Bool,
    Int,
    Float,
    Other,
}

#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    pub ty: ParamType,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

pub type CallArgs = BTreeMap<String, SeqValue>;

/// Lookup service for callable test functions. The interpreter only ever
/// consumes this interface; where the callables come from (native code,
/// compiled scripts) is the provider's business.
///
/// A call returning `Ok(None)` means the function completed without a value,
/// which counts as success.
pub trait StepRegistry: Send + Sync {
    /// Parameter specs in declaration order, or `None` when the function is
    /// unknown to this registry.
    fn parameters(&self, module: &str, function: &str) -> Option<Vec<ParamSpec>>;

    /// Best-effort names a call is expected to bind in its results.
    fn predicted_outputs(&self, module: &str, function: &str) -> Vec<String>;

    fn call(
        &self,
        module: &str,
        function: &str,
        args: &CallArgs,
    ) -> Result<Option<SeqValue>, SequenceError>;
}

type Handler = Box<dyn Fn(&CallArgs) -> Result<Option<SeqValue>, SequenceError> + Send + Sync>;

struct FunctionEntry {
    params: Vec<ParamSpec>,
    predicted: Vec<String>,
    handler: Handler,
}

/// In-memory registry of native functions keyed by `(module, function)`.
#[derive(Default)]
pub struct FnRegistry {
    modules: BTreeMap<String, BTreeMap<String, FunctionEntry>>,
}

impl FnRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        module: impl Into<String>,
        function: impl Into<String>,
        params: Vec<ParamSpec>,
        predicted: Vec<String>,
        handler: impl Fn(&CallArgs) -> Result<Option<SeqValue>, SequenceError> + Send + Sync + 'static,
    ) {
        self.modules.entry(module.into()).or_default().insert(
            function.into(),
            FunctionEntry {
                params,
                predicted,
                handler: Box::new(handler),
            },
        );
    }

    pub fn module_names(&self) -> Vec<String> {
        self.modules.keys().cloned().collect()
    }

    pub fn function_names(&self, module: &str) -> Vec<String> {
        self.modules
            .get(module)
            .map(|functions| functions.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn entry(&self, module: &str, function: &str) -> Option<&FunctionEntry> {
        self.modules.get(module)?.get(function)
    }
}

impl StepRegistry for FnRegistry {
    fn parameters(&self, module: &str, function: &str) -> Option<Vec<ParamSpec>> {
        self.entry(module, function)
            .map(|entry| entry.params.clone())
    }

    fn predicted_outputs(&self, module: &str, function: &str) -> Vec<String> {
        self.entry(module, function)
            .map(|entry| entry.predicted.clone())
            .unwrap_or_default()
    }

    fn call(
        &self,
        module: &str,
        function: &str,
        args: &CallArgs,
    ) -> Result<Option<SeqValue>, SequenceError> {
        let entry = self.entry(module, function).ok_or_else(|| {
            SequenceError::new(
                "REGISTRY_FUNCTION_UNKNOWN",
                format!("Function \"{}.{}\" is not registered.", module, function),
            )
        })?;
        (entry.handler)(args)
    }
}

/// Chains registries; the first one that knows a function answers for it.
#[derive(Default)]
pub struct CompositeRegistry {
    sources: Vec<Arc<dyn StepRegistry>>,
}

impl CompositeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, source: Arc<dyn StepRegistry>) {
        self.sources.push(source);
    }

    fn owner(&self, module: &str, function: &str) -> Option<&Arc<dyn StepRegistry>> {
        self.sources
            .iter()
            .find(|source| source.parameters(module, function).is_some())
    }
}

impl StepRegistry for CompositeRegistry {
    fn parameters(&self, module: &str, function: &str) -> Option<Vec<ParamSpec>> {
        self.owner(module, function)?.parameters(module, function)
    }

    fn predicted_outputs(&self, module: &str, function: &str) -> Vec<String> {
        self.owner(module, function)
            .map(|source| source.predicted_outputs(module, function))
            .unwrap_or_default()
    }

    fn call(
        &self,
        module: &str,
        function: &str,
        args: &CallArgs,
    ) -> Result<Option<SeqValue>, SequenceError> {
        let source = self.owner(module, function).ok_or_else(|| {
            SequenceError::new(
                "REGISTRY_FUNCTION_UNKNOWN",
                format!("Function \"{}.{}\" is not registered.", module, function),
            )
        })?;
        source.call(module, function, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with_echo() -> FnRegistry {
        let mut registry = FnRegistry::new();
        registry.register(
            "demo",
            "echo",
            vec![ParamSpec::new("value", ParamType::Other)],
            vec!["echoed".to_string()],
            |args| Ok(args.get("value").cloned()),
        );
        registry
    }

    #[test]
    fn registered_function_exposes_metadata_and_calls() {
        let registry = registry_with_echo();

        let params = registry
            .parameters("demo", "echo")
            .expect("function should be known");
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].name, "value");
        assert_eq!(registry.predicted_outputs("demo", "echo"), vec!["echoed"]);

        let mut args = CallArgs::new();
        args.insert("value".to_string(), SeqValue::Number(4.0));
        let result = registry
            .call("demo", "echo", &args)
            .expect("call should pass");
        assert_eq!(result, Some(SeqValue::Number(4.0)));
    }

    #[test]
    fn unknown_function_reports_coded_error() {
        let registry = FnRegistry::new();
        assert!(registry.parameters("demo", "missing").is_none());
        let error = registry
            .call("demo", "missing", &CallArgs::new())
            .expect_err("unknown function should fail");
        assert_eq!(error.code, "REGISTRY_FUNCTION_UNKNOWN");
    }

    #[test]
    fn composite_prefers_earlier_sources() {
        let mut first = FnRegistry::new();
        first.register("demo", "pick", Vec::new(), Vec::new(), |_| {
            Ok(Some(SeqValue::from("first")))
        });
        let mut second = FnRegistry::new();
        second.register("demo", "pick", Vec::new(), Vec::new(), |_| {
            Ok(Some(SeqValue::from("second")))
        });
        second.register("demo", "only", Vec::new(), Vec::new(), |_| {
            Ok(Some(SeqValue::from("second-only")))
        });

        let mut composite = CompositeRegistry::new();
        composite.push(Arc::new(first));
        composite.push(Arc::new(second));

        let picked = composite
            .call("demo", "pick", &CallArgs::new())
            .expect("call should pass");
        assert_eq!(picked, Some(SeqValue::from("first")));

        let fallback = composite
            .call("demo", "only", &CallArgs::new())
            .expect("call should pass");
        assert_eq!(fallback, Some(SeqValue::from("second-only")));
    }
}

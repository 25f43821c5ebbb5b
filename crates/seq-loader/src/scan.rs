use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use seq_core::{SeqValue, SequenceError};
use seq_engine::{CallArgs, ParamSpec, StepRegistry};
use walkdir::WalkDir;

use crate::module::ScriptModule;
use crate::LoaderError;

/// Registry of script-defined test functions, keyed by module name (the
/// file stem of each `test_*.rhai` file found under the scanned directory).
#[derive(Debug, Default)]
pub struct ScriptRegistry {
    modules: BTreeMap<String, ScriptModule>,
    skipped: Vec<String>,
}

impl ScriptRegistry {
    /// Walks `dir` for `test_*.rhai` modules. A directory that does not
    /// exist yields an empty registry; a module that fails to compile is
    /// recorded in `skipped` and left out, never fatal to the scan.
    pub fn scan(dir: &Path) -> Result<Self, LoaderError> {
        let mut registry = Self::default();
        if !dir.exists() {
            return Ok(registry);
        }

        for entry in WalkDir::new(dir)
            .follow_links(false)
            .into_iter()
            .filter_map(Result::ok)
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            if !file_name.starts_with("test_") || !file_name.ends_with(".rhai") {
                continue;
            }
            let module_name = file_name.trim_end_matches(".rhai").to_string();

            let source = fs::read_to_string(path).map_err(|source| LoaderError::ReadFile {
                path: path.to_path_buf(),
                source,
            })?;

            match ScriptModule::parse(module_name, source) {
                Ok(module) => {
                    registry.modules.insert(module.name().to_string(), module);
                }
                Err(error) => registry.skipped.push(error.to_string()),
            }
        }

        Ok(registry)
    }

    pub fn module_names(&self) -> Vec<String> {
        self.modules.keys().cloned().collect()
    }

    pub fn function_names(&self, module: &str) -> Vec<String> {
        self.modules
            .get(module)
            .map(ScriptModule::function_names)
            .unwrap_or_default()
    }

    /// Human-readable notes about modules that failed to load.
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl StepRegistry for ScriptRegistry {
    fn parameters(&self, module: &str, function: &str) -> Option<Vec<ParamSpec>> {
        self.modules.get(module)?.parameters(function)
    }

    fn predicted_outputs(&self, module: &str, function: &str) -> Vec<String> {
        self.modules
            .get(module)
            .map(|entry| entry.predicted_outputs(function))
            .unwrap_or_default()
    }

    fn call(
        &self,
        module: &str,
        function: &str,
        args: &CallArgs,
    ) -> Result<Option<SeqValue>, SequenceError> {
        let entry = self.modules.get(module).ok_or_else(|| {
            SequenceError::new(
                "REGISTRY_FUNCTION_UNKNOWN",
                format!("Function \"{}.{}\" is not registered.", module, function),
            )
        })?;
        entry.call(function, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(name: &str) -> std::path::PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time should move forward")
            .as_nanos();
        std::env::temp_dir().join(format!("seq-loader-{}-{}", name, nanos))
    }

    fn write_file(path: &Path, content: &str) {
        let parent = path.parent().expect("path should have parent");
        fs::create_dir_all(parent).expect("parent dir should be created");
        fs::write(path, content).expect("file should be written");
    }

    #[test]
    fn scan_collects_test_modules_and_ignores_others() {
        let root = temp_dir("collect");
        write_file(
            &root.join("test_math.rhai"),
            "fn double(x) { let doubled = x * 2; return doubled; }",
        );
        write_file(&root.join("helpers.rhai"), "fn ignored() { 1 }");
        write_file(&root.join("test_notes.txt"), "not a module");

        let registry = ScriptRegistry::scan(&root).expect("scan should pass");
        assert_eq!(registry.module_names(), vec!["test_math"]);
        assert_eq!(registry.function_names("test_math"), vec!["double"]);
        assert_eq!(
            registry.predicted_outputs("test_math", "double"),
            vec!["doubled"]
        );
    }

    #[test]
    fn scan_of_missing_directory_is_empty_not_fatal() {
        let registry = ScriptRegistry::scan(&temp_dir("missing")).expect("scan should pass");
        assert!(registry.is_empty());
        assert!(registry.skipped().is_empty());
    }

    #[test]
    fn broken_module_is_skipped_with_a_note() {
        let root = temp_dir("broken");
        write_file(&root.join("test_ok.rhai"), "fn ok() { true }");
        write_file(&root.join("test_broken.rhai"), "fn broken( {");

        let registry = ScriptRegistry::scan(&root).expect("scan should pass");
        assert_eq!(registry.module_names(), vec!["test_ok"]);
        assert_eq!(registry.skipped().len(), 1);
        assert!(registry.skipped()[0].contains("test_broken"));
    }

    #[test]
    fn registry_calls_through_to_script_functions() {
        let root = temp_dir("calls");
        write_file(
            &root.join("test_math.rhai"),
            "fn double(x) { let doubled = x * 2; return doubled; }",
        );

        let registry = ScriptRegistry::scan(&root).expect("scan should pass");
        let mut args = CallArgs::new();
        args.insert("x".to_string(), SeqValue::Number(4.0));
        let result = registry
            .call("test_math", "double", &args)
            .expect("call should pass");
        assert_eq!(result, Some(SeqValue::Number(8.0)));

        let error = registry
            .call("test_other", "double", &args)
            .expect_err("unknown module should fail");
        assert_eq!(error.code, "REGISTRY_FUNCTION_UNKNOWN");
    }
}

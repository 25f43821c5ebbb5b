use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SequenceError;
use crate::value::SeqValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    If,
    For,
    End,
    Break,
}

impl ControlKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::If => "if",
            Self::For => "for",
            Self::End => "end",
            Self::Break => "break",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "if" => Some(Self::If),
            "for" => Some(Self::For),
            "end" => Some(Self::End),
            "break" => Some(Self::Break),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepKind {
    Function { module: String, function: String },
    Control(ControlKind),
}

/// One entry in a sequence. `id` is stable across edits and reorders; the
/// interpreter writes `outputs`, everything else belongs to the editor.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub id: String,
    pub kind: StepKind,
    pub params: BTreeMap<String, String>,
    pub outputs: BTreeMap<String, SeqValue>,
}

impl Step {
    pub fn function(module: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind: StepKind::Function {
                module: module.into(),
                function: function.into(),
            },
            params: BTreeMap::new(),
            outputs: BTreeMap::new(),
        }
    }

    pub fn control(kind: ControlKind) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind: StepKind::Control(kind),
            params: BTreeMap::new(),
            outputs: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn control_kind(&self) -> Option<ControlKind> {
        match &self.kind {
            StepKind::Control(kind) => Some(*kind),
            StepKind::Function { .. } => None,
        }
    }

    pub fn label(&self) -> String {
        match &self.kind {
            StepKind::Function { module, function } => format!("{}.{}", module, function),
            StepKind::Control(kind) => kind.name().to_string(),
        }
    }
}

const RECORD_TYPE_FUNCTION: &str = "function";
const RECORD_TYPE_CONTROL: &str = "control";

/// Flat persisted form of a step, one element of the saved JSON array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub step_type: String,
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default)]
    pub function: Option<String>,
    #[serde(default)]
    pub control: Option<String>,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    #[serde(default)]
    pub outputs: BTreeMap<String, SeqValue>,
}

impl From<&Step> for StepRecord {
    fn from(step: &Step) -> Self {
        let (step_type, module, function, control) = match &step.kind {
            StepKind::Function { module, function } => (
                RECORD_TYPE_FUNCTION.to_string(),
                Some(module.clone()),
                Some(function.clone()),
                None,
            ),
            StepKind::Control(kind) => (
                RECORD_TYPE_CONTROL.to_string(),
                None,
                None,
                Some(kind.name().to_string()),
            ),
        };

        Self {
            id: Some(step.id.clone()),
            step_type,
            module,
            function,
            control,
            params: step.params.clone(),
            outputs: step.outputs.clone(),
        }
    }
}

impl TryFrom<StepRecord> for Step {
    type Error = SequenceError;

    fn try_from(record: StepRecord) -> Result<Self, Self::Error> {
        let kind = match record.step_type.as_str() {
            RECORD_TYPE_FUNCTION => {
                let module = record.module.filter(|name| !name.is_empty()).ok_or_else(|| {
                    SequenceError::new(
                        "SEQUENCE_RECORD_MODULE",
                        "Function step record is missing its module name.",
                    )
                })?;
                let function = record
                    .function
                    .filter(|name| !name.is_empty())
                    .ok_or_else(|| {
                        SequenceError::new(
                            "SEQUENCE_RECORD_FUNCTION",
                            "Function step record is missing its function name.",
                        )
                    })?;
                StepKind::Function { module, function }
            }
            RECORD_TYPE_CONTROL => {
                let raw = record.control.unwrap_or_default();
                let control = ControlKind::parse(&raw).ok_or_else(|| {
                    SequenceError::new(
                        "SEQUENCE_RECORD_CONTROL",
                        format!("Unknown control marker \"{}\".", raw),
                    )
                })?;
                StepKind::Control(control)
            }
            other => {
                return Err(SequenceError::new(
                    "SEQUENCE_RECORD_TYPE",
                    format!("Unknown step type \"{}\".", other),
                ))
            }
        };

        // Preserve saved ids so externally cached per-step state survives a
        // load; records without one get a fresh id.
        let id = record
            .id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        Ok(Self {
            id,
            kind,
            params: record.params,
            outputs: record.outputs,
        })
    }
}

pub fn load_sequence(json: &str) -> Result<Vec<Step>, SequenceError> {
    let records: Vec<StepRecord> = serde_json::from_str(json).map_err(|error| {
        SequenceError::new(
            "SEQUENCE_PARSE",
            format!("Sequence file is not a valid step array: {}", error),
        )
    })?;

    records.into_iter().map(Step::try_from).collect()
}

pub fn save_sequence(steps: &[Step]) -> Result<String, SequenceError> {
    let records: Vec<StepRecord> = steps.iter().map(StepRecord::from).collect();
    serde_json::to_string_pretty(&records).map_err(|error| {
        SequenceError::new(
            "SEQUENCE_SERIALIZE",
            format!("Sequence could not be serialized: {}", error),
        )
    })
}

mod block;
mod engine;
mod eval;
mod registry;
mod resolve;
mod sink;
mod stepper;

pub use engine::{SequenceEngine, Vars};
pub use registry::{CallArgs, CompositeRegistry, FnRegistry, ParamSpec, ParamType, StepRegistry};
pub use resolve::resolve_references;
pub use sink::{EventSink, NullSink, RecordingSink, SinkEvent};

pub mod error;
pub mod step;
pub mod value;

pub use error::SequenceError;
pub use step::*;
pub use value::*;

//! C++ emission for the analyzed circuit.
//!
//! Every generator here is a pure function from ([`GenerationMetadata`],
//! target identifiers) to text. The analyses hand over a typed call IR
//! ([`calldata::CallData`]) that a single pretty-printer assembles, keeping
//! the dataflow logic testable independently of the exact emitted syntax.
//! Downstream native code depends on the emitted identifier names verbatim;
//! renaming them is a breaking change.
//!
//! [`GenerationMetadata`]: crate::metadata::GenerationMetadata

pub mod call_body;
pub mod calldata;
pub mod cmake;
pub mod dot;
pub mod names;
pub mod single_call;
pub mod struct_gen;
pub mod timer;

use thiserror::Error;

use crate::error::CircuitError;

pub type CodegenResult<T> = Result<T, CodegenError>;

/// A fatal code-emission error. Generation of the current artifact aborts
/// entirely; there is no partial-file output.
#[derive(Error, Debug)]
pub enum CodegenError {
    #[error(transparent)]
    Circuit(#[from] CircuitError),

    #[error("component {component} callset over {written:?} has no callback but a call must be emitted")]
    MissingCallback {
        component: String,
        written: Vec<String>,
    },

    #[error("component {component} array callset must write exactly one array input, found {count}")]
    ArrayInputCount { component: String, count: usize },

    #[error("array call for component {component} selected no written batches")]
    NoWrittenBatches { component: String },

    #[error("component {component} of class {class_name} has no timer callset")]
    NoTimerCallset {
        component: String,
        class_name: String,
    },

    #[error("multiple call data generators requested a return value for {call_path}")]
    ConflictingReturnValue { call_path: String },
}

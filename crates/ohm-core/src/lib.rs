//! Ohm circuit compiler
//!
//! This crate compiles a declarative dataflow graph ("circuit") of typed
//! components into C++ source implementing a synchronous, event-triggered
//! computation engine:
//! - Definition catalog and circuit graph with construction-time validation
//! - Trigger reachability and callset dispatch
//! - Ephemeral/stored classification and validity-slot allocation
//! - Call-body, state-struct, graphviz, and build-fragment emission
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────────┐   ┌─────────────────────────┐
//! │ Definitions  │ → │ CircuitData   │ → │ per trigger:            │
//! │ (catalog)    │   │ (builder/JSON)│   │   reachability (§find)  │
//! └──────────────┘   └───────────────┘   │   callset dispatch      │
//!                                        └───────────┬─────────────┘
//!                    ┌───────────────────────────────┴─────────────┐
//!                    │ GenerationMetadata (ephemeral + validity)   │
//!                    └───────────────────────────────┬─────────────┘
//!                                                    ↓
//!                              codegen: calls / struct / timers / dot
//! ```

// Model modules
pub mod circuit;
pub mod definition;
pub mod error;

// Analysis modules
pub mod callset;
pub mod ephemeral;
pub mod metadata;
pub mod reachability;

// Emission modules
pub mod codegen;

// Boundary
pub mod loader;

#[cfg(test)]
pub(crate) mod test_support;

// Re-exports
pub use circuit::{
    CallGroup, CallStruct, CircuitBuilder, CircuitData, Component, ComponentInput,
    ComponentOutput, ExternalInput, ExternalStruct, InputWiring, OutputOptions, WireBatch,
    EXTERNAL_PARENT,
};
pub use codegen::{CodegenError, CodegenResult};
pub use definition::{
    CallSpec, Definition, Definitions, InputDecl, InputKind, MetadataParam, OutputSpec,
};
pub use error::CircuitError;
pub use loader::{LoaderConfig, LoaderError, LoaderResult, StructFileTarget};
pub use metadata::{
    AnnotatedComponent, CallMetaData, GenerationMetadata, OutputMetadata,
};
pub use reachability::{find_all_children_of, CalledComponent};

//! Error types for circuit construction and analysis.
//!
//! Every variant is an authoring or catalog error detected at build/codegen
//! time, never a runtime fault of the generated engine. All of them abort the
//! artifact being produced; none are recoverable by retrying.

use thiserror::Error;

/// Result alias used throughout the model and analysis layers.
pub type CircuitResult<T> = Result<T, CircuitError>;

/// A fatal circuit authoring or catalog error.
#[derive(Error, Debug)]
pub enum CircuitError {
    #[error("definition {0} is not in the catalog")]
    UnknownDefinition(String),

    #[error("component {0} is not part of the circuit")]
    UnknownComponent(String),

    #[error("external {0} is not part of the circuit")]
    UnknownExternal(String),

    #[error("call group {0} is not part of the circuit")]
    UnknownCallGroup(String),

    #[error("call group {group} requested nonexistent input struct {struct_name}")]
    UnknownCallStruct { group: String, struct_name: String },

    #[error("circuit already has a component named {0}")]
    DuplicateComponent(String),

    #[error("circuit already has a call group named {0}")]
    DuplicateCallGroup(String),

    #[error("tried to add two different definitions for name {0}")]
    ConflictingDefinition(String),

    #[error("tried to add two different call structs for name {0}")]
    ConflictingCallStruct(String),

    #[error("external {name} already registered with type {existing}, requested {requested}")]
    ConflictingExternal {
        name: String,
        existing: String,
        requested: String,
    },

    #[error("definition {definition} has non-contiguous input indices, missing {missing:?}")]
    NonContiguousInputs {
        definition: String,
        missing: Vec<u32>,
    },

    #[error("definition {definition} callset {callback} references undeclared input {input}")]
    CallsetUndeclaredInput {
        definition: String,
        callback: String,
        input: String,
    },

    #[error("definition {definition} callset {callback} references undeclared output {output}")]
    CallsetUndeclaredOutput {
        definition: String,
        callback: String,
        output: String,
    },

    #[error("definition {definition} callset {callback} lists input {input} as both written and observed")]
    CallsetInputWrittenAndObserved {
        definition: String,
        callback: String,
        input: String,
    },

    #[error("definition {definition} declares two callsets with identical written set {written:?}")]
    DuplicateWrittenSet {
        definition: String,
        written: Vec<String>,
    },

    #[error("definition {definition} timer callset must have an empty written set")]
    TimerCallsetWrites { definition: String },

    #[error("definition {definition} generics_order references non-input name {input}")]
    GenericsUndeclaredInput { definition: String, input: String },

    #[error("component {component} had multiple matching callsets: {matches:?}")]
    AmbiguousCallset {
        component: String,
        matches: Vec<String>,
    },

    #[error("component {component} had no matching callset and no generic callset defined")]
    NoMatchingCallset { component: String },

    #[error("component {component} does not have output {output}")]
    UndeclaredOutput { component: String, output: String },

    #[error("component {component} has output options for {output} which is not an output")]
    OptionsForUndeclaredOutput { component: String, output: String },

    #[error("component {component} requested output {output} be stored, despite being assumed invalid")]
    ForceStoredAssumeInvalid { component: String, output: String },

    #[error("component {component} has input {input} which is not in its definition")]
    UndeclaredInput { component: String, input: String },

    #[error("component {component} is missing input {input}")]
    MissingInput { component: String, input: String },

    #[error("component {component} input {input} wired as {given} but declared {declared}")]
    InputKindMismatch {
        component: String,
        input: String,
        given: &'static str,
        declared: &'static str,
    },

    #[error(
        "component {component} input {input} observes external {external} which requires triggering"
    )]
    ObservedMustTriggerExternal {
        component: String,
        input: String,
        external: String,
    },

    #[error(
        "component {component} input {input} references {parent} which is not inserted yet; \
         components may only reference outputs of already-inserted components or externals"
    )]
    BackReference {
        component: String,
        input: String,
        parent: String,
    },

    #[error("call group {group} requested field {field} from struct {struct_name} but it does not exist")]
    CallGroupUnknownField {
        group: String,
        field: String,
        struct_name: String,
    },

    #[error(
        "call group {group} mapped field {field} to external {external} with different types \
         {field_type} and {external_type}"
    )]
    CallGroupTypeMismatch {
        group: String,
        field: String,
        external: String,
        field_type: String,
        external_type: String,
    },

    #[error("cannot take the default output of component {component} with {count} outputs")]
    NoDefaultOutput { component: String, count: usize },
}

//! Immutable component-kind templates ("definitions") and their catalog.
//!
//! A [`Definition`] describes everything the compiler knows about one kind of
//! component: its declared input slots, its outputs and their storage policy,
//! and the callsets that map freshly-written input subsets to native callbacks.
//! Definitions are loaded once from a JSON catalog and validated up front;
//! nothing downstream re-checks these invariants.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{CircuitError, CircuitResult};

/// How a declared input consumes its wiring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    /// One wire from one producing output.
    #[default]
    Single,
    /// An ordered list of wire batches (variable-length collections).
    Array,
}

/// A declared input slot of a definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputDecl {
    /// Zero-based slot index. The set of indices across a definition's inputs
    /// must be exactly `0..inputs.len()`.
    pub index: u32,
    /// The producer feeding this input is guaranteed valid, so the generated
    /// binding is a plain const reference instead of an optional reference.
    #[serde(default)]
    pub always_valid: bool,
    #[serde(default)]
    pub kind: InputKind,
}

/// Storage policy for one declared output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSpec {
    /// C++ type of the output, relative to the component class
    /// (`{class}::{type_path}`).
    pub type_path: String,
    /// The output may live on the stack of a single trigger's call tree.
    #[serde(default)]
    pub ephemeral: bool,
    /// The output is valid from the first call onwards; its validity check
    /// collapses to a compile-time `true`.
    #[serde(default)]
    pub always_valid: bool,
    /// The output is rewritten from a default-constructed value on every call.
    #[serde(default)]
    pub assume_default: bool,
    /// The output is only meaningful within the call that wrote it; readers in
    /// other call trees see an explicitly invalid binding.
    #[serde(default)]
    pub assume_invalid: bool,
}

/// Extra aggregates a callback receives beyond its input/output structs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataParam {
    /// A handle onto the engine's timer queue, letting the component schedule
    /// its own timer callback.
    Timer,
}

impl MetadataParam {
    /// Field name of this parameter inside the generated metadata struct.
    pub fn field_name(self) -> &'static str {
        match self {
            MetadataParam::Timer => "timer",
        }
    }
}

/// A named input-subset-to-callback mapping; the unit of dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CallSpec {
    /// Inputs guaranteed freshly written for this callset to fire.
    #[serde(default)]
    pub written_set: BTreeSet<String>,
    /// Inputs read but not required fresh.
    #[serde(default)]
    pub observes: BTreeSet<String>,
    /// Native entry point. `None` marks the callset skippable: the trigger
    /// combination is declared, but deliberately generates no call.
    #[serde(default)]
    pub callback: Option<String>,
    /// Outputs this callback may produce (subset of the definition's outputs).
    #[serde(default)]
    pub outputs: BTreeSet<String>,
    #[serde(default)]
    pub metadata: Vec<MetadataParam>,
    /// Use a named input struct declared by the native class instead of an
    /// ad-hoc local struct.
    #[serde(default)]
    pub input_struct_path: Option<String>,
}

impl CallSpec {
    pub fn is_skippable(&self) -> bool {
        self.callback.is_none()
    }

    /// All inputs this callset touches, written and observed alike.
    pub fn inputs(&self) -> impl Iterator<Item = &String> {
        self.written_set.iter().chain(self.observes.iter())
    }

    /// Human-readable handle for error messages.
    pub fn describe(&self) -> String {
        let written: Vec<&str> = self.written_set.iter().map(String::as_str).collect();
        match &self.callback {
            Some(cb) => format!("{}{:?}", cb, written),
            None => format!("<skip>{:?}", written),
        }
    }
}

/// Immutable template for a component kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Definition {
    pub inputs: IndexMap<String, InputDecl>,
    pub output_specs: IndexMap<String, OutputSpec>,
    /// C++ class (or free-function namespace) implementing the component.
    pub class_name: String,
    /// Callbacks are static free functions on the class rather than member
    /// functions of a per-component object.
    #[serde(default)]
    pub static_call: bool,
    /// Header providing the native implementation, relative to the signals
    /// include root.
    pub header: String,
    #[serde(default)]
    pub callsets: Vec<CallSpec>,
    /// Fallback when no callset matches the written set.
    #[serde(default)]
    pub generic_callset: Option<CallSpec>,
    /// Callback fired from the timer queue rather than from a wired trigger.
    #[serde(default)]
    pub timer_callset: Option<CallSpec>,
    /// Inputs whose value types instantiate the class template, keyed by
    /// template-parameter position.
    #[serde(default)]
    pub generics_order: BTreeMap<String, u32>,
}

impl Definition {
    /// Declared output names in declaration order.
    pub fn outputs(&self) -> impl Iterator<Item = &str> {
        self.output_specs.keys().map(String::as_str)
    }

    pub fn output_spec(&self, output: &str) -> Option<&OutputSpec> {
        self.output_specs.get(output)
    }

    /// Every callset, including the generic fallback and timer callset.
    pub fn all_callsets(&self) -> impl Iterator<Item = &CallSpec> {
        self.callsets
            .iter()
            .chain(self.generic_callset.iter())
            .chain(self.timer_callset.iter())
    }

    /// Input names whose writes can activate this component: the union of all
    /// written sets. A generic callset makes every input triggering.
    pub fn triggering_inputs(&self) -> BTreeSet<String> {
        if self.generic_callset.is_some() {
            return self.inputs.keys().cloned().collect();
        }
        self.callsets
            .iter()
            .flat_map(|cs| cs.written_set.iter().cloned())
            .collect()
    }

    /// Template-parameter inputs in template order.
    pub fn ordered_generic_inputs(&self) -> Vec<&str> {
        let mut order: Vec<(&str, u32)> = self
            .generics_order
            .iter()
            .map(|(name, pos)| (name.as_str(), *pos))
            .collect();
        order.sort_by_key(|(_, pos)| *pos);
        order.into_iter().map(|(name, _)| name).collect()
    }

    /// Enforce the structural invariants of the definition. `name` is the
    /// catalog key, used only for error reporting.
    pub fn validate(&self, name: &str) -> CircuitResult<()> {
        let present: BTreeSet<u32> = self.inputs.values().map(|decl| decl.index).collect();
        let missing: Vec<u32> = (0..self.inputs.len() as u32)
            .filter(|idx| !present.contains(idx))
            .collect();
        if !missing.is_empty() {
            return Err(CircuitError::NonContiguousInputs {
                definition: name.to_string(),
                missing,
            });
        }

        for callset in self.all_callsets() {
            self.validate_callset(name, callset)?;
        }

        let mut seen_written: Vec<&BTreeSet<String>> = Vec::new();
        for callset in &self.callsets {
            if seen_written.contains(&&callset.written_set) {
                return Err(CircuitError::DuplicateWrittenSet {
                    definition: name.to_string(),
                    written: callset.written_set.iter().cloned().collect(),
                });
            }
            seen_written.push(&callset.written_set);
        }

        if let Some(timer) = &self.timer_callset {
            if !timer.written_set.is_empty() {
                return Err(CircuitError::TimerCallsetWrites {
                    definition: name.to_string(),
                });
            }
        }

        for generic_input in self.generics_order.keys() {
            if !self.inputs.contains_key(generic_input) {
                return Err(CircuitError::GenericsUndeclaredInput {
                    definition: name.to_string(),
                    input: generic_input.clone(),
                });
            }
        }

        Ok(())
    }

    fn validate_callset(&self, name: &str, callset: &CallSpec) -> CircuitResult<()> {
        let callback = callset.describe();
        for input in callset.inputs() {
            if !self.inputs.contains_key(input) {
                return Err(CircuitError::CallsetUndeclaredInput {
                    definition: name.to_string(),
                    callback: callback.clone(),
                    input: input.clone(),
                });
            }
        }
        for input in &callset.written_set {
            if callset.observes.contains(input) {
                return Err(CircuitError::CallsetInputWrittenAndObserved {
                    definition: name.to_string(),
                    callback: callback.clone(),
                    input: input.clone(),
                });
            }
        }
        for output in &callset.outputs {
            if !self.output_specs.contains_key(output) {
                return Err(CircuitError::CallsetUndeclaredOutput {
                    definition: name.to_string(),
                    callback: callback.clone(),
                    output: output.clone(),
                });
            }
        }
        Ok(())
    }
}

/// The full definition catalog, keyed by definition name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Definitions {
    pub definitions: IndexMap<String, Definition>,
}

impl Definitions {
    /// Validate every definition in the catalog.
    pub fn validate(&self) -> CircuitResult<()> {
        for (name, definition) in &self.definitions {
            definition.validate(name)?;
        }
        Ok(())
    }
}

//! Derived, whole-circuit annotations consumed by every code generator.
//!
//! [`GenerationMetadata`] is built once after the circuit is frozen: it
//! validates the graph, computes the global non-ephemeral set across every
//! trigger and timer subgraph, classifies each output, and bump-allocates the
//! shared validity array. It must be recomputed if the circuit changes.

use std::collections::HashSet;

use indexmap::IndexMap;

use crate::circuit::{CircuitData, Component, ComponentOutput};
use crate::definition::Definition;
use crate::ephemeral::{find_nonephemeral_outputs, is_ephemeral};
use crate::error::CircuitResult;
use crate::reachability::{find_all_children_of, find_all_children_of_from_outputs, CalledComponent};

/// One trigger endpoint: the generated function's name and the externals the
/// incoming event drives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallMetaData {
    pub call_name: String,
    pub triggered: Vec<String>,
}

/// Storage classification of one output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputMetadata {
    /// Slot in the shared `outputs.is_valid[]` array. `None` when the output
    /// is ephemeral (local flag), always valid (compile-time `true`), or
    /// assumed invalid (compile-time `false`).
    pub validity_index: Option<u32>,
    pub is_ephemeral: bool,
}

/// A component plus its derived per-output annotations.
#[derive(Debug, Clone)]
pub struct AnnotatedComponent {
    pub output_data: IndexMap<String, OutputMetadata>,
    /// Prefix placed before the callback name at the call site:
    /// `_objects.{name}.` for stateful components, `{name}TypeAlias::` for
    /// static ones.
    pub call_root: String,
}

impl AnnotatedComponent {
    pub fn output(&self, output_name: &str) -> &OutputMetadata {
        &self.output_data[output_name]
    }
}

/// Classify and slot-allocate every output of one component, assigning
/// consecutive shared-array indices starting at `base` in declaration order.
/// Returns the annotations and the next free index.
pub fn annotate_outputs(
    component: &Component,
    definition: &Definition,
    non_ephemeral: &HashSet<ComponentOutput>,
    base: u32,
) -> (IndexMap<String, OutputMetadata>, u32) {
    let mut next = base;
    let mut output_data = IndexMap::with_capacity(definition.output_specs.len());
    for (output_name, spec) in &definition.output_specs {
        let ephemeral = is_ephemeral(component, output_name, spec, non_ephemeral);
        let validity_index = if ephemeral || spec.always_valid || spec.assume_invalid {
            None
        } else {
            let slot = next;
            next += 1;
            Some(slot)
        };
        output_data.insert(
            output_name.clone(),
            OutputMetadata {
                validity_index,
                is_ephemeral: ephemeral,
            },
        );
    }
    (output_data, next)
}

/// Components whose definitions register a timer callback, in insertion order.
pub fn timer_components(circuit: &CircuitData) -> CircuitResult<Vec<&Component>> {
    let mut timers = Vec::new();
    for component in circuit.components.values() {
        if circuit.definition_of(component)?.timer_callset.is_some() {
            timers.push(component);
        }
    }
    Ok(timers)
}

/// Every call tree the generated engine can run: one per call group, plus one
/// per timer-bearing component (the component itself, then the children its
/// timer outputs wake).
pub fn find_all_subgraphs(circuit: &CircuitData) -> CircuitResult<Vec<Vec<CalledComponent<'_>>>> {
    let mut subgraphs = Vec::new();
    for group in circuit.call_groups.values() {
        subgraphs.push(find_all_children_of(group.triggered_externals(), circuit)?);
    }
    for component in timer_components(circuit)? {
        let definition = circuit.definition_of(component)?;
        let timer = definition.timer_callset.as_ref().unwrap();
        let seed: HashSet<ComponentOutput> = timer
            .outputs
            .iter()
            .map(|output| component.output(output.clone()))
            .collect();
        let mut calls = vec![CalledComponent {
            component,
            callset: timer,
        }];
        calls.extend(find_all_children_of_from_outputs(circuit, &seed)?);
        subgraphs.push(calls);
    }
    Ok(subgraphs)
}

/// The fully analyzed circuit.
#[derive(Debug)]
pub struct GenerationMetadata<'a> {
    pub circuit: &'a CircuitData,
    /// Name of the generated engine struct; every emitted signature and
    /// artifact hangs off it.
    pub struct_name: String,
    pub annotated_components: IndexMap<String, AnnotatedComponent>,
    pub non_ephemeral_outputs: HashSet<ComponentOutput>,
    /// Size of the shared `outputs.is_valid[]` array.
    pub validity_marker_count: u32,
    /// One entry per call group, in registration order.
    pub call_endpoints: Vec<CallMetaData>,
}

impl<'a> GenerationMetadata<'a> {
    pub fn annotated(&self, component_name: &str) -> &AnnotatedComponent {
        &self.annotated_components[component_name]
    }

    /// Storage classification of an arbitrary output handle. Externals are
    /// never ephemeral.
    pub fn output_is_ephemeral(&self, output: &ComponentOutput) -> bool {
        if output.is_external() {
            return false;
        }
        self.annotated_components[&output.parent]
            .output(&output.output_name)
            .is_ephemeral
    }
}

/// Validate the circuit and derive all annotations. Triggers and timers are
/// analyzed together because storage must be globally consistent: a value
/// ephemeral in one tree but read from another must be stored.
pub fn generate_global_metadata<'a>(
    circuit: &'a CircuitData,
    struct_name: impl Into<String>,
) -> CircuitResult<GenerationMetadata<'a>> {
    circuit.validate()?;

    let mut non_ephemeral = HashSet::new();
    for subgraph in find_all_subgraphs(circuit)? {
        non_ephemeral.extend(find_nonephemeral_outputs(&subgraph));
    }

    let mut annotated_components = IndexMap::with_capacity(circuit.components.len());
    let mut next_slot = 0u32;
    for component in circuit.components.values() {
        let definition = circuit.definition_of(component)?;
        let (output_data, next) =
            annotate_outputs(component, definition, &non_ephemeral, next_slot);
        next_slot = next;
        let call_root = if definition.static_call {
            format!("{}TypeAlias::", component.name)
        } else {
            format!("_objects.{}.", component.name)
        };
        annotated_components.insert(
            component.name.clone(),
            AnnotatedComponent {
                output_data,
                call_root,
            },
        );
    }

    let call_endpoints = circuit
        .call_groups
        .iter()
        .map(|(name, group)| {
            let mut triggered = Vec::new();
            for external in group.triggered_externals() {
                if !triggered.contains(external) {
                    triggered.push(external.clone());
                }
            }
            CallMetaData {
                call_name: name.clone(),
                triggered,
            }
        })
        .collect();

    Ok(GenerationMetadata {
        circuit,
        struct_name: struct_name.into(),
        annotated_components,
        non_ephemeral_outputs: non_ephemeral,
        validity_marker_count: next_slot,
        call_endpoints,
    })
}

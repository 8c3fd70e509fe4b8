//! Callset dispatch: select the callback to run for one written-input set.
//!
//! Dispatch mirrors overload resolution: exact matches win over the generic
//! fallback, and more than one exact match is an authoring error, never a
//! silent priority order.

use std::collections::HashSet;

use crate::circuit::{Component, ComponentInput, ComponentOutput};
use crate::definition::{CallSpec, Definition};
use crate::error::{CircuitError, CircuitResult};

/// Does this wired input carry at least one freshly written output?
fn input_is_written(input: &ComponentInput, written_outputs: &HashSet<ComponentOutput>) -> bool {
    input.outputs().any(|output| written_outputs.contains(output))
}

/// A callset matches when every input in its written set is fed by an output
/// written this trigger. Array inputs match if any wire of any batch does.
pub fn callset_matches(
    component: &Component,
    callset: &CallSpec,
    written_outputs: &HashSet<ComponentOutput>,
) -> bool {
    callset.written_set.iter().all(|input_name| {
        component
            .inputs
            .get(input_name)
            .is_some_and(|input| input_is_written(input, written_outputs))
    })
}

/// Select the unique matching callset for `component` given the outputs
/// freshly written this trigger, falling back to the definition's generic
/// callset when nothing matches exactly.
pub fn find_callset_for<'a>(
    component: &Component,
    definition: &'a Definition,
    written_outputs: &HashSet<ComponentOutput>,
) -> CircuitResult<&'a CallSpec> {
    let matches: Vec<&CallSpec> = definition
        .callsets
        .iter()
        .filter(|callset| callset_matches(component, callset, written_outputs))
        .collect();

    match matches.len() {
        1 => Ok(matches[0]),
        0 => definition
            .generic_callset
            .as_ref()
            .ok_or_else(|| CircuitError::NoMatchingCallset {
                component: component.name.clone(),
            }),
        _ => Err(CircuitError::AmbiguousCallset {
            component: component.name.clone(),
            matches: matches.iter().map(|callset| callset.describe()).collect(),
        }),
    }
}

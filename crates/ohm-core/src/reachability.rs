//! Trigger reachability: which components run, in what order, for one event.
//!
//! Two phases with distinct meanings:
//! 1. [`reachable_components`] is a conservative over-approximation used for
//!    storage allocation. A component that can fire at all is assumed to
//!    produce every declared output, because dispatch has not run yet.
//! 2. [`find_all_children_of_from_outputs`] refines that to the exact
//!    "definitely written this call" set by resolving each component's
//!    callset against the outputs actually written so far, and only then
//!    propagating the matched callset's outputs.
//!
//! Both are monotone fixed points over a graph that is topologically ordered
//! by construction, so they terminate in at most one full rescan per
//! component. Circuits are small and this runs at generation time, never at
//! runtime, so the quadratic worst case is acceptable.

use std::collections::HashSet;

use crate::callset::find_callset_for;
use crate::circuit::{CircuitData, Component, ComponentOutput};
use crate::definition::CallSpec;
use crate::error::CircuitResult;

/// One component scheduled to run in a trigger's call tree, paired with the
/// callset dispatch already resolved for it.
#[derive(Debug, Clone, Copy)]
pub struct CalledComponent<'a> {
    pub component: &'a Component,
    pub callset: &'a CallSpec,
}

/// Conservative reachability: the ordered components that may run once any
/// seed output is written, plus the over-approximate set of outputs they may
/// produce. Result order is the insertion order in which components became
/// callable, a valid topological order given the no-back-reference invariant.
pub fn reachable_components<'a>(
    circuit: &'a CircuitData,
    seed_outputs: &HashSet<ComponentOutput>,
) -> CircuitResult<(Vec<&'a Component>, HashSet<ComponentOutput>)> {
    let mut used_outputs = seed_outputs.clone();
    let mut called: Vec<&Component> = Vec::new();
    let mut called_names: HashSet<&str> = HashSet::new();

    loop {
        let mut progressed = false;
        for component in circuit.components.values() {
            if called_names.contains(component.name.as_str()) {
                continue;
            }
            if !component
                .wired_outputs()
                .any(|output| used_outputs.contains(output))
            {
                continue;
            }
            let definition = circuit.definition_of(component)?;
            for output_name in definition.outputs() {
                used_outputs.insert(component.output(output_name));
            }
            called_names.insert(component.name.as_str());
            called.push(component);
            progressed = true;
        }
        if !progressed {
            break;
        }
    }

    Ok((called, used_outputs))
}

/// Exact refinement over the reachable list: dispatch each component against
/// the outputs definitely written so far, skip components whose triggering
/// inputs saw nothing fresh, skip skippable callsets, and propagate only the
/// matched callset's outputs.
pub fn find_all_children_of_from_outputs<'a>(
    circuit: &'a CircuitData,
    seed_outputs: &HashSet<ComponentOutput>,
) -> CircuitResult<Vec<CalledComponent<'a>>> {
    let (reachable, _) = reachable_components(circuit, seed_outputs)?;
    let mut written = seed_outputs.clone();
    let mut calls = Vec::new();

    for component in reachable {
        let definition = circuit.definition_of(component)?;
        let triggered = definition.triggering_inputs().iter().any(|input_name| {
            component
                .inputs
                .get(input_name)
                .is_some_and(|input| input.outputs().any(|output| written.contains(output)))
        });
        if !triggered {
            continue;
        }
        let callset = find_callset_for(component, definition, &written)?;
        if callset.is_skippable() {
            continue;
        }
        for output_name in &callset.outputs {
            written.insert(component.output(output_name.clone()));
        }
        calls.push(CalledComponent { component, callset });
    }

    Ok(calls)
}

/// Call tree of one external trigger event, seeded from the named externals.
pub fn find_all_children_of<'a, I, S>(
    triggered_externals: I,
    circuit: &'a CircuitData,
) -> CircuitResult<Vec<CalledComponent<'a>>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let seed: HashSet<ComponentOutput> = triggered_externals
        .into_iter()
        .map(|name| ComponentOutput::external(name.as_ref()))
        .collect();
    find_all_children_of_from_outputs(circuit, &seed)
}

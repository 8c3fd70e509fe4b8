//! Stored-versus-ephemeral classification of component outputs.
//!
//! An output may live on the stack of a single trigger's call tree only if
//! every reader runs inside that same tree. Any read that crosses a tree
//! boundary forces the output into the shared state struct, because a later,
//! separately triggered tree has no access to the producing tree's stack.

use std::collections::HashSet;

use crate::circuit::{Component, ComponentOutput};
use crate::definition::OutputSpec;
use crate::reachability::CalledComponent;

/// Outputs read by some component in `calls` whose producer is not itself
/// part of `calls`. These must be stored. External inputs are excluded; they
/// always live in the externals struct.
pub fn find_nonephemeral_outputs(calls: &[CalledComponent]) -> HashSet<ComponentOutput> {
    let called: HashSet<&str> = calls
        .iter()
        .map(|call| call.component.name.as_str())
        .collect();
    let mut stored = HashSet::new();
    for call in calls {
        for output in call.component.wired_outputs() {
            if output.is_external() {
                continue;
            }
            if !called.contains(output.parent.as_str()) {
                stored.insert(output.clone());
            }
        }
    }
    stored
}

/// Exactly three conditions, each independently flipping the result: no
/// cross-tree reader, no author override, and the definition marking the
/// output ephemeral-eligible.
pub fn is_ephemeral(
    component: &Component,
    output_name: &str,
    spec: &OutputSpec,
    non_ephemeral: &HashSet<ComponentOutput>,
) -> bool {
    !non_ephemeral.contains(&component.output(output_name))
        && !component.force_stored(output_name)
        && spec.ephemeral
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::CircuitBuilder;
    use crate::definition::{CallSpec, Definition};
    use crate::reachability::find_all_children_of;
    use crate::test_support::{add_definition, chain_circuit, input, output_spec, wires};
    use indexmap::IndexMap;

    #[test]
    fn same_tree_reader_keeps_output_ephemeral() {
        let circuit = chain_circuit(false);
        let calls = find_all_children_of(["a", "b", "c"], &circuit).unwrap();
        let stored = find_nonephemeral_outputs(&calls);
        assert!(stored.is_empty());

        let add1 = circuit.component("add1").unwrap();
        let spec = &circuit.definitions["add"].output_specs["out"];
        assert!(is_ephemeral(add1, "out", spec, &stored));
    }

    #[test]
    fn cross_tree_reader_forces_storage() {
        // observer fires on external d alone and reads add1.out, which is
        // produced in a different trigger's tree.
        let mut observer_def = Definition {
            inputs: IndexMap::new(),
            output_specs: IndexMap::new(),
            class_name: "Observer".to_string(),
            static_call: false,
            header: "signals/observer.hh".to_string(),
            callsets: Vec::new(),
            generic_callset: None,
            timer_callset: None,
            generics_order: Default::default(),
        };
        observer_def.inputs.insert("tick".to_string(), input(0));
        observer_def.inputs.insert("level".to_string(), input(1));
        observer_def
            .output_specs
            .insert("out".to_string(), output_spec("Output", true));
        observer_def.callsets.push(CallSpec {
            written_set: ["tick".to_string()].into_iter().collect(),
            observes: ["level".to_string()].into_iter().collect(),
            callback: Some("on_tick".to_string()),
            outputs: ["out".to_string()].into_iter().collect(),
            metadata: Vec::new(),
            input_struct_path: None,
        });

        let mut builder = CircuitBuilder::new();
        builder.add_definition("add", add_definition()).unwrap();
        builder.add_definition("observer", observer_def).unwrap();
        let a = builder.get_external("a", "double").unwrap();
        let b = builder.get_external("b", "double").unwrap();
        let d = builder.get_external("d", "Tick").unwrap();
        builder
            .make_component("add", "add1", wires(&[("a", a), ("b", b)]), IndexMap::new())
            .unwrap();
        let add1_out = builder.circuit().default_output("add1").unwrap();
        builder
            .make_component(
                "observer",
                "obs1",
                wires(&[("tick", d), ("level", add1_out.clone())]),
                IndexMap::new(),
            )
            .unwrap();
        let circuit = builder.finish().unwrap();

        let tree_ab = find_all_children_of(["a", "b"], &circuit).unwrap();
        let tree_d = find_all_children_of(["d"], &circuit).unwrap();
        assert!(find_nonephemeral_outputs(&tree_ab).is_empty());

        let stored = find_nonephemeral_outputs(&tree_d);
        assert!(stored.contains(&add1_out));

        let add1 = circuit.component("add1").unwrap();
        let spec = &circuit.definitions["add"].output_specs["out"];
        assert!(!is_ephemeral(add1, "out", spec, &stored));
    }

    #[test]
    fn each_condition_flips_the_result() {
        let stored_circuit = chain_circuit(true);
        let plain_circuit = chain_circuit(false);
        let spec = &plain_circuit.definitions["add"].output_specs["out"];
        let empty = HashSet::new();

        // force_stored flips it.
        let forced = stored_circuit.component("add1").unwrap();
        assert!(!is_ephemeral(forced, "out", spec, &empty));
        let plain = plain_circuit.component("add1").unwrap();
        assert!(is_ephemeral(plain, "out", spec, &empty));

        // cross-tree membership flips it.
        let cross: HashSet<ComponentOutput> =
            [plain.output("out")].into_iter().collect();
        assert!(!is_ephemeral(plain, "out", spec, &cross));

        // the definition's eligibility flag flips it.
        let mut ineligible = spec.clone();
        ineligible.ephemeral = false;
        assert!(!is_ephemeral(plain, "out", &ineligible, &empty));
    }
}

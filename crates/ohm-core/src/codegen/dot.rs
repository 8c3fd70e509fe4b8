//! Graphviz renderings of the circuit.
//!
//! Two views: a per-trigger graph showing exactly which components a call
//! group wakes (solid edges for written inputs, dashed for observed, dashed
//! nodes for referenced-but-uncalled producers), and a whole-circuit graph
//! with one edge per wire, solid when the input can trigger its component.

use std::collections::{BTreeSet, HashSet};

use crate::circuit::{CircuitData, ComponentOutput, EXTERNAL_PARENT};
use crate::metadata::{CallMetaData, GenerationMetadata};
use crate::reachability::{find_all_children_of, CalledComponent};

use super::CodegenResult;

/// The engine clock is written on every call and would edge into everything.
fn is_ignored(output: &ComponentOutput) -> bool {
    output.is_external() && output.output_name == "time"
}

fn node_name(output: &ComponentOutput) -> String {
    if output.is_external() {
        format!("{EXTERNAL_PARENT}_{}", output.output_name)
    } else {
        output.parent.clone()
    }
}

fn edge_label(output: &ComponentOutput, input_name: &str) -> String {
    if output.is_external() {
        input_name.to_string()
    } else {
        format!("{} -> {}", output.output_name, input_name)
    }
}

/// Inputs the callset dispatches on, written first, deduped.
fn callset_input_names(callset: &crate::definition::CallSpec) -> Vec<&str> {
    let mut names: Vec<&str> = callset.written_set.iter().map(String::as_str).collect();
    for observed in &callset.observes {
        if !callset.written_set.contains(observed) {
            names.push(observed);
        }
    }
    names
}

fn generate_dot_for_called(
    external_triggered: &BTreeSet<ComponentOutput>,
    all_called: &[CalledComponent<'_>],
) -> String {
    let mut called_outputs: HashSet<ComponentOutput> = external_triggered.iter().cloned().collect();
    for called in all_called {
        for output in &called.callset.outputs {
            called_outputs.insert(called.component.output(output.clone()));
        }
    }

    let mut all_outputs: BTreeSet<ComponentOutput> = BTreeSet::new();
    for called in all_called {
        for input_name in callset_input_names(called.callset) {
            if let Some(input) = called.component.inputs.get(input_name) {
                all_outputs.extend(input.outputs().cloned());
            }
        }
    }

    let mut uncalled_parents: BTreeSet<&str> = BTreeSet::new();
    let mut uncalled_externals: BTreeSet<&ComponentOutput> = BTreeSet::new();
    for output in &all_outputs {
        if called_outputs.contains(output) {
            continue;
        }
        if output.is_external() {
            if !external_triggered.contains(output) && !is_ignored(output) {
                uncalled_externals.insert(output);
            }
        } else {
            uncalled_parents.insert(&output.parent);
        }
    }

    let mut lines = Vec::new();
    let mut external_nodes = Vec::new();

    for trigger in external_triggered {
        let name = node_name(trigger);
        lines.push(format!("{name} [shape=box label=\"{name}\"]"));
        external_nodes.push(name);
    }
    for untriggered in &uncalled_externals {
        let name = node_name(untriggered);
        lines.push(format!("{name} [shape=box label=\"{name}\" style=dashed]"));
        external_nodes.push(name);
    }

    let node_list: String = external_nodes
        .iter()
        .map(|name| format!("{name}; "))
        .collect::<String>()
        .trim_end()
        .to_string();
    lines.push(format!("{{rank=same; {node_list}}}"));

    for called in all_called {
        let callback = called.callset.callback.as_deref().unwrap_or("<generic>");
        lines.push(format!(
            "{name} [label=\"{name}::{callback}\"]",
            name = called.component.name,
        ));
    }
    for parent in &uncalled_parents {
        lines.push(format!("{parent} [style=dashed]"));
    }

    for called in all_called {
        for input_name in callset_input_names(called.callset) {
            let Some(input) = called.component.inputs.get(input_name) else {
                continue;
            };
            for output in input.outputs() {
                if is_ignored(&output) && !external_triggered.contains(&output) {
                    continue;
                }
                let style = if called.callset.written_set.contains(input_name) {
                    "solid"
                } else {
                    "dashed"
                };
                lines.push(format!(
                    "{parent} -> {own} [style={style} label=\"{label}\"]",
                    parent = node_name(&output),
                    own = called.component.name,
                    label = edge_label(&output, input_name),
                ));
            }
        }
    }

    lines.join("\n")
}

/// Dot graph of the components one call group wakes.
pub fn generate_external_dot_body_for(
    meta: &CallMetaData,
    gen_data: &GenerationMetadata<'_>,
) -> CodegenResult<String> {
    let children = find_all_children_of(&meta.triggered, gen_data.circuit)?;
    let triggered: BTreeSet<ComponentOutput> = meta
        .triggered
        .iter()
        .map(ComponentOutput::external)
        .collect();

    let dot_lines = generate_dot_for_called(&triggered, &children);
    Ok(format!("digraph {{\n{dot_lines}\n}}"))
}

/// Dot graph of every wire in the circuit, trigger-agnostic.
pub fn generate_full_circuit_dot(circuit: &CircuitData) -> CodegenResult<String> {
    let mut used_outputs: HashSet<ComponentOutput> = HashSet::new();
    for component in circuit.components.values() {
        for input in component.inputs.values() {
            used_outputs.extend(input.outputs().cloned());
        }
    }

    let mut lines = Vec::new();
    let mut external_nodes = Vec::new();
    for external in circuit.externals.values() {
        if used_outputs.contains(&external.output()) {
            let name = node_name(&external.output());
            lines.push(format!("{name} [shape=box label=\"{name}\"]"));
            external_nodes.push(name);
        }
    }
    let node_list: String = external_nodes
        .iter()
        .map(|name| format!("{name}; "))
        .collect::<String>()
        .trim_end()
        .to_string();
    lines.push(format!("{{rank=same; {node_list}}}"));

    for component in circuit.components.values() {
        lines.push(format!(
            "{name} [label=\"{name}\"]",
            name = component.name
        ));

        let definition = circuit.definition_of(component)?;
        let triggering = definition.triggering_inputs();
        for (input_name, input) in &component.inputs {
            let style = if triggering.contains(input_name) {
                "solid"
            } else {
                "dashed"
            };
            for output in input.outputs() {
                lines.push(format!(
                    "{parent} -> {own} [style={style} label=\"{label}\"]",
                    parent = node_name(&output),
                    own = component.name,
                    label = edge_label(&output, input_name),
                ));
            }
        }
    }

    Ok(format!("digraph {{\n{}\n}}", lines.join("\n")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::generate_global_metadata;
    use crate::test_support::grouped_circuit;

    #[test]
    fn trigger_dot_names_callbacks_and_edge_styles() {
        let circuit = grouped_circuit(false);
        let gen_data = generate_global_metadata(&circuit, "TickCircuit").unwrap();
        let dot =
            generate_external_dot_body_for(&gen_data.call_endpoints[0], &gen_data).unwrap();

        assert!(dot.starts_with("digraph {\n"));
        assert!(dot.contains("external_a [shape=box label=\"external_a\"]"));
        assert!(dot.contains("{rank=same;"));
        assert!(dot.contains("add1 [label=\"add1::doadd\"]"));
        assert!(dot.contains("external_a -> add1 [style=solid label=\"a\"]"));
        assert!(dot.contains("add1 -> add2 [style=solid label=\"out -> a\"]"));
        assert!(dot.ends_with("\n}"));
    }

    #[test]
    fn observed_uncalled_parent_is_dashed() {
        use crate::circuit::CircuitBuilder;
        use crate::definition::{CallSpec, Definition};
        use crate::test_support::{callset, input, output_spec, wires};
        use indexmap::IndexMap;

        let mut src = Definition {
            inputs: IndexMap::new(),
            output_specs: IndexMap::new(),
            class_name: "Source".to_string(),
            static_call: false,
            header: "signals/source.hh".to_string(),
            callsets: vec![callset(&["x"], &["out"], "on_x")],
            generic_callset: None,
            timer_callset: None,
            generics_order: Default::default(),
        };
        src.inputs.insert("x".to_string(), input(0));
        src.output_specs
            .insert("out".to_string(), output_spec("Output", false));

        let mut reader = Definition {
            inputs: IndexMap::new(),
            output_specs: IndexMap::new(),
            class_name: "Reader".to_string(),
            static_call: false,
            header: "signals/reader.hh".to_string(),
            callsets: vec![CallSpec {
                written_set: ["w".to_string()].into_iter().collect(),
                observes: ["o".to_string()].into_iter().collect(),
                callback: Some("on_w".to_string()),
                outputs: Default::default(),
                metadata: Vec::new(),
                input_struct_path: None,
            }],
            generic_callset: None,
            timer_callset: None,
            generics_order: Default::default(),
        };
        reader.inputs.insert("w".to_string(), input(0));
        reader.inputs.insert("o".to_string(), input(1));

        let mut builder = CircuitBuilder::new();
        builder.add_definition("src", src).unwrap();
        builder.add_definition("reader", reader).unwrap();
        let u = builder.get_external("u", "double").unwrap();
        let t = builder.get_external("t", "double").unwrap();
        builder
            .make_component("src", "level", wires(&[("x", u)]), IndexMap::new())
            .unwrap();
        let level_out = builder.circuit().default_output("level").unwrap();
        builder
            .make_component(
                "reader",
                "watch",
                wires(&[("w", t), ("o", level_out)]),
                IndexMap::new(),
            )
            .unwrap();
        let circuit = builder.finish().unwrap();

        let gen_data = generate_global_metadata(&circuit, "TickCircuit").unwrap();
        // Trigger only t: watch runs, level never does.
        let meta = CallMetaData {
            call_name: "on_t".to_string(),
            triggered: vec!["t".to_string()],
        };
        let dot = generate_external_dot_body_for(&meta, &gen_data).unwrap();

        assert!(dot.contains("level [style=dashed]"));
        assert!(dot.contains("level -> watch [style=dashed label=\"out -> o\"]"));
        assert!(dot.contains("external_t -> watch [style=solid label=\"w\"]"));
        assert!(!dot.contains("watch [style=dashed]"));
    }

    #[test]
    fn circuit_dot_lists_all_wires() {
        let circuit = grouped_circuit(false);
        let dot = generate_full_circuit_dot(&circuit).unwrap();
        assert!(dot.contains("external_a [shape=box label=\"external_a\"]"));
        assert!(dot.contains("add2 [label=\"add2\"]"));
        assert!(dot.contains("external_c -> add2 [style=solid label=\"b\"]"));
        assert!(dot.contains("add1 -> add2 [style=solid label=\"out -> a\"]"));
    }
}

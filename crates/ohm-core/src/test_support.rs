//! Shared fixtures for unit tests across the crate.

use indexmap::IndexMap;

use crate::circuit::{
    CallGroup, CallStruct, CircuitBuilder, CircuitData, ComponentOutput, InputWiring,
    OutputOptions,
};
use crate::definition::{CallSpec, Definition, InputDecl, InputKind, OutputSpec};

pub(crate) fn input(index: u32) -> InputDecl {
    InputDecl {
        index,
        always_valid: false,
        kind: InputKind::Single,
    }
}

pub(crate) fn output_spec(type_path: &str, ephemeral: bool) -> OutputSpec {
    OutputSpec {
        type_path: type_path.to_string(),
        ephemeral,
        always_valid: false,
        assume_default: false,
        assume_invalid: false,
    }
}

pub(crate) fn callset(written: &[&str], outputs: &[&str], callback: &str) -> CallSpec {
    CallSpec {
        written_set: written.iter().map(|s| s.to_string()).collect(),
        observes: Default::default(),
        callback: Some(callback.to_string()),
        outputs: outputs.iter().map(|s| s.to_string()).collect(),
        metadata: Vec::new(),
        input_struct_path: None,
    }
}

/// Three-input, two-output definition with two overlapping callsets, the
/// workhorse for dispatch and validation tests.
pub(crate) fn basic_definition() -> Definition {
    let mut inputs = IndexMap::new();
    inputs.insert("a".to_string(), input(0));
    inputs.insert("b".to_string(), input(1));
    inputs.insert("c".to_string(), input(2));

    let mut output_specs = IndexMap::new();
    output_specs.insert("out_a".to_string(), output_spec("OutA", true));
    output_specs.insert("out_b".to_string(), output_spec("OutB", false));

    Definition {
        inputs,
        output_specs,
        class_name: "TestSignal".to_string(),
        static_call: false,
        header: "signals/test_signal.hh".to_string(),
        callsets: vec![
            callset(&["a", "b"], &["out_a"], "on_ab"),
            callset(&["b", "c"], &["out_b"], "on_bc"),
        ],
        generic_callset: None,
        timer_callset: None,
        generics_order: Default::default(),
    }
}

/// `add(a, b) -> out`, with an ephemeral-eligible single output.
pub(crate) fn add_definition() -> Definition {
    let mut inputs = IndexMap::new();
    inputs.insert("a".to_string(), input(0));
    inputs.insert("b".to_string(), input(1));

    let mut output_specs = IndexMap::new();
    output_specs.insert("out".to_string(), output_spec("Output", true));

    Definition {
        inputs,
        output_specs,
        class_name: "AdderClass".to_string(),
        static_call: false,
        header: "signals/adder.hh".to_string(),
        callsets: vec![callset(&["a", "b"], &["out"], "doadd")],
        generic_callset: None,
        timer_callset: None,
        generics_order: Default::default(),
    }
}

pub(crate) fn wires(pairs: &[(&str, ComponentOutput)]) -> IndexMap<String, InputWiring> {
    pairs
        .iter()
        .map(|(name, output)| (name.to_string(), InputWiring::Single(output.clone())))
        .collect()
}

pub(crate) fn force_stored(output: &str) -> IndexMap<String, OutputOptions> {
    let mut options = IndexMap::new();
    options.insert(output.to_string(), OutputOptions { force_stored: true });
    options
}

/// `add1 = add(ext.a, ext.b)`, `add2 = add(add1.out, ext.c)`. With
/// `force_add1` the intermediate output is pinned to storage.
pub(crate) fn chain_circuit(force_add1: bool) -> CircuitData {
    let mut builder = CircuitBuilder::new();
    builder.add_definition("add", add_definition()).unwrap();
    let a = builder.get_external("a", "double").unwrap();
    let b = builder.get_external("b", "double").unwrap();
    let c = builder.get_external("c", "double").unwrap();
    let options = if force_add1 {
        force_stored("out")
    } else {
        IndexMap::new()
    };
    builder
        .make_component("add", "add1", wires(&[("a", a), ("b", b)]), options)
        .unwrap();
    let add1_out = builder.circuit().default_output("add1").unwrap();
    builder
        .make_component(
            "add",
            "add2",
            wires(&[("a", add1_out), ("b", c)]),
            IndexMap::new(),
        )
        .unwrap();
    builder.finish().unwrap()
}

/// [`chain_circuit`] plus one call group triggering all three externals.
pub(crate) fn grouped_circuit(force_add1: bool) -> CircuitData {
    let mut circuit = chain_circuit(force_add1);
    let mut fields = IndexMap::new();
    fields.insert("a".to_string(), "double".to_string());
    fields.insert("b".to_string(), "double".to_string());
    fields.insert("c".to_string(), "double".to_string());
    circuit.call_structs.insert(
        "TickInput".to_string(),
        CallStruct {
            fields: fields.clone(),
            external_struct: None,
        },
    );
    let external_mapping: IndexMap<String, String> = fields
        .keys()
        .map(|field| (field.clone(), field.clone()))
        .collect();
    circuit.call_groups.insert(
        "on_tick".to_string(),
        CallGroup {
            struct_name: "TickInput".to_string(),
            external_mapping,
        },
    );
    circuit.validate().unwrap();
    circuit
}

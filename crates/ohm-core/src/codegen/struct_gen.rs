//! Emission of the persistent engine struct.
//!
//! One struct holds everything the generated engine owns: the externals
//! mirror, the stored-output block with its shared validity array, the
//! stateful component objects, the wire-facing input struct types, and one
//! member declaration per trigger and timer. Type aliases for every wired
//! input and produced output are emitted first so signal headers, call
//! bodies, and hand-written call sites all agree on spellings.

use std::collections::BTreeSet;

use crate::circuit::{CircuitData, Component, ComponentInput};
use crate::metadata::GenerationMetadata;

use super::call_body::generate_call_signature;
use super::names::{self, TIME_TYPE};
use super::timer::generate_timer_signature;
use super::CodegenResult;

/// Runtime headers every generated translation unit needs.
pub const DEFAULT_HEADERS: [&str; 5] = [
    "cppcuit/circuit.hh",
    "cppcuit/optional_reference.hh",
    "cppcuit/packed_optional.hh",
    "cppcuit/raw_call.hh",
    "timer/timer_queue.hh",
];

pub const STD_HEADERS: [&str; 2] = ["cstdint", "type_traits"];

/// Signal headers required by the circuit's components, sorted and deduped.
pub fn struct_headers_for(circuit: &CircuitData) -> CodegenResult<BTreeSet<String>> {
    let mut headers = BTreeSet::new();
    for component in circuit.components.values() {
        headers.insert(circuit.definition_of(component)?.header.clone());
    }
    Ok(headers)
}

fn generate_externals_struct(circuit: &CircuitData) -> String {
    let fields: Vec<String> = circuit
        .externals
        .values()
        .map(|ext| format!("{} {};", ext.ty, ext.name))
        .collect();

    let asserts: BTreeSet<String> = circuit
        .externals
        .values()
        .map(|ext| {
            format!(
                "static_assert(std::is_default_constructible_v<{ty}>, \"External {name} with type {ty} must be default constructible\");",
                ty = ext.ty,
                name = ext.name,
            )
        })
        .collect();

    // The engine clock lives beside the externals unless the circuit wires
    // its own `time` external.
    let time_field = if circuit.externals.contains_key("time") {
        String::new()
    } else {
        format!("{TIME_TYPE} time = 0;")
    };

    format!(
        "struct Externals final {{
{asserts}

{fields}
{time_field}

bool is_valid[{count}];

Externals() = default;
}};",
        asserts = asserts.into_iter().collect::<Vec<_>>().join("\n"),
        fields = fields.join("\n"),
        count = circuit.externals.len(),
    )
}

fn generate_outputs_struct(gen_data: &GenerationMetadata<'_>) -> CodegenResult<String> {
    let circuit = gen_data.circuit;
    let mut fields = Vec::new();
    let mut asserts = BTreeSet::new();
    for component in circuit.components.values() {
        let definition = circuit.definition_of(component)?;
        let annotated = gen_data.annotated(&component.name);
        for (output, spec) in &definition.output_specs {
            let type_name = format!(
                "{}::{}",
                names::class_alias(&component.name),
                spec.type_path
            );
            asserts.insert(format!(
                "static_assert(std::is_default_constructible_v<{type_name}>, \"Output {output} of component {name} must be default constructible\");",
                name = component.name,
            ));
            if !annotated.output(output).is_ephemeral {
                fields.push(format!(
                    "{type_name} {};",
                    names::stored_field(&component.name, output)
                ));
            }
        }
    }

    Ok(format!(
        "struct Outputs final {{
{asserts}

{fields}

bool is_valid[{count}];

Outputs() = default;
}};",
        asserts = asserts.into_iter().collect::<Vec<_>>().join("\n"),
        fields = fields.join("\n"),
        count = gen_data.validity_marker_count,
    ))
}

fn generate_objects_struct(gen_data: &GenerationMetadata<'_>) -> CodegenResult<String> {
    let circuit = gen_data.circuit;
    let mut fields = Vec::new();
    let mut asserts = BTreeSet::new();
    for component in circuit.components.values() {
        let definition = circuit.definition_of(component)?;
        let alias = names::class_alias(&component.name);
        asserts.insert(format!(
            "static_assert(std::is_default_constructible_v<{alias}>, \"Class {class_name} for component {name} must always be default constructible\");",
            class_name = definition.class_name,
            name = component.name,
        ));
        if !definition.static_call {
            fields.push(format!("{alias} {};", component.name));
        }
    }

    Ok(format!(
        "struct Objects final {{
{asserts}

{fields}

Objects() = default;
}};",
        asserts = asserts.into_iter().collect::<Vec<_>>().join("\n"),
        fields = fields.join("\n"),
    ))
}

fn input_source_type(circuit: &CircuitData, output: &crate::circuit::ComponentOutput) -> String {
    if output.is_external() {
        circuit.externals[&output.output_name].ty.clone()
    } else {
        names::output_type_alias(&output.parent, &output.output_name)
    }
}

/// Type aliases for one component: wired input types, the resolved class
/// alias, and one alias per produced output.
fn using_declarations_for(
    circuit: &CircuitData,
    component: &Component,
) -> CodegenResult<Vec<String>> {
    let definition = circuit.definition_of(component)?;
    let mut usings = Vec::new();

    for (input_name, input) in &component.inputs {
        match input {
            ComponentInput::Single { output, .. } => {
                usings.push(format!(
                    "using {} = {};",
                    names::input_type_alias(&component.name, input_name),
                    input_source_type(circuit, output),
                ));
            }
            ComponentInput::Array { batches, .. } => {
                // Batches are homogeneous; the first wire names the type.
                for (idx, batch) in batches.iter().enumerate() {
                    if let Some(output) = batch.fields.values().next() {
                        usings.push(format!(
                            "using {} = {};",
                            names::array_input_type_alias(&component.name, input_name, idx),
                            input_source_type(circuit, output),
                        ));
                    }
                }
            }
        }
    }

    let generics = names::class_generics(component, &definition.ordered_generic_inputs());
    usings.push(format!(
        "using {} = {}{generics};",
        names::class_alias(&component.name),
        definition.class_name,
    ));

    for (output, spec) in &definition.output_specs {
        usings.push(format!(
            "using {} = {}::{};",
            names::output_type_alias(&component.name, output),
            names::class_alias(&component.name),
            spec.type_path,
        ));
    }

    Ok(usings)
}

fn generate_input_types(circuit: &CircuitData) -> String {
    let structs: Vec<String> = circuit
        .call_structs
        .iter()
        .map(|(name, call_struct)| match &call_struct.external_struct {
            Some(external) => format!("using {name} = {};", external.struct_name),
            None => {
                let fields: Vec<String> = call_struct
                    .fields
                    .iter()
                    .map(|(field, ty)| format!("Optionally<{ty}>::Optional {field};"))
                    .collect();
                format!("struct {name} {{\n{}\n}};", fields.join("\n"))
            }
        })
        .collect();
    format!("struct InputTypes {{\n{}\n}};", structs.join("\n"))
}

/// The complete engine struct definition.
pub fn generate_circuit_struct(gen_data: &GenerationMetadata<'_>) -> CodegenResult<String> {
    let circuit = gen_data.circuit;

    let mut usings = Vec::new();
    for component in circuit.components.values() {
        usings.extend(using_declarations_for(circuit, component)?);
    }

    let externals = generate_externals_struct(circuit);
    let outputs = generate_outputs_struct(gen_data)?;
    let objects = generate_objects_struct(gen_data)?;
    let input_types = generate_input_types(circuit);

    let mut calls = Vec::new();
    for meta in &gen_data.call_endpoints {
        calls.push(format!("{};", generate_call_signature(meta, circuit, "")?));
    }

    let mut timer_calls = Vec::new();
    for component in crate::metadata::timer_components(circuit)? {
        timer_calls.push(format!("{};", generate_timer_signature(component, "")));
    }

    Ok(format!(
        "struct {name} final : public Circuit {{
{usings}

using OWN_STRUCT_NAME = {name};

{externals}
Externals externals;

{outputs}
Outputs outputs;

{objects}
Objects objects;

{input_types}

{calls}

{timer_calls}

void update_time({TIME_TYPE} new_time) {{
    externals.time = new_time > externals.time ? new_time : externals.time;
}}
}};",
        name = gen_data.struct_name,
        usings = usings.join("\n"),
        calls = calls.join("\n"),
        timer_calls = timer_calls.join("\n"),
    ))
}

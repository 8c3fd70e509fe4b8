//! Emission of one component's callback invocation inside a trigger body.
//!
//! A call site is assembled from up to four [`CallData`] concerns: single
//! input bindings, array-batch bindings, output bindings with validity
//! write-back, and extra metadata aggregates (timer handles). Array callsets
//! emit one invocation per written batch, initializing outputs only on the
//! first.

use std::collections::HashSet;

use crate::circuit::{Component, ComponentInput, ComponentOutput};
use crate::definition::{CallSpec, Definition, MetadataParam};
use crate::metadata::{AnnotatedComponent, GenerationMetadata};
use crate::reachability::CalledComponent;

use super::calldata::{assemble_call_from, CallData, ReturnValue};
use super::names::{
    self, ARRAY_INPUT_NAME, ARRAY_INPUT_STRUCT_NAME, INPUT_NAME, INPUT_STRUCT_NAME,
    META_STRUCT_TYPE, META_VAR_NAME, MYSELF_VAR, OUTPUT_NAME, OUTPUT_STRUCT_NAME,
    TIMER_HANDLE_TYPE, TIMER_VAR_NAME, VALID_DATA_NAME,
};
use super::{CodegenError, CodegenResult};

/// Wired inputs a callset touches, written first, then observed.
fn callset_inputs<'a>(
    callset: &'a CallSpec,
    component: &'a Component,
) -> Vec<(&'a String, &'a ComponentInput)> {
    callset
        .inputs()
        .filter_map(|input_name| {
            component
                .inputs
                .get_key_value(input_name)
                .map(|(name, input)| (name, input))
        })
        .collect()
}

fn input_binding_lines(
    definition: &Definition,
    input_name: &str,
    type_name: &str,
    output: &ComponentOutput,
    gen_data: &GenerationMetadata<'_>,
    written: &HashSet<ComponentOutput>,
) -> String {
    let valid = names::source_valid_path(output, gen_data);
    let value = names::source_value_path(output, gen_data, written);
    if definition.inputs[input_name].always_valid {
        format!(
            "static_assert(\n    {valid},\n    \"If this fails internal codegen error - always valid input always constexpr true\"\n);\nconst {type_name} &{input_name}_v = {value};"
        )
    } else {
        format!(
            "bool is_{input_name}_v = {valid};\noptional_reference<const {type_name}> {input_name}_v({value}, is_{input_name}_v);"
        )
    }
}

/// Bind every single (non-array) input the callset touches and aggregate them
/// into the `__input__` struct passed to the callback.
pub fn generate_single_input_calldata(
    component: &Component,
    definition: &Definition,
    callset: &CallSpec,
    gen_data: &GenerationMetadata<'_>,
    written: &HashSet<ComponentOutput>,
) -> CallData {
    let singles: Vec<(&String, &ComponentOutput)> = callset_inputs(callset, component)
        .into_iter()
        .filter_map(|(name, input)| match input {
            ComponentInput::Single { output, .. } => Some((name, output)),
            ComponentInput::Array { .. } => None,
        })
        .collect();
    if singles.is_empty() {
        return CallData::default();
    }

    let values: Vec<String> = singles
        .iter()
        .map(|(input_name, output)| {
            let type_name = names::input_type_alias(&component.name, input_name);
            input_binding_lines(definition, input_name, &type_name, output, gen_data, written)
        })
        .collect();

    // Field and initializer order must agree, so both are sorted by input
    // name; callsets aliasing a native input struct declare fields likewise.
    let mut struct_fields: Vec<String> = singles
        .iter()
        .map(|(input_name, _)| {
            let type_name = names::input_type_alias(&component.name, input_name);
            if definition.inputs[*input_name].always_valid {
                format!("const {type_name} &{input_name};")
            } else {
                format!("optional_reference<const {type_name}> {input_name};")
            }
        })
        .collect();
    struct_fields.sort();

    let mut initializers: Vec<String> = singles
        .iter()
        .map(|(input_name, _)| format!(".{input_name} = {input_name}_v,"))
        .collect();
    initializers.sort();

    let (struct_decl, struct_name) = match &callset.input_struct_path {
        None => (
            format!("struct {INPUT_STRUCT_NAME} {{\n{}\n}};", struct_fields.join("\n")),
            INPUT_STRUCT_NAME.to_string(),
        ),
        Some(path) => (
            String::new(),
            format!("{}::{path}", names::class_alias(&component.name)),
        ),
    };

    let local_prefix = format!(
        "{struct_decl}\n\n{}\n\n{struct_name} {INPUT_NAME} = {{\n{}\n}};",
        values.join("\n"),
        initializers.join("\n"),
    );

    CallData {
        local_prefix,
        call_params: vec![INPUT_NAME.to_string()],
        ..CallData::default()
    }
}

/// Bind batch `idx` of the callset's array input into `__array_input__`.
fn generate_array_input_calldata(
    component: &Component,
    definition: &Definition,
    callset: &CallSpec,
    array_input_name: &str,
    gen_data: &GenerationMetadata<'_>,
    written: &HashSet<ComponentOutput>,
    idx: usize,
) -> CallData {
    let ComponentInput::Array { batches, .. } = &component.inputs[array_input_name] else {
        unreachable!("array call selected a non-array input");
    };
    let batch = &batches[idx];
    let type_name = names::array_input_type_alias(&component.name, array_input_name, idx);
    let always_valid = definition.inputs[array_input_name].always_valid;

    let mut values = Vec::new();
    let mut struct_fields = Vec::new();
    let mut initializers = Vec::new();
    for (field, output) in &batch.fields {
        let valid = names::source_valid_path(output, gen_data);
        let value = names::source_value_path(output, gen_data, written);
        if always_valid {
            values.push(format!(
                "array_reference<const {type_name}> {field}_v({value}, {idx});"
            ));
            struct_fields.push(format!("array_reference<const {type_name}> {field};"));
        } else {
            values.push(format!(
                "bool is_{field}_v = {valid};\narray_optional<const {type_name}> {field}_v({value}, is_{field}_v, {idx});"
            ));
            struct_fields.push(format!("array_optional<const {type_name}> {field};"));
        }
        initializers.push(format!(".{field} = {field}_v,"));
    }
    struct_fields.sort();
    initializers.sort();

    let (struct_decl, struct_name) = match &callset.input_struct_path {
        None => (
            format!(
                "struct {ARRAY_INPUT_STRUCT_NAME} {{\n{}\n}};",
                struct_fields.join("\n")
            ),
            ARRAY_INPUT_STRUCT_NAME.to_string(),
        ),
        Some(path) => (
            String::new(),
            format!("{}::{path}", names::class_alias(&component.name)),
        ),
    };

    let local_prefix = format!(
        "{struct_decl}\n\n{}\n\n{struct_name} {ARRAY_INPUT_NAME} = {{\n{}\n}};",
        values.join("\n"),
        initializers.join("\n"),
    );

    CallData {
        local_prefix,
        call_params: vec![ARRAY_INPUT_NAME.to_string()],
        ..CallData::default()
    }
}

fn output_value_inits(
    annotated: &AnnotatedComponent,
    component: &Component,
    definition: &Definition,
    outputs: &[&String],
) -> String {
    let alias = names::class_alias(&component.name);
    let mut lines = Vec::new();
    for output in outputs {
        let spec = &definition.output_specs[*output];
        let type_header = format!("{alias}::{}", spec.type_path);
        let ref_name = names::local_output_ref(&component.name, output);
        if annotated.output(output).is_ephemeral {
            let value_var = names::ephemeral_value_var(&component.name, output);
            lines.push(format!("{type_header} {value_var}{{}};"));
            lines.push(format!("{type_header}& {ref_name} = {value_var};"));
        } else {
            lines.push(format!(
                "{type_header}& {ref_name} = _outputs.{};",
                names::stored_field(&component.name, output)
            ));
        }
    }
    lines.join("\n")
}

fn output_validity_inits(
    annotated: &AnnotatedComponent,
    component: &Component,
    definition: &Definition,
    outputs: &[&String],
) -> String {
    let mut lines = Vec::new();
    for output in outputs {
        let metadata = annotated.output(output);
        // Stored slots persist in the shared array and need no init here.
        if metadata.validity_index.is_some() {
            continue;
        }
        let path = names::valid_path(annotated, &component.name, output);
        if definition.output_specs[*output].always_valid {
            lines.push(format!("constexpr bool {path} = true;"));
        } else {
            lines.push(format!("bool {path} = false;"));
        }
    }
    lines.join("\n")
}

fn output_validity_deconstruction(
    annotated: &AnnotatedComponent,
    component: &Component,
    definition: &Definition,
    outputs: &[&String],
) -> String {
    match outputs {
        [] => String::new(),
        [only] => {
            if definition.output_specs[*only].always_valid {
                return String::new();
            }
            let path = names::valid_path(annotated, &component.name, only);
            format!("{path} = {VALID_DATA_NAME};")
        }
        many => many
            .iter()
            .filter(|output| !definition.output_specs[**output].always_valid)
            .map(|output| {
                let path = names::valid_path(annotated, &component.name, output);
                format!("{path} = {VALID_DATA_NAME}.{output};")
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

/// Bind the callset's outputs: backing values (stored field or ephemeral
/// stack variable), validity-flag inits, the `__output__` aggregate of
/// references, and the post-call validity write-back.
pub fn generate_output_calldata(
    annotated: &AnnotatedComponent,
    component: &Component,
    definition: &Definition,
    callset: &CallSpec,
    initialize_outputs: bool,
) -> CallData {
    let outputs: Vec<&String> = callset.outputs.iter().collect();

    let global_prefix = if initialize_outputs {
        let values = output_value_inits(annotated, component, definition, &outputs);
        let validity = output_validity_inits(annotated, component, definition, &outputs);
        format!("{values}\n{validity}")
    } else {
        String::new()
    };

    let struct_fields: Vec<String> = outputs
        .iter()
        .map(|output| {
            format!(
                "{}& {output};",
                names::output_type_alias(&component.name, output)
            )
        })
        .collect();
    let initializers: Vec<String> = outputs
        .iter()
        .map(|output| {
            format!(
                ".{output} = {},",
                names::local_output_ref(&component.name, output)
            )
        })
        .collect();
    let local_prefix = format!(
        "struct {OUTPUT_STRUCT_NAME} {{\n{}\n}};\n\n{OUTPUT_STRUCT_NAME} {OUTPUT_NAME} {{\n{}\n}};",
        struct_fields.join("\n"),
        initializers.join("\n"),
    );

    let deconstruction =
        output_validity_deconstruction(annotated, component, definition, &outputs);
    let return_value = if deconstruction.is_empty() {
        None
    } else {
        Some(ReturnValue::new(VALID_DATA_NAME))
    };

    CallData {
        global_prefix,
        local_prefix,
        call_params: vec![OUTPUT_NAME.to_string()],
        local_postfix: deconstruction,
        return_value,
    }
}

/// Build the `__metadata__` aggregate of extra callback parameters.
pub fn generate_metadata_calldata(component: &Component, metadata: &[MetadataParam]) -> CallData {
    let mut local_lines = Vec::new();
    let mut struct_lines = Vec::new();
    let mut struct_inits = Vec::new();
    for meta in metadata {
        match meta {
            MetadataParam::Timer => {
                let callback = names::timer_callback_name(&component.name);
                local_lines.push(format!(
                    "{TIMER_HANDLE_TYPE} {TIMER_VAR_NAME}({MYSELF_VAR}->timer, {callback});"
                ));
                struct_lines.push(format!("{TIMER_HANDLE_TYPE} {};", meta.field_name()));
                struct_inits.push(format!(".{} = {TIMER_VAR_NAME}", meta.field_name()));
            }
        }
    }
    let local_prefix = format!(
        "{}\n\nstruct {META_STRUCT_TYPE} {{\n{}\n}};\n\n{META_STRUCT_TYPE} {META_VAR_NAME} {{\n{}\n}};",
        local_lines.join("\n"),
        struct_lines.join("\n"),
        struct_inits.join("\n"),
    );
    CallData {
        local_prefix,
        call_params: vec![META_VAR_NAME.to_string()],
        ..CallData::default()
    }
}

fn written_array_inputs<'a>(
    component: &'a Component,
    callset: &'a CallSpec,
) -> Vec<(&'a String, &'a ComponentInput)> {
    callset
        .written_set
        .iter()
        .filter_map(|name| component.inputs.get_key_value(name))
        .filter(|(_, input)| matches!(input, ComponentInput::Array { .. }))
        .collect()
}

fn generate_array_call(
    called: &CalledComponent<'_>,
    definition: &Definition,
    gen_data: &GenerationMetadata<'_>,
    written: &HashSet<ComponentOutput>,
    callback: &str,
) -> CodegenResult<String> {
    let component = called.component;
    let callset = called.callset;
    let annotated = gen_data.annotated(&component.name);

    let arrays = written_array_inputs(component, callset);
    let (array_name, array_input) = match arrays.as_slice() {
        [only] => *only,
        other => {
            return Err(CodegenError::ArrayInputCount {
                component: component.name.clone(),
                count: other.len(),
            });
        }
    };
    let ComponentInput::Array { batches, .. } = array_input else {
        unreachable!();
    };

    let written_indices: Vec<usize> = batches
        .iter()
        .enumerate()
        .filter(|(_, batch)| batch.outputs().any(|output| written.contains(output)))
        .map(|(idx, _)| idx)
        .collect();
    if written_indices.is_empty() {
        return Err(CodegenError::NoWrittenBatches {
            component: component.name.clone(),
        });
    }

    let call_path = format!("{}{callback}", annotated.call_root);
    let mut calls = Vec::new();
    let mut initialize_outputs = true;
    for idx in written_indices {
        let mut call_data = vec![
            generate_single_input_calldata(component, definition, callset, gen_data, written),
            generate_array_input_calldata(
                component, definition, callset, array_name, gen_data, written, idx,
            ),
        ];
        if !callset.outputs.is_empty() {
            call_data.push(generate_output_calldata(
                annotated,
                component,
                definition,
                callset,
                initialize_outputs,
            ));
            initialize_outputs = false;
        }
        if !callset.metadata.is_empty() {
            call_data.push(generate_metadata_calldata(component, &callset.metadata));
        }
        calls.push(assemble_call_from(&call_path, &call_data)?);
    }
    Ok(calls.join("\n\n"))
}

/// Emit the full call block for one dispatched component.
pub fn generate_single_call(
    called: &CalledComponent<'_>,
    gen_data: &GenerationMetadata<'_>,
    written: &HashSet<ComponentOutput>,
) -> CodegenResult<String> {
    let component = called.component;
    let callset = called.callset;
    let definition = gen_data.circuit.definition_of(component)?;
    let callback = callset
        .callback
        .as_deref()
        .ok_or_else(|| CodegenError::MissingCallback {
            component: component.name.clone(),
            written: callset.written_set.iter().cloned().collect(),
        })?;

    if !written_array_inputs(component, callset).is_empty() {
        return generate_array_call(called, definition, gen_data, written, callback);
    }

    let annotated = gen_data.annotated(&component.name);
    let call_path = format!("{}{callback}", annotated.call_root);
    let mut call_data = vec![generate_single_input_calldata(
        component, definition, callset, gen_data, written,
    )];
    if !callset.outputs.is_empty() {
        call_data.push(generate_output_calldata(
            annotated, component, definition, callset, true,
        ));
    }
    if !callset.metadata.is_empty() {
        call_data.push(generate_metadata_calldata(component, &callset.metadata));
    }
    assemble_call_from(&call_path, &call_data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::generate_global_metadata;
    use crate::reachability::find_all_children_of;
    use crate::test_support::grouped_circuit;

    fn written_for(circuit: &crate::circuit::CircuitData) -> HashSet<ComponentOutput> {
        let mut written: HashSet<ComponentOutput> = ["a", "b", "c"]
            .iter()
            .map(|name| ComponentOutput::external(*name))
            .collect();
        let calls = find_all_children_of(["a", "b", "c"], circuit).unwrap();
        for call in &calls {
            for output in &call.callset.outputs {
                written.insert(call.component.output(output.clone()));
            }
        }
        written
    }

    #[test]
    fn ephemeral_output_binds_stack_variable() {
        let circuit = grouped_circuit(false);
        let gen_data = generate_global_metadata(&circuit, "Circuit").unwrap();
        let written = written_for(&circuit);
        let calls = find_all_children_of(["a", "b", "c"], &circuit).unwrap();

        let text = generate_single_call(&calls[0], &gen_data, &written).unwrap();
        assert!(text.contains("add1TypeAlias::Output add1_out_EV__{};"));
        assert!(text.contains("add1TypeAlias::Output& add1_out = add1_out_EV__;"));
        assert!(text.contains("bool add1_out_IV = false;"));
        assert!(text.contains("auto __valid__ = _objects.add1.doadd(__input__, __output__);"));
        assert!(text.contains("add1_out_IV = __valid__;"));
    }

    #[test]
    fn stored_output_binds_shared_field_and_slot() {
        let circuit = grouped_circuit(true);
        let gen_data = generate_global_metadata(&circuit, "Circuit").unwrap();
        let written = written_for(&circuit);
        let calls = find_all_children_of(["a", "b", "c"], &circuit).unwrap();

        let text = generate_single_call(&calls[0], &gen_data, &written).unwrap();
        assert!(text.contains("add1TypeAlias::Output& add1_out = _outputs.add1_out;"));
        assert!(!text.contains("add1_out_EV__"));
        assert!(text.contains("outputs_is_valid[0] = __valid__;"));
    }

    #[test]
    fn downstream_input_reads_upstream_binding() {
        let circuit = grouped_circuit(false);
        let gen_data = generate_global_metadata(&circuit, "Circuit").unwrap();
        let written = written_for(&circuit);
        let calls = find_all_children_of(["a", "b", "c"], &circuit).unwrap();

        let text = generate_single_call(&calls[1], &gen_data, &written).unwrap();
        // add2's `a` input is wired to add1's ephemeral output.
        assert!(text.contains("bool is_a_v = add1_out_IV;"));
        assert!(text.contains("optional_reference<const add2_a_T> a_v(add1_out_EV__, is_a_v);"));
        // its `b` input is wired to the external c.
        assert!(text.contains("bool is_b_v = _externals.is_valid[2];"));
        assert!(text.contains("optional_reference<const add2_b_T> b_v(_externals.c, is_b_v);"));
        assert!(text.contains("struct __INPUT__ {"));
        assert!(text.contains(".a = a_v,"));
    }

    #[test]
    fn assume_invalid_unwritten_source_binds_nullptr() {
        let mut circuit = grouped_circuit(false);
        {
            let spec = circuit
                .definitions
                .get_mut("add")
                .unwrap()
                .output_specs
                .get_mut("out")
                .unwrap();
            spec.assume_invalid = true;
        }
        let gen_data = generate_global_metadata(&circuit, "Circuit").unwrap();
        // add1.out absent from the written set.
        let written: HashSet<ComponentOutput> = ["a", "b", "c"]
            .iter()
            .map(|name| ComponentOutput::external(*name))
            .collect();
        let calls = find_all_children_of(["a", "b", "c"], &circuit).unwrap();
        let text = generate_single_call(&calls[1], &gen_data, &written).unwrap();
        assert!(text.contains("optional_reference<const add2_a_T> a_v(nullptr, is_a_v);"));
    }

    #[test]
    fn missing_callback_is_a_codegen_error() {
        let circuit = grouped_circuit(false);
        let gen_data = generate_global_metadata(&circuit, "Circuit").unwrap();
        let written = written_for(&circuit);
        let calls = find_all_children_of(["a", "b", "c"], &circuit).unwrap();
        let mut silent = calls[0].callset.clone();
        silent.callback = None;
        let called = CalledComponent {
            component: calls[0].component,
            callset: &silent,
        };
        assert!(matches!(
            generate_single_call(&called, &gen_data, &written),
            Err(CodegenError::MissingCallback { .. })
        ));
    }

    #[test]
    fn timer_metadata_builds_handle_aggregate() {
        let circuit = grouped_circuit(false);
        let component = circuit.component("add1").unwrap();
        let data = generate_metadata_calldata(component, &[MetadataParam::Timer]);
        assert!(data
            .local_prefix
            .contains("TimerHandle __timer_handle_var__(__myself->timer, add1TimerCallback);"));
        assert!(data.local_prefix.contains("struct LocalMetadata {"));
        assert!(data.local_prefix.contains(".timer = __timer_handle_var__"));
        assert_eq!(data.call_params, vec!["__metadata__".to_string()]);
    }
}

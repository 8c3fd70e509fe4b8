//! The identifier-naming contract shared with hand-written native code.
//!
//! Generated call sites, struct fields, and type aliases follow these exact
//! spellings. Signal implementations and the runtime reference them verbatim,
//! so every name here is frozen.

use std::collections::HashSet;

use crate::circuit::{Component, ComponentOutput};
use crate::metadata::{AnnotatedComponent, GenerationMetadata};

/// Engine time is a raw nanosecond counter.
pub const TIME_TYPE: &str = "std::uint64_t";

pub const TIME_VAR: &str = "__time_var__";
pub const STRUCT_VAR: &str = "__struct_var_";
pub const CALL_VAR: &str = "__call__";
pub const MYSELF_VAR: &str = "__myself";

pub const INPUT_STRUCT_NAME: &str = "__INPUT__";
pub const INPUT_NAME: &str = "__input__";
pub const ARRAY_INPUT_STRUCT_NAME: &str = "__ARRAY_INPUT__";
pub const ARRAY_INPUT_NAME: &str = "__array_input__";
pub const OUTPUT_STRUCT_NAME: &str = "__OUTPUT__";
pub const OUTPUT_NAME: &str = "__output__";
pub const VALID_DATA_NAME: &str = "__valid__";
pub const META_STRUCT_TYPE: &str = "LocalMetadata";
pub const META_VAR_NAME: &str = "__metadata__";
pub const TIMER_VAR_NAME: &str = "__timer_handle_var__";
pub const TIMER_HANDLE_TYPE: &str = "TimerHandle";

/// `{component}TypeAlias`, the resolved class (template arguments applied).
pub fn class_alias(component: &str) -> String {
    format!("{component}TypeAlias")
}

/// `{component}_{input}_T`, the value type wired into a single input.
pub fn input_type_alias(component: &str, input: &str) -> String {
    format!("{component}_{input}_T")
}

/// `{component}_{input}_{idx}_T`, the value type of one array-input batch.
pub fn array_input_type_alias(component: &str, input: &str, idx: usize) -> String {
    format!("{component}_{input}_{idx}_T")
}

/// `{component}_{output}_O_T`, the produced value type of an output.
pub fn output_type_alias(component: &str, output: &str) -> String {
    format!("{component}_{output}_O_T")
}

/// Local reference name bound to an output inside a generated call body.
pub fn local_output_ref(component: &str, output: &str) -> String {
    format!("{component}_{output}")
}

/// Stack variable backing an ephemeral output.
pub fn ephemeral_value_var(component: &str, output: &str) -> String {
    format!("{component}_{output}_EV__")
}

/// Field name of a stored output inside the `Outputs` struct.
pub fn stored_field(component: &str, output: &str) -> String {
    format!("{component}_{output}")
}

/// `{component}TimerCallback`, the member emitted for a timer callset.
pub fn timer_callback_name(component: &str) -> String {
    format!("{component}TimerCallback")
}

/// Where a validity check for `output` resolves: the shared bit array for
/// stored outputs, a local flag otherwise (ephemeral outputs, and the
/// compile-time constants bound for always-valid or assume-invalid ones).
pub fn valid_path(annotated: &AnnotatedComponent, component: &str, output: &str) -> String {
    match annotated.output(output).validity_index {
        Some(index) => format!("outputs_is_valid[{index}]"),
        None => format!("{component}_{output}_IV"),
    }
}

/// Validity expression for an arbitrary source output, external or component.
pub fn source_valid_path(
    output: &ComponentOutput,
    gen_data: &GenerationMetadata<'_>,
) -> String {
    if output.is_external() {
        let external = &gen_data.circuit.externals[&output.output_name];
        format!("_externals.is_valid[{}]", external.index)
    } else {
        valid_path(
            gen_data.annotated(&output.parent),
            &output.parent,
            &output.output_name,
        )
    }
}

/// Value expression for an arbitrary source output: the externals struct
/// field, the shared stored field, the producer's ephemeral stack variable,
/// or `nullptr` when the source is assumed invalid and was not written this
/// trigger.
pub fn source_value_path(
    output: &ComponentOutput,
    gen_data: &GenerationMetadata<'_>,
    written: &HashSet<ComponentOutput>,
) -> String {
    if output.is_external() {
        return format!("_externals.{}", output.output_name);
    }
    if gen_data.output_is_ephemeral(output) {
        let parent = &gen_data.circuit.components[&output.parent];
        let definition = &gen_data.circuit.definitions[&parent.definition];
        let spec = &definition.output_specs[&output.output_name];
        if spec.assume_invalid && !written.contains(output) {
            "nullptr".to_string()
        } else {
            ephemeral_value_var(&output.parent, &output.output_name)
        }
    } else {
        format!(
            "_outputs.{}",
            stored_field(&output.parent, &output.output_name)
        )
    }
}

/// Generic arguments of a component's class, `<...>` or empty.
pub fn class_generics(
    component: &Component,
    ordered_generic_inputs: &[&str],
) -> String {
    if ordered_generic_inputs.is_empty() {
        return String::new();
    }
    let args: Vec<String> = ordered_generic_inputs
        .iter()
        .map(|input| input_type_alias(&component.name, input))
        .collect();
    format!("<{}>", args.join(", "))
}

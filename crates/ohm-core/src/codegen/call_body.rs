//! Emission of one trigger's generated member function.
//!
//! The body is laid out in a fixed order: restrict-qualified local bindings,
//! the time update, unpacking of the incoming event struct into the externals
//! struct, compile-time validity constants for referenced-but-uncalled
//! parents, one call block per dispatched component in reachability order,
//! and finally the raw-call tail hook.

use std::collections::HashSet;

use crate::circuit::{CallGroup, CircuitData, ComponentOutput};
use crate::metadata::{CallMetaData, GenerationMetadata};
use crate::reachability::{find_all_children_of, CalledComponent};

use super::names::{self, CALL_VAR, MYSELF_VAR, STRUCT_VAR, TIME_TYPE, TIME_VAR};
use super::single_call::generate_single_call;
use super::CodegenResult;

/// Function-scope bindings shared by every generated call and timer body.
/// The callback receives `__myself` instead of `this`, so the compiler knows
/// circuit-state writes cannot be hoisted past the call.
pub const LOCAL_DATA_LOAD_PREFIX: &str = "\
auto * __restrict __myself = this;
Externals & __restrict _externals = __myself->externals;
Outputs & __restrict _outputs = __myself->outputs;
Objects & __restrict _objects = __myself->objects;
auto & __restrict outputs_is_valid = __myself->outputs.is_valid;";

pub const LOCAL_TIME_LOAD_PREFIX: &str = "this->update_time(__time_var__);";

/// `void {prefix}{call_name}(time, input struct, tail hook)`.
pub fn generate_call_signature(
    meta: &CallMetaData,
    circuit: &CircuitData,
    prefix: &str,
) -> CodegenResult<String> {
    let group = circuit.call_group(&meta.call_name)?;
    Ok(format!(
        "void {prefix}{}({TIME_TYPE} {TIME_VAR}, InputTypes::{} {STRUCT_VAR}, RawCall<const Circuit *> {CALL_VAR})",
        meta.call_name, group.struct_name,
    ))
}

/// Move each event field into the externals struct, tracking validity.
fn generate_init_externals(group: &CallGroup, circuit: &CircuitData) -> CodegenResult<String> {
    let mut lines = Vec::new();
    for (field, external_name) in &group.external_mapping {
        let external = circuit.external(external_name)?;
        let ty = &external.ty;
        let index = external.index;
        lines.push(format!(
            "if (Optionally<{ty}>::valid({STRUCT_VAR}.{field})) [[likely]] {{
_externals.is_valid[{index}] = true;
_externals.{external_name} = std::move(Optionally<{ty}>::value({STRUCT_VAR}.{field}));
}} else {{
_externals.is_valid[{index}] = false;
}}"
        ));
    }
    Ok(lines.join("\n"))
}

/// Compile-time validity constants for outputs that calls in this tree read
/// but whose producers do not run here: always-valid parents pin `true`,
/// assume-invalid parents pin `false`. Stored parents need nothing, their
/// flag lives in the shared array.
pub fn generate_extra_validity_references(
    children: &[CalledComponent<'_>],
    gen_data: &GenerationMetadata<'_>,
) -> String {
    let called: HashSet<&str> = children
        .iter()
        .map(|child| child.component.name.as_str())
        .collect();

    let mut seen: HashSet<ComponentOutput> = HashSet::new();
    let mut lines = Vec::new();
    for child in children {
        for input_name in child.callset.inputs() {
            let Some(input) = child.component.inputs.get(input_name) else {
                continue;
            };
            for output in input.outputs() {
                if output.is_external()
                    || called.contains(output.parent.as_str())
                    || !seen.insert(output.clone())
                {
                    continue;
                }
                let parent = &gen_data.circuit.components[&output.parent];
                let definition = &gen_data.circuit.definitions[&parent.definition];
                let spec = &definition.output_specs[&output.output_name];
                let path = names::valid_path(
                    gen_data.annotated(&output.parent),
                    &output.parent,
                    &output.output_name,
                );
                if spec.always_valid {
                    lines.push(format!("constexpr bool {path} = true;"));
                } else if spec.assume_invalid {
                    lines.push(format!("constexpr bool {path} = false;"));
                }
            }
        }
    }
    lines.join("\n")
}

/// Outputs definitely written while this tree runs: the triggered externals
/// plus every dispatched callset's outputs.
pub fn written_outputs_for(
    seed: impl IntoIterator<Item = ComponentOutput>,
    children: &[CalledComponent<'_>],
) -> HashSet<ComponentOutput> {
    let mut written: HashSet<ComponentOutput> = seed.into_iter().collect();
    for child in children {
        for output in &child.callset.outputs {
            written.insert(child.component.output(output.clone()));
        }
    }
    written
}

/// The full member-function body for one external trigger.
pub fn generate_external_call_body_for(
    meta: &CallMetaData,
    gen_data: &GenerationMetadata<'_>,
) -> CodegenResult<String> {
    let circuit = gen_data.circuit;
    let children = find_all_children_of(&meta.triggered, circuit)?;

    let written = written_outputs_for(
        meta.triggered.iter().map(ComponentOutput::external),
        &children,
    );

    let external_initialization =
        generate_init_externals(circuit.call_group(&meta.call_name)?, circuit)?;
    let extra_validity = generate_extra_validity_references(&children, gen_data);

    let mut all_children = Vec::new();
    for child in &children {
        all_children.push(generate_single_call(child, gen_data, &written)?);
    }
    let all_children = all_children.join("\n");

    let signature =
        generate_call_signature(meta, circuit, &format!("{}::", gen_data.struct_name))?;

    Ok(format!(
        "{signature} {{
{LOCAL_DATA_LOAD_PREFIX}
{LOCAL_TIME_LOAD_PREFIX}
{external_initialization}
{extra_validity}
{all_children}

if ({CALL_VAR}) {{
    {CALL_VAR}.call({MYSELF_VAR});
}}
}}"
    ))
}

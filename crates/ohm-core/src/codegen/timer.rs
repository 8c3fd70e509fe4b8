//! Emission of per-component timer callback bodies.
//!
//! A timer callback is a trigger whose seed is not an external event but the
//! component's own timer callset outputs: the component fires first, then the
//! children those outputs wake, inline in the same generated function.

use crate::circuit::{Component, ComponentOutput};
use crate::metadata::GenerationMetadata;
use crate::reachability::{find_all_children_of_from_outputs, CalledComponent};

use super::call_body::{
    generate_extra_validity_references, written_outputs_for, LOCAL_DATA_LOAD_PREFIX,
    LOCAL_TIME_LOAD_PREFIX,
};
use super::names::{self, TIME_TYPE, TIME_VAR};
use super::single_call::generate_single_call;
use super::{CodegenError, CodegenResult};

/// `void {prefix}{component}TimerCallback(time)`.
pub fn generate_timer_signature(component: &Component, prefix: &str) -> String {
    format!(
        "void {prefix}{}({TIME_TYPE} {TIME_VAR})",
        names::timer_callback_name(&component.name)
    )
}

/// The full member-function body for one component's timer callback.
pub fn generate_timer_call_body_for(
    component_name: &str,
    gen_data: &GenerationMetadata<'_>,
) -> CodegenResult<String> {
    let circuit = gen_data.circuit;
    let component = circuit.component(component_name)?;
    let definition = circuit.definition_of(component)?;
    let timer_callset =
        definition
            .timer_callset
            .as_ref()
            .ok_or_else(|| CodegenError::NoTimerCallset {
                component: component.name.clone(),
                class_name: definition.class_name.clone(),
            })?;

    let timer_outputs: std::collections::HashSet<ComponentOutput> = timer_callset
        .outputs
        .iter()
        .map(|output| component.output(output.clone()))
        .collect();
    let children = find_all_children_of_from_outputs(circuit, &timer_outputs)?;

    let first_called = CalledComponent {
        component,
        callset: timer_callset,
    };
    let mut all_calls = vec![first_called];
    all_calls.extend(children.iter().copied());

    let written = written_outputs_for(timer_outputs, &children);
    let extra_validity = generate_extra_validity_references(&all_calls, gen_data);

    let mut bodies = Vec::new();
    for call in &all_calls {
        bodies.push(generate_single_call(call, gen_data, &written)?);
    }
    let bodies = bodies.join("\n");

    let signature = generate_timer_signature(component, &format!("{}::", gen_data.struct_name));

    Ok(format!(
        "{signature} {{
{LOCAL_DATA_LOAD_PREFIX}
{LOCAL_TIME_LOAD_PREFIX}
{extra_validity}
{bodies}
}}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{CallSpec, MetadataParam};
    use crate::metadata::generate_global_metadata;
    use crate::test_support::grouped_circuit;

    fn timer_circuit() -> crate::circuit::CircuitData {
        use crate::circuit::CircuitBuilder;
        use crate::test_support::{callset, input, output_spec, wires};
        use indexmap::IndexMap;

        let mut relay = crate::definition::Definition {
            inputs: IndexMap::new(),
            output_specs: IndexMap::new(),
            class_name: "Relay".to_string(),
            static_call: false,
            header: "signals/relay.hh".to_string(),
            callsets: vec![callset(&["x"], &["out"], "on_x")],
            generic_callset: None,
            timer_callset: Some(CallSpec {
                written_set: Default::default(),
                observes: Default::default(),
                callback: Some("on_timer".to_string()),
                outputs: ["out".to_string()].into_iter().collect(),
                metadata: vec![MetadataParam::Timer],
                input_struct_path: None,
            }),
            generics_order: Default::default(),
        };
        relay.inputs.insert("x".to_string(), input(0));
        relay
            .output_specs
            .insert("out".to_string(), output_spec("Output", true));

        let mut builder = CircuitBuilder::new();
        builder.add_definition("relay", relay).unwrap();
        let a = builder.get_external("a", "double").unwrap();
        builder
            .make_component("relay", "t1", wires(&[("x", a)]), IndexMap::new())
            .unwrap();
        let t1_out = builder.circuit().default_output("t1").unwrap();
        builder
            .make_component("relay", "t2", wires(&[("x", t1_out)]), IndexMap::new())
            .unwrap();
        builder.finish().unwrap()
    }

    #[test]
    fn timer_body_fires_component_then_children() {
        let circuit = timer_circuit();
        let gen_data = generate_global_metadata(&circuit, "TickCircuit").unwrap();
        let body = generate_timer_call_body_for("t1", &gen_data).unwrap();

        assert!(body.starts_with(
            "void TickCircuit::t1TimerCallback(std::uint64_t __time_var__) {"
        ));
        assert!(body.contains("this->update_time(__time_var__);"));
        let timer_at = body.find("_objects.t1.on_timer(").unwrap();
        let child_at = body.find("_objects.t2.on_x(").unwrap();
        assert!(timer_at < child_at);
        assert!(body.contains("TimerHandle __timer_handle_var__(__myself->timer, t1TimerCallback);"));
    }

    #[test]
    fn component_without_timer_callset_is_rejected() {
        let circuit = grouped_circuit(false);
        let gen_data = generate_global_metadata(&circuit, "TickCircuit").unwrap();
        assert!(matches!(
            generate_timer_call_body_for("add1", &gen_data),
            Err(CodegenError::NoTimerCallset { .. })
        ));
    }
}

//! Build-fragment emission.
//!
//! The generated engine is compiled as part of a consumer's CMake build. The
//! fragment refuses to configure unless the consumer names the target the
//! translation units belong to.

use crate::circuit::CircuitData;
use crate::metadata::timer_components;

use super::CodegenResult;

/// One translation unit per call group, one per timer component, in
/// registration order.
pub fn codegen_source_names(circuit: &CircuitData) -> CodegenResult<Vec<String>> {
    let mut names: Vec<String> = circuit
        .call_groups
        .keys()
        .map(|group| format!("{group}.cc"))
        .collect();
    for component in timer_components(circuit)? {
        names.push(format!("{}_timer_callback.cc", component.name));
    }
    Ok(names)
}

pub fn generate_cmake_file(cc_names: &[String]) -> String {
    let ccs = cc_names.join(" ");
    format!(
        "if (NOT DEFINED CODEGEN_TARGET_NAME)
    message(FATAL_ERROR \"The variable CODEGEN_TARGET_NAME must be set for codegen to call target_sources\")
endif (NOT DEFINED CODEGEN_TARGET_NAME)

target_sources(${{CODEGEN_TARGET_NAME}} PRIVATE {ccs})
"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::grouped_circuit;

    #[test]
    fn fragment_guards_the_target_name() {
        let circuit = grouped_circuit(false);
        let names = codegen_source_names(&circuit).unwrap();
        assert_eq!(names, vec!["on_tick.cc".to_string()]);

        let text = generate_cmake_file(&names);
        assert!(text.starts_with("if (NOT DEFINED CODEGEN_TARGET_NAME)"));
        assert!(text.contains("target_sources(${CODEGEN_TARGET_NAME} PRIVATE on_tick.cc)"));
    }
}

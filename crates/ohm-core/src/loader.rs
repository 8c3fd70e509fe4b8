//! JSON boundary and artifact assembly.
//!
//! The loader turns on-disk documents (definition catalog, circuit graph,
//! loader config) into validated in-memory values, and assembles each
//! generated artifact as one complete string: the struct header with its
//! includes, one translation unit per call group or timer component, the
//! graphviz views, and the CMake fragment. Callers decide where the text
//! lands; nothing here touches the filesystem.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::circuit::CircuitData;
use crate::codegen::call_body::generate_external_call_body_for;
use crate::codegen::cmake::{codegen_source_names, generate_cmake_file};
use crate::codegen::dot::{generate_external_dot_body_for, generate_full_circuit_dot};
use crate::codegen::struct_gen::{
    generate_circuit_struct, struct_headers_for, DEFAULT_HEADERS, STD_HEADERS,
};
use crate::codegen::timer::generate_timer_call_body_for;
use crate::codegen::CodegenError;
use crate::definition::Definitions;
use crate::error::CircuitError;
use crate::metadata::generate_global_metadata;

/// Include-path roots the generated artifacts are resolved against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Root of the native runtime headers (circuit base class, optionals,
    /// raw calls, timer queue).
    pub runtime_include_path: String,
    /// Root the per-definition signal headers are installed under.
    pub signals_include_path: String,
}

pub type LoaderResult<T> = Result<T, LoaderError>;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("malformed document: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Circuit(#[from] CircuitError),

    #[error(transparent)]
    Codegen(#[from] CodegenError),
}

/// Parse and validate a definition catalog document.
pub fn load_definitions(text: &str) -> LoaderResult<Definitions> {
    let definitions: Definitions = serde_json::from_str(text)?;
    definitions.validate()?;
    Ok(definitions)
}

/// Parse and validate a circuit document. The graph is re-checked in full
/// since hand-edited JSON carries none of the builder's guarantees.
pub fn load_circuit(text: &str) -> LoaderResult<CircuitData> {
    let circuit: CircuitData = serde_json::from_str(text)?;
    circuit.validate()?;
    Ok(circuit)
}

pub fn load_loader_config(text: &str) -> LoaderResult<LoaderConfig> {
    Ok(serde_json::from_str(text)?)
}

/// Identifies the generated engine struct a translation unit belongs to.
#[derive(Debug, Clone)]
pub struct StructFileTarget {
    pub struct_name: String,
    /// Header file stem the struct artifact is written to, without `.hh`.
    pub struct_header: String,
}

fn struct_include(target: &StructFileTarget) -> String {
    format!("#include \"{}.hh\"", target.struct_header)
}

/// The struct header artifact: runtime, std, and signal includes followed by
/// the engine struct itself.
pub fn generate_struct_file(
    struct_name: &str,
    config: &LoaderConfig,
    circuit: &CircuitData,
) -> LoaderResult<String> {
    let gen_data = generate_global_metadata(circuit, struct_name)?;

    let mut includes: Vec<String> = DEFAULT_HEADERS
        .iter()
        .map(|header| format!("#include \"{}/{header}\"", config.runtime_include_path))
        .collect();
    includes.extend(
        STD_HEADERS
            .iter()
            .map(|header| format!("#include <{header}>")),
    );
    includes.extend(
        struct_headers_for(circuit)?
            .iter()
            .map(|header| format!("#include \"{}/{header}\"", config.signals_include_path)),
    );

    let body = generate_circuit_struct(&gen_data)?;
    Ok(format!("{}\n\n{body}\n", includes.join("\n")))
}

/// The translation unit implementing one call group's trigger.
pub fn generate_call_file(
    target: &StructFileTarget,
    call_name: &str,
    circuit: &CircuitData,
) -> LoaderResult<String> {
    let gen_data = generate_global_metadata(circuit, &target.struct_name)?;
    let meta = gen_data
        .call_endpoints
        .iter()
        .find(|meta| meta.call_name == call_name)
        .ok_or_else(|| CircuitError::UnknownCallGroup(call_name.to_string()))?;

    let body = generate_external_call_body_for(meta, &gen_data)?;
    Ok(format!("{}\n\n{body}\n", struct_include(target)))
}

/// The translation unit implementing one component's timer callback.
pub fn generate_timer_file(
    target: &StructFileTarget,
    component_name: &str,
    circuit: &CircuitData,
) -> LoaderResult<String> {
    let gen_data = generate_global_metadata(circuit, &target.struct_name)?;
    let body = generate_timer_call_body_for(component_name, &gen_data)?;
    Ok(format!("{}\n\n{body}\n", struct_include(target)))
}

/// Graphviz view of the components one call group wakes.
pub fn generate_call_dot_file(
    struct_name: &str,
    call_name: &str,
    circuit: &CircuitData,
) -> LoaderResult<String> {
    let gen_data = generate_global_metadata(circuit, struct_name)?;
    let meta = gen_data
        .call_endpoints
        .iter()
        .find(|meta| meta.call_name == call_name)
        .ok_or_else(|| CircuitError::UnknownCallGroup(call_name.to_string()))?;
    Ok(generate_external_dot_body_for(meta, &gen_data)?)
}

/// Graphviz view of every wire in the circuit.
pub fn generate_circuit_dot_file(circuit: &CircuitData) -> LoaderResult<String> {
    Ok(generate_full_circuit_dot(circuit)?)
}

/// The CMake fragment registering every generated translation unit.
pub fn generate_cmake_fragment(circuit: &CircuitData) -> LoaderResult<String> {
    let names = codegen_source_names(circuit)?;
    Ok(generate_cmake_file(&names))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::grouped_circuit;

    fn config() -> LoaderConfig {
        LoaderConfig {
            runtime_include_path: "cppcuit_root".to_string(),
            signals_include_path: "signals_root".to_string(),
        }
    }

    fn target() -> StructFileTarget {
        StructFileTarget {
            struct_name: "TickCircuit".to_string(),
            struct_header: "tick_circuit".to_string(),
        }
    }

    #[test]
    fn struct_file_carries_all_include_kinds() {
        let circuit = grouped_circuit(false);
        let text = generate_struct_file("TickCircuit", &config(), &circuit).unwrap();
        assert!(text.contains("#include \"cppcuit_root/cppcuit/circuit.hh\""));
        assert!(text.contains("#include <cstdint>"));
        assert!(text.contains("#include \"signals_root/signals/adder.hh\""));
        assert!(text.contains("struct TickCircuit final : public Circuit {"));
    }

    #[test]
    fn call_file_includes_the_struct_header() {
        let circuit = grouped_circuit(false);
        let text = generate_call_file(&target(), "on_tick", &circuit).unwrap();
        assert!(text.starts_with("#include \"tick_circuit.hh\"\n"));
        assert!(text.contains("void TickCircuit::on_tick("));
    }

    #[test]
    fn unknown_call_name_is_fatal() {
        let circuit = grouped_circuit(false);
        assert!(matches!(
            generate_call_file(&target(), "nope", &circuit),
            Err(LoaderError::Circuit(CircuitError::UnknownCallGroup(name))) if name == "nope"
        ));
    }

    #[test]
    fn circuit_round_trips_through_json() {
        let circuit = grouped_circuit(true);
        let text = serde_json::to_string(&circuit).unwrap();
        let reloaded = load_circuit(&text).unwrap();
        assert_eq!(reloaded.components.len(), circuit.components.len());
        assert_eq!(
            reloaded.components["add2"].inputs["a"],
            circuit.components["add2"].inputs["a"]
        );
        assert!(reloaded.components["add1"].force_stored("out"));
    }

    #[test]
    fn deserialized_circuit_generates_the_same_call_file() {
        let circuit = grouped_circuit(false);
        let direct = generate_call_file(&target(), "on_tick", &circuit).unwrap();

        let text = serde_json::to_string(&circuit).unwrap();
        let reloaded = load_circuit(&text).unwrap();
        let roundtripped = generate_call_file(&target(), "on_tick", &reloaded).unwrap();
        assert_eq!(direct, roundtripped);
    }

    #[test]
    fn config_parses_both_roots() {
        let parsed = load_loader_config(
            "{\"runtime_include_path\": \"rt\", \"signals_include_path\": \"sig\"}",
        )
        .unwrap();
        assert_eq!(parsed.runtime_include_path, "rt");
        assert_eq!(parsed.signals_include_path, "sig");
    }
}

//! Build-time circuit graph: externals, components, wiring, and triggers.
//!
//! The graph is write-once and append-only. Components may only reference
//! outputs of already-inserted components or externals, so the component
//! registry is topologically ordered by construction; every analysis in this
//! crate leans on that ordering. [`CircuitBuilder`] enforces the invariants as
//! each element is added; [`CircuitData::validate`] re-checks them for graphs
//! deserialized from JSON.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::definition::{Definition, Definitions, InputKind};
use crate::error::{CircuitError, CircuitResult};

/// Parent name marking an output produced outside the circuit.
pub const EXTERNAL_PARENT: &str = "external";

/// Identity of one value-producing point in the graph.
///
/// Equality and hashing over the `(parent, output_name)` pair is the edge
/// identity every graph algorithm keys on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentOutput {
    pub parent: String,
    pub output_name: String,
}

impl ComponentOutput {
    pub fn new(parent: impl Into<String>, output_name: impl Into<String>) -> Self {
        ComponentOutput {
            parent: parent.into(),
            output_name: output_name.into(),
        }
    }

    /// Handle for the output of an external input.
    pub fn external(name: impl Into<String>) -> Self {
        ComponentOutput::new(EXTERNAL_PARENT, name)
    }

    pub fn is_external(&self) -> bool {
        self.parent == EXTERNAL_PARENT
    }
}

/// A named, typed value supplied from outside the circuit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalInput {
    pub name: String,
    /// C++ type of the external value.
    pub ty: String,
    /// Insertion-order index, doubling as the external validity-bit slot.
    pub index: u32,
    /// The external may only be consumed as a written trigger, never merely
    /// observed by a callset.
    #[serde(default)]
    pub must_trigger: bool,
}

impl ExternalInput {
    pub fn output(&self) -> ComponentOutput {
        ComponentOutput::external(self.name.clone())
    }
}

/// One named-field batch of an array input.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WireBatch {
    pub fields: IndexMap<String, ComponentOutput>,
}

impl WireBatch {
    pub fn outputs(&self) -> impl Iterator<Item = &ComponentOutput> {
        self.fields.values()
    }
}

/// A resolved input wire of a component, carrying the declared slot index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ComponentInput {
    Single { output: ComponentOutput, index: u32 },
    Array { batches: Vec<WireBatch>, index: u32 },
}

impl ComponentInput {
    pub fn index(&self) -> u32 {
        match self {
            ComponentInput::Single { index, .. } | ComponentInput::Array { index, .. } => *index,
        }
    }

    pub fn kind(&self) -> InputKind {
        match self {
            ComponentInput::Single { .. } => InputKind::Single,
            ComponentInput::Array { .. } => InputKind::Array,
        }
    }

    /// All producing outputs wired into this input.
    pub fn outputs(&self) -> Box<dyn Iterator<Item = &ComponentOutput> + '_> {
        match self {
            ComponentInput::Single { output, .. } => Box::new(std::iter::once(output)),
            ComponentInput::Array { batches, .. } => {
                Box::new(batches.iter().flat_map(|batch| batch.fields.values()))
            }
        }
    }
}

/// Unresolved wiring handed to [`CircuitBuilder::make_component`]; the builder
/// fills in the declared slot index.
#[derive(Debug, Clone)]
pub enum InputWiring {
    Single(ComponentOutput),
    Array(Vec<WireBatch>),
}

impl InputWiring {
    fn kind(&self) -> InputKind {
        match self {
            InputWiring::Single(_) => InputKind::Single,
            InputWiring::Array(_) => InputKind::Array,
        }
    }
}

fn kind_name(kind: InputKind) -> &'static str {
    match kind {
        InputKind::Single => "single",
        InputKind::Array => "array",
    }
}

/// Per-output author overrides on a component instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OutputOptions {
    /// Pin the output to storage even if no cross-trigger reader needs it,
    /// e.g. because logging or the differentiator inspects it externally.
    #[serde(default)]
    pub force_stored: bool,
}

/// A named instantiation of a [`Definition`] within a circuit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    /// Definition name, resolved through the circuit's catalog.
    pub definition: String,
    pub inputs: IndexMap<String, ComponentInput>,
    #[serde(default)]
    pub output_options: IndexMap<String, OutputOptions>,
    /// Insertion index, the deterministic-ordering tie-break.
    pub index: u32,
}

impl Component {
    /// Handle for one of this component's outputs.
    pub fn output(&self, output_name: impl Into<String>) -> ComponentOutput {
        ComponentOutput::new(self.name.clone(), output_name)
    }

    pub fn force_stored(&self, output: &str) -> bool {
        self.output_options
            .get(output)
            .map(|opts| opts.force_stored)
            .unwrap_or(false)
    }

    /// All producing outputs wired into any input of this component.
    pub fn wired_outputs(&self) -> impl Iterator<Item = &ComponentOutput> {
        self.inputs.values().flat_map(|input| input.outputs())
    }
}

/// Alias target when a call struct is declared by the native side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalStruct {
    pub struct_name: String,
    pub header: String,
}

/// Wire-facing input aggregate for one trigger: either generated from named
/// typed fields, or an alias to a struct the native runtime already declares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallStruct {
    /// Field name to C++ type.
    pub fields: IndexMap<String, String>,
    #[serde(default)]
    pub external_struct: Option<ExternalStruct>,
}

/// Names a call struct and maps its fields onto externals, defining one
/// trigger: the set of external outputs driven together by one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallGroup {
    pub struct_name: String,
    /// Struct field name to external name.
    pub external_mapping: IndexMap<String, String>,
}

impl CallGroup {
    pub fn triggered_externals(&self) -> impl Iterator<Item = &String> {
        self.external_mapping.values()
    }
}

/// The full graph of components, externals, and wiring for one generated
/// engine, plus the definition catalog the components resolve against.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CircuitData {
    pub externals: IndexMap<String, ExternalInput>,
    pub components: IndexMap<String, Component>,
    pub definitions: IndexMap<String, Definition>,
    #[serde(default)]
    pub call_structs: IndexMap<String, CallStruct>,
    #[serde(default)]
    pub call_groups: IndexMap<String, CallGroup>,
}

impl CircuitData {
    pub fn component(&self, name: &str) -> CircuitResult<&Component> {
        self.components
            .get(name)
            .ok_or_else(|| CircuitError::UnknownComponent(name.to_string()))
    }

    pub fn external(&self, name: &str) -> CircuitResult<&ExternalInput> {
        self.externals
            .get(name)
            .ok_or_else(|| CircuitError::UnknownExternal(name.to_string()))
    }

    pub fn definition(&self, name: &str) -> CircuitResult<&Definition> {
        self.definitions
            .get(name)
            .ok_or_else(|| CircuitError::UnknownDefinition(name.to_string()))
    }

    pub fn definition_of(&self, component: &Component) -> CircuitResult<&Definition> {
        self.definition(&component.definition)
    }

    pub fn call_group(&self, name: &str) -> CircuitResult<&CallGroup> {
        self.call_groups
            .get(name)
            .ok_or_else(|| CircuitError::UnknownCallGroup(name.to_string()))
    }

    pub fn call_struct_of(&self, group_name: &str, group: &CallGroup) -> CircuitResult<&CallStruct> {
        self.call_structs
            .get(&group.struct_name)
            .ok_or_else(|| CircuitError::UnknownCallStruct {
                group: group_name.to_string(),
                struct_name: group.struct_name.clone(),
            })
    }

    /// The single output of a single-output component, for wiring shorthand.
    pub fn default_output(&self, component_name: &str) -> CircuitResult<ComponentOutput> {
        let component = self.component(component_name)?;
        let definition = self.definition_of(component)?;
        if definition.output_specs.len() != 1 {
            return Err(CircuitError::NoDefaultOutput {
                component: component_name.to_string(),
                count: definition.output_specs.len(),
            });
        }
        let output = definition.output_specs.keys().next().unwrap();
        Ok(component.output(output.clone()))
    }

    /// Re-check every structural invariant; used for deserialized circuits.
    pub fn validate(&self) -> CircuitResult<()> {
        for (name, definition) in &self.definitions {
            definition.validate(name)?;
        }
        for component in self.components.values() {
            self.validate_component(component)?;
        }
        for (name, group) in &self.call_groups {
            self.validate_call_group(name, group)?;
        }
        Ok(())
    }

    pub(crate) fn validate_component(&self, component: &Component) -> CircuitResult<()> {
        let definition = self.definition_of(component)?;

        for (input_name, input) in &component.inputs {
            let decl = definition.inputs.get(input_name).ok_or_else(|| {
                CircuitError::UndeclaredInput {
                    component: component.name.clone(),
                    input: input_name.clone(),
                }
            })?;
            if decl.kind != input.kind() {
                return Err(CircuitError::InputKindMismatch {
                    component: component.name.clone(),
                    input: input_name.clone(),
                    given: kind_name(input.kind()),
                    declared: kind_name(decl.kind),
                });
            }
            for output in input.outputs() {
                self.validate_wire(component, input_name, output)?;
            }
        }

        for input_name in definition.inputs.keys() {
            if !component.inputs.contains_key(input_name) {
                return Err(CircuitError::MissingInput {
                    component: component.name.clone(),
                    input: input_name.clone(),
                });
            }
        }

        for (output, options) in &component.output_options {
            let spec = definition.output_specs.get(output).ok_or_else(|| {
                CircuitError::OptionsForUndeclaredOutput {
                    component: component.name.clone(),
                    output: output.clone(),
                }
            })?;
            if options.force_stored && spec.assume_invalid {
                return Err(CircuitError::ForceStoredAssumeInvalid {
                    component: component.name.clone(),
                    output: output.clone(),
                });
            }
        }

        self.validate_observed_externals(component, definition)
    }

    fn validate_wire(
        &self,
        component: &Component,
        input_name: &str,
        output: &ComponentOutput,
    ) -> CircuitResult<()> {
        if output.is_external() {
            self.external(&output.output_name)?;
            return Ok(());
        }
        let parent = match self.components.get(&output.parent) {
            Some(parent) if parent.index < component.index => parent,
            _ => {
                return Err(CircuitError::BackReference {
                    component: component.name.clone(),
                    input: input_name.to_string(),
                    parent: output.parent.clone(),
                });
            }
        };
        let parent_def = self.definition_of(parent)?;
        if !parent_def.output_specs.contains_key(&output.output_name) {
            return Err(CircuitError::UndeclaredOutput {
                component: output.parent.clone(),
                output: output.output_name.clone(),
            });
        }
        Ok(())
    }

    /// A must-trigger external may only reach a component through written
    /// inputs; appearing in any callset's observe set is an authoring error.
    fn validate_observed_externals(
        &self,
        component: &Component,
        definition: &Definition,
    ) -> CircuitResult<()> {
        for callset in definition.all_callsets() {
            for input_name in &callset.observes {
                let Some(input) = component.inputs.get(input_name) else {
                    continue;
                };
                for output in input.outputs() {
                    if !output.is_external() {
                        continue;
                    }
                    if self.external(&output.output_name)?.must_trigger {
                        return Err(CircuitError::ObservedMustTriggerExternal {
                            component: component.name.clone(),
                            input: input_name.clone(),
                            external: output.output_name.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn validate_call_group(&self, name: &str, group: &CallGroup) -> CircuitResult<()> {
        let call_struct = self.call_struct_of(name, group)?;
        for (field, external_name) in &group.external_mapping {
            let field_type = call_struct.fields.get(field).ok_or_else(|| {
                CircuitError::CallGroupUnknownField {
                    group: name.to_string(),
                    field: field.clone(),
                    struct_name: group.struct_name.clone(),
                }
            })?;
            let external = self.external(external_name)?;
            if *field_type != external.ty {
                return Err(CircuitError::CallGroupTypeMismatch {
                    group: name.to_string(),
                    field: field.clone(),
                    external: external_name.clone(),
                    field_type: field_type.clone(),
                    external_type: external.ty.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Append-only construction handle over a [`CircuitData`].
#[derive(Debug, Default)]
pub struct CircuitBuilder {
    circuit: CircuitData,
}

impl CircuitBuilder {
    pub fn new() -> Self {
        CircuitBuilder::default()
    }

    /// Start from a validated definition catalog.
    pub fn with_definitions(catalog: Definitions) -> CircuitResult<Self> {
        catalog.validate()?;
        Ok(CircuitBuilder {
            circuit: CircuitData {
                definitions: catalog.definitions,
                ..CircuitData::default()
            },
        })
    }

    pub fn circuit(&self) -> &CircuitData {
        &self.circuit
    }

    /// Validate and release the finished graph.
    pub fn finish(self) -> CircuitResult<CircuitData> {
        self.circuit.validate()?;
        Ok(self.circuit)
    }

    /// Memoized external registration: returns the existing external's output
    /// handle if `name` is already registered, otherwise allocates the next
    /// index. Re-registering with a different type is fatal.
    pub fn get_external(
        &mut self,
        name: impl Into<String>,
        ty: impl Into<String>,
    ) -> CircuitResult<ComponentOutput> {
        self.register_external(name.into(), ty.into(), false)
    }

    /// Like [`get_external`](Self::get_external), but marks the external as
    /// trigger-only. A triggering registration upgrades an existing plain one.
    pub fn get_external_triggering(
        &mut self,
        name: impl Into<String>,
        ty: impl Into<String>,
    ) -> CircuitResult<ComponentOutput> {
        self.register_external(name.into(), ty.into(), true)
    }

    fn register_external(
        &mut self,
        name: String,
        ty: String,
        must_trigger: bool,
    ) -> CircuitResult<ComponentOutput> {
        if let Some(existing) = self.circuit.externals.get_mut(&name) {
            if existing.ty != ty {
                return Err(CircuitError::ConflictingExternal {
                    name,
                    existing: existing.ty.clone(),
                    requested: ty,
                });
            }
            existing.must_trigger |= must_trigger;
            return Ok(existing.output());
        }
        let index = self.circuit.externals.len() as u32;
        let external = ExternalInput {
            name: name.clone(),
            ty,
            index,
            must_trigger,
        };
        let output = external.output();
        self.circuit.externals.insert(name, external);
        Ok(output)
    }

    /// Register a definition. Re-adding an identical definition is a no-op; a
    /// different one under the same name is fatal.
    pub fn add_definition(
        &mut self,
        name: impl Into<String>,
        definition: Definition,
    ) -> CircuitResult<()> {
        let name = name.into();
        definition.validate(&name)?;
        if let Some(existing) = self.circuit.definitions.get(&name) {
            if *existing != definition {
                return Err(CircuitError::ConflictingDefinition(name));
            }
            return Ok(());
        }
        self.circuit.definitions.insert(name, definition);
        Ok(())
    }

    pub fn add_call_struct(
        &mut self,
        name: impl Into<String>,
        call_struct: CallStruct,
    ) -> CircuitResult<()> {
        let name = name.into();
        if let Some(existing) = self.circuit.call_structs.get(&name) {
            if *existing != call_struct {
                return Err(CircuitError::ConflictingCallStruct(name));
            }
            return Ok(());
        }
        self.circuit.call_structs.insert(name, call_struct);
        Ok(())
    }

    pub fn add_call_group(
        &mut self,
        name: impl Into<String>,
        group: CallGroup,
    ) -> CircuitResult<()> {
        let name = name.into();
        if self.circuit.call_groups.contains_key(&name) {
            return Err(CircuitError::DuplicateCallGroup(name));
        }
        self.circuit.validate_call_group(&name, &group)?;
        self.circuit.call_groups.insert(name, group);
        Ok(())
    }

    /// Instantiate `definition_name` as a new component called `name`,
    /// resolving each wire to the declared slot index. All structural checks
    /// run here; back-references to not-yet-inserted components are rejected.
    pub fn make_component(
        &mut self,
        definition_name: impl Into<String>,
        name: impl Into<String>,
        inputs: IndexMap<String, InputWiring>,
        output_options: IndexMap<String, OutputOptions>,
    ) -> CircuitResult<&Component> {
        let definition_name = definition_name.into();
        let name = name.into();
        if self.circuit.components.contains_key(&name) {
            return Err(CircuitError::DuplicateComponent(name));
        }
        let definition = self.circuit.definition(&definition_name)?;

        let mut resolved = IndexMap::with_capacity(inputs.len());
        for (input_name, wiring) in inputs {
            let decl = definition.inputs.get(&input_name).ok_or_else(|| {
                CircuitError::UndeclaredInput {
                    component: name.clone(),
                    input: input_name.clone(),
                }
            })?;
            if decl.kind != wiring.kind() {
                return Err(CircuitError::InputKindMismatch {
                    component: name.clone(),
                    input: input_name.clone(),
                    given: kind_name(wiring.kind()),
                    declared: kind_name(decl.kind),
                });
            }
            let input = match wiring {
                InputWiring::Single(output) => ComponentInput::Single {
                    output,
                    index: decl.index,
                },
                InputWiring::Array(batches) => ComponentInput::Array {
                    batches,
                    index: decl.index,
                },
            };
            resolved.insert(input_name, input);
        }

        let component = Component {
            name: name.clone(),
            definition: definition_name,
            inputs: resolved,
            output_options,
            index: self.circuit.components.len() as u32,
        };
        self.circuit.validate_component(&component)?;
        self.circuit.components.insert(name.clone(), component);
        Ok(&self.circuit.components[&name])
    }
}

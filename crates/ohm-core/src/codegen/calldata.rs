//! Typed IR for one callback invocation, plus its pretty-printer.
//!
//! Each concern of a call site (inputs, outputs, metadata) contributes one
//! [`CallData`]; [`assemble_call_from`] folds them into the final block. The
//! global prefix lands at function scope so later calls can reference the
//! bindings (ephemeral values, validity flags); everything else lives inside
//! the call's own braces.

use super::{CodegenError, CodegenResult};

/// A value captured from the callback's return, usually the validity payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnValue {
    pub name: String,
    /// `None` means `auto`.
    pub static_return_type: Option<String>,
}

impl ReturnValue {
    pub fn new(name: impl Into<String>) -> Self {
        ReturnValue {
            name: name.into(),
            static_return_type: None,
        }
    }

    pub fn return_type(&self) -> &str {
        self.static_return_type.as_deref().unwrap_or("auto")
    }
}

/// One concern's contribution to an assembled call.
#[derive(Debug, Clone, Default)]
pub struct CallData {
    /// Lines hoisted to function scope, visible to later calls.
    pub global_prefix: String,
    /// Lines inside the call block, before the invocation.
    pub local_prefix: String,
    /// Expressions passed to the callback, in order.
    pub call_params: Vec<String>,
    /// Lines inside the call block, after the invocation.
    pub local_postfix: String,
    pub return_value: Option<ReturnValue>,
}

fn join_nonempty<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts
        .filter(|part| !part.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Fold the call data into the emitted block:
/// global prefixes, then a brace scope holding local prefixes, the invocation
/// (capturing the return value if one concern requested it), and postfixes.
pub fn assemble_call_from(call_path: &str, calls: &[CallData]) -> CodegenResult<String> {
    let mut return_value: Option<&ReturnValue> = None;
    for call in calls {
        if let Some(requested) = &call.return_value {
            if return_value.is_some() {
                return Err(CodegenError::ConflictingReturnValue {
                    call_path: call_path.to_string(),
                });
            }
            return_value = Some(requested);
        }
    }

    let global_prefix = join_nonempty(calls.iter().map(|call| call.global_prefix.as_str()));
    let local_prefix = join_nonempty(calls.iter().map(|call| call.local_prefix.as_str()));
    let local_postfix = join_nonempty(calls.iter().map(|call| call.local_postfix.as_str()));

    let params: Vec<&str> = calls
        .iter()
        .flat_map(|call| call.call_params.iter().map(String::as_str))
        .collect();
    let invocation = format!("{call_path}({});", params.join(", "));
    let call_line = match return_value {
        Some(ret) => format!("{} {} = {invocation}", ret.return_type(), ret.name),
        None => invocation,
    };

    let body = join_nonempty(
        [local_prefix.as_str(), call_line.as_str(), local_postfix.as_str()].into_iter(),
    );

    Ok(format!("{global_prefix}\n{{\n{body}\n}}\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembles_sections_in_order() {
        let input = CallData {
            local_prefix: "bool is_a_v = true;".to_string(),
            call_params: vec!["__input__".to_string()],
            ..CallData::default()
        };
        let output = CallData {
            global_prefix: "double add1_out_EV__{};".to_string(),
            call_params: vec!["__output__".to_string()],
            local_postfix: "add1_out_IV = __valid__;".to_string(),
            return_value: Some(ReturnValue::new("__valid__")),
            ..CallData::default()
        };
        let text = assemble_call_from("_objects.add1.doadd", &[input, output]).unwrap();
        assert!(text.starts_with("double add1_out_EV__{};\n{"));
        assert!(text.contains(
            "auto __valid__ = _objects.add1.doadd(__input__, __output__);"
        ));
        let prefix_at = text.find("is_a_v").unwrap();
        let call_at = text.find("doadd(").unwrap();
        let postfix_at = text.find("add1_out_IV = __valid__").unwrap();
        assert!(prefix_at < call_at && call_at < postfix_at);
    }

    #[test]
    fn two_return_requests_are_rejected() {
        let one = CallData {
            return_value: Some(ReturnValue::new("__valid__")),
            ..CallData::default()
        };
        assert!(matches!(
            assemble_call_from("call", &[one.clone(), one]),
            Err(CodegenError::ConflictingReturnValue { .. })
        ));
    }

    #[test]
    fn static_return_type_overrides_auto() {
        let ret = ReturnValue {
            name: "__valid__".to_string(),
            static_return_type: Some("bool".to_string()),
        };
        let data = CallData {
            return_value: Some(ret),
            ..CallData::default()
        };
        let text = assemble_call_from("call", &[data]).unwrap();
        assert!(text.contains("bool __valid__ = call();"));
    }
}

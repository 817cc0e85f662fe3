//! Typed input/output contracts and the process-wide signature registry.
//!
//! A [`Signature`] declares what fields a module consumes and produces,
//! with a type constraint per field. Signatures are immutable once created;
//! reasoning modules derive new signatures (Chain-of-Thought prepends a
//! `rationale` output) rather than mutating existing ones.
//!
//! The registry is process-wide mutable state, isolated behind accessor
//! functions with a `reset` hook for tests.

use crate::error::SignatureError;
use crate::io::IoMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, RwLock};

/// Type constraint attached to a signature field.
///
/// `Any` (the default when a field is declared without a constraint)
/// accepts any non-null value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Any non-null value.
    #[default]
    Any,
    /// A JSON string.
    String,
    /// A JSON number (integer or float).
    Number,
    /// A JSON boolean.
    Bool,
    /// A JSON object.
    Object,
    /// A JSON array.
    Array,
}

impl FieldType {
    /// Whether `value` conforms to this constraint.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            FieldType::Any => !value.is_null(),
            FieldType::String => value.is_string(),
            FieldType::Number => value.is_number(),
            FieldType::Bool => value.is_boolean(),
            FieldType::Object => value.is_object(),
            FieldType::Array => value.is_array(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            FieldType::Any => "any",
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Bool => "bool",
            FieldType::Object => "object",
            FieldType::Array => "array",
        }
    }
}

/// A named, typed field on one side of a signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Field name. Must be identifier-like.
    pub name: String,
    /// Type constraint; defaults to [`FieldType::Any`].
    #[serde(default)]
    pub ty: FieldType,
}

impl FieldSpec {
    /// A field accepting any non-null value.
    pub fn any(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: FieldType::Any,
        }
    }

    /// A field constrained to the given type.
    pub fn typed(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

fn identifier_like(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// An immutable input/output contract.
///
/// Invariants (enforced at construction): field names are identifier-like
/// and no name appears on both sides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Symbolic name the signature is registered under.
    pub name: String,
    /// Input fields, in declaration order.
    pub inputs: Vec<FieldSpec>,
    /// Output fields, in declaration order.
    pub outputs: Vec<FieldSpec>,
}

impl Signature {
    /// Build a signature, checking the field invariants.
    pub fn new(
        name: impl Into<String>,
        inputs: Vec<FieldSpec>,
        outputs: Vec<FieldSpec>,
    ) -> Result<Self, SignatureError> {
        for field in inputs.iter().chain(outputs.iter()) {
            if !identifier_like(&field.name) {
                return Err(SignatureError::InvalidFieldName(field.name.clone()));
            }
        }
        for input in &inputs {
            if outputs.iter().any(|o| o.name == input.name) {
                return Err(SignatureError::FieldOverlap(input.name.clone()));
            }
        }
        Ok(Self {
            name: name.into(),
            inputs,
            outputs,
        })
    }

    /// Derive a new signature with an extra output field prepended.
    ///
    /// Used by Chain-of-Thought to insert `rationale` ahead of the original
    /// outputs. The derived signature is registered under `name`.
    pub fn with_output_prepended(
        &self,
        name: impl Into<String>,
        field: FieldSpec,
    ) -> Result<Self, SignatureError> {
        let mut outputs = Vec::with_capacity(self.outputs.len() + 1);
        outputs.push(field);
        outputs.extend(self.outputs.iter().cloned());
        Signature::new(name, self.inputs.clone(), outputs)
    }

    /// The names of the input fields.
    pub fn input_names(&self) -> Vec<&str> {
        self.inputs.iter().map(|f| f.name.as_str()).collect()
    }

    /// The names of the output fields.
    pub fn output_names(&self) -> Vec<&str> {
        self.outputs.iter().map(|f| f.name.as_str()).collect()
    }

    /// The signature's schema as a JSON value: field name → type name,
    /// per side. Stable for a given signature; used in tool catalogs and
    /// persisted snapshots.
    pub fn schema(&self) -> serde_json::Value {
        let side = |fields: &[FieldSpec]| {
            fields
                .iter()
                .map(|f| (f.name.clone(), Value::String(f.ty.name().into())))
                .collect::<serde_json::Map<_, _>>()
        };
        serde_json::json!({
            "inputs": side(&self.inputs),
            "outputs": side(&self.outputs),
        })
    }

    /// Whether `map` carries every input field with a conforming value.
    ///
    /// Extra keys are allowed — pipelines pass merged maps, so a module
    /// routinely sees more fields than it declares.
    pub fn validate_input(&self, map: &IoMap) -> bool {
        self.diagnose(&self.inputs, map).ok()
    }

    /// Whether `map` carries every output field with a conforming value.
    pub fn validate_output(&self, map: &IoMap) -> bool {
        self.diagnose(&self.outputs, map).ok()
    }

    /// Structured diagnosis of `map` against the input side.
    ///
    /// Never fails on invalid data — invalid data is what it describes.
    pub fn explain_input(&self, map: &IoMap) -> SignatureDiagnosis {
        self.diagnose(&self.inputs, map)
    }

    /// Structured diagnosis of `map` against the output side.
    pub fn explain_output(&self, map: &IoMap) -> SignatureDiagnosis {
        self.diagnose(&self.outputs, map)
    }

    fn diagnose(&self, side: &[FieldSpec], map: &IoMap) -> SignatureDiagnosis {
        let mut missing = Vec::new();
        let mut mismatched = Vec::new();
        for field in side {
            match map.get(&field.name) {
                None => missing.push(field.name.clone()),
                Some(value) if !field.ty.accepts(value) => {
                    mismatched.push(FieldMismatch {
                        field: field.name.clone(),
                        expected: field.ty,
                        actual: json_type_name(value).to_string(),
                    });
                }
                Some(_) => {}
            }
        }
        let declared: Vec<&str> = side.iter().map(|f| f.name.as_str()).collect();
        let extra = map
            .keys()
            .filter(|k| !declared.contains(&k.as_str()))
            .cloned()
            .collect();
        SignatureDiagnosis {
            signature: self.name.clone(),
            missing,
            mismatched,
            extra,
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A field whose value did not conform to its declared type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMismatch {
    /// The offending field.
    pub field: String,
    /// The declared constraint.
    pub expected: FieldType,
    /// The JSON type actually found.
    pub actual: String,
}

/// Structured result of validating a value map against one side of a
/// signature. Extra fields are informational, not failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureDiagnosis {
    /// Name of the signature the map was checked against.
    pub signature: String,
    /// Declared fields absent from the map.
    pub missing: Vec<String>,
    /// Fields present with a non-conforming value.
    pub mismatched: Vec<FieldMismatch>,
    /// Fields present but not declared. Allowed; listed for debugging.
    pub extra: Vec<String>,
}

impl SignatureDiagnosis {
    /// Whether the map satisfied the contract.
    pub fn ok(&self) -> bool {
        self.missing.is_empty() && self.mismatched.is_empty()
    }
}

impl fmt::Display for SignatureDiagnosis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ok() {
            return write!(f, "ok");
        }
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!("missing fields: {}", self.missing.join(", ")));
        }
        for m in &self.mismatched {
            parts.push(format!(
                "{}: expected {}, got {}",
                m.field,
                m.expected.name(),
                m.actual
            ));
        }
        write!(f, "{}", parts.join("; "))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// PROCESS-WIDE REGISTRY
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn registry() -> &'static RwLock<HashMap<String, Arc<Signature>>> {
    static REGISTRY: OnceLock<RwLock<HashMap<String, Arc<Signature>>>> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Define (or redefine) a signature under its name.
///
/// Idempotent by name: the last definition within a process wins.
pub fn define(
    name: impl Into<String>,
    inputs: Vec<FieldSpec>,
    outputs: Vec<FieldSpec>,
) -> Result<Arc<Signature>, SignatureError> {
    let name = name.into();
    let sig = Arc::new(Signature::new(name.clone(), inputs, outputs)?);
    registry()
        .write()
        .expect("signature registry poisoned")
        .insert(name, Arc::clone(&sig));
    Ok(sig)
}

/// Look up a previously defined signature.
pub fn lookup(name: &str) -> Option<Arc<Signature>> {
    registry()
        .read()
        .expect("signature registry poisoned")
        .get(name)
        .cloned()
}

/// Clear the registry. Test hook.
pub fn reset() {
    registry()
        .write()
        .expect("signature registry poisoned")
        .clear();
}

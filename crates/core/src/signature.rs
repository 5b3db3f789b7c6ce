//! Model signatures and the type mapping used to annotate their fields.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Type tag of a signature field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    Boolean,
    Integer,
    Long,
    Float,
    Double,
    String,
    Binary,
    Datetime,
    Other(std::string::String),
}

impl FieldType {
    pub fn parse(tag: &str) -> Self {
        match tag {
            "boolean" | "bool" => FieldType::Boolean,
            "integer" | "int" | "int32" => FieldType::Integer,
            "long" | "int64" => FieldType::Long,
            "float" | "float32" => FieldType::Float,
            "double" | "float64" => FieldType::Double,
            "string" | "str" => FieldType::String,
            "binary" | "bytes" => FieldType::Binary,
            "datetime" => FieldType::Datetime,
            other => FieldType::Other(other.to_string()),
        }
    }

    /// The tag as the backend spells it.
    pub fn as_str(&self) -> &str {
        match self {
            FieldType::Boolean => "boolean",
            FieldType::Integer => "integer",
            FieldType::Long => "long",
            FieldType::Float => "float",
            FieldType::Double => "double",
            FieldType::String => "string",
            FieldType::Binary => "binary",
            FieldType::Datetime => "datetime",
            FieldType::Other(tag) => tag,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FieldType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = std::string::String::deserialize(deserializer)?;
        Ok(FieldType::parse(&tag))
    }
}

impl Serialize for FieldType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignatureSpec {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub inputs: Vec<FieldSpec>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub params: Vec<FieldSpec>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub outputs: Vec<FieldSpec>,
}

/// Response of `/model/{model}-{version}/signature`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelSignature {
    pub signature: SignatureSpec,
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<FieldSpec>, D::Error> {
    Ok(Option::<Vec<FieldSpec>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Example value and note for one type tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeInfo {
    #[serde(default)]
    pub example: serde_json::Value,
    #[serde(default)]
    pub notes: String,
}

impl TypeInfo {
    fn unknown() -> Self {
        Self {
            example: serde_json::Value::String("Unknown type".to_string()),
            notes: "Type not found in mapping".to_string(),
        }
    }

    /// Example rendered for a placeholder.
    pub fn example_text(&self) -> String {
        match &self.example {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

/// Response of `/type_mapping`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeMapping {
    #[serde(default)]
    pub python_to_mlflow_types: HashMap<String, TypeInfo>,
}

impl TypeMapping {
    pub fn lookup(&self, tag: &str) -> TypeInfo {
        self.python_to_mlflow_types
            .get(tag)
            .cloned()
            .unwrap_or_else(TypeInfo::unknown)
    }

    /// `"Type: <tag> - <notes>"`, the helper line shown under an input.
    pub fn describe(&self, field: &FieldSpec) -> String {
        format!("Type: {} - {}", field.field_type, self.lookup(field.field_type.as_str()).notes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_signature_with_missing_sections() {
        let body = r#"{"signature": {"inputs": [{"name": "amount", "type": "double"}], "params": null}}"#;
        let sig: ModelSignature = serde_json::from_str(body).unwrap();
        assert_eq!(sig.signature.inputs.len(), 1);
        assert_eq!(sig.signature.inputs[0].field_type, FieldType::Double);
        assert!(sig.signature.params.is_empty());
        assert!(sig.signature.outputs.is_empty());
    }

    #[test]
    fn unknown_tags_are_preserved() {
        let field: FieldSpec =
            serde_json::from_str(r#"{"name": "img", "type": "tensor"}"#).unwrap();
        assert_eq!(field.field_type, FieldType::Other("tensor".into()));
        assert_eq!(field.field_type.to_string(), "tensor");
    }

    #[test]
    fn lookup_falls_back_for_unmapped_types() {
        let mapping: TypeMapping = serde_json::from_str(
            r#"{"python_to_mlflow_types": {"double": {"example": 3.14, "notes": "64-bit float"}}}"#,
        )
        .unwrap();

        let known = mapping.lookup("double");
        assert_eq!(known.example_text(), "3.14");
        assert_eq!(known.notes, "64-bit float");

        let unknown = mapping.lookup("tensor");
        assert_eq!(unknown.example_text(), "Unknown type");
        assert_eq!(unknown.notes, "Type not found in mapping");

        let field = FieldSpec {
            name: "amount".into(),
            field_type: FieldType::Double,
        };
        assert_eq!(mapping.describe(&field), "Type: double - 64-bit float");
    }
}

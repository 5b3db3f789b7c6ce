//! Input form derived from a model signature.
//!
//! Each input and param becomes a [`FormField`] whose [`FieldType`] decides
//! how the typed text is turned into a JSON value for the inference payload.

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::signature::{FieldSpec, FieldType, ModelSignature, TypeMapping};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldGroup {
    Input,
    Param,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormField {
    pub spec: FieldSpec,
    pub group: FieldGroup,
    pub placeholder: String,
    pub help: String,
    pub value: String,
}

impl FormField {
    /// Convert the entered text into the JSON value sent to the model.
    ///
    /// Returns `Ok(None)` for an empty field, which is left out of the payload.
    pub fn to_value(&self) -> Result<Option<Value>> {
        let text = self.value.trim();
        if text.is_empty() {
            return Ok(None);
        }

        let invalid = |kind: &str| {
            Error::validation(format!("{}: expected {}, got '{}'", self.spec.name, kind, text))
        };

        let value = match &self.spec.field_type {
            FieldType::Boolean => match text.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Value::Bool(true),
                "false" | "0" | "no" => Value::Bool(false),
                _ => return Err(invalid("a boolean")),
            },
            FieldType::Integer | FieldType::Long => {
                Value::from(text.parse::<i64>().map_err(|_| invalid("an integer"))?)
            }
            FieldType::Float | FieldType::Double => {
                let n = text.parse::<f64>().map_err(|_| invalid("a number"))?;
                serde_json::Number::from_f64(n)
                    .map(Value::Number)
                    .ok_or_else(|| invalid("a finite number"))?
            }
            FieldType::String | FieldType::Binary | FieldType::Datetime => {
                Value::String(self.value.clone())
            }
            FieldType::Other(_) => {
                serde_json::from_str(text).unwrap_or_else(|_| Value::String(self.value.clone()))
            }
        };
        Ok(Some(value))
    }

    pub fn error(&self) -> Option<String> {
        self.to_value().err().map(|e| e.to_string())
    }
}

/// Editable form for the inputs and params of one signature.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignatureForm {
    pub fields: Vec<FormField>,
}

impl SignatureForm {
    pub fn new(signature: &ModelSignature, mapping: &TypeMapping) -> Self {
        let spec = &signature.signature;
        let fields = spec
            .inputs
            .iter()
            .map(|f| (f, FieldGroup::Input))
            .chain(spec.params.iter().map(|f| (f, FieldGroup::Param)))
            .map(|(field, group)| {
                let info = mapping.lookup(field.field_type.as_str());
                let example = info.example_text();
                FormField {
                    spec: field.clone(),
                    group,
                    placeholder: if example.is_empty() {
                        "Enter value".to_string()
                    } else {
                        example
                    },
                    help: mapping.describe(field),
                    value: String::new(),
                }
            })
            .collect();
        Self { fields }
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) -> Result<()> {
        let field = self
            .fields
            .iter_mut()
            .find(|f| f.spec.name == name)
            .ok_or_else(|| Error::validation(format!("Unknown field: {}", name)))?;
        field.value = value.into();
        Ok(())
    }

    pub fn clear(&mut self) {
        for field in &mut self.fields {
            field.value.clear();
        }
    }

    /// Build the JSON object sent to the model: one key per non-empty field.
    pub fn payload(&self) -> Result<Value> {
        let mut object = Map::new();
        for field in &self.fields {
            if let Some(value) = field.to_value()? {
                object.insert(field.spec.name.clone(), value);
            }
        }
        Ok(Value::Object(object))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn form() -> SignatureForm {
        let signature: ModelSignature = serde_json::from_value(json!({
            "signature": {
                "inputs": [
                    {"name": "amount", "type": "double"},
                    {"name": "count", "type": "long"},
                    {"name": "merchant", "type": "string"},
                    {"name": "flagged", "type": "boolean"}
                ],
                "params": [{"name": "threshold", "type": "float"}],
                "outputs": [{"name": "score", "type": "double"}]
            }
        }))
        .unwrap();
        let mapping: TypeMapping = serde_json::from_value(json!({
            "python_to_mlflow_types": {"double": {"example": 1.5, "notes": "64-bit float"}}
        }))
        .unwrap();
        SignatureForm::new(&signature, &mapping)
    }

    #[test]
    fn fields_cover_inputs_then_params() {
        let form = form();
        let names: Vec<_> = form.fields.iter().map(|f| f.spec.name.as_str()).collect();
        assert_eq!(names, vec!["amount", "count", "merchant", "flagged", "threshold"]);
        assert_eq!(form.fields[4].group, FieldGroup::Param);
        assert_eq!(form.fields[0].placeholder, "1.5");
        assert_eq!(form.fields[0].help, "Type: double - 64-bit float");
        assert_eq!(form.fields[1].placeholder, "Unknown type");
    }

    #[test]
    fn payload_converts_by_type_and_skips_empty() {
        let mut form = form();
        form.set("amount", "12.5").unwrap();
        form.set("count", "3").unwrap();
        form.set("flagged", "True").unwrap();

        assert_eq!(
            form.payload().unwrap(),
            json!({"amount": 12.5, "count": 3, "flagged": true})
        );
    }

    #[test]
    fn bad_values_are_reported_per_field() {
        let mut form = form();
        form.set("count", "three").unwrap();

        assert_eq!(
            form.fields[1].error().unwrap(),
            "count: expected an integer, got 'three'"
        );
        assert!(form.payload().is_err());

        form.clear();
        assert_eq!(form.payload().unwrap(), json!({}));
        assert!(form.set("missing", "1").is_err());
    }
}

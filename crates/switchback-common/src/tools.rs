//! Tool declarations and model-issued tool calls.

use std::collections::BTreeMap;

use log::warn;
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;
use uuid::Uuid;

/// Describes a single property in a function parameter schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Property {
    /// The JSON type (e.g., "string", "number", "object").
    #[serde(rename = "type")]
    pub prop_type: String,
    /// Human-readable description of this property.
    pub description: String,
    /// Allowed enum values for this property.
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
}

impl Property {
    fn typed(prop_type: &str, description: impl Into<String>) -> Self {
        Self {
            prop_type: prop_type.to_string(),
            description: description.into(),
            enum_values: None,
        }
    }

    /// Creates a string property.
    #[must_use]
    pub fn string(description: impl Into<String>) -> Self {
        Self::typed("string", description)
    }

    /// Creates a number property.
    #[must_use]
    pub fn number(description: impl Into<String>) -> Self {
        Self::typed("number", description)
    }

    /// Creates an integer property.
    #[must_use]
    pub fn integer(description: impl Into<String>) -> Self {
        Self::typed("integer", description)
    }

    /// Creates a boolean property.
    #[must_use]
    pub fn boolean(description: impl Into<String>) -> Self {
        Self::typed("boolean", description)
    }

    /// Creates a string property restricted to the given values.
    #[must_use]
    pub fn string_enum(description: impl Into<String>, values: &[&str]) -> Self {
        Self {
            enum_values: Some(values.iter().map(|v| (*v).to_string()).collect()),
            ..Self::typed("string", description)
        }
    }
}

/// Parameter schema for a function, expressed as a JSON Schema object.
///
/// Properties are kept in a `BTreeMap` so the serialized schema is stable
/// across requests.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Parameters {
    /// The JSON type, always "object".
    #[serde(rename = "type")]
    pub param_type: String,
    /// Map of parameter names to their property definitions.
    pub properties: BTreeMap<String, Property>,
    /// List of required parameter names.
    pub required: Vec<String>,
    /// Whether keys outside `properties` are accepted.
    #[serde(rename = "additionalProperties")]
    pub additional_properties: bool,
}

impl Parameters {
    /// Creates an object schema that rejects unknown keys.
    #[must_use]
    pub fn new(properties: BTreeMap<String, Property>, required: Vec<String>) -> Self {
        Self {
            param_type: "object".to_string(),
            properties,
            required,
            additional_properties: false,
        }
    }

    /// An object schema with no parameters.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(BTreeMap::new(), Vec::new())
    }

    /// Adds a property, marking it required when `required` is set.
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, property: Property, required: bool) -> Self {
        let name = name.into();
        if required {
            self.required.push(name.clone());
        }
        self.properties.insert(name, property);
        self
    }
}

impl From<Parameters> for serde_json::Value {
    fn from(params: Parameters) -> Self {
        // Every field is a string, map or bool, so this cannot fail in practice.
        match serde_json::to_value(params) {
            Ok(value) => value,
            Err(e) => {
                warn!("Parameters serialization unexpectedly failed: {e}");
                Self::Null
            }
        }
    }
}

/// A function the model may call, sent with every request that offers tools.
///
/// The `name` is the key the model echoes back in a function call and must
/// match a registered handler exactly.
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder, PartialEq, Eq)]
pub struct ToolDeclaration {
    /// The function name (e.g. `get_weather`).
    #[builder(setter(into))]
    pub name: String,
    /// When and how the model should use the function.
    #[builder(setter(into))]
    pub description: String,
    /// JSON Schema describing the argument object.
    #[builder(setter(into))]
    pub parameters: serde_json::Value,
    /// Whether the server should enforce the schema on generated arguments.
    #[builder(default)]
    pub strict: bool,
}

impl ToolDeclaration {
    /// Names listed under `required` in the parameter schema.
    #[must_use]
    pub fn required_arguments(&self) -> Vec<&str> {
        self.parameters
            .get("required")
            .and_then(serde_json::Value::as_array)
            .map(|names| names.iter().filter_map(serde_json::Value::as_str).collect())
            .unwrap_or_default()
    }
}

/// A model-issued request to run a function.
///
/// `arguments` is passed through untouched from the response; it is only
/// checked for JSON syntax when the call is dispatched.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ToolCall {
    /// Identifier of the output item that carried the call.
    pub id: String,
    /// Correlation id echoed back with the call's result.
    pub call_id: String,
    /// Name of the function being invoked.
    pub name: String,
    /// Arguments as a JSON text blob.
    pub arguments: String,
}

impl ToolCall {
    /// Creates a tool call with a generated item id.
    pub fn new(
        call_id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: format!("fc_{}", Uuid::new_v4().simple()),
            call_id: call_id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Returns the arguments, substituting `"{}"` for an empty blob.
    #[must_use]
    pub fn arguments_json(&self) -> &str {
        if self.arguments.trim().is_empty() {
            "{}"
        } else {
            &self.arguments
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;
    use serde_json::json;

    #[test]
    fn test_property_creation() {
        let prop = Property::number("Latitude of the location");
        assert_eq!(prop.prop_type, "number");
        assert!(prop.enum_values.is_none());

        let prop = Property::string_enum("Unit", &["celsius", "fahrenheit"]);
        assert_eq!(
            prop.enum_values,
            Some(vec!["celsius".to_string(), "fahrenheit".to_string()])
        );
    }

    #[test]
    fn test_parameters_serialize_with_additional_properties() {
        let params = Parameters::empty()
            .with_property("latitude", Property::number("Latitude"), true)
            .with_property("longitude", Property::number("Longitude"), true);

        let value: serde_json::Value = params.into();
        assert_eq!(
            value,
            json!({
                "type": "object",
                "properties": {
                    "latitude": {"type": "number", "description": "Latitude"},
                    "longitude": {"type": "number", "description": "Longitude"}
                },
                "required": ["latitude", "longitude"],
                "additionalProperties": false
            })
        );
    }

    #[test]
    fn test_declaration_required_arguments() {
        let decl = ToolDeclaration::builder()
            .name("get_weather")
            .description("Retrieves current weather for the given location.")
            .parameters(json!({
                "type": "object",
                "properties": {},
                "required": ["latitude", "longitude"]
            }))
            .build();

        assert_eq!(decl.required_arguments(), vec!["latitude", "longitude"]);
        assert!(!decl.strict);
    }

    #[test]
    fn test_declaration_without_required_list() {
        let decl = ToolDeclaration::builder()
            .name("now")
            .description("Current time")
            .parameters(json!({"type": "object"}))
            .build();

        assert!(decl.required_arguments().is_empty());
    }

    #[test]
    fn test_arguments_json_defaults_empty() {
        let call = ToolCall::new("call_1", "now", "");
        assert_eq!(call.arguments_json(), "{}");

        let call = ToolCall::new("call_1", "now", "  ");
        assert_eq!(call.arguments_json(), "{}");

        let call = ToolCall::new("call_2", "get_weather", r#"{"latitude":1}"#);
        assert_eq!(call.arguments_json(), r#"{"latitude":1}"#);
        assert!(call.id.starts_with("fc_"));
    }
}

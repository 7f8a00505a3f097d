use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// JSON object used for tool arguments and schemas.
pub type JsonObject = serde_json::Map<String, Value>;

// Typed schema IR for tool parameters.
//
// Only the structural subset of JSON Schema that matters for filling in
// missing arguments is captured. Unrecognized schemas map to `Ty::Any`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Ty {
    /// Unknown or too complex type.
    Any,
    /// Explicit JSON `null`.
    Null,
    String,
    Integer,
    Number,
    Boolean,
    Array(Box<Ty>),
    Object {
        /// Known object properties and their types.
        properties: BTreeMap<String, Ty>,
        /// Whether additional, unknown properties are allowed.
        additional: bool,
    },
    /// A union of multiple possible types (e.g. anyOf/oneOf or ["string", "null"]).
    Union(Vec<Ty>),
}

impl Ty {
    /// Construct a `Ty` from a JSON Schema-like value.
    ///
    /// Understands:
    /// - `type`: "string" | "integer" | "number" | "boolean" | "null"
    /// - `type`: "array" with `items`
    /// - `type`: "object" with `properties` and optional `additionalProperties`
    /// - `type`: [ ... ] of primitive type strings (treated as `Union`)
    /// - `anyOf` / `oneOf` (treated as `Union`)
    ///
    /// Anything else is mapped to `Ty::Any`.
    pub fn from_json_schema(schema: &Value) -> Ty {
        fn simple_type(s: &str) -> Ty {
            match s {
                "string" => Ty::String,
                "integer" => Ty::Integer,
                "number" => Ty::Number,
                "boolean" => Ty::Boolean,
                "null" => Ty::Null,
                "array" => Ty::Array(Box::new(Ty::Any)),
                "object" => Ty::Object {
                    properties: BTreeMap::new(),
                    additional: true,
                },
                _ => Ty::Any,
            }
        }

        fn union_of(mut tys: Vec<Ty>) -> Ty {
            match tys.len() {
                0 => Ty::Any,
                1 => tys.remove(0),
                _ => Ty::Union(tys),
            }
        }

        if let Some(type_value) = schema.get("type") {
            match type_value {
                Value::String(s) => match s.as_str() {
                    "array" => {
                        let item_ty = schema
                            .get("items")
                            .map(Ty::from_json_schema)
                            .unwrap_or(Ty::Any);
                        Ty::Array(Box::new(item_ty))
                    }
                    "object" => {
                        let mut props = BTreeMap::new();
                        if let Some(Value::Object(map)) = schema.get("properties") {
                            for (name, prop_schema) in map {
                                props.insert(name.clone(), Ty::from_json_schema(prop_schema));
                            }
                        }

                        // `additionalProperties` may also be a schema; only the
                        // boolean form is distinguished.
                        let additional = schema
                            .get("additionalProperties")
                            .and_then(|v| v.as_bool())
                            .unwrap_or(true);

                        Ty::Object {
                            properties: props,
                            additional,
                        }
                    }
                    other => simple_type(other),
                },
                Value::Array(arr) => union_of(
                    arr.iter()
                        .filter_map(|v| v.as_str())
                        .map(simple_type)
                        .collect(),
                ),
                _ => Ty::Any,
            }
        } else if let Some(Value::Array(variants)) =
            schema.get("anyOf").or_else(|| schema.get("oneOf"))
        {
            union_of(variants.iter().map(Ty::from_json_schema).collect())
        } else {
            Ty::Any
        }
    }

    /// Placeholder value used when a required argument could not be extracted.
    ///
    /// Strings become `""`, numbers `0`, arrays `[]`, booleans `false`;
    /// everything else (objects, unions, unknown) becomes `null`.
    pub fn default_value(&self) -> Value {
        match self {
            Ty::String => Value::String(String::new()),
            Ty::Integer | Ty::Number => Value::from(0),
            Ty::Array(_) => Value::Array(Vec::new()),
            Ty::Boolean => Value::Bool(false),
            _ => Value::Null,
        }
    }
}

/// A single parameter declared by a tool's input schema.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    pub name: String,
    pub description: Option<String>,
    pub ty: Ty,
    pub required: bool,
}

impl ParameterSpec {
    /// Flatten an object schema into its parameters, required ones first in
    /// the order the schema lists them, optional ones after.
    pub fn from_schema(schema: &JsonObject) -> Vec<ParameterSpec> {
        let properties = schema
            .get("properties")
            .and_then(|p| p.as_object())
            .cloned()
            .unwrap_or_default();

        let required: Vec<String> = schema
            .get("required")
            .and_then(|r| r.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        let describe = |name: &str, required: bool| {
            let prop = properties.get(name).cloned().unwrap_or(Value::Null);
            ParameterSpec {
                name: name.to_string(),
                description: prop
                    .get("description")
                    .and_then(|d| d.as_str())
                    .map(str::to_string),
                ty: Ty::from_json_schema(&prop),
                required,
            }
        };

        let mut specs: Vec<ParameterSpec> =
            required.iter().map(|name| describe(name, true)).collect();
        for name in properties.keys() {
            if !required.contains(name) {
                specs.push(describe(name, false));
            }
        }
        specs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_primitive_types() {
        assert_eq!(Ty::from_json_schema(&json!({"type": "string"})), Ty::String);
        assert_eq!(Ty::from_json_schema(&json!({"type": "integer"})), Ty::Integer);
        assert_eq!(Ty::from_json_schema(&json!({"type": "number"})), Ty::Number);
        assert_eq!(Ty::from_json_schema(&json!({"type": "boolean"})), Ty::Boolean);
        assert_eq!(Ty::from_json_schema(&json!({})), Ty::Any);
    }

    #[test]
    fn test_array_and_union() {
        assert_eq!(
            Ty::from_json_schema(&json!({"type": "array", "items": {"type": "string"}})),
            Ty::Array(Box::new(Ty::String))
        );
        assert_eq!(
            Ty::from_json_schema(&json!({"type": ["string", "null"]})),
            Ty::Union(vec![Ty::String, Ty::Null])
        );
        assert_eq!(
            Ty::from_json_schema(&json!({"anyOf": [{"type": "number"}]})),
            Ty::Number
        );
    }

    #[test]
    fn test_default_values() {
        assert_eq!(Ty::String.default_value(), json!(""));
        assert_eq!(Ty::Number.default_value(), json!(0));
        assert_eq!(Ty::Integer.default_value(), json!(0));
        assert_eq!(Ty::Array(Box::new(Ty::Any)).default_value(), json!([]));
        assert_eq!(Ty::Boolean.default_value(), json!(false));
        assert_eq!(
            Ty::from_json_schema(&json!({"type": "object"})).default_value(),
            Value::Null
        );
        assert_eq!(Ty::Any.default_value(), Value::Null);
    }

    #[test]
    fn test_parameter_specs_required_first() {
        let schema = json!({
            "type": "object",
            "properties": {
                "size": {"type": "number", "description": "Square feet"},
                "location": {"type": "string", "description": "Where"},
                "property_type": {"type": "string"}
            },
            "required": ["property_type", "location"]
        });
        let specs = ParameterSpec::from_schema(schema.as_object().unwrap());

        let names: Vec<&str> = specs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["property_type", "location", "size"]);
        assert!(specs[0].required && specs[1].required && !specs[2].required);
        assert_eq!(specs[1].description.as_deref(), Some("Where"));
        assert_eq!(specs[2].ty, Ty::Number);
    }
}

//! Snapshot parsing and the field classification pass.
//!
//! The schema loader hands over a JSON snapshot of each model's schema tree.
//! Every raw field value is classified exactly once into a [`FieldKind`]
//! variant; later stages only pattern-match on the result.
//!
//! Encodings for values JSON cannot express:
//! - `{"$schema": {...}}` / `{"$schema": "<id>"}`: child schema, inline or from the registry
//! - `{"$function": "..."}`: a function value (for example a computed `ref`)
//! - `{"$undefined": true}`: an explicit `undefined` (for example `default: undefined`)

use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::ast::{
    ArrayDescriptor, DefaultValue, FieldDescriptor, FieldKind, FieldTree, MapDescriptor,
    ModelDescriptor, Primitive, PrimitiveKind, RefTarget, ReferenceDescriptor, Required,
    SchemaDescriptor, SchemaSlot, VirtualDescriptor,
};
use crate::error::TypegenError;

const SCHEMA_KEY: &str = "$schema";
const FUNCTION_KEY: &str = "$function";
const UNDEFINED_KEY: &str = "$undefined";

#[derive(Debug, Clone, PartialEq)]
/// Classified snapshot: shared schema registry plus models in input order.
pub struct Snapshot {
    pub schemas: IndexMap<String, SchemaDescriptor>,
    pub models: Vec<ModelDescriptor>,
}

#[derive(Deserialize)]
struct RawSnapshot {
    #[serde(default)]
    schemas: IndexMap<String, JsonValue>,
    models: Vec<RawModel>,
}

#[derive(Deserialize)]
struct RawModel {
    name: String,
    schema: JsonValue,
    #[serde(default)]
    methods: Vec<String>,
    #[serde(default)]
    statics: Vec<String>,
    #[serde(default, alias = "query")]
    queries: Vec<String>,
    #[serde(default)]
    virtuals: Vec<String>,
    #[serde(default)]
    comments: IndexMap<String, String>,
}

/// Parses snapshot JSON text.
pub fn parse_snapshot(input: &str) -> Result<Snapshot, TypegenError> {
    let value: JsonValue = serde_json::from_str(input)
        .map_err(|e| TypegenError::Serialization(format!("invalid snapshot JSON: {e}")))?;
    snapshot_from_value(value)
}

/// Builds a [`Snapshot`] from an already parsed JSON value.
pub fn snapshot_from_value(value: JsonValue) -> Result<Snapshot, TypegenError> {
    let raw: RawSnapshot = serde_json::from_value(value)
        .map_err(|e| TypegenError::Snapshot(format!("unexpected snapshot shape: {e}")))?;

    let mut schemas = IndexMap::new();
    for (id, schema_json) in &raw.schemas {
        let mut schema = parse_schema(schema_json)
            .map_err(|e| TypegenError::Snapshot(format!("schemas.{id}: {e}")))?;
        schema.registry_id = Some(id.clone());
        schemas.insert(id.clone(), schema);
    }

    let mut models = Vec::with_capacity(raw.models.len());
    for model in raw.models {
        let schema = match &model.schema {
            JsonValue::String(id) => schemas.get(id).cloned().ok_or_else(|| {
                TypegenError::Snapshot(format!(
                    "model '{}' references unknown schema id '{id}'",
                    model.name
                ))
            })?,
            other => parse_schema(other).map_err(|e| {
                TypegenError::Snapshot(format!("model '{}': {e}", model.name))
            })?,
        };
        models.push(ModelDescriptor {
            name: model.name,
            schema,
            methods: model.methods.into_iter().collect::<BTreeSet<_>>(),
            statics: model.statics.into_iter().collect(),
            queries: model.queries.into_iter().collect(),
            virtuals: model.virtuals.into_iter().collect(),
            comments: model.comments,
        });
    }

    Ok(Snapshot { schemas, models })
}

/// Parses a `{tree, aliases, options}` schema object.
pub fn parse_schema(value: &JsonValue) -> Result<SchemaDescriptor, TypegenError> {
    let map = value
        .as_object()
        .ok_or_else(|| TypegenError::Snapshot("schema must be an object".to_string()))?;

    let tree = match map.get("tree") {
        Some(JsonValue::Object(tree)) => tree,
        Some(_) => {
            return Err(TypegenError::Snapshot(
                "schema.tree must be an object".to_string(),
            ))
        }
        None => {
            return Err(TypegenError::Snapshot(
                "schema is missing 'tree'".to_string(),
            ))
        }
    };

    let mut aliases = IndexMap::new();
    if let Some(raw_aliases) = map.get("aliases") {
        let raw_aliases = raw_aliases.as_object().ok_or_else(|| {
            TypegenError::Snapshot("schema.aliases must be an object".to_string())
        })?;
        for (alias, target) in raw_aliases {
            let target = target.as_str().ok_or_else(|| {
                TypegenError::Snapshot(format!("schema.aliases.{alias} must be a string"))
            })?;
            aliases.insert(alias.clone(), target.to_string());
        }
    }

    let mut schema = SchemaDescriptor::new(classify_tree(tree));
    schema.aliases = aliases;
    schema.lean_include_virtuals = map
        .get("options")
        .map(lean_includes_virtuals)
        .unwrap_or(false);
    Ok(schema)
}

/// Lean output carries virtuals when `toObject` or `toJSON` serialization includes them.
fn lean_includes_virtuals(options: &JsonValue) -> bool {
    ["toObject", "toJSON"].iter().any(|key| {
        options
            .get(key)
            .and_then(|o| o.get("virtuals"))
            .and_then(JsonValue::as_bool)
            .unwrap_or(false)
    })
}

pub fn classify_tree(tree: &JsonMap<String, JsonValue>) -> FieldTree {
    tree.iter()
        .map(|(key, value)| (key.clone(), classify_field(value)))
        .collect()
}

/// Classifies one raw field value.
pub fn classify_field(value: &JsonValue) -> FieldDescriptor {
    match value {
        JsonValue::String(marker) => FieldDescriptor::new(kind_for_marker(marker, None)),
        JsonValue::Array(items) => FieldDescriptor::new(array_kind(items.first())),
        JsonValue::Object(map) => classify_object(map),
        other => FieldDescriptor::new(FieldKind::Unknown(other.to_string())),
    }
}

fn classify_object(map: &JsonMap<String, JsonValue>) -> FieldDescriptor {
    if map.is_empty() {
        return FieldDescriptor::new(FieldKind::Mixed);
    }
    if let Some(slot) = map.get(SCHEMA_KEY) {
        return with_modifiers(schema_slot(slot), map);
    }
    if is_virtual_shape(map) {
        return FieldDescriptor::new(FieldKind::Virtual(VirtualDescriptor { alias_of: None }));
    }

    let kind = match map.get("type") {
        Some(JsonValue::String(marker)) => {
            if map.contains_key("ref") && !matches!(marker.as_str(), "Map" | "Array") {
                reference_kind(map)
            } else {
                kind_for_marker(marker, Some(map))
            }
        }
        Some(JsonValue::Array(items)) => match items.first() {
            Some(JsonValue::String(marker)) => marker_array_kind(marker, map),
            element => array_kind(element),
        },
        Some(JsonValue::Object(inner)) if inner.contains_key("type") => {
            // `{ type: { type: X }, ... }` declares a nested path with a field named `type`.
            return FieldDescriptor::new(FieldKind::Nested(classify_tree(map)));
        }
        Some(JsonValue::Object(inner)) if inner.is_empty() => FieldKind::Mixed,
        Some(JsonValue::Object(inner)) if inner.contains_key(SCHEMA_KEY) => {
            schema_slot(&inner[SCHEMA_KEY])
        }
        Some(JsonValue::Object(inner)) => FieldKind::Nested(classify_tree(inner)),
        Some(other) => FieldKind::Unknown(other.to_string()),
        None if map.contains_key("ref") => reference_kind(map),
        None => return FieldDescriptor::new(FieldKind::Nested(classify_tree(map))),
    };

    with_modifiers(kind, map)
}

fn is_virtual_shape(map: &JsonMap<String, JsonValue>) -> bool {
    map.contains_key("path") && map.contains_key("getters") && map.contains_key("setters")
}

fn with_modifiers(kind: FieldKind, map: &JsonMap<String, JsonValue>) -> FieldDescriptor {
    FieldDescriptor {
        kind,
        required: parse_required(map.get("required")),
        default: parse_default(map),
        index: map.get("index").and_then(JsonValue::as_str).map(str::to_string),
    }
}

fn parse_required(value: Option<&JsonValue>) -> Required {
    match value {
        Some(JsonValue::Bool(flag)) => Required::from_flag(*flag),
        Some(JsonValue::Array(items)) => match items.first() {
            Some(JsonValue::Bool(flag)) => Required::from_flag(*flag),
            _ => Required::Unset,
        },
        _ => Required::Unset,
    }
}

fn parse_default(map: &JsonMap<String, JsonValue>) -> DefaultValue {
    match map.get("default") {
        None => DefaultValue::Absent,
        Some(JsonValue::Null) => DefaultValue::Null,
        Some(value) if is_undefined(value) => DefaultValue::Undefined,
        Some(value) => DefaultValue::Value(value.clone()),
    }
}

pub fn is_undefined(value: &JsonValue) -> bool {
    value
        .get(UNDEFINED_KEY)
        .and_then(JsonValue::as_bool)
        .unwrap_or(false)
}

fn is_function(value: &JsonValue) -> bool {
    value.get(FUNCTION_KEY).is_some()
}

fn kind_for_marker(marker: &str, options: Option<&JsonMap<String, JsonValue>>) -> FieldKind {
    let primitive = |kind| {
        FieldKind::Primitive(Primitive {
            kind,
            enum_values: options.and_then(enum_values),
        })
    };
    match marker {
        "String" => primitive(PrimitiveKind::String),
        "Number" | "Int32" | "Double" => primitive(PrimitiveKind::Number),
        "Boolean" | "Bool" => primitive(PrimitiveKind::Boolean),
        "Date" => primitive(PrimitiveKind::Date),
        "Buffer" | "buffer" => primitive(PrimitiveKind::Buffer),
        "Decimal128" | "Decimal" => primitive(PrimitiveKind::Decimal),
        "ObjectId" | "ObjectID" => primitive(PrimitiveKind::ObjectId),
        "Mixed" => FieldKind::Mixed,
        "Object" => FieldKind::Object,
        "Array" => array_kind(None),
        "Map" => FieldKind::Map(MapDescriptor {
            value: options
                .and_then(|o| o.get("of"))
                .map(|of| Box::new(classify_field(of))),
        }),
        other => FieldKind::Unknown(other.to_string()),
    }
}

fn array_kind(element: Option<&JsonValue>) -> FieldKind {
    let element_dual_form = matches!(element, Some(JsonValue::Object(map)) if map.contains_key("type"));
    FieldKind::Array(ArrayDescriptor {
        element: element.map(|e| Box::new(classify_field(e))),
        element_dual_form,
        default_undefined_marker: false,
    })
}

/// `{type: [Marker], ref, enum, ...}`: element-level options sit on the outer map.
fn marker_array_kind(marker: &str, map: &JsonMap<String, JsonValue>) -> FieldKind {
    let element = if map.contains_key("ref") && !matches!(marker, "Map" | "Array") {
        reference_kind(map)
    } else {
        kind_for_marker(marker, Some(map))
    };
    FieldKind::Array(ArrayDescriptor {
        element: Some(Box::new(FieldDescriptor::new(element))),
        element_dual_form: false,
        default_undefined_marker: false,
    })
}

fn reference_kind(map: &JsonMap<String, JsonValue>) -> FieldKind {
    let target = match map.get("ref") {
        Some(JsonValue::String(name)) => RefTarget::Named(name.trim_matches('\'').to_string()),
        _ => RefTarget::Function,
    };
    let autopopulate = match map.get("autopopulate") {
        Some(JsonValue::Bool(flag)) => *flag,
        Some(JsonValue::Object(_)) => true,
        Some(value) => is_function(value),
        None => false,
    };
    FieldKind::Reference(ReferenceDescriptor {
        target,
        autopopulate,
    })
}

fn enum_values(map: &JsonMap<String, JsonValue>) -> Option<Vec<JsonValue>> {
    match map.get("enum")? {
        JsonValue::Array(values) => Some(values.clone()),
        JsonValue::Object(obj) => match obj.get("values") {
            Some(JsonValue::Array(values)) => Some(values.clone()),
            _ => Some(obj.values().cloned().collect()),
        },
        _ => None,
    }
}

fn schema_slot(value: &JsonValue) -> FieldKind {
    match value {
        JsonValue::String(id) => FieldKind::Schema(SchemaSlot::Registry(id.clone())),
        other => match parse_schema(other) {
            Ok(schema) => FieldKind::Schema(SchemaSlot::Inline(Box::new(schema))),
            Err(e) => FieldKind::Unknown(format!("invalid child schema ({e})")),
        },
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{classify_field, parse_snapshot};
    use crate::ast::{DefaultValue, FieldKind, PrimitiveKind, RefTarget, Required, SchemaSlot};

    #[test]
    fn classifies_shorthand_and_options() {
        let field = classify_field(&json!("String"));
        assert!(matches!(field.kind, FieldKind::Primitive(ref p) if p.kind == PrimitiveKind::String));
        assert_eq!(field.required, Required::Unset);

        let field = classify_field(&json!({"type": "Number", "required": [true, "needed"]}));
        assert!(matches!(field.kind, FieldKind::Primitive(ref p) if p.kind == PrimitiveKind::Number));
        assert_eq!(field.required, Required::Yes);
    }

    #[test]
    fn classifies_empty_object_as_mixed() {
        assert_eq!(classify_field(&json!({})).kind, FieldKind::Mixed);
        assert_eq!(classify_field(&json!({"type": {}})).kind, FieldKind::Mixed);
        assert_eq!(classify_field(&json!("Mixed")).kind, FieldKind::Mixed);
    }

    #[test]
    fn classifies_arrays_and_dual_form() {
        let FieldKind::Array(array) = classify_field(&json!([])).kind else {
            panic!("expected array");
        };
        assert!(array.element.is_none());

        let FieldKind::Array(array) =
            classify_field(&json!({"type": [{"type": "ObjectId", "ref": "User"}]})).kind
        else {
            panic!("expected array");
        };
        assert!(array.element_dual_form);
        let element = array.element.unwrap();
        assert!(matches!(element.kind, FieldKind::Reference(ref r) if r.target == RefTarget::Named("User".into())));
    }

    #[test]
    fn array_options_apply_to_marker_elements() {
        let FieldKind::Array(array) = classify_field(&json!({
            "type": ["ObjectId"],
            "ref": "User",
            "autopopulate": true
        }))
        .kind
        else {
            panic!("expected array");
        };
        assert!(!array.element_dual_form);
        let element = array.element.unwrap();
        assert!(matches!(
            element.kind,
            FieldKind::Reference(ref r) if r.target == RefTarget::Named("User".into()) && r.autopopulate
        ));

        let FieldKind::Array(array) =
            classify_field(&json!({"type": ["String"], "enum": ["a", "b"]})).kind
        else {
            panic!("expected array");
        };
        let element = array.element.unwrap();
        assert!(matches!(
            element.kind,
            FieldKind::Primitive(ref p) if p.enum_values == Some(vec![json!("a"), json!("b")])
        ));
    }

    #[test]
    fn classifies_references_and_defaults() {
        let field = classify_field(&json!({
            "type": "ObjectId",
            "ref": {"$function": "() => model"},
            "default": {"$undefined": true}
        }));
        assert!(matches!(field.kind, FieldKind::Reference(ref r) if r.target == RefTarget::Function));
        assert_eq!(field.default, DefaultValue::Undefined);

        let field = classify_field(&json!({"type": "String", "default": null}));
        assert_eq!(field.default, DefaultValue::Null);
    }

    #[test]
    fn classifies_nested_paths_and_virtuals() {
        let field = classify_field(&json!({"street": "String", "zip": {"type": "String"}}));
        let FieldKind::Nested(tree) = field.kind else {
            panic!("expected nested");
        };
        assert_eq!(tree.keys().collect::<Vec<_>>(), vec!["street", "zip"]);

        let field = classify_field(&json!({"path": "fullName", "getters": [], "setters": []}));
        assert!(matches!(field.kind, FieldKind::Virtual(_)));

        let field = classify_field(&json!({"type": {"type": "String"}, "amount": "Number"}));
        let FieldKind::Nested(tree) = field.kind else {
            panic!("expected nested");
        };
        assert!(tree.contains_key("type"));
        assert!(tree.contains_key("amount"));
    }

    #[test]
    fn unknown_markers_are_kept_for_diagnostics() {
        let field = classify_field(&json!({"type": "Email"}));
        assert_eq!(field.kind, FieldKind::Unknown("Email".to_string()));
    }

    #[test]
    fn parses_snapshot_with_registry_models() {
        let snapshot = parse_snapshot(
            r#"{
              "schemas": {"cat": {"tree": {"name": "String", "children": [{"$schema": "cat"}]}}},
              "models": [
                {"name": "Category", "schema": "cat", "methods": ["rename"]},
                {"name": "User", "schema": {"tree": {"email": "String"}, "options": {"toObject": {"virtuals": true}}}}
              ]
            }"#,
        )
        .unwrap();

        assert_eq!(snapshot.models.len(), 2);
        let category = &snapshot.models[0];
        assert_eq!(category.schema.registry_id.as_deref(), Some("cat"));
        assert!(category.methods.contains("rename"));
        let FieldKind::Array(array) = &category.schema.fields["children"].kind else {
            panic!("expected array");
        };
        assert!(matches!(
            array.element.as_ref().unwrap().kind,
            FieldKind::Schema(SchemaSlot::Registry(ref id)) if id == "cat"
        ));
        assert!(snapshot.models[1].schema.lean_include_virtuals);
    }

    #[test]
    fn rejects_unknown_model_schema_ids() {
        let err = parse_snapshot(r#"{"models": [{"name": "User", "schema": "missing"}]}"#)
            .unwrap_err();
        assert!(err.to_string().contains("unknown schema id 'missing'"));
    }
}

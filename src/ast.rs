//! Descriptor model shared by the normalizer, resolver, generator and assembler.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Ordered field table; insertion order is emission order.
pub type FieldTree = IndexMap<String, FieldDescriptor>;

#[derive(Debug, Clone, PartialEq)]
/// A named, possibly nested record definition.
pub struct SchemaDescriptor {
    /// Field name to descriptor, in declaration order.
    pub fields: FieldTree,
    /// Child schemas extracted by the normalizer, in discovery order.
    pub children: Vec<ChildSchema>,
    /// Alternate field name to canonical dotted path.
    pub aliases: IndexMap<String, String>,
    /// Registry id when the schema came from the snapshot's shared `schemas` table.
    pub registry_id: Option<String>,
    /// Whether lean output should include virtual fields.
    pub lean_include_virtuals: bool,
    /// Element schema of a subdocument array; picks the `Subdocument` base type.
    pub is_subdocument_array_element: bool,
    // The flags below describe where the child was lifted from. Generation does
    // not read them: optionality is decided on the owning field.
    /// Value schema of a map field.
    pub is_map_value: bool,
    /// The owning field declared `required: true`.
    pub required_override: bool,
    /// The owning array declared `default: undefined`.
    pub default_explicitly_undefined: bool,
}

impl SchemaDescriptor {
    pub fn new(fields: FieldTree) -> Self {
        Self {
            fields,
            children: Vec::new(),
            aliases: IndexMap::new(),
            registry_id: None,
            lean_include_virtuals: false,
            is_subdocument_array_element: false,
            is_map_value: false,
            required_override: false,
            default_explicitly_undefined: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
/// A child schema lifted out of its parent by the normalizer.
pub struct ChildSchema {
    /// Dotted field path inside the parent (`profile.addresses`).
    pub path: String,
    /// Derived, run-unique type name.
    pub name: String,
    /// Normalized child schema, itself carrying its own children.
    pub schema: SchemaDescriptor,
}

#[derive(Debug, Clone, PartialEq)]
/// One field declaration after classification.
pub struct FieldDescriptor {
    pub kind: FieldKind,
    pub required: Required,
    pub default: DefaultValue,
    /// Index type, when the field declares `index: "<type>"`.
    pub index: Option<String>,
}

impl FieldDescriptor {
    pub fn new(kind: FieldKind) -> Self {
        Self {
            kind,
            required: Required::Unset,
            default: DefaultValue::Absent,
            index: None,
        }
    }

    pub fn is_geospatial(&self) -> bool {
        self.index.as_deref() == Some("2dsphere")
    }
}

#[derive(Debug, Clone, PartialEq)]
/// Explicit tagged variant for every field shape the runtime accepts.
pub enum FieldKind {
    Primitive(Primitive),
    /// `Mixed`, `{}` and other deliberately untyped values.
    Mixed,
    /// Generic `Object` marker.
    Object,
    Array(ArrayDescriptor),
    Map(MapDescriptor),
    Reference(ReferenceDescriptor),
    Virtual(VirtualDescriptor),
    /// Plain nested path; recursed structurally.
    Nested(FieldTree),
    /// Child schema position.
    Schema(SchemaSlot),
    /// Marker the classifier did not recognize; resolves to `any`.
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Primitive {
    pub kind: PrimitiveKind,
    /// Allowed values, when the field declares `enum`.
    pub enum_values: Option<Vec<JsonValue>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
    String,
    Number,
    Boolean,
    Date,
    Buffer,
    Decimal,
    ObjectId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayDescriptor {
    /// `None` for untyped arrays (`[]`, `Array`).
    pub element: Option<Box<FieldDescriptor>>,
    /// Element was declared in the `{ type: [{ type: X, ... }] }` dual form.
    pub element_dual_form: bool,
    /// Set by the normalizer when the array opted out of its implicit empty default.
    pub default_undefined_marker: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapDescriptor {
    /// `None` when the map declares no `of`.
    pub value: Option<Box<FieldDescriptor>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceDescriptor {
    pub target: RefTarget,
    pub autopopulate: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefTarget {
    /// Literal model name, possibly dot-qualified (`User.friends`).
    Named(String),
    /// `ref` computed at runtime; the target is unknowable.
    Function,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VirtualDescriptor {
    /// For alias virtuals, the descriptor of the aliased field.
    pub alias_of: Option<Box<FieldDescriptor>>,
}

#[derive(Debug, Clone, PartialEq)]
/// Child schema position before and after normalization.
pub enum SchemaSlot {
    /// Inline schema as classified from the snapshot.
    Inline(Box<SchemaDescriptor>),
    /// Reference to an entry of the snapshot's shared schema registry.
    Registry(String),
    /// Normalized: the derived name of the child type.
    Named(InferredName),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InferredName {
    pub name: String,
    pub is_subdocument_array: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// `required` as declared; array form `[true, "message"]` collapses to index 0.
pub enum Required {
    Unset,
    Yes,
    No,
}

impl Required {
    pub fn from_flag(flag: bool) -> Self {
        if flag {
            Required::Yes
        } else {
            Required::No
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
/// `default` as declared; explicit `undefined` differs from absent.
pub enum DefaultValue {
    Absent,
    Undefined,
    Null,
    Value(JsonValue),
}

impl DefaultValue {
    pub fn is_undefined(&self) -> bool {
        matches!(self, DefaultValue::Undefined)
    }
}

#[derive(Debug, Clone, PartialEq)]
/// A root schema plus the per-model metadata the assembler and enricher need.
pub struct ModelDescriptor {
    pub name: String,
    pub schema: SchemaDescriptor,
    pub methods: BTreeSet<String>,
    pub statics: BTreeSet<String>,
    pub queries: BTreeSet<String>,
    pub virtuals: BTreeSet<String>,
    /// Documentation comments keyed by dotted field path.
    pub comments: IndexMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
/// Flat generation options consumed by the core.
pub struct GenerationOptions {
    /// Emit `Date` fields as `string`.
    pub dates_as_strings: bool,
    /// Emit lean types only, with identifiers as plain strings.
    pub no_runtime_wrapper: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// Lean/document bodies for one child schema.
pub struct ChildTypeSet {
    pub name: String,
    pub lean: String,
    pub document: Option<String>,
    pub is_subdocument_array: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// Every type body generated for one model.
pub struct ModelTypeSet {
    pub name: String,
    /// Child blocks in emission order (dependencies before dependents).
    pub children: Vec<ChildTypeSet>,
    pub lean: String,
    pub document: Option<String>,
    pub methods: Option<String>,
    pub statics: Option<String>,
    pub queries: Option<String>,
    pub query: Option<String>,
    pub model: Option<String>,
    pub schema: Option<String>,
    pub method_names: Vec<String>,
    pub static_names: Vec<String>,
    pub query_names: Vec<String>,
    pub virtual_names: Vec<String>,
    pub comments: IndexMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
/// Output of one generation run.
pub struct GeneratedTypeSet {
    pub models: Vec<ModelTypeSet>,
    /// True when document/model/schema aliases were generated.
    pub runtime_wrapper: bool,
    /// Non-fatal diagnostics collected during generation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

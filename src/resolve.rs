//! Base type resolution for leaf field descriptors.
//!
//! Rules, in priority order:
//! - `Mixed`, `{}` and maps without a value type are `any`
//! - strings are `string`, or a union of quoted literals when an enum is declared
//! - numbers are `number`, except the `__v` version key, which is omitted
//! - decimals and buffers use runtime wrappers in the document variant
//! - dates are `Date`, or `string` in dates-as-strings mode
//! - object ids are wrapped identifiers, or `string` without runtime wrappers
//! - the generic `Object` marker is `any`
//! - nested plain mappings are handed back to the caller for recursion
//! - unrecognized markers are `any` with a diagnostic

use serde_json::Value as JsonValue;

use crate::ast::{FieldDescriptor, FieldKind, FieldTree, PrimitiveKind};
use crate::diagnostics::Diagnostics;
use crate::fragment::ParseContext;
use crate::identifier::escape_string;

/// Module every runtime wrapper type is imported from.
pub const RUNTIME_MODULE: &str = "mongoose";

pub(crate) const ANY: &str = "any";
pub(crate) const OBJECT_ID: &str = "mongoose.Types.ObjectId";
pub(crate) const DECIMAL: &str = "mongoose.Types.Decimal128";
pub(crate) const BUFFER: &str = "mongoose.Types.Buffer";
pub(crate) const GENERIC_DOCUMENT: &str = "mongoose.Document";

/// Mongoose's internal document version key.
const VERSION_KEY: &str = "__v";

#[derive(Debug, Clone, PartialEq)]
pub enum BaseType<'a> {
    Fragment(String),
    /// The field carries no data and is left out.
    Omit,
    /// Nested plain mapping; the caller recurses into it as a new field tree.
    Nested(&'a FieldTree),
}

impl BaseType<'_> {
    fn fragment(text: &str) -> Self {
        BaseType::Fragment(text.to_string())
    }
}

/// Maps one field descriptor to its base type fragment.
pub fn resolve_base_type<'a>(
    key: &str,
    field: &'a FieldDescriptor,
    ctx: &ParseContext,
    path: &str,
    diagnostics: &mut Diagnostics,
) -> BaseType<'a> {
    match &field.kind {
        FieldKind::Mixed | FieldKind::Object => BaseType::fragment(ANY),
        FieldKind::Map(map) if map.value.is_none() => BaseType::fragment(ANY),
        FieldKind::Primitive(primitive) => match primitive.kind {
            PrimitiveKind::String => match primitive.enum_values.as_deref() {
                Some(values) if !values.is_empty() => BaseType::Fragment(enum_union(values)),
                _ => BaseType::fragment("string"),
            },
            PrimitiveKind::Number if key == VERSION_KEY => BaseType::Omit,
            PrimitiveKind::Number => BaseType::fragment("number"),
            PrimitiveKind::Decimal if ctx.is_document => BaseType::fragment(DECIMAL),
            PrimitiveKind::Decimal => BaseType::fragment("number"),
            PrimitiveKind::Boolean => BaseType::fragment("boolean"),
            PrimitiveKind::Date if ctx.dates_as_strings => BaseType::fragment("string"),
            PrimitiveKind::Date => BaseType::fragment("Date"),
            PrimitiveKind::Buffer if ctx.is_document => BaseType::fragment(BUFFER),
            PrimitiveKind::Buffer => BaseType::fragment("Buffer"),
            PrimitiveKind::ObjectId => BaseType::fragment(object_id_type(ctx)),
        },
        FieldKind::Nested(tree) => BaseType::Nested(tree),
        FieldKind::Unknown(marker) => {
            diagnostics.warn(path, format!("unrecognized type '{marker}', typed as any"));
            BaseType::fragment(ANY)
        }
        other => {
            diagnostics.warn(
                path,
                format!("{} is not a base type, typed as any", kind_label(other)),
            );
            BaseType::fragment(ANY)
        }
    }
}

pub(crate) fn object_id_type(ctx: &ParseContext) -> &'static str {
    if ctx.no_runtime_wrapper {
        "string"
    } else {
        OBJECT_ID
    }
}

/// `"a" | "b"`, with a trailing `| null` when the enum admits null.
fn enum_union(values: &[JsonValue]) -> String {
    let mut members: Vec<String> = Vec::with_capacity(values.len());
    let mut nullable = false;
    for value in values {
        let literal = match value {
            JsonValue::Null => {
                nullable = true;
                continue;
            }
            JsonValue::String(text) => text.clone(),
            other => other.to_string(),
        };
        let literal = format!("\"{}\"", escape_string(&literal));
        if !members.contains(&literal) {
            members.push(literal);
        }
    }
    if nullable {
        members.push("null".to_string());
    }
    members.join(" | ")
}

fn kind_label(kind: &FieldKind) -> &'static str {
    match kind {
        FieldKind::Array(_) => "array",
        FieldKind::Map(_) => "map",
        FieldKind::Reference(_) => "reference",
        FieldKind::Virtual(_) => "virtual",
        FieldKind::Schema(_) => "child schema",
        _ => "field",
    }
}

//! Recursive fragment generation: one normalized field to one `key?: type;` line.
//!
//! Arrays and maps are unwrapped outermost-first into a wrapper stack, the
//! innermost descriptor is dispatched on its [`FieldKind`], and the wrappers
//! are re-applied innermost-first so the emitted nesting matches the
//! declaration (`Map<string, number[]>` vs `Map<string, number>[]`).

use indexmap::IndexMap;

use crate::ast::{
    ArrayDescriptor, DefaultValue, FieldDescriptor, FieldKind, FieldTree, RefTarget,
    ReferenceDescriptor, Required, SchemaSlot,
};
use crate::diagnostics::Diagnostics;
use crate::error::TypegenError;
use crate::identifier::{quote_if_needed, sanitize};
use crate::normalize::NameRegistry;
use crate::resolve::{object_id_type, resolve_base_type, BaseType, ANY, GENERIC_DOCUMENT, OBJECT_ID};

/// Schema machinery that shows up in raw trees but never carries data.
const RESERVED_RUNTIME_KEYS: &[&str] = &[
    "get",
    "set",
    "schemaName",
    "defaultOptions",
    "_checkRequired",
    "_cast",
    "checkRequired",
    "cast",
    "__v",
];

const INDENT: &str = "  ";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
/// Per-variant switches threaded through every recursive call.
pub struct ParseContext {
    /// Generating the document variant rather than the lean one.
    pub is_document: bool,
    /// Plain identifiers instead of runtime wrapper types.
    pub no_runtime_wrapper: bool,
    pub dates_as_strings: bool,
    /// Lean output keeps virtual fields.
    pub lean_include_virtuals: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wrapper {
    Array { subdocuments: bool },
    Map,
}

/// Walks normalized field trees of one schema and renders their fragments.
pub struct FragmentGenerator<'a> {
    ctx: ParseContext,
    names: &'a NameRegistry,
    owner: String,
    comments: Option<&'a IndexMap<String, String>>,
    comment_prefix: String,
    diagnostics: &'a mut Diagnostics,
}

impl<'a> FragmentGenerator<'a> {
    pub fn new(
        ctx: ParseContext,
        owner: &str,
        names: &'a NameRegistry,
        diagnostics: &'a mut Diagnostics,
    ) -> Self {
        Self {
            ctx,
            names,
            owner: owner.to_string(),
            comments: None,
            comment_prefix: String::new(),
            diagnostics,
        }
    }

    /// Attaches documentation comments keyed by `prefix` + field path.
    pub fn with_comments(mut self, comments: &'a IndexMap<String, String>, prefix: &str) -> Self {
        self.comments = Some(comments);
        self.comment_prefix = prefix.to_string();
        self
    }

    /// Renders every field of `fields`, skipping omitted ones.
    pub fn parse_fields(&mut self, fields: &FieldTree) -> Result<Vec<String>, TypegenError> {
        self.parse_tree(fields, "")
    }

    /// Renders one field, or `None` when the field is omitted.
    pub fn parse_field(
        &mut self,
        key: &str,
        field: &FieldDescriptor,
    ) -> Result<Option<String>, TypegenError> {
        self.parse_field_at(key, field, key)
    }

    fn parse_tree(&mut self, fields: &FieldTree, prefix: &str) -> Result<Vec<String>, TypegenError> {
        let mut lines = Vec::with_capacity(fields.len());
        for (key, field) in fields {
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}.{key}")
            };
            if let Some(line) = self.parse_field_at(key, field, &path)? {
                lines.push(line);
            }
        }
        Ok(lines)
    }

    fn parse_field_at(
        &mut self,
        key: &str,
        field: &FieldDescriptor,
        path: &str,
    ) -> Result<Option<String>, TypegenError> {
        let mut optional = field.required != Required::Yes && key != "_id";

        let mut wrappers = Vec::new();
        let mut inner = field;
        loop {
            match &inner.kind {
                FieldKind::Array(array) => {
                    if wrappers.is_empty() {
                        optional = array_is_optional(field, array);
                    }
                    let subdocuments = array.element.as_ref().is_some_and(|e| {
                        matches!(
                            &e.kind,
                            FieldKind::Schema(SchemaSlot::Named(n)) if n.is_subdocument_array
                        )
                    });
                    wrappers.push(Wrapper::Array { subdocuments });
                    match &array.element {
                        Some(element) => inner = element.as_ref(),
                        None => break,
                    }
                }
                FieldKind::Map(map) => match &map.value {
                    Some(value) => {
                        wrappers.push(Wrapper::Map);
                        inner = value.as_ref();
                    }
                    None => break,
                },
                _ => break,
            }
        }

        let resolved = match &inner.kind {
            // Untyped arrays (`[]`, `Array`) hold anything.
            FieldKind::Array(array) if array.element.is_none() => Some(ANY.to_string()),
            FieldKind::Schema(SchemaSlot::Named(inferred)) => Some(if self.ctx.is_document {
                format!("{}Document", inferred.name)
            } else {
                inferred.name.clone()
            }),
            FieldKind::Schema(_) => {
                self.warn(path, "child schema was not normalized, typed as any");
                Some(ANY.to_string())
            }
            FieldKind::Virtual(virtual_field) => {
                if key == "id" {
                    return Ok(None);
                }
                if !self.ctx.is_document && !self.ctx.lean_include_virtuals {
                    return Ok(None);
                }
                if let Some(aliased) = &virtual_field.alias_of {
                    return self.parse_field_at(key, aliased, path);
                }
                optional = false;
                Some(ANY.to_string())
            }
            _ if RESERVED_RUNTIME_KEYS.contains(&key) => return Ok(None),
            FieldKind::Reference(reference) => Some(self.reference_type(reference)?),
            _ => {
                let diagnostic_path = self.diagnostic_path(path);
                match resolve_base_type(key, inner, &self.ctx, &diagnostic_path, self.diagnostics) {
                    BaseType::Fragment(text) => Some(text),
                    BaseType::Omit => None,
                    BaseType::Nested(tree) => {
                        if wrappers.is_empty() {
                            optional = false;
                        }
                        Some(self.nested_block(tree, path)?)
                    }
                }
            }
        };

        let Some(mut ty) = resolved.filter(|t| !t.is_empty()) else {
            return Ok(None);
        };

        for wrapper in wrappers.iter().rev() {
            ty = self.wrap(*wrapper, ty);
        }

        if field.default == DefaultValue::Null && !ty.ends_with("| null") {
            ty.push_str(" | null");
        }

        let mut line = String::new();
        if let Some(comment) = self.comment_for(path) {
            line.push_str(&comment);
            line.push('\n');
        }
        line.push_str(&quote_if_needed(key));
        if optional {
            line.push('?');
        }
        line.push_str(": ");
        line.push_str(&ty);
        line.push(';');
        Ok(Some(line))
    }

    fn wrap(&self, wrapper: Wrapper, ty: String) -> String {
        match (wrapper, self.ctx.is_document) {
            (Wrapper::Array { subdocuments: true }, true) => {
                format!("mongoose.Types.DocumentArray<{ty}>")
            }
            (Wrapper::Array { .. }, true) => format!("mongoose.Types.Array<{ty}>"),
            (Wrapper::Array { .. }, false) if ty.contains(' ') => format!("({ty})[]"),
            (Wrapper::Array { .. }, false) => format!("{ty}[]"),
            (Wrapper::Map, true) => format!("mongoose.Types.Map<{ty}>"),
            (Wrapper::Map, false) => format!("Map<string, {ty}>"),
        }
    }

    fn reference_type(&mut self, reference: &ReferenceDescriptor) -> Result<String, TypegenError> {
        let name = match &reference.target {
            RefTarget::Function if self.ctx.is_document => {
                return Ok(format!("{OBJECT_ID} | {GENERIC_DOCUMENT}"));
            }
            RefTarget::Function => return Ok(object_id_type(&self.ctx).to_string()),
            RefTarget::Named(name) if name.contains('.') => self.names.resolve_qualified(name)?,
            RefTarget::Named(name) => sanitize(name)?,
        };
        let target = if self.ctx.is_document {
            format!("{name}Document")
        } else {
            name
        };
        if reference.autopopulate {
            Ok(target)
        } else {
            Ok(format!("{target}[\"_id\"] | {target}"))
        }
    }

    fn nested_block(&mut self, tree: &FieldTree, path: &str) -> Result<String, TypegenError> {
        let lines = self.parse_tree(tree, path)?;
        if lines.is_empty() {
            return Ok("{}".to_string());
        }
        Ok(format!("{{\n{}\n}}", indent(&lines.join("\n"))))
    }

    fn comment_for(&self, path: &str) -> Option<String> {
        let comments = self.comments?;
        let text = comments.get(&format!("{}{path}", self.comment_prefix))?;
        Some(render_doc_comment(text))
    }

    fn diagnostic_path(&self, path: &str) -> String {
        if self.owner.is_empty() {
            path.to_string()
        } else {
            format!("{}.{path}", self.owner)
        }
    }

    fn warn(&mut self, path: &str, message: &str) {
        let full = self.diagnostic_path(path);
        self.diagnostics.warn(&full, message);
    }
}

/// Array optionality, first matching row wins:
/// explicit `required: false`; geospatial index; untyped element (marker);
/// dual-form element; `default: undefined` without `required: true`; marker.
fn array_is_optional(field: &FieldDescriptor, array: &ArrayDescriptor) -> bool {
    if field.required == Required::No {
        return true;
    }
    if field.is_geospatial() {
        return true;
    }
    if array.element.is_none() {
        return array.default_undefined_marker;
    }
    if array.element_dual_form {
        return false;
    }
    if field.default.is_undefined() && field.required != Required::Yes {
        return true;
    }
    array.default_undefined_marker
}

fn render_doc_comment(text: &str) -> String {
    let text = text.trim().replace("*/", "*\\/");
    if !text.contains('\n') {
        return format!("/** {text} */");
    }
    let mut out = String::from("/**\n");
    for line in text.lines() {
        out.push_str(" * ");
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out.push_str(" */");
    out
}

/// Indents every non-empty line by one level.
pub fn indent(text: &str) -> String {
    text.lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{INDENT}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Renders a single field in isolation, without cross-schema context.
pub fn parse_field(
    key: &str,
    field: &FieldDescriptor,
    ctx: ParseContext,
) -> Result<Option<String>, TypegenError> {
    let names = NameRegistry::new();
    let mut diagnostics = Diagnostics::new();
    FragmentGenerator::new(ctx, "", &names, &mut diagnostics).parse_field(key, field)
}

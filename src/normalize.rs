//! Tree normalization: child-schema extraction, naming and alias injection.
//!
//! Normalization never touches its input; every pass builds a new
//! [`SchemaDescriptor`] in which each child-schema position is replaced by
//! [`SchemaSlot::Named`] and the lifted child is appended to `children`.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use tracing::debug;

use crate::ast::{
    ArrayDescriptor, ChildSchema, FieldDescriptor, FieldKind, FieldTree, InferredName,
    MapDescriptor, ModelDescriptor, Required, SchemaDescriptor, SchemaSlot, VirtualDescriptor,
};
use crate::diagnostics::Diagnostics;
use crate::error::TypegenError;
use crate::identifier::{derive_child_name, sanitize, unique_identifier, RESERVED_ALIAS_SUFFIXES};
use crate::snapshot::Snapshot;

/// Run-wide name bookkeeping shared by every model of one generation call.
#[derive(Debug, Default)]
pub struct NameRegistry {
    used: HashSet<String>,
    /// Shared-schema id to the type name it was first emitted under.
    registry_names: HashMap<String, String>,
    /// `Owner.path` to derived child name, for dot-qualified references.
    qualified: HashMap<String, String>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims a model name and every alias type name derived from it.
    pub fn reserve_model(&mut self, name: &str) -> Result<(), TypegenError> {
        if !self.used.insert(name.to_string()) {
            return Err(TypegenError::invalid_identifier(
                name,
                "model name is declared more than once",
            ));
        }
        for suffix in RESERVED_ALIAS_SUFFIXES {
            self.used.insert(format!("{name}{suffix}"));
        }
        Ok(())
    }

    /// Resolves a dot-qualified reference (`User.friends`) to a child type name.
    pub fn resolve_qualified(&self, reference: &str) -> Result<String, TypegenError> {
        if let Some(name) = self.qualified.get(reference) {
            return Ok(name.clone());
        }
        match reference.split_once('.') {
            Some((owner, path)) => derive_child_name(path, &sanitize(owner)?),
            None => sanitize(reference),
        }
    }

    fn claim_child(&mut self, owner: &str, path: &str) -> Result<String, TypegenError> {
        let derived = derive_child_name(path, owner)?;
        let name = unique_identifier(&derived, &mut self.used);
        if name != derived {
            debug!(owner, path, derived = %derived, name = %name, "renamed colliding child schema");
        }
        self.qualified.insert(format!("{owner}.{path}"), name.clone());
        Ok(name)
    }
}

/// Sanitizes every model name, then normalizes every model schema.
///
/// Models come back in input order with their sanitized names.
pub fn normalize_snapshot(
    snapshot: &Snapshot,
    diagnostics: &mut Diagnostics,
) -> Result<(Vec<ModelDescriptor>, NameRegistry), TypegenError> {
    let mut registry = NameRegistry::new();
    let mut names = Vec::with_capacity(snapshot.models.len());

    for model in &snapshot.models {
        let name = sanitize(&model.name).map_err(|e| e.in_model(&model.name))?;
        registry.reserve_model(&name).map_err(|e| e.in_model(&model.name))?;
        if let Some(id) = &model.schema.registry_id {
            registry
                .registry_names
                .entry(id.clone())
                .or_insert_with(|| name.clone());
        }
        names.push(name);
    }

    let mut models = Vec::with_capacity(snapshot.models.len());
    for (model, name) in snapshot.models.iter().zip(names) {
        let mut normalizer = Normalizer {
            shared: &snapshot.schemas,
            registry: &mut registry,
            diagnostics: &mut *diagnostics,
        };
        let schema = normalizer
            .normalize_schema(&model.schema, &name)
            .map_err(|e| e.in_model(&model.name))?;
        models.push(ModelDescriptor {
            name,
            schema,
            ..model.clone()
        });
    }

    Ok((models, registry))
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum SlotRole {
    Field,
    ArrayElement,
    MapValue,
}

#[derive(Clone, Copy)]
struct SlotContext {
    role: SlotRole,
    required: bool,
    default_undefined: bool,
}

impl SlotContext {
    fn field(field: &FieldDescriptor) -> Self {
        Self {
            role: SlotRole::Field,
            required: field.required == Required::Yes,
            default_undefined: false,
        }
    }
}

struct Normalizer<'a> {
    shared: &'a IndexMap<String, SchemaDescriptor>,
    registry: &'a mut NameRegistry,
    diagnostics: &'a mut Diagnostics,
}

impl Normalizer<'_> {
    fn normalize_schema(
        &mut self,
        schema: &SchemaDescriptor,
        owner: &str,
    ) -> Result<SchemaDescriptor, TypegenError> {
        let mut children = Vec::new();
        let mut fields = FieldTree::with_capacity(schema.fields.len());
        for (key, field) in &schema.fields {
            let normalized =
                self.normalize_field(field, key, owner, SlotContext::field(field), &mut children)?;
            fields.insert(key.clone(), normalized);
        }

        inject_aliases(&mut fields, &schema.aliases, owner, self.diagnostics);

        Ok(SchemaDescriptor {
            fields,
            children,
            ..schema.clone()
        })
    }

    fn normalize_field(
        &mut self,
        field: &FieldDescriptor,
        path: &str,
        owner: &str,
        slot: SlotContext,
        children: &mut Vec<ChildSchema>,
    ) -> Result<FieldDescriptor, TypegenError> {
        let kind = match &field.kind {
            FieldKind::Nested(tree) => {
                let mut nested = FieldTree::with_capacity(tree.len());
                for (key, inner) in tree {
                    let inner_path = format!("{path}.{key}");
                    let normalized = self.normalize_field(
                        inner,
                        &inner_path,
                        owner,
                        SlotContext::field(inner),
                        children,
                    )?;
                    nested.insert(key.clone(), normalized);
                }
                FieldKind::Nested(nested)
            }
            FieldKind::Array(array) => {
                let element_is_schema = array
                    .element
                    .as_ref()
                    .is_some_and(|e| matches!(e.kind, FieldKind::Schema(_)));
                let element_slot = SlotContext {
                    role: SlotRole::ArrayElement,
                    required: field.required == Required::Yes,
                    default_undefined: field.default.is_undefined(),
                };
                let element = match &array.element {
                    Some(element) => Some(Box::new(
                        self.normalize_field(element, path, owner, element_slot, children)?,
                    )),
                    None => None,
                };
                FieldKind::Array(ArrayDescriptor {
                    element,
                    element_dual_form: array.element_dual_form,
                    default_undefined_marker: array.default_undefined_marker
                        || (field.default.is_undefined()
                            && (array.element.is_none() || element_is_schema)),
                })
            }
            FieldKind::Map(map) => {
                let value_slot = SlotContext {
                    role: SlotRole::MapValue,
                    required: field.required == Required::Yes,
                    default_undefined: false,
                };
                let value = match &map.value {
                    Some(value) => Some(Box::new(
                        self.normalize_field(value, path, owner, value_slot, children)?,
                    )),
                    None => None,
                };
                FieldKind::Map(MapDescriptor { value })
            }
            FieldKind::Schema(schema_slot) => self.name_child(schema_slot, path, owner, slot, children)?,
            other => other.clone(),
        };

        Ok(FieldDescriptor {
            kind,
            ..field.clone()
        })
    }

    fn name_child(
        &mut self,
        schema_slot: &SchemaSlot,
        path: &str,
        owner: &str,
        slot: SlotContext,
        children: &mut Vec<ChildSchema>,
    ) -> Result<FieldKind, TypegenError> {
        let shared = self.shared;
        let is_subdocument_array = slot.role == SlotRole::ArrayElement;
        let named = |name: String| {
            FieldKind::Schema(SchemaSlot::Named(InferredName {
                name,
                is_subdocument_array,
            }))
        };

        let source = match schema_slot {
            SchemaSlot::Named(inferred) => return Ok(named(inferred.name.clone())),
            SchemaSlot::Registry(id) => {
                if let Some(name) = self.registry.registry_names.get(id) {
                    return Ok(named(name.clone()));
                }
                let Some(shared) = shared.get(id) else {
                    self.diagnostics.warn(
                        &format!("{owner}.{path}"),
                        format!("unknown schema id '{id}', typed as any"),
                    );
                    return Ok(FieldKind::Unknown(format!("schema:{id}")));
                };
                shared
            }
            SchemaSlot::Inline(schema) => schema.as_ref(),
        };

        let name = self.registry.claim_child(owner, path)?;
        if let Some(id) = &source.registry_id {
            self.registry
                .registry_names
                .insert(id.clone(), name.clone());
        }

        let mut schema = self.normalize_schema(source, &name)?;
        schema.is_subdocument_array_element = is_subdocument_array;
        schema.is_map_value = slot.role == SlotRole::MapValue;
        schema.required_override = slot.required;
        schema.default_explicitly_undefined = slot.default_undefined;

        children.push(ChildSchema {
            path: path.to_string(),
            name: name.clone(),
            schema,
        });
        Ok(named(name))
    }
}

/// Points every alias at the descriptor of the field it stands for.
fn inject_aliases(
    fields: &mut FieldTree,
    aliases: &IndexMap<String, String>,
    owner: &str,
    diagnostics: &mut Diagnostics,
) {
    for (alias, target) in aliases {
        let Some(root) = find_path(fields, target).cloned() else {
            diagnostics.warn(
                &format!("{owner}.{alias}"),
                format!("alias target '{target}' not found"),
            );
            continue;
        };
        let virtual_field = FieldDescriptor::new(FieldKind::Virtual(VirtualDescriptor {
            alias_of: Some(Box::new(root)),
        }));
        match fields.get_mut(alias) {
            Some(existing) => *existing = virtual_field,
            None => {
                fields.insert(alias.clone(), virtual_field);
            }
        }
    }
}

fn find_path<'a>(fields: &'a FieldTree, path: &str) -> Option<&'a FieldDescriptor> {
    let mut segments = path.split('.');
    let mut current = fields.get(segments.next()?)?;
    for segment in segments {
        match &current.kind {
            FieldKind::Nested(tree) => current = tree.get(segment)?,
            _ => return None,
        }
    }
    Some(current)
}

//! Model assembly: child blocks, lean/document bodies and alias placeholders.

use std::collections::BTreeSet;

use tracing::debug;

use crate::ast::{ChildTypeSet, GenerationOptions, ModelDescriptor, ModelTypeSet, SchemaDescriptor};
use crate::diagnostics::Diagnostics;
use crate::error::TypegenError;
use crate::fragment::{indent, FragmentGenerator, ParseContext};
use crate::identifier::quote_if_needed;
use crate::normalize::NameRegistry;

/// Type given to every method/static/query placeholder until signatures are enriched.
pub const PLACEHOLDER_TYPE: &str = "Function";

const SUBDOCUMENT_BASE: &str = "mongoose.Types.Subdocument";
const NESTED_DOCUMENT_BASE: &str = "mongoose.Document<mongoose.Types.ObjectId>";

/// Assembles every type body for one normalized model.
pub fn assemble_model(
    model: &ModelDescriptor,
    names: &NameRegistry,
    options: &GenerationOptions,
    diagnostics: &mut Diagnostics,
) -> Result<ModelTypeSet, TypegenError> {
    let name = model.name.as_str();
    let mut assembler = Assembler {
        model,
        names,
        options,
        diagnostics,
        children: Vec::new(),
    };

    assembler.collect_children(&model.schema, "")?;
    let lean = assembler.body(&model.schema, name, "", false)?;
    let runtime = !options.no_runtime_wrapper;

    let (document, methods, statics, queries, query, model_alias, schema_alias) = if runtime {
        let fields = assembler.body(&model.schema, name, "", true)?;
        (
            Some(format!(
                "mongoose.Document<mongoose.Types.ObjectId, {name}Queries> & {name}Methods & {fields}"
            )),
            Some(placeholder_block(&model.methods)),
            Some(placeholder_block(&model.statics)),
            Some(placeholder_block(&model.queries)),
            Some(format!(
                "mongoose.Query<any, {name}Document, {name}Queries> & {name}Queries"
            )),
            Some(format!(
                "mongoose.Model<{name}Document, {name}Queries> & {name}Statics"
            )),
            Some(format!(
                "mongoose.Schema<{name}Document, {name}Model, {name}Methods, {name}Queries>"
            )),
        )
    } else {
        (None, None, None, None, None, None, None)
    };

    debug!(model = name, children = assembler.children.len(), "assembled model");

    Ok(ModelTypeSet {
        name: name.to_string(),
        children: assembler.children,
        lean,
        document,
        methods,
        statics,
        queries,
        query,
        model: model_alias,
        schema: schema_alias,
        method_names: model.methods.iter().cloned().collect(),
        static_names: model.statics.iter().cloned().collect(),
        query_names: model.queries.iter().cloned().collect(),
        virtual_names: model.virtuals.iter().cloned().collect(),
        comments: model.comments.clone(),
    })
}

struct Assembler<'a> {
    model: &'a ModelDescriptor,
    names: &'a NameRegistry,
    options: &'a GenerationOptions,
    diagnostics: &'a mut Diagnostics,
    children: Vec<ChildTypeSet>,
}

impl Assembler<'_> {
    /// Depth-first: grandchildren land before the child that references them.
    fn collect_children(
        &mut self,
        schema: &SchemaDescriptor,
        comment_prefix: &str,
    ) -> Result<(), TypegenError> {
        for child in &schema.children {
            let prefix = format!("{comment_prefix}{}.", child.path);
            self.collect_children(&child.schema, &prefix)?;

            let lean = self.body(&child.schema, &child.name, &prefix, false)?;
            let document = if self.options.no_runtime_wrapper {
                None
            } else {
                let base = if child.schema.is_subdocument_array_element {
                    SUBDOCUMENT_BASE
                } else {
                    NESTED_DOCUMENT_BASE
                };
                let fields = self.body(&child.schema, &child.name, &prefix, true)?;
                Some(format!("{base} & {fields}"))
            };

            self.children.push(ChildTypeSet {
                name: child.name.clone(),
                lean,
                document,
                is_subdocument_array: child.schema.is_subdocument_array_element,
            });
        }
        Ok(())
    }

    fn body(
        &mut self,
        schema: &SchemaDescriptor,
        owner: &str,
        comment_prefix: &str,
        is_document: bool,
    ) -> Result<String, TypegenError> {
        let ctx = ParseContext {
            is_document,
            no_runtime_wrapper: self.options.no_runtime_wrapper,
            dates_as_strings: self.options.dates_as_strings,
            lean_include_virtuals: schema.lean_include_virtuals,
        };
        let lines = FragmentGenerator::new(ctx, owner, self.names, &mut *self.diagnostics)
            .with_comments(&self.model.comments, comment_prefix)
            .parse_fields(&schema.fields)?;
        Ok(object_block(&lines))
    }
}

fn placeholder_block(names: &BTreeSet<String>) -> String {
    let lines: Vec<String> = names
        .iter()
        .map(|name| format!("{}: {PLACEHOLDER_TYPE};", quote_if_needed(name)))
        .collect();
    object_block(&lines)
}

/// `{}` or a multi-line object literal type.
pub fn object_block(lines: &[String]) -> String {
    if lines.is_empty() {
        return "{}".to_string();
    }
    format!("{{\n{}\n}}", indent(&lines.join("\n")))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::assemble_model;
    use crate::ast::GenerationOptions;
    use crate::diagnostics::Diagnostics;
    use crate::normalize::normalize_snapshot;
    use crate::snapshot::snapshot_from_value;

    fn assemble(value: serde_json::Value, options: GenerationOptions) -> crate::ast::ModelTypeSet {
        let snapshot = snapshot_from_value(value).unwrap();
        let mut diagnostics = Diagnostics::new();
        let (models, names) = normalize_snapshot(&snapshot, &mut diagnostics).unwrap();
        assemble_model(&models[0], &names, &options, &mut diagnostics).unwrap()
    }

    #[test]
    fn assembles_lean_document_and_aliases() {
        let set = assemble(
            json!({"models": [{
                "name": "User",
                "schema": {"tree": {
                    "email": {"type": "String", "required": true},
                    "_id": {"type": "ObjectId", "auto": true}
                }},
                "methods": ["isAdmin"],
                "statics": ["findByEmail"],
                "queries": ["byEmail"]
            }]}),
            GenerationOptions::default(),
        );

        assert_eq!(set.lean, "{\n  email: string;\n  _id: mongoose.Types.ObjectId;\n}");
        assert_eq!(
            set.document.as_deref(),
            Some("mongoose.Document<mongoose.Types.ObjectId, UserQueries> & UserMethods & {\n  email: string;\n  _id: mongoose.Types.ObjectId;\n}")
        );
        assert_eq!(set.methods.as_deref(), Some("{\n  isAdmin: Function;\n}"));
        assert_eq!(set.statics.as_deref(), Some("{\n  findByEmail: Function;\n}"));
        assert_eq!(set.queries.as_deref(), Some("{\n  byEmail: Function;\n}"));
        assert_eq!(
            set.model.as_deref(),
            Some("mongoose.Model<UserDocument, UserQueries> & UserStatics")
        );
        assert_eq!(
            set.schema.as_deref(),
            Some("mongoose.Schema<UserDocument, UserModel, UserMethods, UserQueries>")
        );
    }

    #[test]
    fn child_blocks_precede_parents_and_pick_wrappers() {
        let set = assemble(
            json!({"models": [{"name": "User", "schema": {"tree": {
                "friends": [{"$schema": {"tree": {
                    "name": "String",
                    "address": {"$schema": {"tree": {"city": "String"}}}
                }}}],
                "profile": {"$schema": {"tree": {"bio": "String"}}}
            }}}]}),
            GenerationOptions::default(),
        );

        let names: Vec<_> = set.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["UserFriendAddress", "UserFriend", "UserProfile"]);
        assert!(set.children[1]
            .document
            .as_deref()
            .unwrap()
            .starts_with("mongoose.Types.Subdocument & {"));
        assert!(set.children[2]
            .document
            .as_deref()
            .unwrap()
            .starts_with("mongoose.Document<mongoose.Types.ObjectId> & {"));
        assert!(set.children[1].lean.contains("address?: UserFriendAddress;"));
        assert!(set.lean.contains("friends: UserFriend[];"));
        assert!(set
            .document
            .as_deref()
            .unwrap()
            .contains("friends: mongoose.Types.DocumentArray<UserFriendDocument>;"));
        assert!(set.lean.contains("profile?: UserProfile;"));
    }

    #[test]
    fn subdocument_array_default_undefined_is_optional() {
        let set = assemble(
            json!({"models": [{"name": "User", "schema": {"tree": {
                "friends": {"type": [{"$schema": {"tree": {"name": "String"}}}], "default": {"$undefined": true}, "required": true}
            }}}]}),
            GenerationOptions::default(),
        );
        assert!(set.lean.contains("friends?: UserFriend[];"));
    }

    #[test]
    fn no_runtime_wrapper_emits_lean_only() {
        let set = assemble(
            json!({"models": [{"name": "User", "schema": {"tree": {
                "_id": "ObjectId",
                "pet": {"$schema": {"tree": {"owner": {"type": "ObjectId", "ref": "User"}}}}
            }}}]}),
            GenerationOptions {
                no_runtime_wrapper: true,
                ..GenerationOptions::default()
            },
        );
        assert!(set.lean.contains("_id: string;"));
        assert!(set.document.is_none());
        assert!(set.model.is_none());
        assert!(set.children[0].document.is_none());
        assert!(set.children[0].lean.contains("owner?: User[\"_id\"] | User;"));
    }

    #[test]
    fn child_comments_use_full_paths() {
        let set = assemble(
            json!({"models": [{
                "name": "User",
                "schema": {"tree": {"friends": [{"$schema": {"tree": {"name": "String"}}}]}},
                "comments": {"friends.name": "Display name"}
            }]}),
            GenerationOptions::default(),
        );
        assert!(set.children[0].lean.contains("/** Display name */\n  name?: string;"));
    }

    #[test]
    fn lean_virtuals_follow_schema_options() {
        let virtual_field = json!({"path": "fullName", "getters": [], "setters": []});
        let set = assemble(
            json!({"models": [{"name": "User", "schema": {
                "tree": {"fullName": virtual_field},
                "options": {"toJSON": {"virtuals": true}}
            }}]}),
            GenerationOptions::default(),
        );
        assert!(set.lean.contains("fullName: any;"));

        let set = assemble(
            json!({"models": [{"name": "User", "schema": {"tree": {"fullName": virtual_field}}}]}),
            GenerationOptions::default(),
        );
        assert_eq!(set.lean, "{}");
        assert!(set.document.as_deref().unwrap().contains("fullName: any;"));
    }
}

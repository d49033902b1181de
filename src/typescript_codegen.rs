//! TypeScript file rendering for generated type sets.
//!
//! Layout: header, runtime import, then for each model its child blocks
//! followed by the model's own aliases, and finally the custom-types region
//! carried over from the previous output.

use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::debug;

use crate::ast::{GeneratedTypeSet, GenerationOptions, ModelTypeSet};
use crate::custom_region::{extract_custom_region, render_custom_region};
use crate::error::TypegenError;
use crate::resolve::RUNTIME_MODULE;
use crate::snapshot::parse_snapshot;

const HEADER: &str = concat!(
    "// Generated by schema-typegen.\n",
    "// WARNING: This file is generated. Only edit inside the custom-types region.\n",
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PlaceholderKind {
    Method,
    Static,
    Query,
    Virtual,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
/// One placeholder member an enricher may replace with a real signature.
pub struct PlaceholderSite {
    pub model: String,
    pub kind: PlaceholderKind,
    pub member: String,
    /// Alias type the member is declared in (`UserMethods`, `UserDocument`, ...).
    pub type_name: String,
    pub comment: Option<String>,
}

/// Rewrites placeholder members in rendered text, for example from the
/// application's own source files.
pub trait SignatureEnricher {
    fn enrich(&self, text: &str, sites: &[PlaceholderSite]) -> Result<String, TypegenError>;
}

/// Leaves every placeholder as `Function` / `any`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEnricher;

impl SignatureEnricher for NoopEnricher {
    fn enrich(&self, text: &str, _sites: &[PlaceholderSite]) -> Result<String, TypegenError> {
        Ok(text.to_string())
    }
}

/// Lists every placeholder declaration of a generated set.
///
/// Empty without runtime wrappers, since no placeholder alias types exist then.
pub fn placeholder_sites(set: &GeneratedTypeSet) -> Vec<PlaceholderSite> {
    if !set.runtime_wrapper {
        return Vec::new();
    }
    let mut sites = Vec::new();
    for model in &set.models {
        let groups = [
            (PlaceholderKind::Method, &model.method_names, "Methods"),
            (PlaceholderKind::Static, &model.static_names, "Statics"),
            (PlaceholderKind::Query, &model.query_names, "Queries"),
            (PlaceholderKind::Virtual, &model.virtual_names, "Document"),
        ];
        for (kind, members, suffix) in groups {
            for member in members {
                sites.push(PlaceholderSite {
                    model: model.name.clone(),
                    kind,
                    member: member.clone(),
                    type_name: format!("{}{suffix}", model.name),
                    comment: model.comments.get(member).cloned(),
                });
            }
        }
    }
    sites
}

/// Renders a complete TypeScript file, keeping the custom region of `previous`.
pub fn render_typescript_file(
    set: &GeneratedTypeSet,
    previous: Option<&str>,
) -> Result<String, TypegenError> {
    render_typescript_file_with(set, previous, &NoopEnricher)
}

/// Like [`render_typescript_file`], passing the generated part through `enricher`.
///
/// The custom region is appended after enrichment and is never rewritten.
pub fn render_typescript_file_with(
    set: &GeneratedTypeSet,
    previous: Option<&str>,
    enricher: &dyn SignatureEnricher,
) -> Result<String, TypegenError> {
    let custom = match previous {
        Some(text) => extract_custom_region(text)?,
        None => None,
    };

    let generated = enricher.enrich(&render_definitions(set), &placeholder_sites(set))?;

    let mut out = generated;
    out.push('\n');
    out.push_str(&render_custom_region(custom.as_deref()));
    Ok(out)
}

fn render_definitions(set: &GeneratedTypeSet) -> String {
    let mut out = String::from(HEADER);
    if set.models.is_empty() {
        out.push_str("// No models found.\n");
        return out;
    }
    if set.runtime_wrapper {
        out.push('\n');
        out.push_str(&format!("import {RUNTIME_MODULE} from \"{RUNTIME_MODULE}\";\n"));
    }

    let definitions: Vec<String> = set.models.iter().map(render_model).collect();
    out.push('\n');
    out.push_str(&definitions.join("\n\n"));
    out.push('\n');
    out
}

fn render_model(model: &ModelTypeSet) -> String {
    let mut blocks = Vec::new();
    for child in &model.children {
        blocks.push(export_type(&child.name, &child.lean));
        if let Some(document) = &child.document {
            blocks.push(export_type(&format!("{}Document", child.name), document));
        }
    }

    let name = &model.name;
    blocks.push(export_type(name, &model.lean));
    let aliases = [
        ("Document", &model.document),
        ("Methods", &model.methods),
        ("Statics", &model.statics),
        ("Queries", &model.queries),
        ("Query", &model.query),
        ("Model", &model.model),
        ("Schema", &model.schema),
    ];
    for (suffix, body) in aliases {
        if let Some(body) = body {
            blocks.push(export_type(&format!("{name}{suffix}"), body));
        }
    }
    blocks.join("\n\n")
}

fn export_type(name: &str, body: &str) -> String {
    format!("export type {name} = {body};")
}

/// Generates a TypeScript file from snapshot JSON text.
pub fn generate_typescript(
    input: &str,
    options: &GenerationOptions,
    previous: Option<&str>,
) -> Result<String, TypegenError> {
    let snapshot = parse_snapshot(input)?;
    let set = crate::generate_types(&snapshot, options)?;
    render_typescript_file(&set, previous)
}

/// Generates a TypeScript file from a snapshot path.
///
/// When `existing_output` exists its custom region is preserved.
pub fn generate_typescript_from_path(
    snapshot_path: impl AsRef<Path>,
    options: &GenerationOptions,
    existing_output: Option<&Path>,
) -> Result<String, TypegenError> {
    let input = fs::read_to_string(snapshot_path.as_ref())?;
    let previous = match existing_output {
        Some(path) if path.exists() => {
            debug!(path = %path.display(), "preserving custom region");
            Some(fs::read_to_string(path)?)
        }
        _ => None,
    };
    generate_typescript(&input, options, previous.as_deref())
}

pub mod assemble;
pub mod ast;
pub mod custom_region;
pub mod diagnostics;
pub mod error;
pub mod fragment;
pub mod identifier;
pub mod normalize;
pub mod resolve;
pub mod snapshot;
pub mod typescript_codegen;

use std::fs;
use std::path::Path;

use tracing::debug;

use assemble::assemble_model;
pub use ast::{GeneratedTypeSet, GenerationOptions, ModelTypeSet};
use diagnostics::Diagnostics;
pub use error::TypegenError;
use normalize::normalize_snapshot;
pub use snapshot::{parse_snapshot, Snapshot};
pub use typescript_codegen::{
    generate_typescript, generate_typescript_from_path, placeholder_sites,
    render_typescript_file, render_typescript_file_with, NoopEnricher, PlaceholderKind,
    PlaceholderSite, SignatureEnricher,
};

/// Generates every model's type set from a classified snapshot.
///
/// Either every model succeeds or the first failing model is reported.
pub fn generate_types(
    snapshot: &Snapshot,
    options: &GenerationOptions,
) -> Result<GeneratedTypeSet, TypegenError> {
    let mut diagnostics = Diagnostics::new();
    let (models, names) = normalize_snapshot(snapshot, &mut diagnostics)?;

    let mut sets = Vec::with_capacity(models.len());
    for model in &models {
        let set = assemble_model(model, &names, options, &mut diagnostics)
            .map_err(|e| e.in_model(&model.name))?;
        sets.push(set);
    }
    debug!(models = sets.len(), warnings = diagnostics.len(), "generated type set");

    Ok(GeneratedTypeSet {
        models: sets,
        runtime_wrapper: !options.no_runtime_wrapper,
        warnings: diagnostics.into_warnings(),
    })
}

/// Parses snapshot JSON text and generates its type set.
pub fn generate_types_from_json(
    input: &str,
    options: &GenerationOptions,
) -> Result<GeneratedTypeSet, TypegenError> {
    generate_types(&parse_snapshot(input)?, options)
}

/// Parses `GenerationOptions` from JSON config text (camelCase keys).
pub fn parse_options(input: &str) -> Result<GenerationOptions, TypegenError> {
    serde_json::from_str(input)
        .map_err(|e| TypegenError::Serialization(format!("invalid options: {e}")))
}

/// Reads `GenerationOptions` from a JSON config file.
pub fn load_options(path: impl AsRef<Path>) -> Result<GenerationOptions, TypegenError> {
    parse_options(&fs::read_to_string(path)?)
}

//! Identifier sanitizing, key quoting and child-schema naming.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::TypegenError;

/// Words that cannot appear as bare type names or record keys in the emitted grammar.
const RESERVED_WORDS: &[&str] = &[
    "break",
    "case",
    "catch",
    "class",
    "const",
    "continue",
    "debugger",
    "default",
    "delete",
    "do",
    "else",
    "enum",
    "export",
    "extends",
    "false",
    "finally",
    "for",
    "function",
    "if",
    "import",
    "in",
    "instanceof",
    "new",
    "null",
    "return",
    "super",
    "switch",
    "this",
    "throw",
    "true",
    "try",
    "typeof",
    "var",
    "void",
    "while",
    "with",
    "yield",
    "let",
    "static",
    "implements",
    "interface",
    "package",
    "private",
    "protected",
    "public",
    "await",
];

/// Suffixes the model assembler appends to a model name for its alias types.
pub const RESERVED_ALIAS_SUFFIXES: &[&str] = &[
    "Document", "Methods", "Statics", "Queries", "Query", "Model", "Schema",
];

/// Suffix appended to a derived child name that would shadow `<Parent>Model`.
const CHILD_COLLISION_SUFFIX: &str = "Subdoc";

static PLAIN_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").expect("valid regex"));

pub fn is_reserved_word(text: &str) -> bool {
    RESERVED_WORDS.iter().any(|kw| kw == &text)
}

fn is_ident_part_char(ch: char) -> bool {
    ch == '_' || ch == '$' || ch.is_ascii_alphanumeric()
}

fn is_ident_start_char(ch: char) -> bool {
    ch == '_' || ch == '$' || ch.is_ascii_alphabetic()
}

/// Converts a raw name into a PascalCase type identifier.
///
/// The input is split on every character outside `[A-Za-z0-9_$]`. Only the
/// first part has leading non-start characters stripped; later parts may begin
/// with a digit. Each part has its first character upper-cased and the rest
/// left untouched.
pub fn sanitize(input: &str) -> Result<String, TypegenError> {
    if input.trim().is_empty() {
        return Err(TypegenError::invalid_identifier(
            input,
            "identifier is empty",
        ));
    }
    if is_reserved_word(input) {
        return Err(TypegenError::invalid_identifier(
            input,
            "identifier is a reserved word",
        ));
    }
    if input.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        return Err(TypegenError::invalid_identifier(
            input,
            "identifier cannot start with a digit",
        ));
    }

    let mut out = String::new();
    let mut first = true;
    for part in input.split(|c: char| !is_ident_part_char(c)) {
        if part.is_empty() {
            continue;
        }
        let part = if first {
            part.trim_start_matches(|c: char| !is_ident_start_char(c))
        } else {
            part
        };
        if part.is_empty() {
            continue;
        }
        first = false;
        out.push_str(&capitalize(part));
    }

    if out.is_empty() {
        return Err(TypegenError::invalid_identifier(
            input,
            "identifier is empty after removing invalid characters",
        ));
    }
    Ok(out)
}

/// Returns `key` unchanged when it is a plain identifier, otherwise a quoted literal.
pub fn quote_if_needed(key: &str) -> String {
    if PLAIN_KEY_RE.is_match(key) && !is_reserved_word(key) {
        key.to_string()
    } else {
        format!("\"{}\"", escape_string(key))
    }
}

/// Derives the type name of a child schema found at `path` under `parent`.
///
/// `derive_child_name("friends", "User")` is `UserFriend`; a path that would
/// produce `<Parent>Model` gets a suffix instead.
pub fn derive_child_name(path: &str, parent: &str) -> Result<String, TypegenError> {
    let mut raw = String::from(parent);
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        raw.push('.');
        raw.push_str(segment);
    }
    let mut name = singularize(&sanitize(&raw)?);
    if RESERVED_ALIAS_SUFFIXES
        .iter()
        .any(|suffix| name == format!("{parent}{suffix}"))
    {
        name.push_str(CHILD_COLLISION_SUFFIX);
    }
    Ok(name)
}

/// Naive English singularization used for child-schema names.
pub fn singularize(name: &str) -> String {
    if let Some(stem) = name.strip_suffix("sses") {
        return format!("{stem}ss");
    }
    if name.ends_with("ss") {
        return name.to_string();
    }
    match name.strip_suffix('s') {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => name.to_string(),
    }
}

/// Returns `base`, or `base2`, `base3`, ... whichever is not yet in `used`.
pub fn unique_identifier(base: &str, used: &mut HashSet<String>) -> String {
    if used.insert(base.to_string()) {
        return base.to_string();
    }

    let mut idx = 2usize;
    loop {
        let candidate = format!("{base}{idx}");
        if used.insert(candidate.clone()) {
            return candidate;
        }
        idx += 1;
    }
}

pub fn escape_string(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('"', "\\\"")
}

fn capitalize(part: &str) -> String {
    let mut chars = part.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

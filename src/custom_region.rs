//! Scanner for the hand-written custom-types region of a generated file.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::TypegenError;

pub const REGION_START: &str = "// <custom-types>";
pub const REGION_END: &str = "// </custom-types>";

static START_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^//\s*<custom-types>$").expect("valid regex"));
static END_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^//\s*</custom-types>$").expect("valid regex"));

/// Returns the text between the region markers of a previously generated file.
///
/// The body is the exact slice between the start-marker line and the
/// end-marker line, line endings and trailing blank lines included.
/// `Ok(None)` when the file has no region. Unbalanced or repeated markers are
/// errors so a damaged file is never silently overwritten.
pub fn extract_custom_region(previous: &str) -> Result<Option<String>, TypegenError> {
    let mut region: Option<String> = None;
    // (line index, byte offset where the body starts)
    let mut open_at: Option<(usize, usize)> = None;
    let mut offset = 0usize;

    for (i, line) in previous.split_inclusive('\n').enumerate() {
        let line_start = offset;
        offset += line.len();
        let trimmed = line.trim();

        if START_RE.is_match(trimmed) {
            if let Some((start, _)) = open_at {
                return Err(TypegenError::CustomRegion(format!(
                    "nested start marker at line {} (region opened at line {})",
                    i + 1,
                    start + 1
                )));
            }
            if region.is_some() {
                return Err(TypegenError::CustomRegion(format!(
                    "duplicate custom region at line {}",
                    i + 1
                )));
            }
            open_at = Some((i, offset));
            continue;
        }

        if END_RE.is_match(trimmed) {
            let Some((_, body_start)) = open_at.take() else {
                return Err(TypegenError::CustomRegion(format!(
                    "end marker without start marker at line {}",
                    i + 1
                )));
            };
            region = Some(previous[body_start..line_start].to_string());
        }
    }

    if let Some((start, _)) = open_at {
        return Err(TypegenError::CustomRegion(format!(
            "custom region opened at line {} is never closed",
            start + 1
        )));
    }

    Ok(region)
}

/// Renders the region block around `body`, copied verbatim.
///
/// A body that does not end in a newline gets one so the end marker stays on
/// its own line.
pub fn render_custom_region(body: Option<&str>) -> String {
    let mut out = String::from(REGION_START);
    out.push('\n');
    if let Some(body) = body.filter(|b| !b.is_empty()) {
        out.push_str(body);
        if !body.ends_with('\n') {
            out.push('\n');
        }
    }
    out.push_str(REGION_END);
    out.push('\n');
    out
}

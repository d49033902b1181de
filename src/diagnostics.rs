//! Non-fatal diagnostics collected while generating.

use tracing::warn;

#[derive(Debug, Default)]
/// Warnings for one generation run, in the order they were raised.
pub struct Diagnostics {
    warnings: Vec<String>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a degraded field; generation continues.
    ///
    /// Lean and document passes visit the same fields, so repeats are dropped.
    pub fn warn(&mut self, path: &str, message: impl Into<String>) {
        let message = message.into();
        let entry = format!("{path}: {message}");
        if self.warnings.contains(&entry) {
            return;
        }
        warn!(field = path, "{message}");
        self.warnings.push(entry);
    }

    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn into_warnings(self) -> Vec<String> {
        self.warnings
    }
}

#[cfg(test)]
mod tests {
    use super::Diagnostics;

    #[test]
    fn repeated_warnings_are_recorded_once() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.warn("User.email", "unrecognized type 'Email', typed as any");
        diagnostics.warn("User.email", "unrecognized type 'Email', typed as any");
        diagnostics.warn("User.phone", "unrecognized type 'Phone', typed as any");
        assert_eq!(
            diagnostics.into_warnings(),
            vec![
                "User.email: unrecognized type 'Email', typed as any".to_string(),
                "User.phone: unrecognized type 'Phone', typed as any".to_string(),
            ]
        );
    }
}

//! Health check types for `load-tweets stats --check`.
//!
//! The checks themselves live in [`crate::storage`]; this module only defines
//! how a result is represented and rendered.

use colored::Colorize;
use serde::Serialize;

/// Status for an individual health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pass,
    Warning,
    Error,
}

impl CheckStatus {
    /// Whether the check is healthy enough for continued operation.
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Pass)
    }
}

/// Single health check result.
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl HealthCheck {
    /// A passing check.
    pub fn pass(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Pass,
            message: message.into(),
            suggestion: None,
        }
    }

    /// A failing check with a remedy.
    pub fn error(
        name: impl Into<String>,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Error,
            message: message.into(),
            suggestion: Some(suggestion.into()),
        }
    }

    /// Render as one terminal line, plus a hint line when there is a suggestion.
    #[must_use]
    pub fn render(&self) -> String {
        let marker = match self.status {
            CheckStatus::Pass => "✓".green(),
            CheckStatus::Warning => "!".yellow(),
            CheckStatus::Error => "✗".red(),
        };
        let mut line = format!("  {marker} {}: {}", self.name, self.message);
        if let Some(suggestion) = &self.suggestion {
            line.push_str(&format!("\n      {} {suggestion}", "Hint:".cyan()));
        }
        line
    }
}

/// Whether every check passed.
#[must_use]
pub fn all_ok(checks: &[HealthCheck]) -> bool {
    checks.iter().all(|check| check.status.is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_hint_for_errors() {
        colored::control::set_override(false);
        let check = HealthCheck::error("PRAGMA foreign_key_check", "2 violations", "Reload.");
        let rendered = check.render();
        assert!(rendered.contains("✗ PRAGMA foreign_key_check: 2 violations"));
        assert!(rendered.contains("Hint: Reload."));
    }

    #[test]
    fn all_ok_requires_every_check_to_pass() {
        let pass = HealthCheck::pass("a", "ok");
        let fail = HealthCheck::error("b", "bad", "fix");
        assert!(all_ok(std::slice::from_ref(&pass)));
        assert!(!all_ok(&[pass, fail]));
    }
}

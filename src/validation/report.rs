//! Validation report formatting.

use super::{ValidationIssue, ValidationResult, ValidationSeverity};

/// Formats a validation result as one block per issue plus a verdict line.
///
/// Errors are listed before warnings. Each issue reads
/// `error: <field>: <message>` with an indented `hint:` line when a
/// suggestion exists.
pub fn format_report(result: &ValidationResult) -> String {
    let errors: Vec<_> = result.errors().collect();
    let warnings: Vec<_> = result.warnings().collect();

    if errors.is_empty() && warnings.is_empty() {
        return "Configuration is valid.".to_string();
    }

    let mut lines: Vec<String> = errors
        .iter()
        .chain(warnings.iter())
        .flat_map(|issue| issue_lines(issue))
        .collect();

    lines.push(String::new());
    lines.push(verdict(errors.len(), warnings.len()));

    lines.join("\n")
}

fn issue_lines(issue: &ValidationIssue) -> Vec<String> {
    let label = match issue.severity {
        ValidationSeverity::Error => "error",
        ValidationSeverity::Warning => "warning",
    };

    let mut lines = vec![format!("{}: {}: {}", label, issue.path, issue.message)];
    if let Some(suggestion) = &issue.suggestion {
        lines.push(format!("    hint: {}", suggestion));
    }
    lines
}

fn verdict(errors: usize, warnings: usize) -> String {
    if errors == 0 {
        format!("Configuration usable with {} warning(s).", warnings)
    } else {
        format!(
            "Configuration rejected: {} error(s), {} warning(s). No segments will be encoded with it.",
            errors, warnings
        )
    }
}

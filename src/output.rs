// ABOUTME: Report rendering for CLI feedback.
// ABOUTME: Supports human-readable and JSON output modes.

use crate::deploy::{DeployOutcome, DeployReport};

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-friendly summary with per-file lines
    Normal,
    /// The full report as JSON for scripting
    Json,
}

/// Render a deployment report for the terminal.
pub fn render_report(report: &DeployReport, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => {
            serde_json::to_string_pretty(report).unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"))
        }
        OutputMode::Normal => render_human(report),
    }
}

fn render_human(report: &DeployReport) -> String {
    let mut out = String::new();

    match &report.outcome {
        DeployOutcome::Completed => {
            out.push_str(&format!(
                "Deployment complete ({} file(s) transferred)\n",
                report.transferred()
            ));
        }
        DeployOutcome::Failed { message, .. } => {
            out.push_str(&format!("Deployment failed: {message}\n"));
        }
    }

    for file in &report.files {
        match &file.error {
            None => out.push_str(&format!("  ✓ {}\n", file.remote_path)),
            Some(error) => out.push_str(&format!("  ✗ {}: {}\n", file.remote_path, error)),
        }
    }

    out
}

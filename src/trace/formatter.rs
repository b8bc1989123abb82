use super::{ExecutionTrace, StepOutcome};
use std::fmt::Write;

/// Formats execution traces into human-readable strings.
pub struct TraceFormatter;

impl TraceFormatter {
    /// One line per planned node, in execution order.
    pub fn format_trace(trace: &ExecutionTrace) -> String {
        let mut result = String::new();
        for (position, step) in trace.steps.iter().enumerate() {
            let label = if step.name == step.node_id {
                step.node_id.clone()
            } else {
                format!("{} ({})", step.name, step.node_id)
            };
            let _ = write!(result, "{:>3}. [{}] {}: ", position + 1, step.kind, label);
            let _ = match &step.outcome {
                StepOutcome::Ran {
                    contribution,
                    branch: Some(branch),
                } => writeln!(
                    result,
                    "took branch '{}' -> {}",
                    branch,
                    Self::format_value(contribution)
                ),
                StepOutcome::Ran {
                    contribution,
                    branch: None,
                } => writeln!(result, "ran -> {}", Self::format_value(contribution)),
                StepOutcome::Skipped { switch_id, branch } => writeln!(
                    result,
                    "skipped, requires switch '{}' to take branch '{}'",
                    switch_id, branch
                ),
                StepOutcome::Failed { error } => writeln!(result, "FAILED: {}", error),
            };
        }
        result
    }

    /// Compact JSON, truncated so that wide contexts stay on one readable line.
    fn format_value(value: &serde_json::Value) -> String {
        const LIMIT: usize = 120;
        let text = value.to_string();
        match text.char_indices().nth(LIMIT) {
            Some((cut, _)) => format!("{}...", &text[..cut]),
            None => text,
        }
    }
}

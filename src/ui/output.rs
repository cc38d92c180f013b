//! Report formatting on stdout

use super::context::UiContext;
use crate::exit::CiStatus;
use crate::lineage::LineagePair;
use crate::report::InspectionOutcome;
use console::style;

/// Print which builds were compared
pub fn lineage_header(ctx: &UiContext, lineage: &LineagePair) {
    print!("{}", render_lineage(ctx, lineage));
}

/// Print the outcome of one inspection followed by its verdict
pub fn inspection(ctx: &UiContext, outcome: &InspectionOutcome) {
    print!("{}", render_outcome(outcome));
    verdict(ctx, outcome.name(), outcome.ci_status());
}

/// Print the verdict line
pub fn verdict(ctx: &UiContext, name: &str, status: CiStatus) {
    let label = status.to_string();
    let styled = match status {
        CiStatus::Pass => style(label).green().bold(),
        CiStatus::Fail => style(label).red().bold(),
        CiStatus::Error | CiStatus::InsufficientSpace => style(label).yellow().bold(),
    };
    if ctx.use_fancy_output() {
        println!();
    }
    println!("{}: {}", style(name).bold(), styled);
}

fn render_lineage(ctx: &UiContext, lineage: &LineagePair) -> String {
    let before = match &lineage.before {
        Some(before) => before.to_string(),
        None => style("no baseline").dim().to_string(),
    };
    let mut text = format!(
        "{:<8}{}\n{:<8}{}\n",
        style("after").dim(),
        lineage.after,
        style("before").dim(),
        before
    );
    if ctx.use_fancy_output() {
        text.push('\n');
    }
    text
}

fn render_outcome(outcome: &InspectionOutcome) -> String {
    match outcome {
        InspectionOutcome::Disabled { name } => format!("{} inspection is disabled\n", name),
        InspectionOutcome::Skipped { name } => format!("{} inspection was skipped\n", name),
        InspectionOutcome::Completed { artifact, .. } => {
            let mut text = String::new();
            if !artifact.description.trim().is_empty() {
                text.push_str(&format!("{}\n\n", style(artifact.description.trim()).bold()));
            }
            text.push_str(&artifact.result_text);
            if !text.ends_with('\n') {
                text.push('\n');
            }
            text
        }
    }
}

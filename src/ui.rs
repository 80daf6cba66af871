use colored::Colorize;
use declarative::{
    ApplyResult, ConfirmCallback, ExecuteSummary, ExecutionPlan, ProgressCallback, ResourceDiff,
};
use dialoguer::Confirm;
use linkconfig::{Error, Warning};
use linkspec::{LinkKind, LinkSpec};

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

// ============================================================================
// Links
// ============================================================================

/// One-line summary of a declaration's kind-specific settings
pub fn link_details(link: &LinkSpec) -> String {
    let mut details = match &link.kind {
        LinkKind::Physical => format!("{:?}", link.link_type).to_lowercase(),
        LinkKind::Vlan(vlan) => format!("vlan {} on {} ({})", vlan.vid, vlan.parent, vlan.protocol),
        LinkKind::Bond(bond) => {
            let carrier = if bond.use_carrier { ", carrier" } else { "" };
            format!("bond {}{carrier}", bond.mode)
        }
        LinkKind::Dummy => "dummy".to_string(),
        LinkKind::Wireguard(wg) => format!("wireguard, {} peer(s)", wg.peers.len()),
    };

    if let Some(master) = link.master_name() {
        details.push_str(&format!(", slave of {master}"));
    }
    if let Some(mtu) = link.mtu {
        details.push_str(&format!(", mtu {mtu}"));
    }
    details
}

/// Print declarations as a table
pub fn display_links(links: &[LinkSpec]) {
    if links.is_empty() {
        dim("(no links)");
        return;
    }

    for link in links {
        let state = if link.up { "up".green() } else { "down".red() };
        let logical = if link.logical { "logical" } else { "" };
        println!(
            "  {:<28} {:<5} {:<8} {}",
            link.key().to_string(),
            state,
            logical.dimmed(),
            link_details(link).dimmed()
        );
    }
}

/// Print warnings and rejected inputs of a pass
pub fn display_problems(warnings: &[Warning], errors: &[Error]) {
    for warning in warnings {
        warn(&warning.to_string());
    }
    for err in errors {
        error(&err.to_string());
    }
}

// ============================================================================
// Plans
// ============================================================================

/// Display a plan in a user-friendly format
pub fn display_plan(plan: &ExecutionPlan<LinkSpec>) {
    if plan.is_empty() {
        println!();
        println!("  {} No changes needed", "✓".green());
        return;
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Link Diff".bold()
    );
    println!("│");

    for diff in plan.operations() {
        let (symbol, detail) = match diff {
            ResourceDiff::Create(link) => ("+".green(), link_details(link)),
            ResourceDiff::Update { from, to } => (
                "~".yellow(),
                format!("{} → {}", link_details(from), link_details(to)),
            ),
            ResourceDiff::Destroy(_) => ("-".red(), "(will remove)".to_string()),
        };
        println!(
            "│   {} {:<30} {}",
            symbol,
            diff.key().to_string(),
            detail.dimmed()
        );
    }

    let summary = plan.summary();
    println!("│");
    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Summary: {} to create, {} to update, {} to remove",
        summary.additions.to_string().green(),
        summary.modifications.to_string().yellow(),
        summary.removals.to_string().red()
    );
    println!("└─────────────────────────────────────────────────────┘");
}

/// Print final summary
pub fn print_summary(summary: &ExecuteSummary) {
    println!();
    if summary.is_success() {
        println!("  {} Links published successfully!", "✓".green().bold());
    } else {
        println!("  {} Links published with errors", "⚠".yellow().bold());
    }

    if summary.created > 0 {
        println!("    • {} links created", summary.created);
    }
    if summary.modified > 0 {
        println!("    • {} links modified", summary.modified);
    }
    if summary.removed > 0 {
        println!("    • {} links removed", summary.removed);
    }
    if summary.skipped > 0 {
        println!("    • {} links skipped", summary.skipped);
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "links".red());
    }
}

/// Prints each applied operation as it completes
pub struct TermProgress {
    verbose: bool,
}

impl TermProgress {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ProgressCallback for TermProgress {
    fn on_batch_start(&mut self, count: usize, operation: &str) {
        println!();
        println!("  {} Applying {} {} operation(s)...", "→".cyan(), count, operation);
    }

    fn on_resource_start(&mut self, id: &str, description: &str) {
        if self.verbose {
            dim(&format!("{id}: {description}"));
        }
    }

    fn on_resource_complete(&mut self, id: &str, result: &ApplyResult) {
        match result {
            ApplyResult::NoChange => println!("    {} {}", "○".dimmed(), id),
            ApplyResult::Created | ApplyResult::Modified | ApplyResult::Removed => {
                println!("    {} {}", "✓".green(), id);
            }
            ApplyResult::Failed { error } => {
                println!("    {} {} {}", "✗".red(), id, error.dimmed());
            }
            ApplyResult::Skipped { reason } => {
                println!("    {} {} {}", "⊘".yellow(), id, reason.dimmed());
            }
        }
    }

    fn on_batch_complete(&mut self) {}
}

/// Asks on the terminal before publishing
pub struct DialoguerConfirm {
    assume_yes: bool,
}

impl DialoguerConfirm {
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }
}

impl ConfirmCallback for DialoguerConfirm {
    fn confirm(&mut self, prompt: &str) -> declarative::Result<bool> {
        if self.assume_yes {
            return Ok(true);
        }

        println!();
        Confirm::new()
            .with_prompt(prompt)
            .default(true)
            .interact()
            .map_err(|e| declarative::Error::Other(format!("confirmation prompt failed: {e}")))
    }
}

//! `linkd apply` - run one reconciliation pass against the state file

use anyhow::Result;
use declarative::CancelToken;

use super::Inputs;
use crate::Context;
use crate::cli::ApplyArgs;
use crate::ui;

pub fn run(ctx: &Context, args: &ApplyArgs) -> Result<()> {
    let inputs = Inputs::load(ctx)?;
    let ctrl = inputs.controller(args.dry_run, args.jobs)?;

    let plan = ctrl.plan()?;
    ui::display_plan(&plan);
    if plan.is_empty() {
        return Ok(());
    }

    if args.dry_run {
        println!();
        ui::info("Dry run, nothing published");
        return Ok(());
    }

    let mut confirm = ui::DialoguerConfirm::new(args.yes);
    let mut progress = ui::TermProgress::new(ctx.verbose > 0);

    let report = ctrl.reconcile_with(&CancelToken::new(), &mut progress, &mut confirm)?;

    ui::display_problems(&report.warnings, &report.errors);
    if report.summary.total_changes() == 0 && report.summary.skipped > 0 {
        ui::warn("Aborted, nothing published");
        return Ok(());
    }

    ui::print_summary(&report.summary);
    report.check()?;
    Ok(())
}

//! `linkd diff` - preview what apply would change

use anyhow::Result;

use super::Inputs;
use crate::Context;
use crate::ui;

pub fn run(ctx: &Context, target: Option<&str>) -> Result<()> {
    let inputs = Inputs::load(ctx)?;
    let ctrl = inputs.controller(true, None)?;

    if !ctx.quiet {
        ui::header("Link Diff");
        ui::kv("state", &inputs.state_file.display().to_string());
        if let Some(t) = target {
            ui::kv("target", t);
        }
    }

    let derivation = ctrl.desired()?;
    ui::display_problems(&derivation.warnings, &derivation.errors);

    let plan = ctrl.plan()?.filter_by_target(target);
    ui::display_plan(&plan);

    if !plan.is_empty() && !ctx.quiet {
        println!();
        ui::dim("Run 'linkd apply' to publish these changes");
    }
    Ok(())
}

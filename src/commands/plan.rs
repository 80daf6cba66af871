//! `linkd plan` - show the declarations the current inputs produce

use anyhow::Result;

use super::Inputs;
use crate::Context;
use crate::ui;

pub fn run(ctx: &Context, json: bool) -> Result<()> {
    let inputs = Inputs::load(ctx)?;
    let ctrl = inputs.controller(true, None)?;
    let derivation = ctrl.desired()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&derivation.links)?);
        ui::display_problems(&derivation.warnings, &derivation.errors);
        return Ok(());
    }

    if !ctx.quiet {
        ui::header("Link Declarations");
        ui::kv("machine config", &inputs.machine_config.display().to_string());
        ui::kv(
            "cmdline",
            if inputs.cmdline.is_some() {
                "present"
            } else {
                "absent"
            },
        );
        println!();
    }

    ui::display_links(&derivation.links);

    if !derivation.is_clean() {
        println!();
        ui::display_problems(&derivation.warnings, &derivation.errors);
    }
    Ok(())
}

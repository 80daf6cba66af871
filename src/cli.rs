use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "linkd")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Publish network link declarations from boot parameters and machine config", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Settings file (default: ~/.config/linkd/config.toml)
    #[arg(long, env = "LINKD_SETTINGS", global = true)]
    pub settings: Option<PathBuf>,

    #[command(flatten)]
    pub inputs: InputArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Overrides for where the inputs and the published state live
#[derive(Args, Debug, Clone, Default)]
pub struct InputArgs {
    /// Machine configuration file (overrides settings)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Kernel command line text, used instead of reading the cmdline file
    #[arg(long, global = true)]
    pub cmdline: Option<String>,

    /// State file holding published links (overrides settings)
    #[arg(long, global = true)]
    pub state: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show the link declarations the current inputs produce
    Plan(PlanArgs),

    /// Preview what apply would change
    Diff(DiffArgs),

    /// Publish the declarations, removing stale ones
    Apply(ApplyArgs),

    /// Keep declarations published while the machine config changes
    Watch,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Print declarations as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Only show changes for this layer or layer/name (e.g. configuration/bond0)
    pub target: Option<String>,
}

#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// Show what would change without publishing
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Store operations applied in parallel (overrides settings)
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_inputs_after_subcommand() {
        let cli = Cli::parse_from([
            "linkd",
            "diff",
            "configuration/bond0",
            "--cmdline",
            "ip=dhcp",
            "--state",
            "/tmp/links.toml",
        ]);
        assert_eq!(cli.inputs.cmdline.as_deref(), Some("ip=dhcp"));
        assert_eq!(cli.inputs.state, Some(PathBuf::from("/tmp/links.toml")));
        match cli.command {
            Command::Diff(args) => assert_eq!(args.target.as_deref(), Some("configuration/bond0")),
            _ => panic!("expected diff"),
        }
    }

    #[test]
    fn test_apply_flags() {
        let cli = Cli::parse_from(["linkd", "-vv", "apply", "--dry-run", "-y", "-j", "4"]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Apply(args) => {
                assert!(args.dry_run);
                assert!(args.yes);
                assert_eq!(args.jobs, Some(4));
            }
            _ => panic!("expected apply"),
        }
    }
}

//! Command-line interface definitions.

use std::path::PathBuf;

use clap::Parser;

pub mod commands;
pub mod output;

pub use commands::Commands;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Develop assistant skills in per-branch sandboxes
///
/// * create individual developer sandboxes for skills
/// * decompose skill JSON files into diff friendly XML and CSV files
/// * clone the skills from a service to another service
/// * run k-fold, blind and flow tests on a skill
/// * download, deploy and delete skills
#[derive(Parser, Debug)]
#[command(name = "wa-cli", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Disable logging
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// JSON output on stdout and JSON logs on stderr
    #[arg(long, global = true)]
    pub json: bool,

    /// Config file (default: .wa-cli/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Apikey of the target service [default: $WA_APIKEY]
    #[arg(long, global = true)]
    pub apikey: Option<String>,

    /// URL of the target service [default: $WA_URL]
    #[arg(long, global = true)]
    pub url: Option<String>,
}

impl Cli {
    #[must_use]
    pub fn output_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "wa-cli", "sandbox", "push", "billing", "-vv", "--json", "--apikey", "k",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.output_format(), OutputFormat::Json);
        assert_eq!(cli.apikey.as_deref(), Some("k"));
    }

    #[test]
    fn skill_list_pattern_defaults_to_star() {
        let cli = Cli::try_parse_from(["wa-cli", "skill", "list"]).unwrap();
        let Commands::Skill(args) = cli.command else {
            panic!("expected skill command");
        };
        let commands::skill::SkillCommand::List { pattern } = args.command else {
            panic!("expected list");
        };
        assert_eq!(pattern, "*");
    }
}

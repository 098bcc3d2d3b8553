//! CLI command implementations
//!
//! Each subcommand has its own module with:
//! - Args struct for command-line arguments
//! - run() function to execute the command

use clap::Subcommand;

pub mod env;
pub mod init;
pub mod sandbox;
pub mod service;
pub mod skill;

use crate::app::AppContext;
use crate::cli::Cli;
use crate::error::Result;

/// Dispatch `cli.command`. Only `init` and `env` run outside a project.
pub fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Init(args) => init::run(cli, args),
        Commands::Env => env::run(cli),
        Commands::Skill(args) => skill::run(&AppContext::from_cli(cli)?, args),
        Commands::Sandbox(args) => sandbox::run(&AppContext::from_cli(cli)?, args),
        Commands::Service(args) => service::run(&AppContext::from_cli(cli)?, args),
        Commands::Test(args) => test::run(&AppContext::from_cli(cli)?, args),
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialise the current folder for further work with wa-cli
    Init(init::InitArgs),

    /// Print the shell line that exports the variables in .env
    Env,

    /// Skill related commands
    Skill(skill::SkillArgs),

    /// Work with skills in a branch-dependent sandbox
    Sandbox(sandbox::SandboxArgs),

    /// Service related commands
    Service(service::ServiceArgs),

    /// Run the testing tool against a skill
    Test(test::TestArgs),
}

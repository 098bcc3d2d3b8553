//! wa-cli sandbox - Work with skills in a branch-dependent sandbox
//!
//! ```text
//! $ git checkout master
//! $ wa-cli sandbox init your_skill
//! $ git checkout -b topic_branch
//! $ wa-cli sandbox push your_skill
//! # work with topic_branch__your_skill in the assistant GUI
//! $ wa-cli sandbox pull your_skill
//! $ git diff
//! ```

use std::time::Duration;

use clap::{Args, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;

use crate::app::AppContext;
use crate::cli::output::{done, emit_json, json_ok};
use crate::core::sandbox::Sandbox;
use crate::error::Result;
use crate::service::WatsonService;
use crate::vcs::GitRepository;
use crate::workbench::WorkbenchDecomposer;

#[derive(Args, Debug)]
pub struct SandboxArgs {
    #[command(subcommand)]
    pub command: SandboxCommand,
}

#[derive(Subcommand, Debug)]
pub enum SandboxCommand {
    /// Download a skill and decompose it into waw/<skill_name> (main branch)
    Init { skill_name: String },

    /// Reassemble waw/<skill_name> and deploy it as <branch>__<skill_name>
    Push {
        skill_name: String,

        /// Wait for the sandbox to finish training
        #[arg(long)]
        wait: bool,
    },

    /// Overwrite waw/<skill_name> with the contents of <branch>__<skill_name>
    Pull { skill_name: String },

    /// Delete the remote <branch>__<skill_name>; no files are touched
    Delete { skill_name: String },

    /// Reassemble waw/<skill_name> and deploy it under its own name (main branch)
    Deploy { skill_name: String },

    /// Wait until the sandbox skill is available
    Wait {
        skill_name: String,

        /// Seconds to wait [default: sandbox.ready_timeout_secs]
        #[arg(long)]
        timeout: Option<u64>,
    },
}

struct Collaborators {
    service: WatsonService,
    vcs: GitRepository,
    decomposer: WorkbenchDecomposer,
}

impl Collaborators {
    fn new(ctx: &AppContext) -> Result<Self> {
        Ok(Self {
            service: ctx.target_service()?,
            vcs: ctx.vcs(),
            decomposer: ctx.decomposer()?,
        })
    }
}

pub fn run(ctx: &AppContext, args: &SandboxArgs) -> Result<()> {
    if matches!(
        args.command,
        SandboxCommand::Push { .. } | SandboxCommand::Delete { .. } | SandboxCommand::Deploy { .. }
    ) {
        ctx.authorize_mutation()?;
    }

    let parts = Collaborators::new(ctx)?;
    let cache = ctx.cache();
    let skill_name = match &args.command {
        SandboxCommand::Init { skill_name }
        | SandboxCommand::Push { skill_name, .. }
        | SandboxCommand::Pull { skill_name }
        | SandboxCommand::Delete { skill_name }
        | SandboxCommand::Deploy { skill_name }
        | SandboxCommand::Wait { skill_name, .. } => skill_name,
    };
    let mut sandbox = Sandbox::new(
        skill_name,
        &ctx.main_branch,
        &parts.service,
        &parts.vcs,
        &parts.decomposer,
        &cache,
    )?
    .with_poll_interval(ctx.poll_interval());

    match &args.command {
        SandboxCommand::Init { .. } => sandbox.init()?,
        SandboxCommand::Push { wait, .. } => {
            sandbox.push()?;
            if *wait {
                wait_for(ctx, &sandbox, ctx.ready_timeout())?;
            }
        }
        SandboxCommand::Pull { .. } => sandbox.pull()?,
        SandboxCommand::Delete { .. } => sandbox.delete()?,
        SandboxCommand::Deploy { .. } => {
            sandbox.deploy()?;
        }
        SandboxCommand::Wait { timeout, .. } => {
            let timeout = timeout.map_or_else(|| ctx.ready_timeout(), Duration::from_secs);
            wait_for(ctx, &sandbox, timeout)?;
        }
    }

    let identity = sandbox.identity();
    if ctx.is_json() {
        return emit_json(&json_ok(json!({
            "branch": identity.branch,
            "skill": identity.base_name,
            "sandbox": identity.sandbox_name,
            "state": format!("{:?}", sandbox.state()),
        })));
    }
    done();
    Ok(())
}

fn wait_for(ctx: &AppContext, sandbox: &Sandbox<'_>, timeout: Duration) -> Result<()> {
    if ctx.is_json() {
        return sandbox.wait_for_ready(timeout);
    }
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(format!(
        "waiting for {} to be available",
        sandbox.identity().sandbox_name
    ));
    spinner.enable_steady_tick(Duration::from_millis(120));
    let outcome = sandbox.wait_for_ready(timeout);
    spinner.finish_and_clear();
    outcome
}

//! wa-cli service - Operations on every skill of a service

use clap::{Args, Subcommand};

use crate::app::AppContext;
use crate::cli::output::{confirm, emit_batch, emit_json, json_batch};
use crate::core::bulk::{BatchReport, clone_all, delete_all, download_all};
use crate::core::skill::SkillRecord;
use crate::error::{Result, WaError};

#[derive(Args, Debug)]
pub struct ServiceArgs {
    #[command(subcommand)]
    pub command: ServiceCommand,
}

#[derive(Subcommand, Debug)]
pub enum ServiceCommand {
    /// Delete all the skills in the target service
    DeleteAll {
        /// Do not ask for confirmation
        #[arg(long)]
        force: bool,
    },

    /// Copy the skills of the source service into the target service
    CloneSkills {
        /// Apikey of the source service [default: $WA_APIKEY_SRC]
        #[arg(long)]
        src_apikey: Option<String>,

        /// URL of the source service [default: $WA_URL_SRC]
        #[arg(long)]
        src_url: Option<String>,

        /// Do not ask before each skill
        #[arg(long)]
        force: bool,
    },

    /// Download every skill of the target service into skills/
    DownloadSkills {
        /// Do not ask before each skill
        #[arg(long)]
        force: bool,
    },
}

pub fn run(ctx: &AppContext, args: &ServiceArgs) -> Result<()> {
    match &args.command {
        ServiceCommand::DeleteAll { force } => {
            ctx.authorize_mutation()?;
            if !*force && !ask(ctx, "Do you want to delete every skill in the service?")? {
                return Err(WaError::Precondition("delete-all cancelled".to_string()));
            }
            let report = delete_all(&ctx.target_service()?)?;
            emit(ctx, "Deleted skills", &report)
        }
        ServiceCommand::CloneSkills {
            src_apikey,
            src_url,
            force,
        } => {
            ctx.authorize_mutation()?;
            let source = ctx.source_service(src_apikey.as_deref(), src_url.as_deref())?;
            let target = ctx.target_service()?;
            let report = clone_all(&source, &target, &ctx.cache(), |skill| {
                *force || ask_for(ctx, "copy", skill)
            })?;
            emit(ctx, "Cloned skills", &report)
        }
        ServiceCommand::DownloadSkills { force } => {
            let service = ctx.target_service()?;
            let report = download_all(&service, &ctx.cache(), |skill| {
                *force || ask_for(ctx, "download", skill)
            })?;
            emit(ctx, "Downloaded skills", &report)
        }
    }
}

fn ask(ctx: &AppContext, question: &str) -> Result<bool> {
    if ctx.is_json() {
        return Ok(false);
    }
    confirm(question)
}

fn ask_for(ctx: &AppContext, verb: &str, skill: &SkillRecord) -> bool {
    ask(
        ctx,
        &format!("Do you want to {verb} the skill {}-{}?", skill.id, skill.name),
    )
    .unwrap_or(false)
}

fn emit(ctx: &AppContext, title: &str, report: &BatchReport) -> Result<()> {
    if ctx.is_json() {
        return emit_json(&json_batch(report));
    }
    emit_batch(title, report);
    Ok(())
}

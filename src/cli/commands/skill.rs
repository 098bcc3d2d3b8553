//! wa-cli skill - List, deploy, delete, download, decompose and assemble skills

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use serde_json::json;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, confirm, emit_human, emit_json, json_ok, success_line};
use crate::core::cache::CachedArtifact;
use crate::core::deploy::deploy_document;
use crate::core::resolver::SkillResolver;
use crate::core::skill::SkillDocument;
use crate::error::{Result, WaError};
use crate::service::SkillService;
use crate::workbench::Decomposer;

#[derive(Args, Debug)]
pub struct SkillArgs {
    #[command(subcommand)]
    pub command: SkillCommand,
}

#[derive(Subcommand, Debug)]
pub enum SkillCommand {
    /// List skills whose name matches a glob pattern
    List {
        #[arg(default_value = "*")]
        pattern: String,
    },

    /// Create or update a skill from a JSON file
    Deploy {
        skill_file: PathBuf,

        /// Overwrite a same-named skill without asking
        #[arg(long)]
        force: bool,
    },

    /// Delete a skill by id
    Delete { skill_id: String },

    /// Download a skill into the skills/ cache and print its path
    Download { skill_name: String },

    /// Decompose a skill JSON file into waw/<name>
    Decompose {
        /// Skill file to decompose
        #[arg(required_unless_present = "all")]
        skill_file: Option<PathBuf>,

        /// Folder name under waw/ (default: the skill's name)
        #[arg(long)]
        name: Option<String>,

        /// Decompose every file in skills/
        #[arg(long, conflicts_with = "skill_file")]
        all: bool,

        /// Do not ask before each file with --all
        #[arg(long)]
        force: bool,
    },

    /// Reassemble waw/<skill_name> into waw/re-assembled/<new_name>/skill.json
    Assemble {
        skill_name: String,
        new_name: Option<String>,

        /// Overwrite a previous reassembly without asking
        #[arg(long)]
        force: bool,
    },
}

pub fn run(ctx: &AppContext, args: &SkillArgs) -> Result<()> {
    match &args.command {
        SkillCommand::List { pattern } => list(ctx, pattern),
        SkillCommand::Deploy { skill_file, force } => deploy(ctx, skill_file, *force),
        SkillCommand::Delete { skill_id } => delete(ctx, skill_id),
        SkillCommand::Download { skill_name } => download(ctx, skill_name),
        SkillCommand::Decompose {
            skill_file,
            name,
            all,
            force,
        } => {
            if *all {
                decompose_all(ctx, *force)
            } else {
                let file = skill_file.as_ref().ok_or_else(|| {
                    WaError::Precondition("a skill file or --all is required".to_string())
                })?;
                decompose(ctx, file, name.as_deref())
            }
        }
        SkillCommand::Assemble {
            skill_name,
            new_name,
            force,
        } => assemble(ctx, skill_name, new_name.as_deref(), *force),
    }
}

fn list(ctx: &AppContext, pattern: &str) -> Result<()> {
    let service = ctx.target_service()?;
    let skills = SkillResolver::new(&service).resolve(pattern)?;
    if ctx.is_json() {
        return emit_json(&json_ok(&skills));
    }
    for skill in &skills {
        println!("{}   {}   {}", skill.updated_on, skill.id, skill.name);
    }
    Ok(())
}

fn deploy(ctx: &AppContext, skill_file: &Path, force: bool) -> Result<()> {
    ctx.authorize_mutation()?;
    let service = ctx.target_service()?;
    let document: SkillDocument = serde_json::from_str(&fs::read_to_string(skill_file)?)?;
    let interactive = !ctx.is_json();
    let success = deploy_document(&service, document, |record| {
        force
            || (interactive
                && confirm(&format!(
                    "Do you want to overwrite the skill {}-{}?",
                    record.id, record.name
                ))
                .unwrap_or(false))
    })?;
    report_success(ctx, success)
}

fn delete(ctx: &AppContext, skill_id: &str) -> Result<()> {
    ctx.authorize_mutation()?;
    let success = ctx.target_service()?.delete(skill_id)?;
    report_success(ctx, success)
}

fn download(ctx: &AppContext, skill_name: &str) -> Result<()> {
    let service = ctx.target_service()?;
    let record = SkillResolver::new(&service).resolve_unique(skill_name)?;
    let artifact = ctx.cache().get_or_fetch(&service, &record)?;
    if ctx.is_json() {
        return emit_json(&json_ok(json!({
            "id": record.id,
            "name": record.name,
            "path": artifact.path,
            "from_cache": artifact.from_cache,
        })));
    }
    println!("{}", artifact.path.display());
    Ok(())
}

fn decompose(ctx: &AppContext, skill_file: &Path, name: Option<&str>) -> Result<()> {
    let artifact = CachedArtifact::from_file(skill_file)?;
    let target = name.unwrap_or(&artifact.document.name).to_string();
    let folder = ctx.decomposer()?.decompose(&artifact, &target)?;
    if ctx.is_json() {
        return emit_json(&json_ok(json!({ "name": target, "folder": folder })));
    }
    println!("{}", folder.display());
    success_line(true);
    Ok(())
}

fn decompose_all(ctx: &AppContext, force: bool) -> Result<()> {
    let decomposer = ctx.decomposer()?;
    let interactive = !ctx.is_json();
    let folders = decomposer.decompose_all(&ctx.project.skills_dir(), |path, name| {
        force
            || (interactive
                && confirm(&format!(
                    "Do you want to decompose {} into waw/{name}?",
                    path.display()
                ))
                .unwrap_or(false))
    })?;
    if ctx.is_json() {
        return emit_json(&json_ok(&folders));
    }
    let mut layout = HumanLayout::new();
    layout.title("Decomposed");
    for folder in &folders {
        layout.bullet(&folder.display().to_string());
    }
    emit_human(layout);
    Ok(())
}

fn assemble(ctx: &AppContext, skill_name: &str, new_name: Option<&str>, force: bool) -> Result<()> {
    let decomposer = ctx.decomposer()?;
    let target = new_name.unwrap_or(skill_name);
    let output = decomposer.reassembled_file(target);
    if output.is_file() && !force {
        let overwrite = !ctx.is_json()
            && confirm(&format!("{} already exists. Overwrite it?", output.display()))?;
        if !overwrite {
            return Err(WaError::Precondition(format!(
                "{} exists; not overwritten",
                output.display()
            )));
        }
    }
    let document = decomposer.reassemble(skill_name, target)?;
    if ctx.is_json() {
        return emit_json(&json_ok(json!({ "name": document.name, "path": output })));
    }
    println!("{}", output.display());
    success_line(true);
    Ok(())
}

fn report_success(ctx: &AppContext, success: bool) -> Result<()> {
    if ctx.is_json() {
        return emit_json(&json_ok(json!({ "success": success })));
    }
    success_line(success);
    Ok(())
}

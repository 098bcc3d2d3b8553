//! wa-cli init - Turn the current folder into a wa-cli project

use clap::Args;
use serde_json::json;

use crate::cli::Cli;
use crate::cli::output::{confirm, emit_json, json_ok, prompt};
use crate::error::{Result, WaError};
use crate::project::{ENV_SETUP_LINE, InitOptions, initialize};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Trunk branch of the project's git repository
    #[arg(long, default_value = "master")]
    pub main_branch: String,

    /// Apikey of a service to clone skills from; it is marked read-only
    #[arg(long)]
    pub src_apikey: Option<String>,

    /// URL of the service to clone skills from
    #[arg(long)]
    pub src_url: Option<String>,

    /// Take every value from the command line instead of asking
    #[arg(long)]
    pub no_prompt: bool,
}

pub fn run(cli: &Cli, args: &InitArgs) -> Result<()> {
    let interactive = !args.no_prompt && !cli.json;
    if interactive
        && !confirm("This will initialise the current folder as a wa-cli project. Continue?")?
    {
        return Err(WaError::Precondition("Init cancelled".to_string()));
    }

    let ask = |value: &Option<String>, question: &str| -> Result<String> {
        match value {
            Some(value) => Ok(value.clone()),
            None if interactive => prompt(question, ""),
            None => Ok(String::new()),
        }
    };
    let options = InitOptions {
        apikey: ask(&cli.apikey, "Enter the apikey of the service that you are going to be targeting")?,
        url: ask(&cli.url, "Enter the url of the service that you are going to be targeting")?,
        src_apikey: ask(
            &args.src_apikey,
            "If you plan to clone skills from a different service, enter its apikey",
        )?,
        src_url: ask(
            &args.src_url,
            "If you plan to clone skills from a different service, enter its url",
        )?,
        main_branch: args.main_branch.clone(),
    };

    let root = std::env::current_dir()?;
    let project = initialize(&root, &options)?;

    if cli.json {
        return emit_json(&json_ok(json!({
            "root": project.root(),
            "main_branch": options.main_branch,
            "setup": ENV_SETUP_LINE,
        })));
    }
    println!("The values you have supplied have been added to the .env file");
    println!("You can set them as environment variables by running\n");
    println!("   {ENV_SETUP_LINE}\n");
    println!("You don't need to remember this: run \"wa-cli env\" to be reminded");
    Ok(())
}

//! wa-cli env - Remind how to load the project's .env file

use serde_json::json;

use crate::cli::Cli;
use crate::cli::output::{emit_json, json_ok};
use crate::error::Result;
use crate::project::ENV_SETUP_LINE;

pub fn run(cli: &Cli) -> Result<()> {
    if cli.json {
        return emit_json(&json_ok(json!({ "setup": ENV_SETUP_LINE })));
    }
    println!("Set the environment variables that \"wa-cli init\" added to the .env file by running\n");
    println!("   {ENV_SETUP_LINE}\n");
    Ok(())
}

//! Project setup and configuration: `init`, `config`.

use anyhow::Result;
use std::path::Path;

use forge_review::config::{CONFIG_FILE, ReviewToml};
use forge_review::init::{get_forge_dir, init_project};

use super::super::ConfigCommands;

pub fn cmd_init(project_dir: &Path) -> Result<()> {
    let result = init_project(project_dir)?;
    if result.created {
        println!("Initialized review loop in {}", result.forge_dir.display());
    } else {
        println!("Already initialized: {}", result.forge_dir.display());
    }
    println!("  Config: {}", result.forge_dir.join(CONFIG_FILE).display());
    println!("  Store:  {}", result.db_path.display());
    Ok(())
}

pub fn cmd_config(project_dir: &Path, command: Option<ConfigCommands>) -> Result<()> {
    let forge_dir = get_forge_dir(project_dir);
    let config_path = forge_dir.join(CONFIG_FILE);
    let config = ReviewToml::load_or_default(&forge_dir)?;

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No review.toml found at {}; showing defaults.", config_path.display());
            }
            println!();
            print!("{}", toml::to_string_pretty(&config)?);
            println!();
            println!("Effective values (with env overrides):");
            println!("  claude_cmd = \"{}\"", config.claude_cmd());
            println!("  skip_permissions = {}", config.skip_permissions());
            println!("  db_path = \"{}\"", config.db_path(&forge_dir).display());
            println!();
        }
        Some(ConfigCommands::Validate) => match config.validate() {
            Ok(()) => println!("{}", console::style("Configuration is valid.").green()),
            Err(e) => {
                println!("{} {}", console::style("Invalid configuration:").red().bold(), e);
                return Err(e);
            }
        },
    }
    Ok(())
}

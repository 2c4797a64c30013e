//! Config command - show or initialize configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigFile};
use crate::error::SwiftShResult;
use console::style;

/// Execute the config command
pub async fn execute(args: ConfigArgs, config: &Config, file: &ConfigFile) -> SwiftShResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config)?,
        Some(ConfigAction::Path) => show_path(file),
        Some(ConfigAction::Init { force }) => init_config(file, force).await?,
    }

    Ok(())
}

fn show_config(config: &Config) -> SwiftShResult<()> {
    let toml = toml::to_string_pretty(config)?;
    println!("{}", toml);
    Ok(())
}

fn show_path(file: &ConfigFile) {
    println!("{}", file.path().display());
}

async fn init_config(file: &ConfigFile, force: bool) -> SwiftShResult<()> {
    let path = file.path();

    if file.exists().await && !force {
        eprintln!(
            "{} Config already exists at {}",
            style("!").yellow(),
            path.display()
        );
        eprintln!("  Use --force to overwrite");
        return Ok(());
    }

    file.save(&Config::default()).await?;
    eprintln!(
        "{} Configuration initialized at {}",
        style("✓").green(),
        path.display()
    );

    Ok(())
}

//! `correlog config init`

use crate::cli::ConfigInitArgs;
use std::fs;

const EXAMPLE_CONFIG: &str = include_str!("../../correlog.example.toml");
const PLACEHOLDER_PROJECT: &str = "project = \"my-project\"";

/// Render the starter config, filling in the project when one was given.
fn render_template(project: Option<&str>) -> String {
    match project {
        Some(project) => EXAMPLE_CONFIG.replacen(
            PLACEHOLDER_PROJECT,
            &format!("project = {}", toml::Value::String(project.to_string())),
            1,
        ),
        None => EXAMPLE_CONFIG.to_string(),
    }
}

/// Write a starter `correlog.toml`. Refuses to clobber an existing file
/// unless `--force` is set.
pub fn handle_config_init(args: &ConfigInitArgs) -> Result<(), Box<dyn std::error::Error>> {
    if args.output.exists() && !args.force {
        return Err(format!(
            "{} already exists; pass --force to replace it",
            args.output.display()
        )
        .into());
    }

    fs::write(&args.output, render_template(args.project.as_deref()))?;

    println!("Wrote {}", args.output.display());
    if args.project.is_none() {
        println!("  Edit [correlation] project (or set CORRELOG_PROJECT) before `correlog serve`.");
    }

    Ok(())
}

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use crate::output::OutputFormat;

#[derive(Args)]
pub struct CreateArgs {
    /// Session key (1 to 64 characters)
    pub key: String,

    /// Use this file as the initial prompt instead of the default template
    #[arg(long)]
    pub template_file: Option<PathBuf>,
}

pub fn run(args: &CreateArgs, format: OutputFormat) -> Result<()> {
    let ledger = super::open_ledger()?;

    let template = args
        .template_file
        .as_ref()
        .map(|path| {
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read template file {}", path.display()))
        })
        .transpose()?;

    let created = ledger
        .create_session(&args.key, template.as_deref())
        .with_context(|| format!("Failed to create session '{}'", args.key))?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&created)?),
        OutputFormat::Text => println!(
            "Created session {} ({}), template {} chars",
            args.key, created.session_id, created.template_length
        ),
    }
    Ok(())
}

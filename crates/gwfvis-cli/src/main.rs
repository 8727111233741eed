//! `gwfvis`: operator tool for visualization database files.
//!
//! # Usage
//!
//! ```text
//! gwfvis inspect output/mesh.gwfvisdb
//! gwfvis clone output/mesh.gwfvisdb output/mesh.backup.gwfvisdb
//! gwfvis derive output/mesh.gwfvisdb output/mesh.new.gwfvisdb --base STGW --subtrahend SNO
//! ```

mod commands;
mod settings;

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use gwfvis_core::entity::VariableRef;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::settings::CliConfig;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "gwfvis", version, about = "Inspect, clone and derive GWFVis databases")]
struct Cli {
  /// Path to a TOML config file.
  #[arg(short, long, default_value = "gwfvis.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Summarise the contents of a store.
  Inspect { store: PathBuf },

  /// Copy a store file verbatim, replacing the destination.
  Clone { source: PathBuf, destination: PathBuf },

  /// Write a copy of a store with one extra variable, `base - subtrahend`.
  Derive {
    source:      PathBuf,
    destination: PathBuf,

    /// Variable to subtract from: a name, or `#<id>`.
    #[arg(long, value_parser = parse_variable_ref)]
    base: VariableRef,

    /// Variable to subtract: a name, or `#<id>`.
    #[arg(long, value_parser = parse_variable_ref)]
    subtrahend: VariableRef,

    /// Name of the new variable (defaults to `derived_name` from config).
    #[arg(long)]
    name: Option<String>,

    #[arg(long)]
    description: Option<String>,
  },
}

fn parse_variable_ref(s: &str) -> Result<VariableRef, String> {
  match s.strip_prefix('#') {
    Some(id) => id
      .parse()
      .map(VariableRef::Id)
      .map_err(|e| format!("invalid variable id {id:?}: {e}")),
    None if s.is_empty() => Err("variable name must not be empty".to_owned()),
    None => Ok(VariableRef::Name(s.to_owned())),
  }
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let config = CliConfig::load(&cli.config).context("failed to load configuration")?;

  match cli.command {
    Command::Inspect { store } => {
      let summary = commands::inspect(&config.resolve(&store)).await?;
      print!("{summary}");
    }
    Command::Clone { source, destination } => {
      commands::clone(&config.resolve(&source), &config.resolve(&destination)).await?;
    }
    Command::Derive {
      source,
      destination,
      base,
      subtrahend,
      name,
      description,
    } => {
      let request = gwfvis_core::derive::DerivationRequest {
        base,
        subtrahend,
        name: name.unwrap_or_else(|| config.derived_name.clone()),
        description,
      };
      let variable = commands::derive(
        &config.resolve(&source),
        &config.resolve(&destination),
        &request,
      )
      .await?;
      println!("added variable {} ({:?})", variable.id, variable.name);
    }
  }

  Ok(())
}

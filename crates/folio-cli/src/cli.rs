use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "folio")]
#[command(about = "Browse, search and edit a tree of documents over HTTP", version)]
pub struct Cli {
    /// Document root; defaults to `FOLIO_ROOT` or the current directory.
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Tracing filter directives, e.g. `folio_core=debug`.
    #[arg(long)]
    pub log: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Serve the document tree.
    Serve(ServeArgs),
    /// Build the index once and print ranked matches.
    Search(SearchArgs),
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    #[arg(long)]
    pub host: Option<String>,
    #[arg(long)]
    pub port: Option<u16>,
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    pub query: String,
    #[arg(long, value_parser = parse_limit)]
    pub limit: Option<usize>,
}

fn parse_limit(raw: &str) -> std::result::Result<usize, String> {
    let value = raw
        .parse::<usize>()
        .map_err(|_| format!("invalid limit '{raw}'"))?;
    if value == 0 {
        return Err("limit must be at least 1".to_string());
    }
    Ok(value)
}

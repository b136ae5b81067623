use anyhow::{Context, Result};

use folio_core::{DocumentStore, FolioConfig, SearchIndex};

use crate::cli::{Cli, Commands, SearchArgs, ServeArgs};

pub fn run(cli: Cli) -> Result<()> {
    let mut config = FolioConfig::from_env();
    if let Some(root) = cli.root {
        config.root = root;
    }

    match cli.command {
        Commands::Serve(args) => serve(config, args),
        Commands::Search(args) => search(config, &args),
    }
}

fn serve(mut config: FolioConfig, args: ServeArgs) -> Result<()> {
    apply_serve_args(&mut config, args);
    folio_web::serve_web(config)
}

fn apply_serve_args(config: &mut FolioConfig, args: ServeArgs) {
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
}

fn search(config: FolioConfig, args: &SearchArgs) -> Result<()> {
    config.validate().context("invalid configuration")?;
    let store = DocumentStore::open(&config.root)
        .with_context(|| format!("failed to open document root {}", config.root.display()))?;
    let index = SearchIndex::new(store, &config).context("failed to create search index")?;
    let limit = args.limit.unwrap_or(config.search_limit);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build runtime")?;
    runtime
        .block_on(index.build())
        .context("search index build failed")?;

    let hits = index.search(&args.query, limit);
    if hits.is_empty() {
        println!("no matches for '{}'", args.query);
        return Ok(());
    }
    for hit in hits {
        println!("{:>6.3}  {}  {}", hit.score, hit.route, hit.title);
    }
    Ok(())
}

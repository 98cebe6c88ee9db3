//! # CLI Layer
//!
//! This module is **one possible UI client** for folio. It is the only place
//! that knows about terminal I/O, argument parsing and human-readable output.
//!
//! - `args.rs`: clap definitions
//! - `handlers.rs`: one function per command, calling into [`folio::Workspace`]
//! - `render.rs`: terminal formatting
//!
//! A CLI invocation is one short session: a deleted page cannot be undone by a
//! later invocation, so `delete` asks first and then drops the page for good.

mod args;
mod handlers;
mod render;

use args::{Cli, Commands};
use clap::Parser;
use directories::ProjectDirs;
use folio::config::FolioConfig;
use folio::error::{FolioError, Result};
use folio::store::{FsBackend, PageStore};
use folio::Workspace;
use handlers::AppContext;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let data_dir = resolve_data_dir(&cli)?;
    let config = FolioConfig::load(&data_dir)?;
    init_logging(&config, cli.verbose);
    debug!(data_dir = %data_dir.display(), "opening workspace");

    let store = PageStore::open(FsBackend::new(&data_dir))?;
    let workspace = Workspace::open(store, config);
    let mut ctx = AppContext {
        workspace,
        data_dir,
    };

    let result = match cli.command {
        None | Some(Commands::List) => handlers::list(&ctx),
        Some(Commands::New { title, text }) => handlers::new_page(&mut ctx, title, text),
        Some(Commands::Show { page }) => handlers::show(&ctx, &page),
        Some(Commands::Rename { page, title }) => handlers::rename(&mut ctx, &page, title),
        Some(Commands::Add {
            page,
            content,
            block_type,
            after,
        }) => handlers::add(&mut ctx, &page, content, &block_type, after.as_deref()),
        Some(Commands::Edit {
            page,
            block,
            content,
        }) => handlers::edit(&mut ctx, &page, &block, content),
        Some(Commands::Check { page, block }) => handlers::check(&mut ctx, &page, &block),
        Some(Commands::Remove { page, block }) => handlers::remove(&mut ctx, &page, &block),
        Some(Commands::Move { page, block, to }) => handlers::move_block(&mut ctx, &page, &block, &to),
        Some(Commands::Link {
            page,
            target,
            block,
            snapshot,
        }) => handlers::link(&mut ctx, &page, &target, block.as_deref(), snapshot),
        Some(Commands::Links { page }) => handlers::links(&ctx, &page),
        Some(Commands::Delete { page, yes }) => handlers::delete(&mut ctx, &page, yes),
        Some(Commands::Table(command)) => handlers::table(&mut ctx, command),
        Some(Commands::Export { output }) => handlers::export(&mut ctx, &output),
        Some(Commands::Config) => handlers::config(&ctx),
    };

    // Surface a save that failed after the change was applied in memory.
    if let Some(e) = ctx.workspace.take_save_error() {
        return Err(e.into());
    }
    result
}

fn resolve_data_dir(cli: &Cli) -> Result<PathBuf> {
    if let Some(dir) = &cli.data {
        return Ok(dir.clone());
    }
    ProjectDirs::from("com", "folio", "folio")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| FolioError::Config("could not determine a data directory".into()))
}

fn init_logging(config: &FolioConfig, verbose: bool) {
    let fallback = if verbose { "debug" } else { config.log_level.as_str() };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::builder().parse(fallback))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr);

    // A second init (e.g. in tests) is harmless.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}

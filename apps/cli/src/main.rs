//! linkshelf CLI: save web pages as local bookmarks.
//!
//! Normalizes the URL, pulls title and article text from the page, stores the
//! record and keeps a thumbnail next to the database.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}

use clap::{Parser, Subcommand};

use crate::Data;

pub mod author;
pub mod category;
pub mod quote;
pub mod refresh;
pub mod status;

/// a personal quote collection, cached locally and kept in notion.
#[derive(Debug, Parser)]
#[command(name = "quotebook", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// replace the local cache with everything stored in notion.
    Refresh,
    /// list, add, rename or delete categories.
    #[command(subcommand)]
    Category(category::CategoryCommand),
    /// list, search, add, edit, move or delete quotes.
    #[command(subcommand)]
    Quote(quote::QuoteCommand),
    /// list, add, rename or delete authors.
    #[command(subcommand)]
    Author(author::AuthorCommand),
    /// show what the local cache holds.
    Status,
}

#[tracing::instrument(skip(data))]
pub async fn run(data: &Data, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Refresh => refresh::refresh(data).await,
        Command::Category(command) => category::category(data, command).await,
        Command::Quote(command) => quote::quote(data, command).await,
        Command::Author(command) => author::author(data, command).await,
        Command::Status => status::status(data).await,
    }
}

pub(crate) fn author_label(name: Option<&str>) -> &str {
    name.unwrap_or("no author")
}

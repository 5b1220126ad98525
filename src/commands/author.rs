use clap::Subcommand;

use crate::{
    commands::{author_label, quote::print_quotes},
    Data,
};

#[derive(Debug, Subcommand)]
pub enum AuthorCommand {
    /// print every author.
    List,
    /// print the quotes attributed to an author.
    Quotes { id: i64 },
    /// add an author, or reuse the one that already has this name.
    Add { name: String },
    /// rename an author, here and on their notion pages.
    Rename { id: i64, name: String },
    /// delete an author and every quote attributed to them.
    Delete { id: i64 },
}

#[tracing::instrument(skip(data))]
pub async fn author(data: &Data, command: AuthorCommand) -> anyhow::Result<()> {
    match command {
        AuthorCommand::List => {
            let authors = data.engine.authors().await.inspect_err(
                |e| tracing::error!(err = ?e, "an error occurred when fetching authors"),
            )?;

            if authors.is_empty() {
                println!("no authors yet!");
                return Ok(());
            }

            for author in authors {
                println!("{}. {}", author.id, author_label(author.name.as_deref()));
            }
        }
        AuthorCommand::Quotes { id } => {
            let quotes = data.engine.quotes_by_author(id).await.inspect_err(
                |e| tracing::error!(err = ?e, id, "an error occurred when fetching quotes of author"),
            )?;

            if quotes.is_empty() {
                println!("author {id} has no quotes yet!");
                return Ok(());
            }

            print_quotes(&quotes);
        }
        AuthorCommand::Add { name } => {
            let author = data.engine.create_author(&name).await.inspect_err(
                |e| tracing::error!(err = ?e, name = %name, "an error occurred when adding author"),
            )?;

            println!("author \"{name}\" is number {}.", author.id);
        }
        AuthorCommand::Rename { id, name } => {
            let author = data.engine.rename_author(id, &name).await.inspect_err(
                |e| tracing::error!(err = ?e, id, "an error occurred when renaming author"),
            )?;

            if author.id == id {
                println!("renamed author {id} to \"{name}\".");
            } else {
                println!("merged author {id} into author {} (\"{name}\").", author.id);
            }
        }
        AuthorCommand::Delete { id } => {
            let removed = data.engine.delete_author(id).await.inspect_err(
                |e| tracing::error!(err = ?e, id, "an error occurred when deleting author"),
            )?;

            println!("deleted author {id} and {removed} of their quotes.");
        }
    }

    Ok(())
}

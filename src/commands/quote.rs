use clap::Subcommand;
use tokio::io::AsyncReadExt;

use crate::{
    commands::author_label, constants::FAILED_TEXT_RECOGNIZE, models::quotes::Quote, Data,
};

#[derive(Debug, Subcommand)]
pub enum QuoteCommand {
    /// print the quotes filed under a category.
    List { category_id: i64 },
    /// add a quote to a category.
    ///
    /// without TEXT the quote is read from stdin, e.g. piped from a text recognizer.
    Add { category_id: i64, text: Option<String> },
    /// change a quote's text, and optionally its author.
    Edit {
        id: i64,
        text: String,
        #[arg(long)]
        author: Option<String>,
    },
    /// file a quote under another category.
    Move { id: i64, category_id: i64 },
    /// delete a quote, here and in notion.
    Delete { id: i64 },
    /// print the quotes whose text contains TEXT.
    Search { text: String },
}

pub(crate) fn print_quotes(quotes: &[Quote]) {
    for quote in quotes {
        println!(
            "{}. \"{}\" - {} [{}]",
            quote.id,
            quote.text,
            author_label(quote.author_name.as_deref()),
            quote.category_name
        );
    }
}

async fn read_recognized_text() -> anyhow::Result<String> {
    let mut text = String::new();
    tokio::io::stdin()
        .read_to_string(&mut text)
        .await
        .inspect_err(|e| tracing::error!(err = ?e, "an error occurred when reading stdin"))?;

    let text = text.trim_end_matches(['\r', '\n']);

    if text.trim().is_empty() {
        tracing::warn!("recognized text is empty, storing a placeholder");
        return Ok(FAILED_TEXT_RECOGNIZE.to_owned());
    }

    Ok(text.to_owned())
}

#[tracing::instrument(skip(data))]
pub async fn quote(data: &Data, command: QuoteCommand) -> anyhow::Result<()> {
    match command {
        QuoteCommand::List { category_id } => {
            let quotes = data
                .engine
                .quotes_in_category(category_id)
                .await
                .inspect_err(|e| {
                    tracing::error!(err = ?e, category_id, "an error occurred when fetching quotes")
                })?;

            if quotes.is_empty() {
                println!("no quotes in this category yet!");
                return Ok(());
            }

            for quote in quotes {
                println!(
                    "{}. \"{}\" - {}",
                    quote.id,
                    quote.text,
                    author_label(quote.author_name.as_deref())
                );
            }
        }
        QuoteCommand::Add { category_id, text } => {
            let text = match text {
                Some(text) => text,
                None => read_recognized_text().await?,
            };

            let quote = data
                .engine
                .create_quote(category_id, &text)
                .await
                .inspect_err(|e| {
                    tracing::error!(err = ?e, category_id, "an error occurred when adding quote")
                })?;

            println!("added quote {} to \"{}\".", quote.id, quote.category_name);
        }
        QuoteCommand::Edit { id, text, author } => {
            let quote = data
                .engine
                .edit_quote(id, &text, author.as_deref())
                .await
                .inspect_err(|e| tracing::error!(err = ?e, id, "an error occurred when editing quote"))?;

            println!(
                "updated quote {}: \"{}\" - {}",
                quote.id,
                quote.text,
                author_label(quote.author_name.as_deref())
            );
        }
        QuoteCommand::Move { id, category_id } => {
            let quote = data
                .engine
                .move_quote(id, category_id)
                .await
                .inspect_err(|e| tracing::error!(err = ?e, id, "an error occurred when moving quote"))?;

            println!("moved quote {} to \"{}\".", quote.id, quote.category_name);
        }
        QuoteCommand::Delete { id } => {
            data.engine
                .delete_quote(id)
                .await
                .inspect_err(|e| tracing::error!(err = ?e, id, "an error occurred when deleting quote"))?;

            println!("deleted quote {id}.");
        }
        QuoteCommand::Search { text } => {
            let quotes = data.engine.search_quotes(&text).await.inspect_err(
                |e| tracing::error!(err = ?e, "an error occurred when searching quotes"),
            )?;

            if quotes.is_empty() {
                println!("no quote contains \"{text}\".");
                return Ok(());
            }

            print_quotes(&quotes);
        }
    }

    Ok(())
}

use clap::Subcommand;

use crate::{store::CategorySort, Data};

#[derive(Debug, Subcommand)]
pub enum CategoryCommand {
    /// print categories, newest first.
    List {
        /// sort alphabetically instead.
        #[arg(long)]
        by_name: bool,
    },
    /// add a new category.
    Add { name: String },
    /// rename a category.
    Rename { id: i64, name: String },
    /// delete a category along with its quotes, here and in notion.
    Delete { id: i64 },
}

#[tracing::instrument(skip(data))]
pub async fn category(data: &Data, command: CategoryCommand) -> anyhow::Result<()> {
    match command {
        CategoryCommand::List { by_name } => {
            let sort = if by_name {
                CategorySort::NameAsc
            } else {
                CategorySort::CreatedDesc
            };

            let categories = data.engine.categories(sort).await.inspect_err(
                |e| tracing::error!(err = ?e, "an error occurred when fetching categories"),
            )?;

            if categories.is_empty() {
                println!("no categories yet! try `quotebook refresh` or `quotebook category add`.");
                return Ok(());
            }

            for category in categories {
                println!("{}. {}", category.id, category.name);
            }
        }
        CategoryCommand::Add { name } => {
            let category = data.engine.create_category(&name).await.inspect_err(
                |e| tracing::error!(err = ?e, name = %name, "an error occurred when adding category"),
            )?;

            println!("added category \"{}\" ({}).", category.name, category.id);
        }
        CategoryCommand::Rename { id, name } => {
            let category = data.engine.rename_category(id, &name).await.inspect_err(
                |e| tracing::error!(err = ?e, id, "an error occurred when renaming category"),
            )?;

            println!("renamed category {} to \"{}\".", category.id, category.name);
        }
        CategoryCommand::Delete { id } => {
            data.engine.delete_category(id).await.inspect_err(
                |e| tracing::error!(err = ?e, id, "an error occurred when deleting category"),
            )?;

            println!("deleted category {id}.");
        }
    }

    Ok(())
}

use crate::Data;

/// pull every page from notion and rebuild the local cache from it.
#[tracing::instrument(skip_all)]
pub async fn refresh(data: &Data) -> anyhow::Result<()> {
    println!("refreshing from notion... please wait warmly.");

    let snapshot = data
        .engine
        .retrieve_data()
        .await
        .inspect_err(|e| tracing::error!(err = ?e, "an error occurred when refreshing from notion"))?;

    println!(
        "refreshed! {} quotes, {} categories, {} authors.",
        snapshot.quotes.len(),
        snapshot.categories.len(),
        snapshot.authors.len()
    );

    for category in snapshot.categories {
        println!("{}. {}", category.id, category.name);
    }

    Ok(())
}

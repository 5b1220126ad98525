use crate::Data;

/// get the local cache's status.
#[tracing::instrument(skip_all)]
pub async fn status(data: &Data) -> anyhow::Result<()> {
    let counts = data.engine.store().counts().await.inspect_err(
        |e| tracing::error!(err = ?e, "an error occurred when counting rows in database"),
    )?;

    println!("quotebook {}", env!("CARGO_PKG_VERSION"));
    println!("notion database: {}", data.engine.notion().database_id());
    println!("ingest mode: {}", data.engine.ingest_mode());
    println!("quotes: {}", counts.quotes);
    println!("categories: {}", counts.categories);
    println!("authors: {}", counts.authors);

    Ok(())
}

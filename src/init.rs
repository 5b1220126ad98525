use anyhow::Context;

use crate::{
    notion::{NotionClient, NotionConfig},
    store::Store,
    sync::{policy::IngestMode, SyncEngine},
    Data,
};

const DEFAULT_DATABASE_URL: &str = "sqlite://quotes.db";

async fn init_database() -> anyhow::Result<Store> {
    let db_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| {
        tracing::debug!("no DATABASE_URL set, using {}", DEFAULT_DATABASE_URL);
        DEFAULT_DATABASE_URL.to_owned()
    });

    tracing::info!("initializing database connection...");
    let store = Store::connect(&db_url)
        .await
        .with_context(|| format!("could not open local store at {db_url}"))?;

    Ok(store)
}

fn init_notion() -> anyhow::Result<NotionClient> {
    tracing::info!("initializing notion client...");

    let token = std::env::var("NOTION_TOKEN").context("missing NOTION_TOKEN")?;
    let database_id = std::env::var("NOTION_DATABASE_ID").context("missing NOTION_DATABASE_ID")?;

    let mut config = NotionConfig::new(token, database_id);

    if let Ok(api_base) = std::env::var("NOTION_API_BASE") {
        tracing::info!("using notion api at {}", api_base);
        config.api_base = api_base;
    }

    if let Ok(version) = std::env::var("NOTION_VERSION") {
        config.version = version;
    }

    Ok(NotionClient::new(&config)?)
}

fn init_ingest_mode() -> anyhow::Result<IngestMode> {
    match std::env::var("QUOTEBOOK_INGEST_MODE") {
        Ok(mode) => mode.parse(),
        Err(_) => Ok(IngestMode::default()),
    }
}

pub async fn init() -> anyhow::Result<Data> {
    let store = init_database().await?;
    let notion = init_notion()?;
    let ingest_mode = init_ingest_mode()?;

    if ingest_mode == IngestMode::RowPerRecord {
        tracing::warn!("refreshes will create one author and category row per remote page");
    }

    let engine = SyncEngine::new(store, notion, ingest_mode);

    tracing::info!("finished initializing!");
    Ok(Data { engine })
}

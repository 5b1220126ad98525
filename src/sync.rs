use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::Instrument;

use crate::models::quotes::{Author, Category, Quote};
use crate::notion::{NotionClient, NotionError, QueryFilter};
use crate::store::{CategorySort, QuoteFilter, Store};

pub mod policy;

use policy::{find_or_create_author, remote_author_name, IngestMode, Ingestor};

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("local store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("remote error: {0}")]
    Remote(#[from] NotionError),

    #[error("{entity} {id} does not exist")]
    NotFound { entity: &'static str, id: i64 },

    #[error("{0} must not be empty")]
    EmptyInput(&'static str),
}

/// every local collection, read back after a change.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub quotes: Vec<Quote>,
    pub categories: Vec<Category>,
    pub authors: Vec<Author>,
}

/// keeps the local store and the remote database in step.
///
/// the local store is authoritative for the session: every mutation commits locally
/// first, and the matching remote change is pushed in the background. a failed push
/// is logged and never undoes the local commit. the only way remote data comes back
/// is [`SyncEngine::retrieve_data`].
#[derive(Clone)]
pub struct SyncEngine {
    store: Store,
    notion: NotionClient,
    ingest_mode: IngestMode,
    pushes: Arc<Mutex<JoinSet<()>>>,
}

impl SyncEngine {
    pub fn new(store: Store, notion: NotionClient, ingest_mode: IngestMode) -> Self {
        SyncEngine {
            store,
            notion,
            ingest_mode,
            pushes: Arc::new(Mutex::new(JoinSet::new())),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn notion(&self) -> &NotionClient {
        &self.notion
    }

    pub fn ingest_mode(&self) -> IngestMode {
        self.ingest_mode
    }

    /// replaces the whole local cache with what the remote database holds.
    ///
    /// every remote record is parsed before anything local is touched, and the wipe
    /// and rebuild commit together, so a failure leaves the previous cache in place.
    /// pages without a quote text or a category are skipped.
    #[tracing::instrument(skip(self))]
    pub async fn retrieve_data(&self) -> Result<Snapshot, SyncError> {
        tracing::info!("started full refresh from notion");

        let pages = self.notion.query(None).await.inspect_err(
            |e| tracing::error!(err = ?e, "an error occurred when fetching pages from notion"),
        )?;

        let mut records = Vec::with_capacity(pages.len());
        for page in pages {
            match page.into_record() {
                Ok(record) => records.push(record),
                Err(NotionError::MissingProperty { page_id, property }) => {
                    tracing::warn!(page_id = %page_id, property, "skipping remote page without a required property")
                }
                Err(e) => {
                    tracing::error!(err = ?e, "notion returned an unusable page");
                    return Err(e.into());
                }
            }
        }

        let mut batch = self.store.begin().await?;
        batch.delete_all().await?;

        let mut ingestor = Ingestor::new(self.ingest_mode);
        for record in &records {
            ingestor.ingest(&mut batch, record).await?;
        }

        batch.save().await?;

        tracing::info!(records = records.len(), mode = %self.ingest_mode, "finished full refresh");
        self.snapshot().await
    }

    pub async fn snapshot(&self) -> Result<Snapshot, SyncError> {
        Ok(Snapshot {
            quotes: self.store.quotes(&QuoteFilter::All).await?,
            categories: self.store.categories(CategorySort::CreatedDesc).await?,
            authors: self.store.authors().await?,
        })
    }

    pub async fn categories(&self, sort: CategorySort) -> Result<Vec<Category>, SyncError> {
        Ok(self.store.categories(sort).await?)
    }

    pub async fn quotes_in_category(&self, category_id: i64) -> Result<Vec<Quote>, SyncError> {
        self.require_category(category_id).await?;

        Ok(self
            .store
            .quotes(&QuoteFilter::InCategory(category_id))
            .await?)
    }

    pub async fn authors(&self) -> Result<Vec<Author>, SyncError> {
        Ok(self.store.authors().await?)
    }

    pub async fn quotes_by_author(&self, author_id: i64) -> Result<Vec<Quote>, SyncError> {
        self.require_author(author_id).await?;

        Ok(self.store.quotes(&QuoteFilter::ByAuthor(author_id)).await?)
    }

    /// local, case-sensitive substring search over quote texts.
    pub async fn search_quotes(&self, text: &str) -> Result<Vec<Quote>, SyncError> {
        require_text("search text", text)?;

        Ok(self
            .store
            .quotes(&QuoteFilter::TextContains(text.to_owned()))
            .await?)
    }

    /// categories live only locally until a quote is filed under them.
    #[tracing::instrument(skip(self))]
    pub async fn create_category(&self, name: &str) -> Result<Category, SyncError> {
        require_text("category name", name)?;

        let mut batch = self.store.begin().await?;
        let category = batch.create_category(name).await?;
        batch.save().await?;

        Ok(category)
    }

    #[tracing::instrument(skip(self))]
    pub async fn rename_category(&self, id: i64, name: &str) -> Result<Category, SyncError> {
        require_text("category name", name)?;
        self.require_category(id).await?;

        let mut batch = self.store.begin().await?;
        batch.rename_category(id, name).await?;
        batch.save().await?;

        self.require_category(id).await
    }

    /// drops the category and its quotes, and every remote page filed under its name.
    #[tracing::instrument(skip(self))]
    pub async fn delete_category(&self, id: i64) -> Result<(), SyncError> {
        let category = self.require_category(id).await?;

        let mut batch = self.store.begin().await?;
        batch.delete_category(id).await?;
        batch.save().await?;

        let notion = self.notion.clone();
        self.spawn_push("delete category", async move {
            delete_all_matches(&notion, &QueryFilter::CategoryContains(category.name)).await
        })
        .await;

        Ok(())
    }

    #[tracing::instrument(skip(self, text))]
    pub async fn create_quote(&self, category_id: i64, text: &str) -> Result<Quote, SyncError> {
        require_text("quote", text)?;
        self.require_category(category_id).await?;

        let mut batch = self.store.begin().await?;
        let quote = batch.create_quote(text, category_id, None).await?;
        batch.save().await?;

        let notion = self.notion.clone();
        let pushed = quote.clone();
        self.spawn_push("create quote", async move {
            notion
                .create_page(
                    &pushed.text,
                    remote_author_name(pushed.author_name.as_deref()),
                    &pushed.category_name,
                )
                .await
                .map(|page| tracing::debug!(page_id = %page.id, "created remote page"))
        })
        .await;

        Ok(quote)
    }

    /// changes the text and, when `author` is given, the author of a quote.
    ///
    /// the author is looked up by exact name and only created when missing. the remote
    /// page is found by searching for the old text; the first hit is rewritten.
    #[tracing::instrument(skip(self, text))]
    pub async fn edit_quote(
        &self,
        quote_id: i64,
        text: &str,
        author: Option<&str>,
    ) -> Result<Quote, SyncError> {
        require_text("quote", text)?;
        if let Some(author) = author {
            require_text("author name", author)?;
        }

        let old = self.require_quote(quote_id).await?;

        let mut batch = self.store.begin().await?;
        batch.set_quote_text(quote_id, text).await?;
        if let Some(name) = author {
            let author = find_or_create_author(&mut batch, name).await?;
            batch.set_quote_author(quote_id, Some(author.id)).await?;
        }
        let quote = batch.quote(quote_id).await?.ok_or(SyncError::NotFound {
            entity: "quote",
            id: quote_id,
        })?;
        batch.save().await?;

        self.push_first_match_update(old.text, quote.clone()).await;

        Ok(quote)
    }

    /// files a quote under another category; the quote itself is never recreated.
    #[tracing::instrument(skip(self))]
    pub async fn move_quote(&self, quote_id: i64, category_id: i64) -> Result<Quote, SyncError> {
        let old = self.require_quote(quote_id).await?;
        self.require_category(category_id).await?;

        let mut batch = self.store.begin().await?;
        batch.move_quote(quote_id, category_id).await?;
        let quote = batch.quote(quote_id).await?.ok_or(SyncError::NotFound {
            entity: "quote",
            id: quote_id,
        })?;
        batch.save().await?;

        self.push_first_match_update(old.text, quote.clone()).await;

        Ok(quote)
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_quote(&self, quote_id: i64) -> Result<(), SyncError> {
        let quote = self.require_quote(quote_id).await?;

        let mut batch = self.store.begin().await?;
        batch.delete_quote(quote_id).await?;
        batch.save().await?;

        let notion = self.notion.clone();
        self.spawn_push("delete quote", async move {
            let pages = notion
                .query(Some(&QueryFilter::QuoteContains(quote.text)))
                .await?;

            match pages.first() {
                Some(page) => notion.delete_block(&page.id).await.map(|_| ()),
                None => {
                    tracing::warn!(quote_id, "no remote page matched the deleted quote");
                    Ok(())
                }
            }
        })
        .await;

        Ok(())
    }

    /// authors are local only; they reach the remote side through their quotes.
    #[tracing::instrument(skip(self))]
    pub async fn create_author(&self, name: &str) -> Result<Author, SyncError> {
        require_text("author name", name)?;

        let mut batch = self.store.begin().await?;
        let author = find_or_create_author(&mut batch, name).await?;
        batch.save().await?;

        Ok(author)
    }

    /// renaming onto a name another author already has merges the two: the quotes
    /// move to the existing author and the renamed row is dropped.
    #[tracing::instrument(skip(self))]
    pub async fn rename_author(&self, id: i64, name: &str) -> Result<Author, SyncError> {
        require_text("author name", name)?;
        let old = self.require_author(id).await?;

        let mut batch = self.store.begin().await?;
        let kept_id = match batch.author_by_name(name).await? {
            Some(existing) if existing.id != id => {
                let moved = batch.reassign_author_quotes(id, existing.id).await?;
                batch.delete_author(id).await?;
                tracing::info!(from = id, into = existing.id, moved, "merged renamed author into the existing one");
                existing.id
            }
            _ => {
                batch.rename_author(id, name).await?;
                id
            }
        };
        batch.save().await?;

        if let Some(old_name) = old.name.filter(|old_name| old_name != name) {
            let notion = self.notion.clone();
            let new_name = name.to_owned();
            self.spawn_push("rename author", async move {
                rename_author_pages(&notion, &old_name, &new_name).await
            })
            .await;
        }

        self.require_author(kept_id).await
    }

    /// removes the author together with every quote attributed to them, here and remotely.
    ///
    /// the remote side matches by name, so every local author row sharing that name
    /// goes too. returns how many local quotes were removed.
    #[tracing::instrument(skip(self))]
    pub async fn delete_author(&self, id: i64) -> Result<u64, SyncError> {
        let author = self.require_author(id).await?;

        let mut batch = self.store.begin().await?;
        let removed = match author.name.as_deref() {
            Some(name) => batch.delete_authors_named(name).await?,
            None => {
                let removed = batch.delete_quotes_by_author(id).await?;
                batch.delete_author(id).await?;
                removed
            }
        };
        batch.save().await?;

        tracing::info!(author_id = id, removed, "deleted author and their quotes");

        match author.name {
            Some(name) => {
                let notion = self.notion.clone();
                self.spawn_push("delete author", async move {
                    delete_all_matches(&notion, &QueryFilter::AuthorContains(name)).await
                })
                .await;
            }
            None => tracing::warn!(author_id = id, "author has no name, nothing to match remotely"),
        }

        Ok(removed)
    }

    /// waits until every push spawned so far has finished.
    pub async fn wait_for_pushes(&self) {
        loop {
            let mut pending = std::mem::take(&mut *self.pushes.lock().await);

            if pending.is_empty() {
                return;
            }

            while let Some(result) = pending.join_next().await {
                if let Err(e) = result {
                    tracing::error!(err = ?e, "a push task panicked or was cancelled");
                }
            }
        }
    }

    async fn push_first_match_update(&self, old_text: String, quote: Quote) {
        let notion = self.notion.clone();

        self.spawn_push("update quote", async move {
            let pages = notion
                .query(Some(&QueryFilter::QuoteContains(old_text)))
                .await?;

            let Some(page) = pages.first() else {
                tracing::warn!(quote_id = quote.id, "no remote page matched the old quote text");
                return Ok(());
            };

            notion
                .update_page(
                    &page.id,
                    &quote.text,
                    remote_author_name(quote.author_name.as_deref()),
                    &quote.category_name,
                )
                .await
                .map(|_| ())
        })
        .await;
    }

    async fn spawn_push<F>(&self, action: &'static str, push: F)
    where
        F: Future<Output = Result<(), NotionError>> + Send + 'static,
    {
        let span = tracing::info_span!("push", action);

        self.pushes.lock().await.spawn(
            async move {
                match push.await {
                    Ok(()) => tracing::info!("pushed local change to notion"),
                    Err(e) => {
                        tracing::error!(err = ?e, "an error occurred when pushing local change to notion")
                    }
                }
            }
            .instrument(span),
        );
    }

    async fn require_category(&self, id: i64) -> Result<Category, SyncError> {
        self.store
            .category(id)
            .await?
            .ok_or(SyncError::NotFound {
                entity: "category",
                id,
            })
    }

    async fn require_author(&self, id: i64) -> Result<Author, SyncError> {
        self.store
            .author(id)
            .await?
            .ok_or(SyncError::NotFound {
                entity: "author",
                id,
            })
    }

    async fn require_quote(&self, id: i64) -> Result<Quote, SyncError> {
        self.store
            .quote(id)
            .await?
            .ok_or(SyncError::NotFound { entity: "quote", id })
    }
}

fn require_text(what: &'static str, value: &str) -> Result<(), SyncError> {
    if value.trim().is_empty() {
        return Err(SyncError::EmptyInput(what));
    }

    Ok(())
}

/// deletes every page the filter matches; one failed delete does not stop the rest.
async fn delete_all_matches(notion: &NotionClient, filter: &QueryFilter) -> Result<(), NotionError> {
    let pages = notion.query(Some(filter)).await?;
    let mut first_err = None;

    for page in &pages {
        match notion.delete_block(&page.id).await {
            Ok(block) => {
                tracing::debug!(page_id = %block.id, archived = block.archived, "deleted remote page")
            }
            Err(e) => {
                tracing::error!(err = ?e, page_id = %page.id, "an error occurred when deleting remote page");
                first_err.get_or_insert(e);
            }
        }
    }

    tracing::info!(filter = ?filter, matched = pages.len(), "deleted matching remote pages");

    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

async fn rename_author_pages(
    notion: &NotionClient,
    old_name: &str,
    new_name: &str,
) -> Result<(), NotionError> {
    let pages = notion
        .query(Some(&QueryFilter::AuthorContains(old_name.to_owned())))
        .await?;
    let mut first_err = None;

    for page in pages {
        let page_id = page.id.clone();

        let result = match page.into_record() {
            Ok(record) => notion
                .update_page(&record.page_id, &record.text, new_name, &record.category)
                .await
                .map(|_| ()),
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            tracing::error!(err = ?e, page_id = %page_id, "an error occurred when renaming author on remote page");
            first_err.get_or_insert(e);
        }
    }

    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

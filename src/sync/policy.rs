use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::constants::notion::NO_AUTHOR;
use crate::models::quotes::{Author, Quote};
use crate::notion::RemoteQuote;
use crate::store::Batch;

/// how a full refresh turns remote records into local rows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IngestMode {
    /// reuse authors and categories that share an exact name.
    #[default]
    FindOrCreate,
    /// a fresh author and category row for every record, duplicates included.
    RowPerRecord,
}

impl FromStr for IngestMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "find-or-create" => Ok(IngestMode::FindOrCreate),
            "row-per-record" => Ok(IngestMode::RowPerRecord),
            other => Err(anyhow::anyhow!(
                "unknown ingest mode \"{other}\", expected \"find-or-create\" or \"row-per-record\""
            )),
        }
    }
}

impl fmt::Display for IngestMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestMode::FindOrCreate => f.write_str("find-or-create"),
            IngestMode::RowPerRecord => f.write_str("row-per-record"),
        }
    }
}

/// the author name a remote page carries for a local author.
pub fn remote_author_name(name: Option<&str>) -> &str {
    name.unwrap_or(NO_AUTHOR)
}

/// exact, case-sensitive lookup; creates the author when nobody has that name yet.
pub async fn find_or_create_author(batch: &mut Batch, name: &str) -> Result<Author, sqlx::Error> {
    if let Some(author) = batch.author_by_name(name).await? {
        return Ok(author);
    }

    tracing::debug!(name = %name, "no author with this name yet, creating one");
    batch.create_author(Some(name)).await
}

/// relates remote records to local rows during a full refresh.
///
/// the local tables are empty when ingestion starts, so names seen earlier in the
/// same refresh are the only candidates for reuse.
pub struct Ingestor {
    mode: IngestMode,
    authors: HashMap<String, i64>,
    categories: HashMap<String, i64>,
}

impl Ingestor {
    pub fn new(mode: IngestMode) -> Self {
        Ingestor {
            mode,
            authors: HashMap::new(),
            categories: HashMap::new(),
        }
    }

    pub async fn ingest(
        &mut self,
        batch: &mut Batch,
        record: &RemoteQuote,
    ) -> Result<Quote, sqlx::Error> {
        let (category_id, author_id) = match self.mode {
            IngestMode::RowPerRecord => {
                let category = batch.create_category(&record.category).await?;
                let author = batch.create_author(record.author.as_deref()).await?;

                (category.id, Some(author.id))
            }
            IngestMode::FindOrCreate => {
                let category_id = match self.categories.get(&record.category) {
                    Some(id) => *id,
                    None => {
                        let category = batch.create_category(&record.category).await?;
                        self.categories.insert(category.name, category.id);
                        category.id
                    }
                };

                let author_id = match record.author.as_deref() {
                    None => None,
                    Some(name) => match self.authors.get(name) {
                        Some(id) => Some(*id),
                        None => {
                            let author = batch.create_author(Some(name)).await?;
                            self.authors.insert(name.to_owned(), author.id);
                            Some(author.id)
                        }
                    },
                };

                (category_id, author_id)
            }
        };

        tracing::debug!(page_id = %record.page_id, category_id, author_id = ?author_id, "ingesting remote quote");
        batch.create_quote(&record.text, category_id, author_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    fn record(page_id: &str, text: &str, author: Option<&str>, category: &str) -> RemoteQuote {
        RemoteQuote {
            page_id: page_id.into(),
            text: text.into(),
            author: author.map(str::to_owned),
            category: category.into(),
        }
    }

    fn records() -> Vec<RemoteQuote> {
        vec![
            record("p1", "The obstacle is the way", Some("Marcus"), "Stoic"),
            record("p2", "Waste no more time", Some("Marcus"), "Stoic"),
            record("p3", "I am so clever", None, "Humor"),
        ]
    }

    #[tokio::test]
    async fn find_or_create_reuses_names() {
        let store = Store::in_memory().await;
        let mut batch = store.begin().await.unwrap();
        let mut ingestor = Ingestor::new(IngestMode::FindOrCreate);

        for record in records() {
            ingestor.ingest(&mut batch, &record).await.unwrap();
        }
        batch.save().await.unwrap();

        let counts = store.counts().await.unwrap();
        assert_eq!(counts.quotes, 3);
        assert_eq!(counts.categories, 2);
        assert_eq!(counts.authors, 1);
    }

    #[tokio::test]
    async fn row_per_record_duplicates_names() {
        let store = Store::in_memory().await;
        let mut batch = store.begin().await.unwrap();
        let mut ingestor = Ingestor::new(IngestMode::RowPerRecord);

        for record in records() {
            ingestor.ingest(&mut batch, &record).await.unwrap();
        }
        batch.save().await.unwrap();

        let counts = store.counts().await.unwrap();
        assert_eq!(counts.quotes, 3);
        assert_eq!(counts.categories, 3);
        assert_eq!(counts.authors, 3);
    }

    #[tokio::test]
    async fn author_lookup_is_exact() {
        let store = Store::in_memory().await;
        let mut batch = store.begin().await.unwrap();

        let marcus = find_or_create_author(&mut batch, "Marcus").await.unwrap();
        let again = find_or_create_author(&mut batch, "Marcus").await.unwrap();
        let lower = find_or_create_author(&mut batch, "marcus").await.unwrap();
        let padded = find_or_create_author(&mut batch, "Marcus ").await.unwrap();
        batch.save().await.unwrap();

        assert_eq!(marcus.id, again.id);
        assert_ne!(marcus.id, lower.id);
        assert_ne!(marcus.id, padded.id);
        assert_eq!(store.counts().await.unwrap().authors, 3);
    }

    #[test]
    fn ingest_mode_parses() {
        assert_eq!("find-or-create".parse::<IngestMode>().unwrap(), IngestMode::FindOrCreate);
        assert_eq!("row-per-record".parse::<IngestMode>().unwrap(), IngestMode::RowPerRecord);
        assert!("sometimes".parse::<IngestMode>().is_err());
        assert_eq!(remote_author_name(None), "No Author");
        assert_eq!(remote_author_name(Some("Seneca")), "Seneca");
    }
}

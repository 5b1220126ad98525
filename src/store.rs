use std::str::FromStr;

use sqlx::{
    migrate::Migrator,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Pool, Sqlite, SqliteExecutor, Transaction,
};
use time::OffsetDateTime;

use crate::models::quotes::{Author, Category, Counts, Quote};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const QUOTE_SELECT: &str = r#"
    SELECT
        q.id,
        q.text,
        q.author_id,
        a.name AS author_name,
        q.category_id,
        c.name AS category_name
    FROM quotes q
    JOIN categories c ON c.id = q.category_id
    LEFT JOIN authors a ON a.id = q.author_id
"#;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CategorySort {
    /// newest first, for the category list.
    #[default]
    CreatedDesc,
    /// alphabetical, for pickers.
    NameAsc,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum QuoteFilter {
    #[default]
    All,
    InCategory(i64),
    ByAuthor(i64),
    /// case-sensitive substring match on the quote text.
    TextContains(String),
}

/// local cache of categories, authors and quotes.
///
/// reads go straight to the pool. every mutation goes through a [`Batch`], which
/// persists nothing until [`Batch::save`] succeeds.
#[derive(Clone, Debug)]
pub struct Store {
    db: Pool<Sqlite>,
}

impl Store {
    pub async fn connect(db_url: &str) -> anyhow::Result<Self> {
        let opts = SqliteConnectOptions::from_str(db_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);

        let db = SqlitePoolOptions::new()
            .max_connections(20)
            .connect_with(opts)
            .await?;

        let store = Store { db };
        store.migrate().await?;

        Ok(store)
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        tracing::info!("running migrations...");
        MIGRATOR.run(&self.db).await?;
        tracing::info!("finished running migrations!");

        Ok(())
    }

    pub async fn begin(&self) -> Result<Batch, sqlx::Error> {
        let tx = self.db.begin().await.inspect_err(
            |e| tracing::error!(err = ?e, "an error occurred when starting a transaction"),
        )?;

        Ok(Batch { tx })
    }

    pub async fn categories(&self, sort: CategorySort) -> Result<Vec<Category>, sqlx::Error> {
        fetch_categories(&self.db, sort).await
    }

    pub async fn category(&self, id: i64) -> Result<Option<Category>, sqlx::Error> {
        fetch_category(&self.db, id).await
    }

    pub async fn authors(&self) -> Result<Vec<Author>, sqlx::Error> {
        sqlx::query_as::<_, Author>("SELECT id, name FROM authors ORDER BY name, id;")
            .fetch_all(&self.db)
            .await
            .inspect_err(
                |e| tracing::error!(err = ?e, "an error occurred when fetching authors from db"),
            )
    }

    pub async fn author(&self, id: i64) -> Result<Option<Author>, sqlx::Error> {
        fetch_author(&self.db, id).await
    }

    pub async fn quotes(&self, filter: &QuoteFilter) -> Result<Vec<Quote>, sqlx::Error> {
        fetch_quotes(&self.db, filter).await
    }

    pub async fn quote(&self, id: i64) -> Result<Option<Quote>, sqlx::Error> {
        fetch_quote(&self.db, id).await
    }

    pub async fn counts(&self) -> Result<Counts, sqlx::Error> {
        let (quotes, authors, categories) = sqlx::query_as::<_, (i64, i64, i64)>(
            r#"
                SELECT
                    (SELECT COUNT(*) FROM quotes),
                    (SELECT COUNT(*) FROM authors),
                    (SELECT COUNT(*) FROM categories);
            "#,
        )
        .fetch_one(&self.db)
        .await
        .inspect_err(|e| tracing::error!(err = ?e, "an error occurred when counting rows"))?;

        Ok(Counts {
            quotes,
            authors,
            categories,
        })
    }
}

/// a set of pending mutations; dropping it without [`Batch::save`] discards them.
pub struct Batch {
    tx: Transaction<'static, Sqlite>,
}

impl Batch {
    pub async fn save(self) -> Result<(), sqlx::Error> {
        self.tx
            .commit()
            .await
            .inspect_err(|e| tracing::error!(err = ?e, "an error occurred when committing to db"))
    }

    pub async fn create_category(&mut self, name: &str) -> Result<Category, sqlx::Error> {
        sqlx::query_as::<_, Category>(
            r#"
                INSERT INTO
                    categories (name, created_at)
                VALUES
                    ($1, $2)
                RETURNING id, name, created_at;
            "#,
        )
        .bind(name)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(&mut *self.tx)
        .await
        .inspect_err(|e| {
            tracing::error!(err = ?e, name = %name, "an error occurred when adding category")
        })
    }

    pub async fn rename_category(&mut self, id: i64, name: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE categories SET name = $1 WHERE id = $2;")
            .bind(name)
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .inspect_err(|e| {
                tracing::error!(err = ?e, id, name = %name, "an error occurred when renaming category")
            })?;

        Ok(result.rows_affected())
    }

    /// quotes in the category go with it.
    pub async fn delete_category(&mut self, id: i64) -> Result<u64, sqlx::Error> {
        sqlx::query("DELETE FROM quotes WHERE category_id = $1;")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .inspect_err(|e| {
                tracing::error!(err = ?e, id, "an error occurred when deleting quotes of category")
            })?;

        let result = sqlx::query("DELETE FROM categories WHERE id = $1;")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .inspect_err(
                |e| tracing::error!(err = ?e, id, "an error occurred when deleting category"),
            )?;

        Ok(result.rows_affected())
    }

    pub async fn create_author(&mut self, name: Option<&str>) -> Result<Author, sqlx::Error> {
        sqlx::query_as::<_, Author>(
            r#"
                INSERT INTO
                    authors (name)
                VALUES
                    ($1)
                RETURNING id, name;
            "#,
        )
        .bind(name)
        .fetch_one(&mut *self.tx)
        .await
        .inspect_err(|e| {
            tracing::error!(err = ?e, name = ?name, "an error occurred when adding author")
        })
    }

    pub async fn author_by_name(&mut self, name: &str) -> Result<Option<Author>, sqlx::Error> {
        fetch_author_by_name(&mut *self.tx, name).await
    }

    pub async fn rename_author(&mut self, id: i64, name: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE authors SET name = $1 WHERE id = $2;")
            .bind(name)
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .inspect_err(|e| {
                tracing::error!(err = ?e, id, name = %name, "an error occurred when renaming author")
            })?;

        Ok(result.rows_affected())
    }

    pub async fn delete_author(&mut self, id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM authors WHERE id = $1;")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .inspect_err(
                |e| tracing::error!(err = ?e, id, "an error occurred when deleting author"),
            )?;

        Ok(result.rows_affected())
    }

    pub async fn create_quote(
        &mut self,
        text: &str,
        category_id: i64,
        author_id: Option<i64>,
    ) -> Result<Quote, sqlx::Error> {
        let (id,) = sqlx::query_as::<_, (i64,)>(
            r#"
                INSERT INTO
                    quotes (text, author_id, category_id)
                VALUES
                    ($1, $2, $3)
                RETURNING id;
            "#,
        )
        .bind(text)
        .bind(author_id)
        .bind(category_id)
        .fetch_one(&mut *self.tx)
        .await
        .inspect_err(|e| {
            tracing::error!(err = ?e, category_id, "an error occurred when adding quote")
        })?;

        fetch_quote(&mut *self.tx, id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn quote(&mut self, id: i64) -> Result<Option<Quote>, sqlx::Error> {
        fetch_quote(&mut *self.tx, id).await
    }

    pub async fn set_quote_text(&mut self, id: i64, text: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE quotes SET text = $1 WHERE id = $2;")
            .bind(text)
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .inspect_err(
                |e| tracing::error!(err = ?e, id, "an error occurred when updating quote text"),
            )?;

        Ok(result.rows_affected())
    }

    pub async fn set_quote_author(
        &mut self,
        id: i64,
        author_id: Option<i64>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE quotes SET author_id = $1 WHERE id = $2;")
            .bind(author_id)
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .inspect_err(|e| {
                tracing::error!(err = ?e, id, author_id = ?author_id, "an error occurred when updating quote author")
            })?;

        Ok(result.rows_affected())
    }

    pub async fn move_quote(&mut self, id: i64, category_id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE quotes SET category_id = $1 WHERE id = $2;")
            .bind(category_id)
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .inspect_err(|e| {
                tracing::error!(err = ?e, id, category_id, "an error occurred when moving quote")
            })?;

        Ok(result.rows_affected())
    }

    pub async fn delete_quote(&mut self, id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM quotes WHERE id = $1;")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .inspect_err(|e| tracing::error!(err = ?e, id, "an error occurred when deleting quote"))?;

        Ok(result.rows_affected())
    }

    pub async fn delete_quotes_by_author(&mut self, author_id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM quotes WHERE author_id = $1;")
            .bind(author_id)
            .execute(&mut *self.tx)
            .await
            .inspect_err(|e| {
                tracing::error!(err = ?e, author_id, "an error occurred when deleting quotes of author")
            })?;

        Ok(result.rows_affected())
    }

    /// deletes every author with exactly this name and all of their quotes.
    pub async fn delete_authors_named(&mut self, name: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
                DELETE FROM quotes
                WHERE author_id IN (SELECT id FROM authors WHERE name = $1);
            "#,
        )
        .bind(name)
        .execute(&mut *self.tx)
        .await
        .inspect_err(|e| {
            tracing::error!(err = ?e, name = %name, "an error occurred when deleting quotes of authors")
        })?;

        sqlx::query("DELETE FROM authors WHERE name = $1;")
            .bind(name)
            .execute(&mut *self.tx)
            .await
            .inspect_err(|e| {
                tracing::error!(err = ?e, name = %name, "an error occurred when deleting authors")
            })?;

        Ok(result.rows_affected())
    }

    pub async fn reassign_author_quotes(&mut self, from: i64, to: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE quotes SET author_id = $1 WHERE author_id = $2;")
            .bind(to)
            .bind(from)
            .execute(&mut *self.tx)
            .await
            .inspect_err(|e| {
                tracing::error!(err = ?e, from, to, "an error occurred when reassigning quotes")
            })?;

        Ok(result.rows_affected())
    }

    pub async fn delete_all(&mut self) -> Result<(), sqlx::Error> {
        for table in ["quotes", "authors", "categories"] {
            sqlx::query(&format!("DELETE FROM {table};"))
                .execute(&mut *self.tx)
                .await
                .inspect_err(
                    |e| tracing::error!(err = ?e, table, "an error occurred when wiping table"),
                )?;
        }

        Ok(())
    }
}

async fn fetch_categories<'e>(
    db: impl SqliteExecutor<'e>,
    sort: CategorySort,
) -> Result<Vec<Category>, sqlx::Error> {
    let sql = match sort {
        CategorySort::CreatedDesc => {
            "SELECT id, name, created_at FROM categories ORDER BY created_at DESC, id DESC;"
        }
        CategorySort::NameAsc => "SELECT id, name, created_at FROM categories ORDER BY name, id;",
    };

    sqlx::query_as::<_, Category>(sql)
        .fetch_all(db)
        .await
        .inspect_err(
            |e| tracing::error!(err = ?e, "an error occurred when fetching categories from db"),
        )
}

async fn fetch_category<'e>(
    db: impl SqliteExecutor<'e>,
    id: i64,
) -> Result<Option<Category>, sqlx::Error> {
    sqlx::query_as::<_, Category>("SELECT id, name, created_at FROM categories WHERE id = $1;")
        .bind(id)
        .fetch_optional(db)
        .await
        .inspect_err(|e| tracing::error!(err = ?e, id, "an error occurred when fetching category"))
}

async fn fetch_author<'e>(
    db: impl SqliteExecutor<'e>,
    id: i64,
) -> Result<Option<Author>, sqlx::Error> {
    sqlx::query_as::<_, Author>("SELECT id, name FROM authors WHERE id = $1;")
        .bind(id)
        .fetch_optional(db)
        .await
        .inspect_err(|e| tracing::error!(err = ?e, id, "an error occurred when fetching author"))
}

async fn fetch_author_by_name<'e>(
    db: impl SqliteExecutor<'e>,
    name: &str,
) -> Result<Option<Author>, sqlx::Error> {
    sqlx::query_as::<_, Author>("SELECT id, name FROM authors WHERE name = $1 ORDER BY id LIMIT 1;")
        .bind(name)
        .fetch_optional(db)
        .await
        .inspect_err(|e| {
            tracing::error!(err = ?e, name = %name, "an error occurred when fetching author by name")
        })
}

async fn fetch_quote<'e>(db: impl SqliteExecutor<'e>, id: i64) -> Result<Option<Quote>, sqlx::Error> {
    sqlx::query_as::<_, Quote>(&format!("{QUOTE_SELECT} WHERE q.id = $1;"))
        .bind(id)
        .fetch_optional(db)
        .await
        .inspect_err(|e| tracing::error!(err = ?e, id, "an error occurred when fetching quote"))
}

async fn fetch_quotes<'e>(
    db: impl SqliteExecutor<'e>,
    filter: &QuoteFilter,
) -> Result<Vec<Quote>, sqlx::Error> {
    let sql = match filter {
        QuoteFilter::All => format!("{QUOTE_SELECT} ORDER BY q.id;"),
        QuoteFilter::InCategory(_) => format!("{QUOTE_SELECT} WHERE q.category_id = $1 ORDER BY q.id;"),
        QuoteFilter::ByAuthor(_) => format!("{QUOTE_SELECT} WHERE q.author_id = $1 ORDER BY q.id;"),
        QuoteFilter::TextContains(_) => {
            format!("{QUOTE_SELECT} WHERE instr(q.text, $1) > 0 ORDER BY q.id;")
        }
    };

    let query = sqlx::query_as::<_, Quote>(&sql);
    let query = match filter {
        QuoteFilter::All => query,
        QuoteFilter::InCategory(id) | QuoteFilter::ByAuthor(id) => query.bind(*id),
        QuoteFilter::TextContains(text) => query.bind(text.as_str()),
    };

    query.fetch_all(db).await.inspect_err(
        |e| tracing::error!(err = ?e, filter = ?filter, "an error occurred when fetching quotes from db"),
    )
}

#[cfg(test)]
impl Store {
    /// a private in-memory database; one connection so every query sees the same data.
    pub(crate) async fn in_memory() -> Self {
        let opts = SqliteConnectOptions::new()
            .in_memory(true)
            .foreign_keys(true);

        let db = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await
            .expect("in-memory database");

        let store = Store { db };
        store.migrate().await.expect("migrations");

        store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> (Store, Category, Category, Author) {
        let store = Store::in_memory().await;
        let mut batch = store.begin().await.unwrap();
        let stoic = batch.create_category("Stoic").await.unwrap();
        let humor = batch.create_category("Humor").await.unwrap();
        let marcus = batch.create_author(Some("Marcus")).await.unwrap();
        batch.save().await.unwrap();

        (store, stoic, humor, marcus)
    }

    #[tokio::test]
    async fn quotes_resolve_author_and_category() {
        let (store, stoic, _, marcus) = seeded().await;

        let mut batch = store.begin().await.unwrap();
        let quote = batch
            .create_quote("The obstacle is the way", stoic.id, Some(marcus.id))
            .await
            .unwrap();
        let orphan = batch.create_quote("Carpe diem", stoic.id, None).await.unwrap();
        batch.save().await.unwrap();

        assert_eq!(quote.category_name, "Stoic");
        assert_eq!(quote.author_name.as_deref(), Some("Marcus"));
        assert_eq!(orphan.author_id, None);
        assert_eq!(orphan.author_name, None);

        let by_author = store.quotes(&QuoteFilter::ByAuthor(marcus.id)).await.unwrap();
        assert_eq!(by_author, vec![quote]);
    }

    #[tokio::test]
    async fn dropped_batch_persists_nothing() {
        let (store, stoic, _, _) = seeded().await;

        {
            let mut batch = store.begin().await.unwrap();
            batch.create_quote("lost", stoic.id, None).await.unwrap();
            batch.create_category("lost too").await.unwrap();
        }

        let counts = store.counts().await.unwrap();
        assert_eq!(counts.quotes, 0);
        assert_eq!(counts.categories, 2);
    }

    #[tokio::test]
    async fn failed_write_rolls_back_the_batch() {
        let (store, stoic, _, _) = seeded().await;

        let mut batch = store.begin().await.unwrap();
        batch.create_quote("kept?", stoic.id, None).await.unwrap();
        let err = batch.create_quote("dangling", 9_999, None).await;
        assert!(err.is_err());
        drop(batch);

        assert_eq!(store.counts().await.unwrap().quotes, 0);
    }

    #[tokio::test]
    async fn categories_sort_by_creation_or_name() {
        let (store, stoic, humor, _) = seeded().await;

        let newest_first = store.categories(CategorySort::CreatedDesc).await.unwrap();
        assert_eq!(
            newest_first.iter().map(|c| c.id).collect::<Vec<_>>(),
            vec![humor.id, stoic.id]
        );

        let by_name = store.categories(CategorySort::NameAsc).await.unwrap();
        assert_eq!(
            by_name.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            vec!["Humor", "Stoic"]
        );
    }

    #[tokio::test]
    async fn text_filter_is_case_sensitive() {
        let (store, stoic, _, _) = seeded().await;

        let mut batch = store.begin().await.unwrap();
        batch.create_quote("Carpe diem", stoic.id, None).await.unwrap();
        batch.save().await.unwrap();

        let hits = store
            .quotes(&QuoteFilter::TextContains("diem".into()))
            .await
            .unwrap();
        let misses = store
            .quotes(&QuoteFilter::TextContains("DIEM".into()))
            .await
            .unwrap();

        assert_eq!(hits.len(), 1);
        assert!(misses.is_empty());
    }

    #[tokio::test]
    async fn deleting_category_takes_its_quotes() {
        let (store, stoic, humor, _) = seeded().await;

        let mut batch = store.begin().await.unwrap();
        batch.create_quote("a", stoic.id, None).await.unwrap();
        batch.create_quote("b", humor.id, None).await.unwrap();
        assert_eq!(batch.delete_category(stoic.id).await.unwrap(), 1);
        batch.save().await.unwrap();

        let remaining = store.quotes(&QuoteFilter::All).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].category_id, humor.id);
    }

    #[tokio::test]
    async fn move_and_edit_keep_identity() {
        let (store, stoic, humor, marcus) = seeded().await;

        let mut batch = store.begin().await.unwrap();
        let quote = batch.create_quote("a", stoic.id, None).await.unwrap();
        batch.move_quote(quote.id, humor.id).await.unwrap();
        batch.set_quote_text(quote.id, "b").await.unwrap();
        batch.set_quote_author(quote.id, Some(marcus.id)).await.unwrap();
        batch.save().await.unwrap();

        let quote = store.quote(quote.id).await.unwrap().unwrap();
        assert_eq!(quote.text, "b");
        assert_eq!(quote.category_name, "Humor");
        assert_eq!(quote.author_id, Some(marcus.id));
    }

    #[tokio::test]
    async fn delete_all_wipes_everything() {
        let (store, stoic, _, marcus) = seeded().await;

        let mut batch = store.begin().await.unwrap();
        batch.create_quote("a", stoic.id, Some(marcus.id)).await.unwrap();
        batch.delete_all().await.unwrap();
        batch.save().await.unwrap();

        assert_eq!(store.counts().await.unwrap(), Counts::default());
    }
}

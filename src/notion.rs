use reqwest::header::{HeaderMap, HeaderValue, InvalidHeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use crate::constants::notion::{
    AUTHOR_PROPERTY, CATEGORY_PROPERTY, NOTION_API_BASE, NOTION_VERSION, NO_AUTHOR, PAGE_SIZE,
    QUOTE_PROPERTY,
};
use crate::models::notion::{
    Block, Contains, FilterBody, Page, PageRequest, Parent, PropertiesRequest, QueryRequest,
    QueryResponse,
};

#[derive(Debug, thiserror::Error)]
pub enum NotionError {
    #[error("could not reach notion: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("notion responded with {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("could not parse notion response: {source}")]
    Malformed {
        #[source]
        source: serde_json::Error,
        body: String,
    },

    #[error("page {page_id} has no usable {property} property")]
    MissingProperty {
        page_id: String,
        property: &'static str,
    },

    #[error("invalid notion credentials: {0}")]
    InvalidCredentials(#[from] InvalidHeaderValue),
}

#[derive(Clone, Debug)]
pub struct NotionConfig {
    pub token: String,
    pub database_id: String,
    pub api_base: String,
    pub version: String,
}

impl NotionConfig {
    pub fn new(token: impl Into<String>, database_id: impl Into<String>) -> Self {
        NotionConfig {
            token: token.into(),
            database_id: database_id.into(),
            api_base: NOTION_API_BASE.to_owned(),
            version: NOTION_VERSION.to_owned(),
        }
    }
}

/// remote filters understood by [`NotionClient::query`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryFilter {
    QuoteContains(String),
    AuthorContains(String),
    CategoryContains(String),
}

impl QueryFilter {
    fn body(&self) -> FilterBody<'_> {
        match self {
            QueryFilter::QuoteContains(text) => FilterBody {
                property: QUOTE_PROPERTY,
                rich_text: Some(Contains { contains: text }),
                multi_select: None,
            },
            QueryFilter::AuthorContains(name) => FilterBody {
                property: AUTHOR_PROPERTY,
                rich_text: None,
                multi_select: Some(Contains { contains: name }),
            },
            QueryFilter::CategoryContains(name) => FilterBody {
                property: CATEGORY_PROPERTY,
                rich_text: None,
                multi_select: Some(Contains { contains: name }),
            },
        }
    }
}

/// one remote page reduced to the fields the local model cares about.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteQuote {
    pub page_id: String,
    pub text: String,
    pub author: Option<String>,
    pub category: String,
}

impl Page {
    pub fn quote_text(&self) -> Option<String> {
        let title = &self.properties.quote.as_ref()?.title;

        if title.is_empty() {
            return None;
        }

        Some(title.iter().map(|fragment| fragment.content()).collect())
    }

    pub fn author_name(&self) -> Option<&str> {
        self.properties
            .author
            .as_ref()?
            .multi_select
            .first()
            .map(|option| option.name.as_str())
    }

    pub fn category_name(&self) -> Option<&str> {
        self.properties
            .category
            .as_ref()?
            .multi_select
            .first()
            .map(|option| option.name.as_str())
    }

    pub fn into_record(self) -> Result<RemoteQuote, NotionError> {
        let text = self.quote_text().ok_or_else(|| NotionError::MissingProperty {
            page_id: self.id.clone(),
            property: QUOTE_PROPERTY,
        })?;

        let category = self
            .category_name()
            .ok_or_else(|| NotionError::MissingProperty {
                page_id: self.id.clone(),
                property: CATEGORY_PROPERTY,
            })?
            .to_owned();

        let author = self
            .author_name()
            .filter(|name| *name != NO_AUTHOR)
            .map(str::to_owned);

        Ok(RemoteQuote {
            page_id: self.id,
            text,
            author,
            category,
        })
    }
}

#[derive(Clone, Debug)]
pub struct NotionClient {
    client: reqwest::Client,
    api_base: String,
    database_id: String,
}

impl NotionClient {
    pub fn new(config: &NotionConfig) -> Result<Self, NotionError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("Notion-Version", HeaderValue::from_str(&config.version)?);

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.token))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(NotionClient {
            client,
            api_base: config.api_base.trim_end_matches('/').to_owned(),
            database_id: config.database_id.clone(),
        })
    }

    pub fn database_id(&self) -> &str {
        &self.database_id
    }

    #[tracing::instrument(skip(self))]
    pub async fn query(&self, filter: Option<&QueryFilter>) -> Result<Vec<Page>, NotionError> {
        let body = QueryRequest {
            page_size: PAGE_SIZE,
            filter: filter.map(QueryFilter::body),
        };

        let response: QueryResponse = self
            .send(
                self.client
                    .post(format!(
                        "{}/databases/{}/query",
                        self.api_base, self.database_id
                    ))
                    .json(&body),
            )
            .await?;

        if response.has_more {
            tracing::warn!(
                page_size = PAGE_SIZE,
                "notion has more pages than a single query returns, the rest are ignored"
            );
        }

        Ok(response.results)
    }

    #[tracing::instrument(skip(self))]
    pub async fn create_page(
        &self,
        quote: &str,
        author: &str,
        category: &str,
    ) -> Result<Page, NotionError> {
        let body = PageRequest {
            parent: Some(Parent {
                kind: "database_id",
                database_id: &self.database_id,
            }),
            properties: PropertiesRequest::new(quote, author, category),
        };

        self.send(
            self.client
                .post(format!("{}/pages", self.api_base))
                .json(&body),
        )
        .await
    }

    /// rewrites all three properties of a page, even the unchanged ones.
    #[tracing::instrument(skip(self))]
    pub async fn update_page(
        &self,
        page_id: &str,
        quote: &str,
        author: &str,
        category: &str,
    ) -> Result<Page, NotionError> {
        let body = PageRequest {
            parent: None,
            properties: PropertiesRequest::new(quote, author, category),
        };

        self.send(
            self.client
                .patch(format!("{}/pages/{}", self.api_base, page_id))
                .json(&body),
        )
        .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_block(&self, block_id: &str) -> Result<Block, NotionError> {
        self.send(
            self.client
                .delete(format!("{}/blocks/{}", self.api_base, block_id)),
        )
        .await
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, NotionError> {
        let resp = request.send().await.inspect_err(
            |e| tracing::error!(err = ?e, "an error occurred when sending notion request"),
        )?;

        let status = resp.status();

        let text = resp.text().await.inspect_err(
            |e| tracing::error!(err = ?e, "an error occurred when receiving response text"),
        )?;

        if !status.is_success() {
            tracing::error!(status = %status, text = %text, "notion rejected the request");
            return Err(NotionError::Status { status, body: text });
        }

        match serde_json::from_str(&text) {
            Ok(body) => Ok(body),
            Err(source) => {
                tracing::error!(err = ?source, text = %text, "an error occurred when parsing response body");
                Err(NotionError::Malformed { source, body: text })
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use httpmock::Method::{DELETE, PATCH, POST};
    use httpmock::MockServer;
    use serde_json::{json, Value};

    use super::*;

    pub(crate) const TEST_DATABASE: &str = "db-test";
    pub(crate) const TEST_TOKEN: &str = "secret-test";

    pub(crate) fn test_client(server: &MockServer) -> NotionClient {
        let mut config = NotionConfig::new(TEST_TOKEN, TEST_DATABASE);
        config.api_base = server.base_url();

        NotionClient::new(&config).expect("client")
    }

    pub(crate) fn page_json(id: &str, quote: &str, author: Option<&str>, category: &str) -> Value {
        let author = match author {
            Some(name) => json!([{ "id": "opt", "name": name, "color": "default" }]),
            None => json!([]),
        };

        json!({
            "object": "page",
            "id": id,
            "archived": false,
            "properties": {
                "Quote": {
                    "id": "title",
                    "type": "title",
                    "title": [{
                        "type": "text",
                        "text": { "content": quote, "link": null },
                        "plain_text": quote
                    }]
                },
                "Author": { "id": "a", "type": "multi_select", "multi_select": author },
                "Category": {
                    "id": "c",
                    "type": "multi_select",
                    "multi_select": [{ "id": "opt", "name": category, "color": "default" }]
                }
            }
        })
    }

    #[tokio::test]
    async fn query_sends_credentials_and_page_size() {
        let server = MockServer::start_async().await;

        let query = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/databases/db-test/query")
                    .header("authorization", "Bearer secret-test")
                    .header("notion-version", "2022-02-22")
                    .header("content-type", "application/json")
                    .json_body(json!({ "page_size": 100 }));
                then.status(200).json_body(json!({
                    "object": "list",
                    "results": [
                        page_json("page-1", "Carpe diem", Some("Horace"), "Stoic"),
                        page_json("page-2", "Memento mori", None, "Stoic"),
                    ],
                    "has_more": false,
                    "next_cursor": null
                }));
            })
            .await;

        let pages = test_client(&server).query(None).await.expect("query");

        query.assert_hits_async(1).await;
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].id, "page-1");
        assert_eq!(pages[0].quote_text().as_deref(), Some("Carpe diem"));
        assert_eq!(pages[0].author_name(), Some("Horace"));
        assert_eq!(pages[1].author_name(), None);
        assert_eq!(pages[1].category_name(), Some("Stoic"));
    }

    #[tokio::test]
    async fn query_filters_by_property() {
        let server = MockServer::start_async().await;

        let by_quote = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/databases/db-test/query")
                    .json_body(json!({
                        "page_size": 100,
                        "filter": { "property": "Quote", "rich_text": { "contains": "diem" } }
                    }));
                then.status(200).json_body(json!({ "results": [] }));
            })
            .await;

        let by_author = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/databases/db-test/query")
                    .json_body(json!({
                        "page_size": 100,
                        "filter": { "property": "Author", "multi_select": { "contains": "Marcus" } }
                    }));
                then.status(200).json_body(json!({ "results": [] }));
            })
            .await;

        let by_category = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/databases/db-test/query")
                    .json_body(json!({
                        "page_size": 100,
                        "filter": { "property": "Category", "multi_select": { "contains": "Humor" } }
                    }));
                then.status(200).json_body(json!({ "results": [] }));
            })
            .await;

        let client = test_client(&server);
        client
            .query(Some(&QueryFilter::QuoteContains("diem".into())))
            .await
            .expect("quote filter");
        client
            .query(Some(&QueryFilter::AuthorContains("Marcus".into())))
            .await
            .expect("author filter");
        client
            .query(Some(&QueryFilter::CategoryContains("Humor".into())))
            .await
            .expect("category filter");

        by_quote.assert_hits_async(1).await;
        by_author.assert_hits_async(1).await;
        by_category.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn create_page_writes_all_three_properties() {
        let server = MockServer::start_async().await;

        let create = server
            .mock_async(|when, then| {
                when.method(POST).path("/pages").json_body(json!({
                    "parent": { "type": "database_id", "database_id": "db-test" },
                    "properties": {
                        "Quote": { "title": [{ "type": "text", "text": { "content": "Carpe diem" } }] },
                        "Author": { "type": "multi_select", "multi_select": [{ "name": "No Author" }] },
                        "Category": { "type": "multi_select", "multi_select": [{ "name": "Stoic" }] }
                    }
                }));
                then.status(200)
                    .json_body(page_json("page-new", "Carpe diem", Some("No Author"), "Stoic"));
            })
            .await;

        let page = test_client(&server)
            .create_page("Carpe diem", "No Author", "Stoic")
            .await
            .expect("create");

        create.assert_hits_async(1).await;
        assert_eq!(page.id, "page-new");
    }

    #[tokio::test]
    async fn update_page_patches_without_parent() {
        let server = MockServer::start_async().await;

        let update = server
            .mock_async(|when, then| {
                when.method(PATCH).path("/pages/page-1").json_body(json!({
                    "properties": {
                        "Quote": { "title": [{ "type": "text", "text": { "content": "new" } }] },
                        "Author": { "type": "multi_select", "multi_select": [{ "name": "Seneca" }] },
                        "Category": { "type": "multi_select", "multi_select": [{ "name": "Stoic" }] }
                    }
                }));
                then.status(200)
                    .json_body(page_json("page-1", "new", Some("Seneca"), "Stoic"));
            })
            .await;

        test_client(&server)
            .update_page("page-1", "new", "Seneca", "Stoic")
            .await
            .expect("update");

        update.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn delete_block_archives() {
        let server = MockServer::start_async().await;

        let delete = server
            .mock_async(|when, then| {
                when.method(DELETE).path("/blocks/page-1");
                then.status(200)
                    .json_body(json!({ "object": "block", "id": "page-1", "archived": true }));
            })
            .await;

        let block = test_client(&server)
            .delete_block("page-1")
            .await
            .expect("delete");

        delete.assert_hits_async(1).await;
        assert!(block.archived);
    }

    #[tokio::test]
    async fn non_success_status_is_reported() {
        let server = MockServer::start_async().await;

        server
            .mock_async(|when, then| {
                when.method(POST).path("/databases/db-test/query");
                then.status(401).json_body(json!({
                    "object": "error",
                    "status": 401,
                    "code": "unauthorized",
                    "message": "API token is invalid."
                }));
            })
            .await;

        let err = test_client(&server).query(None).await.unwrap_err();

        match err {
            NotionError::Status { status, body } => {
                assert_eq!(status, StatusCode::UNAUTHORIZED);
                assert!(body.contains("unauthorized"));
            }
            other => panic!("expected a status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_body_is_reported() {
        let server = MockServer::start_async().await;

        server
            .mock_async(|when, then| {
                when.method(POST).path("/databases/db-test/query");
                then.status(200).body("<html>not json</html>");
            })
            .await;

        let err = test_client(&server).query(None).await.unwrap_err();

        assert!(matches!(err, NotionError::Malformed { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn unreachable_server_is_a_transport_error() {
        let mut config = NotionConfig::new(TEST_TOKEN, TEST_DATABASE);
        config.api_base = "http://127.0.0.1:1".to_owned();

        let err = NotionClient::new(&config)
            .expect("client")
            .query(None)
            .await
            .unwrap_err();

        assert!(matches!(err, NotionError::Transport(_)), "{err:?}");
    }

    #[test]
    fn record_requires_text_and_category() {
        let page: Page = serde_json::from_value(json!({
            "id": "page-1",
            "properties": {
                "Quote": { "title": [] },
                "Category": { "multi_select": [{ "name": "Stoic" }] }
            }
        }))
        .expect("page");

        match page.into_record().unwrap_err() {
            NotionError::MissingProperty { page_id, property } => {
                assert_eq!(page_id, "page-1");
                assert_eq!(property, "Quote");
            }
            other => panic!("unexpected error {other:?}"),
        }

        let page: Page =
            serde_json::from_value(page_json("page-2", "text", Some("Seneca"), "Stoic"))
                .expect("page");
        let mut value = page_json("page-2", "text", Some("Seneca"), "Stoic");
        value["properties"]["Category"]["multi_select"] = json!([]);
        let without_category: Page = serde_json::from_value(value).expect("page");

        assert!(page.into_record().is_ok());
        assert!(matches!(
            without_category.into_record(),
            Err(NotionError::MissingProperty {
                property: "Category",
                ..
            })
        ));
    }

    #[test]
    fn record_maps_placeholder_author_to_none() {
        let page: Page =
            serde_json::from_value(page_json("page-1", "Carpe diem", Some("No Author"), "Stoic"))
                .expect("page");

        assert_eq!(
            page.into_record().expect("record"),
            RemoteQuote {
                page_id: "page-1".into(),
                text: "Carpe diem".into(),
                author: None,
                category: "Stoic".into(),
            }
        );
    }

    #[test]
    fn title_fragments_are_joined() {
        let page: Page = serde_json::from_value(json!({
            "id": "page-1",
            "properties": {
                "Quote": { "title": [
                    { "type": "text", "text": { "content": "Memento " } },
                    { "type": "mention", "plain_text": "mori" }
                ] }
            }
        }))
        .expect("page");

        assert_eq!(page.quote_text().as_deref(), Some("Memento mori"));
    }
}

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize)]
pub struct QueryResponse {
    pub results: Vec<Page>,
    #[serde(default)]
    pub has_more: bool,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Page {
    pub id: String,
    #[serde(default)]
    pub properties: PageProperties,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct PageProperties {
    #[serde(rename = "Quote")]
    pub quote: Option<TitleProperty>,
    #[serde(rename = "Author")]
    pub author: Option<MultiSelectProperty>,
    #[serde(rename = "Category")]
    pub category: Option<MultiSelectProperty>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct TitleProperty {
    #[serde(default)]
    pub title: Vec<RichText>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RichText {
    pub text: Option<TextContent>,
    pub plain_text: Option<String>,
}

impl RichText {
    pub fn content(&self) -> &str {
        match (&self.text, &self.plain_text) {
            (Some(text), _) => &text.content,
            (None, Some(plain)) => plain,
            (None, None) => "",
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct TextContent {
    pub content: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct MultiSelectProperty {
    #[serde(default)]
    pub multi_select: Vec<SelectOption>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SelectOption {
    pub name: String,
}

/// what comes back from archiving a block.
#[derive(Clone, Debug, Deserialize)]
pub struct Block {
    pub id: String,
    #[serde(default)]
    pub archived: bool,
}

#[derive(Debug, Serialize)]
pub struct QueryRequest<'a> {
    pub page_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterBody<'a>>,
}

#[derive(Debug, Serialize)]
pub struct FilterBody<'a> {
    pub property: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rich_text: Option<Contains<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multi_select: Option<Contains<'a>>,
}

#[derive(Debug, Serialize)]
pub struct Contains<'a> {
    pub contains: &'a str,
}

#[derive(Debug, Serialize)]
pub struct PageRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<Parent<'a>>,
    pub properties: PropertiesRequest<'a>,
}

#[derive(Debug, Serialize)]
pub struct Parent<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub database_id: &'a str,
}

#[derive(Debug, Serialize)]
pub struct PropertiesRequest<'a> {
    #[serde(rename = "Quote")]
    pub quote: TitleValue<'a>,
    #[serde(rename = "Author")]
    pub author: MultiSelectValue<'a>,
    #[serde(rename = "Category")]
    pub category: MultiSelectValue<'a>,
}

impl<'a> PropertiesRequest<'a> {
    pub fn new(quote: &'a str, author: &'a str, category: &'a str) -> Self {
        PropertiesRequest {
            quote: TitleValue {
                title: [TextFragment {
                    kind: "text",
                    text: TextBody { content: quote },
                }],
            },
            author: MultiSelectValue::single(author),
            category: MultiSelectValue::single(category),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TitleValue<'a> {
    pub title: [TextFragment<'a>; 1],
}

#[derive(Debug, Serialize)]
pub struct TextFragment<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: TextBody<'a>,
}

#[derive(Debug, Serialize)]
pub struct TextBody<'a> {
    pub content: &'a str,
}

#[derive(Debug, Serialize)]
pub struct MultiSelectValue<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub multi_select: [SelectName<'a>; 1],
}

impl<'a> MultiSelectValue<'a> {
    fn single(name: &'a str) -> Self {
        MultiSelectValue {
            kind: "multi_select",
            multi_select: [SelectName { name }],
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SelectName<'a> {
    pub name: &'a str,
}

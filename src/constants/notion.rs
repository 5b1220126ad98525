pub static NOTION_API_BASE: &str = "https://api.notion.com/v1";
pub static NOTION_VERSION: &str = "2022-02-22";

/// the API never returns more than this many pages per query.
pub const PAGE_SIZE: u32 = 100;

pub static QUOTE_PROPERTY: &str = "Quote";
pub static AUTHOR_PROPERTY: &str = "Author";
pub static CATEGORY_PROPERTY: &str = "Category";

/// author name written to remote pages for quotes without an author.
pub static NO_AUTHOR: &str = "No Author";

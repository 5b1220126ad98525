pub mod notion;
pub mod quotes;

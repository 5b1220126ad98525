pub mod notion;

/// stand-in text for a quote whose source image yielded nothing readable.
pub static FAILED_TEXT_RECOGNIZE: &str = "Failed Text Recognize";

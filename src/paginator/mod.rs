//! Pagination engine.
//!
//! Splits accumulated lines into pages that never exceed a maximum size,
//! counted in characters and including the page prefix and suffix.

mod base;
mod file;
pub mod language;
mod wrapped;

use thiserror::Error;

pub use base::Paginator;
pub use file::FilePaginator;
pub use wrapped::{WrapOptions, WrappedPaginator};

/// Errors raised while building pages.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PaginatorError {
    #[error("Line exceeds maximum page size {max} (got {length})")]
    LineTooLong { length: usize, max: usize },

    #[error(
        "Line of length `{length}` had sequence of `{sequence}` characters (max is {max}) \
         that could not be wrapped with delimiters: `{delimiters:?}`"
    )]
    Unwrappable {
        length: usize,
        sequence: usize,
        max: usize,
        delimiters: Vec<String>,
    },

    #[error("Couldn't determine the encoding: {0}")]
    Decode(String),

    #[error("Linespan {start}-{end} goes out of bounds (file has {line_count} lines)")]
    Range {
        start: usize,
        end: usize,
        line_count: usize,
    },
}

/// Anything that turns lines into pages.
pub trait PageSource: Send {
    /// Appends a line, opening a new page first if it would not fit.
    fn add_line(&mut self, line: &str, empty: bool) -> Result<(), PaginatorError>;

    /// Every page, including the open one if it has content.
    fn pages(&self) -> Vec<String>;

    /// Page at `index`, rendered on demand.
    fn page(&self, index: usize) -> Option<String>;

    fn page_count(&self) -> usize;

    /// Configured maximum page size.
    fn max_size(&self) -> usize;

    /// Captures the current contents so a later [`rollback`](Self::rollback)
    /// can undo lines added since.
    fn checkpoint(&self) -> Checkpoint;

    fn rollback(&mut self, checkpoint: Checkpoint);
}

/// Saved paginator position: closed page count plus the open page.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    closed_pages: usize,
    open_page: Vec<String>,
    count: usize,
}

/// Character length, which is what chat limits are measured in.
pub(crate) fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Byte offset of the `n`th character, or the string length.
pub(crate) fn byte_offset(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map_or(s.len(), |(i, _)| i)
}

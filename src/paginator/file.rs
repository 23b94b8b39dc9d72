//! Paginates file contents as a highlighted code block.

use tracing::debug;

use super::language::{analyze_content, detect_language};
use super::{Checkpoint, PageSource, Paginator, PaginatorError, WrapOptions, WrappedPaginator};

/// Pages of decoded file content fenced with the detected language.
#[derive(Debug, Clone)]
pub struct FilePaginator<P = Paginator> {
    inner: P,
    language: String,
    encoding: &'static str,
}

/// Decoded, range-sliced file content ready to be paged.
struct Prepared {
    lines: Vec<String>,
    language: String,
    encoding: &'static str,
}

impl FilePaginator<Paginator> {
    /// Pages `data`, rejecting lines longer than a page.
    ///
    /// `line_span` is a 1-indexed inclusive range, in either order.
    pub fn new(
        data: &[u8],
        line_span: Option<(usize, usize)>,
        language_hints: &[&str],
        max_size: usize,
    ) -> Result<Self, PaginatorError> {
        let prepared = prepare(data, line_span, language_hints)?;
        let inner = Paginator::code_block(&prepared.language, max_size);
        Self::fill(inner, prepared)
    }
}

impl FilePaginator<WrappedPaginator> {
    /// Pages `data`, wrapping lines longer than a page.
    pub fn wrapped(
        data: &[u8],
        line_span: Option<(usize, usize)>,
        language_hints: &[&str],
        max_size: usize,
        options: WrapOptions,
    ) -> Result<Self, PaginatorError> {
        let prepared = prepare(data, line_span, language_hints)?;
        let inner = WrappedPaginator::new(
            Paginator::code_block(&prepared.language, max_size),
            options,
        );
        Self::fill(inner, prepared)
    }
}

impl<P: PageSource> FilePaginator<P> {
    fn fill(mut inner: P, prepared: Prepared) -> Result<Self, PaginatorError> {
        for line in &prepared.lines {
            inner.add_line(line, false)?;
        }
        Ok(Self {
            inner,
            language: prepared.language,
            encoding: prepared.encoding,
        })
    }

    /// Highlight tag used for the code fence (may be empty).
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Encoding the content was decoded with.
    pub const fn encoding(&self) -> &'static str {
        self.encoding
    }
}

impl<P: PageSource> PageSource for FilePaginator<P> {
    fn add_line(&mut self, line: &str, empty: bool) -> Result<(), PaginatorError> {
        self.inner.add_line(line, empty)
    }

    fn pages(&self) -> Vec<String> {
        self.inner.pages()
    }

    fn page(&self, index: usize) -> Option<String> {
        self.inner.page(index)
    }

    fn page_count(&self) -> usize {
        self.inner.page_count()
    }

    fn max_size(&self) -> usize {
        self.inner.max_size()
    }

    fn checkpoint(&self) -> Checkpoint {
        self.inner.checkpoint()
    }

    fn rollback(&mut self, checkpoint: Checkpoint) {
        self.inner.rollback(checkpoint);
    }
}

fn prepare(
    data: &[u8],
    line_span: Option<(usize, usize)>,
    language_hints: &[&str],
) -> Result<Prepared, PaginatorError> {
    let hinted = language_hints.iter().find_map(|hint| detect_language(hint));

    let analyzed = analyze_content(data)?;
    let language = analyzed.language.or(hinted).unwrap_or_default().to_owned();
    debug!(
        "Paginating {} bytes as {:?} ({})",
        data.len(),
        language,
        analyzed.encoding
    );

    let lines: Vec<&str> = analyzed.text.split('\n').collect();
    let lines = match line_span {
        Some(span) => slice_lines(&lines, span)?,
        None => &lines[..],
    };

    Ok(Prepared {
        lines: lines.iter().map(|l| (*l).to_owned()).collect(),
        language,
        encoding: analyzed.encoding,
    })
}

/// Selects the 1-indexed inclusive `span` from `lines`.
pub(crate) fn slice_lines<'a, T>(lines: &'a [T], span: (usize, usize)) -> Result<&'a [T], PaginatorError> {
    let (start, end) = if span.0 <= span.1 {
        span
    } else {
        (span.1, span.0)
    };

    if start < 1 || end > lines.len() {
        return Err(PaginatorError::Range {
            start,
            end,
            line_count: lines.len(),
        });
    }
    Ok(&lines[start - 1..end])
}

//! Paginator that wraps lines too long for a single page.

use super::{Checkpoint, PageSource, Paginator, PaginatorError, byte_offset, char_len};

/// How [`WrappedPaginator`] splits long lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrapOptions {
    /// Delimiters tried in order; the rightmost match of the first one found wins.
    pub wrap_on: Vec<String>,
    /// Keep the delimiter at the start of the continuation.
    pub include_wrapped: bool,
    /// Split at the raw character boundary when no delimiter matches.
    pub force_wrap: bool,
}

impl Default for WrapOptions {
    fn default() -> Self {
        Self {
            wrap_on: vec!["\n".to_owned(), " ".to_owned()],
            include_wrapped: true,
            force_wrap: false,
        }
    }
}

impl WrapOptions {
    /// Default delimiters with forced wrapping enabled.
    #[must_use]
    pub fn forced() -> Self {
        Self {
            force_wrap: true,
            ..Self::default()
        }
    }
}

/// A [`Paginator`] that splits overlong lines instead of rejecting them.
#[derive(Debug, Clone)]
pub struct WrappedPaginator {
    inner: Paginator,
    options: WrapOptions,
}

impl Default for WrappedPaginator {
    fn default() -> Self {
        Self::new(Paginator::default(), WrapOptions::default())
    }
}

impl WrappedPaginator {
    #[must_use]
    pub const fn new(inner: Paginator, options: WrapOptions) -> Self {
        Self { inner, options }
    }

    pub const fn options(&self) -> &WrapOptions {
        &self.options
    }

    pub const fn inner(&self) -> &Paginator {
        &self.inner
    }

    fn unwrappable(&self, length: usize, sequence: usize, max: usize) -> PaginatorError {
        PaginatorError::Unwrappable {
            length,
            sequence,
            max,
            delimiters: self.options.wrap_on.clone(),
        }
    }
}

impl PageSource for WrappedPaginator {
    fn add_line(&mut self, line: &str, empty: bool) -> Result<(), PaginatorError> {
        let true_max = self.inner.line_capacity().saturating_sub(usize::from(empty));
        let line_length = char_len(line);

        // Each pass must consume at least one character.
        if line_length > true_max && true_max < 2 {
            return Err(PaginatorError::LineTooLong {
                length: line_length,
                max: true_max,
            });
        }

        let mut rest = line;
        while char_len(rest) > true_max {
            let search = &rest[..byte_offset(rest, true_max - 1)];

            let split = self.options.wrap_on.iter().find_map(|delimiter| {
                search
                    .rfind(delimiter.as_str())
                    .filter(|&position| position > 0)
                    .map(|position| (position, delimiter.len()))
            });

            if let Some((position, delimiter_len)) = split {
                self.inner.add_line(&rest[..position], empty)?;
                rest = if self.options.include_wrapped {
                    &rest[position..]
                } else {
                    &rest[position + delimiter_len..]
                };
            } else if self.options.force_wrap {
                let cut = byte_offset(rest, true_max - 1);
                self.inner.add_line(&rest[..cut], false)?;
                rest = &rest[cut..];
            } else {
                return Err(self.unwrappable(line_length, char_len(rest), true_max));
            }
        }

        self.inner.add_line(rest, empty)
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

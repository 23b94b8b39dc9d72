//! Line-accumulating paginator.

use super::{Checkpoint, PageSource, PaginatorError, char_len};

const DEFAULT_FENCE: &str = "```";
const DEFAULT_MAX_SIZE: usize = 2000;

/// Accumulates lines into pages wrapped in an optional prefix and suffix.
#[derive(Debug, Clone)]
pub struct Paginator {
    prefix: Option<String>,
    suffix: Option<String>,
    max_size: usize,
    linesep: String,
    current_page: Vec<String>,
    /// Characters used by the open page, excluding the suffix.
    count: usize,
    pages: Vec<String>,
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new(Some(DEFAULT_FENCE), Some(DEFAULT_FENCE), DEFAULT_MAX_SIZE)
    }
}

impl Paginator {
    /// Creates an empty paginator.
    #[must_use]
    pub fn new(prefix: Option<&str>, suffix: Option<&str>, max_size: usize) -> Self {
        let mut paginator = Self {
            prefix: prefix.map(str::to_owned),
            suffix: suffix.map(str::to_owned),
            max_size,
            linesep: "\n".to_owned(),
            current_page: Vec::new(),
            count: 0,
            pages: Vec::new(),
        };
        paginator.reset_page();
        paginator
    }

    /// Creates a paginator fenced as a code block tagged with `language`.
    #[must_use]
    pub fn code_block(language: &str, max_size: usize) -> Self {
        Self::new(
            Some(format!("{DEFAULT_FENCE}{language}").as_str()),
            Some(DEFAULT_FENCE),
            max_size,
        )
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn suffix(&self) -> Option<&str> {
        self.suffix.as_deref()
    }

    pub(crate) fn prefix_len(&self) -> usize {
        self.prefix.as_deref().map_or(0, char_len)
    }

    pub(crate) fn suffix_len(&self) -> usize {
        self.suffix.as_deref().map_or(0, char_len)
    }

    fn linesep_len(&self) -> usize {
        char_len(&self.linesep)
    }

    /// Largest line that fits on an otherwise empty page.
    pub fn line_capacity(&self) -> usize {
        self.max_size
            .saturating_sub(self.prefix_len())
            .saturating_sub(self.suffix_len())
            .saturating_sub(2 * self.linesep_len())
    }

    /// Drops all pages.
    pub fn clear(&mut self) {
        self.pages.clear();
        self.reset_page();
    }

    fn reset_page(&mut self) {
        self.current_page.clear();
        self.count = 0;
        if let Some(prefix) = &self.prefix {
            self.count = char_len(prefix) + char_len(&self.linesep);
            self.current_page.push(prefix.clone());
        }
    }

    /// Whether the open page holds anything besides its prefix.
    fn has_open_content(&self) -> bool {
        self.current_page.len() > usize::from(self.prefix.is_some())
    }

    /// Closes the open page, even if it is empty.
    pub fn close_page(&mut self) {
        let page = self.render_open_page();
        self.pages.push(page);
        self.reset_page();
    }

    fn render_open_page(&self) -> String {
        let mut page = self.current_page.join(&self.linesep);
        if let Some(suffix) = &self.suffix {
            page.push_str(&self.linesep);
            page.push_str(suffix);
        }
        page
    }
}

impl PageSource for Paginator {
    fn add_line(&mut self, line: &str, empty: bool) -> Result<(), PaginatorError> {
        let sep = self.linesep_len();
        let trailing = if empty { sep } else { 0 };
        let length = char_len(line);
        let max = self.line_capacity().saturating_sub(trailing);
        if length > max {
            return Err(PaginatorError::LineTooLong { length, max });
        }

        let needed = length + sep + trailing;
        if self.has_open_content()
            && self.count + needed > self.max_size.saturating_sub(self.suffix_len())
        {
            self.close_page();
        }

        self.count += length + sep;
        self.current_page.push(line.to_owned());

        if empty {
            self.current_page.push(String::new());
            self.count += sep;
        }
        Ok(())
    }

    fn pages(&self) -> Vec<String> {
        let mut pages = self.pages.clone();
        if self.has_open_content() {
            pages.push(self.render_open_page());
        }
        pages
    }

    fn page(&self, index: usize) -> Option<String> {
        match self.pages.get(index) {
            Some(page) => Some(page.clone()),
            None if index == self.pages.len() && self.has_open_content() => {
                Some(self.render_open_page())
            }
            None => None,
        }
    }

    fn page_count(&self) -> usize {
        self.pages.len() + usize::from(self.has_open_content())
    }

    fn max_size(&self) -> usize {
        self.max_size
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            closed_pages: self.pages.len(),
            open_page: self.current_page.clone(),
            count: self.count,
        }
    }

    fn rollback(&mut self, checkpoint: Checkpoint) {
        self.pages.truncate(checkpoint.closed_pages);
        self.current_page = checkpoint.open_page;
        self.count = checkpoint.count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Strips the fence lines and returns the content lines of every page.
    fn body_lines(pages: &[String]) -> Vec<String> {
        pages
            .iter()
            .flat_map(|page| {
                let lines: Vec<&str> = page.split('\n').collect();
                lines[1..lines.len() - 1]
                    .iter()
                    .map(|l| (*l).to_owned())
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    #[test]
    fn test_empty_paginator_has_no_pages() {
        let paginator = Paginator::default();
        assert!(paginator.pages().is_empty());
    }

    #[test]
    fn test_single_page_layout() {
        let mut paginator = Paginator::default();
        paginator.add_line("hello", false).unwrap();
        paginator.add_line("world", false).unwrap();
        assert_eq!(paginator.pages(), vec!["```\nhello\nworld\n```".to_owned()]);
    }

    #[test]
    fn test_empty_flag_adds_blank_line() {
        let mut paginator = Paginator::new(None, None, 100);
        paginator.add_line("a", true).unwrap();
        paginator.add_line("b", false).unwrap();
        assert_eq!(paginator.pages(), vec!["a\n\nb".to_owned()]);
    }

    #[test]
    fn test_pages_respect_max_size_and_are_lossless() {
        let mut paginator = Paginator::new(Some("```py"), Some("```"), 60);
        let input: Vec<String> = (0..50).map(|i| format!("line number {i}")).collect();
        for line in &input {
            paginator.add_line(line, false).unwrap();
        }

        let pages = paginator.pages();
        assert!(pages.len() > 1);
        for page in &pages {
            assert!(char_len(page) <= 60, "page too long: {page:?}");
            assert!(page.starts_with("```py\n"));
            assert!(page.ends_with("\n```"));
        }
        assert_eq!(body_lines(&pages), input);
    }

    #[test]
    fn test_line_too_long() {
        let mut paginator = Paginator::new(Some("```"), Some("```"), 20);
        assert_eq!(paginator.line_capacity(), 12);
        paginator.add_line(&"x".repeat(12), false).unwrap();
        let err = paginator.add_line(&"x".repeat(13), false).unwrap_err();
        assert_eq!(err, PaginatorError::LineTooLong { length: 13, max: 12 });
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        let mut paginator = Paginator::new(None, None, 10);
        paginator.add_line("ééééé", false).unwrap();
        paginator.add_line("ééé", false).unwrap();
        assert_eq!(paginator.pages(), vec!["ééééé\nééé".to_owned()]);
    }

    #[test]
    fn test_clear_and_close_page() {
        let mut paginator = Paginator::default();
        paginator.add_line("a", false).unwrap();
        paginator.close_page();
        paginator.add_line("b", false).unwrap();
        assert_eq!(paginator.page_count(), 2);

        paginator.clear();
        assert_eq!(paginator.page_count(), 0);
    }

    #[test]
    fn test_page_lookup_matches_pages() {
        let mut paginator = Paginator::new(Some("```"), Some("```"), 20);
        for i in 0..3 {
            paginator.add_line(&format!("line-{i:05}"), false).unwrap();
        }
        let pages = paginator.pages();
        assert_eq!(paginator.page_count(), pages.len());
        for (i, page) in pages.iter().enumerate() {
            assert_eq!(paginator.page(i).as_ref(), Some(page));
        }
        assert_eq!(paginator.page(3), None);
    }

    #[test]
    fn test_rollback_restores_checkpoint() {
        let mut paginator = Paginator::new(None, None, 12);
        paginator.add_line("first", false).unwrap();
        let checkpoint = paginator.checkpoint();

        paginator.add_line("second", false).unwrap();
        paginator.add_line("third", true).unwrap();
        assert_eq!(paginator.page_count(), 3);

        paginator.rollback(checkpoint);
        assert_eq!(paginator.pages(), vec!["first".to_owned()]);
        paginator.add_line("again", false).unwrap();
        assert_eq!(paginator.pages(), vec!["first\nagain".to_owned()]);
    }
}

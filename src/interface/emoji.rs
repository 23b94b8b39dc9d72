//! Navigation reactions.

/// What a navigation reaction does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Start,
    Back,
    Forward,
    End,
    Close,
}

/// The five reactions a session listens for. Empty strings are skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmojiSettings {
    pub start: String,
    pub back: String,
    pub forward: String,
    pub end: String,
    pub close: String,
}

impl Default for EmojiSettings {
    fn default() -> Self {
        Self {
            start: "\u{23EE}".to_owned(),
            back: "\u{25C0}".to_owned(),
            forward: "\u{25B6}".to_owned(),
            end: "\u{23ED}".to_owned(),
            close: "\u{23F9}".to_owned(),
        }
    }
}

impl EmojiSettings {
    /// All five, in posting order.
    pub fn all(&self) -> [&str; 5] {
        [
            self.start.as_str(),
            self.back.as_str(),
            self.forward.as_str(),
            self.end.as_str(),
            self.close.as_str(),
        ]
    }

    /// Maps a reaction to its action.
    pub fn action(&self, emoji: &str) -> Option<Navigation> {
        if emoji.is_empty() {
            return None;
        }
        // Close is checked first so a shared symbol always closes.
        [
            (&self.close, Navigation::Close),
            (&self.start, Navigation::Start),
            (&self.end, Navigation::End),
            (&self.back, Navigation::Back),
            (&self.forward, Navigation::Forward),
        ]
        .into_iter()
        .find(|(symbol, _)| symbol.as_str() == emoji)
        .map(|(_, navigation)| navigation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_actions() {
        let emojis = EmojiSettings::default();
        assert_eq!(emojis.action("\u{23EE}"), Some(Navigation::Start));
        assert_eq!(emojis.action("\u{25C0}"), Some(Navigation::Back));
        assert_eq!(emojis.action("\u{25B6}"), Some(Navigation::Forward));
        assert_eq!(emojis.action("\u{23ED}"), Some(Navigation::End));
        assert_eq!(emojis.action("\u{23F9}"), Some(Navigation::Close));
        assert_eq!(emojis.action("👍"), None);
    }

    #[test]
    fn test_disabled_emoji_never_matches() {
        let emojis = EmojiSettings {
            start: String::new(),
            ..EmojiSettings::default()
        };
        assert_eq!(emojis.action(""), None);
        assert_eq!(emojis.all()[0], "");
    }
}

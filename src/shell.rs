#![forbid(unsafe_code)]

//! Page routing and the active language, shared by every view.

use crate::i18n::{Language, t};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Page {
    #[default]
    Home,
    Library,
    Config,
}

impl Page {
    pub const ALL: [Page; 3] = [Page::Home, Page::Library, Page::Config];

    pub fn label_key(self) -> &'static str {
        match self {
            Page::Home => "nav.home",
            Page::Library => "nav.library",
            Page::Config => "nav.config",
        }
    }

    pub fn next(self) -> Page {
        let idx = Page::ALL.iter().position(|&p| p == self).unwrap_or(0);
        Page::ALL[(idx + 1) % Page::ALL.len()]
    }

    pub fn prev(self) -> Page {
        let idx = Page::ALL.iter().position(|&p| p == self).unwrap_or(0);
        Page::ALL[(idx + Page::ALL.len() - 1) % Page::ALL.len()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Shell {
    page: Page,
    language: Language,
}

impl Shell {
    pub fn new(language: Language) -> Self {
        Self {
            page: Page::Home,
            language,
        }
    }

    pub fn page(&self) -> Page {
        self.page
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Returns true when the page actually changed.
    pub fn navigate(&mut self, page: Page) -> bool {
        if self.page == page {
            return false;
        }
        debug!(from = ?self.page, to = ?page, "navigate");
        self.page = page;
        true
    }

    pub fn next_page(&mut self) -> Page {
        self.navigate(self.page.next());
        self.page
    }

    pub fn prev_page(&mut self) -> Page {
        self.navigate(self.page.prev());
        self.page
    }

    pub fn set_language(&mut self, language: Language) {
        self.language = language;
    }

    pub fn cycle_language(&mut self) -> Language {
        self.language = self.language.next();
        self.language
    }

    pub fn t(&self, key: &'static str) -> &'static str {
        t(self.language, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_cycle_both_ways() {
        let mut page = Page::Home;
        for _ in 0..Page::ALL.len() {
            page = page.next();
        }
        assert_eq!(page, Page::Home);
        assert_eq!(Page::Home.prev(), Page::Config);
    }

    #[test]
    fn navigation_reports_changes() {
        let mut shell = Shell::new(Language::En);
        assert!(!shell.navigate(Page::Home));
        assert!(shell.navigate(Page::Library));
        assert_eq!(shell.next_page(), Page::Config);
        assert_eq!(shell.prev_page(), Page::Library);
    }

    #[test]
    fn language_switch_changes_lookups() {
        let mut shell = Shell::new(Language::En);
        assert_eq!(shell.t(Page::Library.label_key()), "Library");
        assert_eq!(shell.cycle_language(), Language::Zh);
        assert_eq!(shell.t(Page::Library.label_key()), "视频库");
    }
}

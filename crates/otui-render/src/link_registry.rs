#![forbid(unsafe_code)]

//! OSC 8 hyperlink registry.
//!
//! Cells store a 24-bit link id in their attribute word; this registry
//! maps ids to the URL strings emitted in OSC 8 sequences. Id 0 is
//! reserved for "no hyperlink".

use std::collections::HashMap;

use crate::cell::CellAttrs;

/// Registry of hyperlink URLs addressed by compact ids.
#[derive(Debug, Clone)]
pub struct LinkRegistry {
    /// Slot 0 is the reserved "no link" entry.
    urls: Vec<Option<String>>,
    lookup: HashMap<String, u32>,
}

impl Default for LinkRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkRegistry {
    const MAX_ID: u32 = 0x00FF_FFFF;

    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            urls: vec![None],
            lookup: HashMap::new(),
        }
    }

    /// Register a URL, returning its id. Duplicate URLs share one id.
    ///
    /// Returns [`CellAttrs::NO_LINK`] if the 24-bit id space is exhausted.
    pub fn register(&mut self, url: &str) -> u32 {
        if let Some(&id) = self.lookup.get(url) {
            return id;
        }

        let id = self.urls.len() as u32;
        if id > Self::MAX_ID {
            return CellAttrs::NO_LINK;
        }

        self.urls.push(Some(url.to_string()));
        self.lookup.insert(url.to_string(), id);
        id
    }

    /// The URL for an id, or `None` for id 0 / unknown ids.
    #[must_use]
    pub fn get(&self, id: u32) -> Option<&str> {
        self.urls
            .get(id as usize)
            .and_then(|slot| slot.as_deref())
    }

    /// Remove a link. Its id is not reused; cells still carrying it
    /// resolve to no hyperlink.
    pub fn unregister(&mut self, id: u32) {
        if id == 0 {
            return;
        }
        if let Some(slot) = self.urls.get_mut(id as usize) {
            if let Some(url) = slot.take() {
                self.lookup.remove(&url);
            }
        }
    }

    /// Number of live links.
    #[must_use]
    pub fn len(&self) -> usize {
        self.urls.iter().filter(|slot| slot.is_some()).count()
    }

    /// Whether no links are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_resolve() {
        let mut reg = LinkRegistry::new();
        let id = reg.register("https://example.com");
        assert_ne!(id, CellAttrs::NO_LINK);
        assert_eq!(reg.get(id), Some("https://example.com"));
    }

    #[test]
    fn id_zero_is_never_a_link() {
        let reg = LinkRegistry::new();
        assert_eq!(reg.get(0), None);
    }

    #[test]
    fn duplicates_share_an_id() {
        let mut reg = LinkRegistry::new();
        let a = reg.register("https://example.com");
        let b = reg.register("https://example.com");
        assert_eq!(a, b);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn unregister_resolves_to_none() {
        let mut reg = LinkRegistry::new();
        let id = reg.register("https://example.com");
        reg.unregister(id);
        assert_eq!(reg.get(id), None);
        assert!(reg.is_empty());
    }
}

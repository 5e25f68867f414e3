#![forbid(unsafe_code)]

//! Interning pool for multi-codepoint grapheme clusters.
//!
//! Cells store 4 bytes of content. A cluster that needs more than one
//! scalar (ZWJ emoji, combining sequences, flags) is interned here and the
//! cell stores a compact [`GraphemeId`] instead. The pool deduplicates by
//! string, so a screen full of the same emoji costs one allocation.
//!
//! Slots are not reference counted: buffers are redrawn wholesale each
//! frame, so the pool is cleared by the presenter when both the front and
//! back frame have been rebuilt (or simply left to grow - a session's
//! distinct-cluster population is tiny).

use std::collections::HashMap;

use crate::cell::GraphemeId;

/// Deduplicating store of grapheme cluster strings.
#[derive(Debug, Clone, Default)]
pub struct GraphemePool {
    slots: Vec<String>,
    lookup: HashMap<String, GraphemeId>,
}

impl GraphemePool {
    /// Create an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of interned clusters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the pool is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Intern a cluster with its display width, returning its id.
    ///
    /// Re-interning the same string returns the existing id. Width is
    /// clamped to the id's 7-bit field.
    pub fn intern(&mut self, text: &str, width: u8) -> GraphemeId {
        if let Some(&id) = self.lookup.get(text) {
            return id;
        }

        let slot = self.slots.len() as u32;
        debug_assert!(slot <= GraphemeId::MAX_SLOT, "grapheme pool exhausted");
        let id = GraphemeId::new(
            slot.min(GraphemeId::MAX_SLOT),
            width.min(GraphemeId::MAX_WIDTH),
        );
        self.slots.push(text.to_string());
        self.lookup.insert(text.to_string(), id);
        id
    }

    /// The cluster string for an id, or `None` for a stale id.
    #[must_use]
    pub fn get(&self, id: GraphemeId) -> Option<&str> {
        self.slots.get(id.slot()).map(String::as_str)
    }

    /// Drop every interned cluster. Ids handed out before this call go
    /// stale; callers clear the pool only between full redraws.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.lookup.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_and_get() {
        let mut pool = GraphemePool::new();
        let id = pool.intern("👨\u{200D}👩\u{200D}👧", 2);
        assert_eq!(pool.get(id), Some("👨\u{200D}👩\u{200D}👧"));
        assert_eq!(id.width(), 2);
    }

    #[test]
    fn interning_deduplicates() {
        let mut pool = GraphemePool::new();
        let a = pool.intern("🏳️\u{200D}🌈", 2);
        let b = pool.intern("🏳️\u{200D}🌈", 2);
        assert_eq!(a, b);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn distinct_clusters_get_distinct_slots() {
        let mut pool = GraphemePool::new();
        let a = pool.intern("e\u{0301}", 1);
        let b = pool.intern("o\u{0308}", 1);
        assert_ne!(a.slot(), b.slot());
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn stale_id_after_clear_returns_none() {
        let mut pool = GraphemePool::new();
        let id = pool.intern("e\u{0301}", 1);
        pool.clear();
        assert_eq!(pool.get(id), None);
        assert!(pool.is_empty());
    }

    #[test]
    fn width_is_clamped_to_field() {
        let mut pool = GraphemePool::new();
        let id = pool.intern("x\u{0301}", 200);
        assert_eq!(id.width(), GraphemeId::MAX_WIDTH as usize);
    }
}

#![forbid(unsafe_code)]

//! Syntax style registry.
//!
//! Maps capture names (`keyword.import`, `string.special`) to style atoms.
//! Lookup walks dotted scopes from most to least specific, so registering
//! `keyword` covers `keyword.import` until a more specific entry exists.
//!
//! Style ids are stable integers assigned in registration order; id 0 is
//! always the `default` entry, which the registry guarantees exists.

use std::collections::HashMap;

use otui_render::cell::{PackedRgba, StyleFlags};

use crate::color::Rgba;

/// Stable identifier for a registered style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StyleId(pub u32);

impl StyleId {
    /// The id of the mandatory `default` entry.
    pub const DEFAULT: Self = Self(0);
}

/// A style atom: optional colors plus an attribute set.
///
/// `None` colors inherit whatever is underneath at composite time.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Style {
    /// Foreground color, if the style sets one.
    pub fg: Option<Rgba>,
    /// Background color, if the style sets one.
    pub bg: Option<Rgba>,
    /// Text attributes.
    pub attrs: StyleFlags,
}

impl Style {
    /// An empty style that inherits everything.
    pub const EMPTY: Self = Self {
        fg: None,
        bg: None,
        attrs: StyleFlags::empty(),
    };

    /// Create a style with only a foreground color.
    #[must_use]
    pub fn fg(color: Rgba) -> Self {
        Self {
            fg: Some(color),
            ..Self::EMPTY
        }
    }

    /// Set the background color.
    #[must_use]
    pub fn with_bg(mut self, color: Rgba) -> Self {
        self.bg = Some(color);
        self
    }

    /// Set attributes.
    #[must_use]
    pub fn with_attrs(mut self, attrs: StyleFlags) -> Self {
        self.attrs = attrs;
        self
    }

    /// The packed foreground, transparent when inherited.
    #[must_use]
    pub fn packed_fg(&self) -> PackedRgba {
        self.fg.map_or(PackedRgba::TRANSPARENT, Rgba::pack)
    }

    /// The packed background, transparent when inherited.
    #[must_use]
    pub fn packed_bg(&self) -> PackedRgba {
        self.bg.map_or(PackedRgba::TRANSPARENT, Rgba::pack)
    }

    /// Layer `other` on top of `self`: set fields of `other` win.
    #[must_use]
    pub fn merged(self, other: Self) -> Self {
        Self {
            fg: other.fg.or(self.fg),
            bg: other.bg.or(self.bg),
            attrs: self.attrs | other.attrs,
        }
    }
}

/// Registry mapping capture names to styles.
#[derive(Debug, Clone)]
pub struct StyleRegistry {
    /// Styles by id; index == id.
    styles: Vec<Style>,
    /// Capture name -> id.
    by_name: HashMap<String, StyleId>,
}

impl Default for StyleRegistry {
    fn default() -> Self {
        Self::new(Style::EMPTY)
    }
}

impl StyleRegistry {
    /// Create a registry with the given `default` style at id 0.
    #[must_use]
    pub fn new(default_style: Style) -> Self {
        let mut by_name = HashMap::new();
        by_name.insert("default".to_string(), StyleId::DEFAULT);
        Self {
            styles: vec![default_style],
            by_name,
        }
    }

    /// Register (or replace) a style under a capture name.
    ///
    /// Re-registering an existing name keeps its id stable and replaces
    /// the style in place.
    pub fn register(&mut self, name: &str, style: Style) -> StyleId {
        if let Some(&id) = self.by_name.get(name) {
            self.styles[id.0 as usize] = style;
            return id;
        }
        let id = StyleId(self.styles.len() as u32);
        self.styles.push(style);
        self.by_name.insert(name.to_string(), id);
        id
    }

    /// Number of registered styles (including `default`).
    #[must_use]
    pub fn len(&self) -> usize {
        self.styles.len()
    }

    /// Whether only the default entry exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.styles.len() <= 1
    }

    /// Resolve a style by id. Unknown ids fall back to the default style.
    #[must_use]
    pub fn get(&self, id: StyleId) -> &Style {
        self.styles.get(id.0 as usize).unwrap_or(&self.styles[0])
    }

    /// Resolve a capture name to an id via longest-dotted-prefix lookup.
    ///
    /// `keyword.import.special` tries itself, then `keyword.import`, then
    /// `keyword`, then falls back to `default`.
    #[must_use]
    pub fn lookup(&self, capture: &str) -> StyleId {
        let mut scope = capture;
        loop {
            if let Some(&id) = self.by_name.get(scope) {
                return id;
            }
            match scope.rfind('.') {
                Some(dot) => scope = &scope[..dot],
                None => return StyleId::DEFAULT,
            }
        }
    }

    /// Resolve a capture name straight to its style.
    #[must_use]
    pub fn resolve(&self, capture: &str) -> &Style {
        self.get(self.lookup(capture))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_entry_always_exists() {
        let registry = StyleRegistry::default();
        assert_eq!(registry.lookup("default"), StyleId::DEFAULT);
        assert_eq!(registry.lookup("anything.at.all"), StyleId::DEFAULT);
    }

    #[test]
    fn ids_are_stable_in_registration_order() {
        let mut registry = StyleRegistry::default();
        let kw = registry.register("keyword", Style::fg(Rgba::rgb(1.0, 0.0, 0.0)));
        let s = registry.register("string", Style::fg(Rgba::rgb(0.0, 1.0, 0.0)));
        assert_eq!(kw, StyleId(1));
        assert_eq!(s, StyleId(2));

        // Re-registering keeps the id.
        let kw2 = registry.register("keyword", Style::fg(Rgba::rgb(0.5, 0.0, 0.0)));
        assert_eq!(kw2, kw);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn longest_prefix_lookup() {
        let mut registry = StyleRegistry::default();
        let kw = registry.register("keyword", Style::fg(Rgba::rgb(1.0, 0.0, 0.0)));
        let kwi = registry.register("keyword.import", Style::fg(Rgba::rgb(0.0, 0.0, 1.0)));

        assert_eq!(registry.lookup("keyword.import"), kwi);
        assert_eq!(registry.lookup("keyword.import.special"), kwi);
        assert_eq!(registry.lookup("keyword.operator"), kw);
        assert_eq!(registry.lookup("comment"), StyleId::DEFAULT);
    }

    #[test]
    fn unknown_id_falls_back_to_default() {
        let registry = StyleRegistry::new(Style::fg(Rgba::WHITE));
        let style = registry.get(StyleId(99));
        assert_eq!(style.fg, Some(Rgba::WHITE));
    }

    #[test]
    fn merged_prefers_overlay_fields() {
        let base = Style::fg(Rgba::BLACK).with_bg(Rgba::WHITE);
        let overlay = Style::fg(Rgba::rgb(1.0, 0.0, 0.0)).with_attrs(StyleFlags::BOLD);
        let merged = base.merged(overlay);
        assert_eq!(merged.fg, Some(Rgba::rgb(1.0, 0.0, 0.0)));
        assert_eq!(merged.bg, Some(Rgba::WHITE));
        assert!(merged.attrs.contains(StyleFlags::BOLD));
    }
}

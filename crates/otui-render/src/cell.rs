#![forbid(unsafe_code)]

//! Cell types and invariants.
//!
//! A [`Cell`] is one terminal character position: glyph content, foreground,
//! background, and attributes, packed into 16 bytes so buffers stay dense
//! and the frame diff compiles down to word compares.
//!
//! # Wide glyphs
//!
//! A grapheme of display width 2 occupies two cells: the left cell holds the
//! glyph (*wide head*), the right cell holds [`CellContent::WIDE_TAIL`], an
//! empty placeholder owned by the head. Buffer writes maintain this pairing;
//! the presenter skips tails because emitting the head already advanced the
//! terminal cursor by two columns.

use crate::char_width;

/// Content of a cell: an inline `char` or a reference into the grapheme pool.
///
/// Packed into 4 bytes. Bit 31 discriminates: clear = direct Unicode scalar
/// (≤ U+10FFFF fits in 21 bits), set = [`GraphemeId`] (24-bit pool slot plus
/// 7-bit width).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct CellContent(u32);

/// Reference to an interned grapheme cluster in the
/// [`GraphemePool`](crate::grapheme_pool::GraphemePool).
///
/// Layout: bits 23..0 pool slot, bits 30..24 display width.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct GraphemeId(u32);

impl GraphemeId {
    /// Maximum pool slot (24 bits).
    pub const MAX_SLOT: u32 = 0x00FF_FFFF;
    /// Maximum display width (7 bits).
    pub const MAX_WIDTH: u8 = 0x7F;

    /// Build an id from a pool slot and display width.
    #[inline]
    pub const fn new(slot: u32, width: u8) -> Self {
        debug_assert!(slot <= Self::MAX_SLOT);
        debug_assert!(width <= Self::MAX_WIDTH);
        Self((slot & Self::MAX_SLOT) | ((width as u32) << 24))
    }

    /// Pool slot index.
    #[inline]
    pub const fn slot(self) -> usize {
        (self.0 & Self::MAX_SLOT) as usize
    }

    /// Display width embedded at intern time.
    #[inline]
    pub const fn width(self) -> usize {
        ((self.0 >> 24) & 0x7F) as usize
    }

    /// Raw representation for storage in [`CellContent`].
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Rebuild from the raw representation.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }
}

impl core::fmt::Debug for GraphemeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "GraphemeId(slot={}, width={})", self.slot(), self.width())
    }
}

impl CellContent {
    /// No glyph. Presented as a space.
    pub const EMPTY: Self = Self(0);

    /// Placeholder for the right half of a wide glyph.
    ///
    /// `0x7FFF_FFFF` is outside the Unicode scalar range but still in
    /// direct-char mode (bit 31 clear), so it can never collide with a
    /// real character or a grapheme reference.
    pub const WIDE_TAIL: Self = Self(0x7FFF_FFFF);

    const GRAPHEME_BIT: u32 = 0x8000_0000;

    /// Content holding a single Unicode scalar.
    #[inline]
    pub const fn from_char(c: char) -> Self {
        Self(c as u32)
    }

    /// Content referencing an interned grapheme cluster.
    #[inline]
    pub const fn from_grapheme(id: GraphemeId) -> Self {
        Self(Self::GRAPHEME_BIT | id.raw())
    }

    /// Whether this is a grapheme reference rather than a direct char.
    #[inline]
    pub const fn is_grapheme(self) -> bool {
        self.0 & Self::GRAPHEME_BIT != 0
    }

    /// Whether this is the wide-tail placeholder.
    #[inline]
    pub const fn is_wide_tail(self) -> bool {
        self.0 == Self::WIDE_TAIL.0
    }

    /// Whether the cell holds no glyph.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == Self::EMPTY.0
    }

    /// The direct char, if that is what this content holds.
    #[inline]
    pub fn as_char(self) -> Option<char> {
        if self.is_grapheme() || self.is_empty() || self.is_wide_tail() {
            None
        } else {
            char::from_u32(self.0)
        }
    }

    /// The grapheme reference, if that is what this content holds.
    #[inline]
    pub const fn grapheme_id(self) -> Option<GraphemeId> {
        if self.is_grapheme() {
            Some(GraphemeId::from_raw(self.0 & !Self::GRAPHEME_BIT))
        } else {
            None
        }
    }

    /// Display width of this content.
    ///
    /// Empty and wide-tail cells are width 0; grapheme references carry
    /// their width; direct chars go through the Unicode width tables.
    #[inline]
    pub fn width(self) -> usize {
        if self.is_empty() || self.is_wide_tail() {
            0
        } else if self.is_grapheme() {
            ((self.0 >> 24) & 0x7F) as usize
        } else {
            match self.as_char() {
                Some(c) => char_width(c),
                None => 1,
            }
        }
    }

    /// Raw 32-bit value, for diffing.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl Default for CellContent {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl core::fmt::Debug for CellContent {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.is_empty() {
            write!(f, "CellContent::EMPTY")
        } else if self.is_wide_tail() {
            write!(f, "CellContent::WIDE_TAIL")
        } else if let Some(c) = self.as_char() {
            write!(f, "CellContent({c:?})")
        } else if let Some(id) = self.grapheme_id() {
            write!(f, "CellContent({id:?})")
        } else {
            write!(f, "CellContent(0x{:08x})", self.0)
        }
    }
}

/// A packed sRGB color with straight alpha, `0xRRGGBBAA`.
///
/// This is the storage form used inside cells; the float-channel type in
/// `otui-style` converts to and from it at the 8-bit boundary. Compositing
/// is Porter-Duff source-over on straight alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[repr(transparent)]
pub struct PackedRgba(pub u32);

impl PackedRgba {
    /// Fully transparent.
    pub const TRANSPARENT: Self = Self(0);
    /// Opaque black.
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    /// Opaque white.
    pub const WHITE: Self = Self::rgb(255, 255, 255);

    /// Opaque color from 8-bit channels.
    #[inline]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::rgba(r, g, b, 255)
    }

    /// Color from 8-bit channels with explicit alpha.
    #[inline]
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self(((r as u32) << 24) | ((g as u32) << 16) | ((b as u32) << 8) | (a as u32))
    }

    /// Red channel.
    #[inline]
    pub const fn r(self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Green channel.
    #[inline]
    pub const fn g(self) -> u8 {
        (self.0 >> 16) as u8
    }

    /// Blue channel.
    #[inline]
    pub const fn b(self) -> u8 {
        (self.0 >> 8) as u8
    }

    /// Alpha channel.
    #[inline]
    pub const fn a(self) -> u8 {
        self.0 as u8
    }

    /// Whether this color is fully transparent.
    #[inline]
    pub const fn is_transparent(self) -> bool {
        self.a() == 0
    }

    #[inline]
    const fn div_round_u8(numer: u64, denom: u64) -> u8 {
        let v = (numer + denom / 2) / denom;
        if v > 255 { 255 } else { v as u8 }
    }

    /// Porter-Duff source-over: `self` composited on top of `dst`.
    ///
    /// Exact rational arithmetic with one rounding at the end, so chained
    /// blends don't accumulate channel drift.
    #[inline]
    #[must_use]
    pub fn over(self, dst: Self) -> Self {
        let sa = self.a() as u64;
        if sa == 255 {
            return self;
        }
        if sa == 0 {
            return dst;
        }

        let da = dst.a() as u64;
        let inv = 255 - sa;

        // Work in the 255^2 domain: numer_a = 255*sa + da*(255-sa).
        let numer_a = 255 * sa + da * inv;
        if numer_a == 0 {
            return Self::TRANSPARENT;
        }
        let out_a = Self::div_round_u8(numer_a, 255);

        let channel = |s: u8, d: u8| {
            Self::div_round_u8((s as u64) * sa * 255 + (d as u64) * da * inv, numer_a)
        };
        Self::rgba(
            channel(self.r(), dst.r()),
            channel(self.g(), dst.g()),
            channel(self.b(), dst.b()),
            out_a,
        )
    }
}

bitflags::bitflags! {
    /// Text attribute bitset, mirroring the SGR attribute set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StyleFlags: u8 {
        /// Bold / increased intensity (SGR 1).
        const BOLD          = 1 << 0;
        /// Dim / decreased intensity (SGR 2).
        const DIM           = 1 << 1;
        /// Italic (SGR 3).
        const ITALIC        = 1 << 2;
        /// Underline (SGR 4).
        const UNDERLINE     = 1 << 3;
        /// Blink (SGR 5).
        const BLINK         = 1 << 4;
        /// Inverse video (SGR 7).
        const INVERSE       = 1 << 5;
        /// Hidden / concealed (SGR 8).
        const HIDDEN        = 1 << 6;
        /// Strikethrough (SGR 9).
        const STRIKETHROUGH = 1 << 7;
    }
}

/// Packed attributes: style flags in bits 31..24, hyperlink id in bits 23..0.
///
/// Link id 0 means "no hyperlink"; nonzero ids resolve through the
/// [`LinkRegistry`](crate::link_registry::LinkRegistry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[repr(transparent)]
pub struct CellAttrs(u32);

impl CellAttrs {
    /// No flags, no link.
    pub const NONE: Self = Self(0);
    /// Sentinel link id for "no hyperlink".
    pub const NO_LINK: u32 = 0;
    const LINK_MASK: u32 = 0x00FF_FFFF;

    /// Build from flags and a link id.
    #[inline]
    pub fn new(flags: StyleFlags, link_id: u32) -> Self {
        debug_assert!(link_id <= Self::LINK_MASK);
        Self(((flags.bits() as u32) << 24) | (link_id & Self::LINK_MASK))
    }

    /// Build from flags only.
    #[inline]
    pub fn from_flags(flags: StyleFlags) -> Self {
        Self::new(flags, Self::NO_LINK)
    }

    /// The style flags.
    #[inline]
    pub fn flags(self) -> StyleFlags {
        StyleFlags::from_bits_truncate((self.0 >> 24) as u8)
    }

    /// The hyperlink id.
    #[inline]
    pub const fn link_id(self) -> u32 {
        self.0 & Self::LINK_MASK
    }

    /// Copy with different flags, keeping the link.
    #[inline]
    pub fn with_flags(self, flags: StyleFlags) -> Self {
        Self((self.0 & Self::LINK_MASK) | ((flags.bits() as u32) << 24))
    }

    /// Copy with a different link, keeping the flags.
    #[inline]
    pub fn with_link(self, link_id: u32) -> Self {
        debug_assert!(link_id <= Self::LINK_MASK);
        Self((self.0 & !Self::LINK_MASK) | (link_id & Self::LINK_MASK))
    }

    /// Raw 32-bit value, for diffing.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// One terminal cell: 16 bytes, four 32-bit words.
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(C, align(16))]
pub struct Cell {
    /// Glyph content.
    pub content: CellContent,
    /// Foreground color.
    pub fg: PackedRgba,
    /// Background color.
    pub bg: PackedRgba,
    /// Style flags plus hyperlink id.
    pub attrs: CellAttrs,
}

const _: () = assert!(core::mem::size_of::<Cell>() == 16);

impl Cell {
    /// Wide-tail placeholder cell.
    pub const WIDE_TAIL: Self = Self {
        content: CellContent::WIDE_TAIL,
        fg: PackedRgba::TRANSPARENT,
        bg: PackedRgba::TRANSPARENT,
        attrs: CellAttrs::NONE,
    };

    /// A cell holding a single character with default colors.
    #[inline]
    pub const fn from_char(c: char) -> Self {
        Self {
            content: CellContent::from_char(c),
            fg: PackedRgba::TRANSPARENT,
            bg: PackedRgba::TRANSPARENT,
            attrs: CellAttrs::NONE,
        }
    }

    /// Whether this is the right half of a wide glyph.
    #[inline]
    pub const fn is_wide_tail(&self) -> bool {
        self.content.is_wide_tail()
    }

    /// Whether the cell holds no glyph.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Display width of the content.
    #[inline]
    pub fn width(&self) -> usize {
        self.content.width()
    }

    /// Copy with a different foreground.
    #[inline]
    pub const fn with_fg(mut self, fg: PackedRgba) -> Self {
        self.fg = fg;
        self
    }

    /// Copy with a different background.
    #[inline]
    pub const fn with_bg(mut self, bg: PackedRgba) -> Self {
        self.bg = bg;
        self
    }

    /// Copy with different attributes.
    #[inline]
    pub const fn with_attrs(mut self, attrs: CellAttrs) -> Self {
        self.attrs = attrs;
        self
    }

    /// Word-wise equality for the diff inner loop.
    ///
    /// Non-short-circuiting `&` keeps the four compares branch-free so the
    /// compiler can vectorize the row scan.
    #[inline]
    pub fn bits_eq(&self, other: &Self) -> bool {
        (self.content.raw() == other.content.raw())
            & (self.fg == other.fg)
            & (self.bg == other.bg)
            & (self.attrs == other.attrs)
    }
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            content: CellContent::EMPTY,
            fg: PackedRgba::TRANSPARENT,
            bg: PackedRgba::TRANSPARENT,
            attrs: CellAttrs::NONE,
        }
    }
}

impl core::fmt::Debug for Cell {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Cell")
            .field("content", &self.content)
            .field("fg", &self.fg)
            .field("bg", &self.bg)
            .field("attrs", &self.attrs)
            .finish()
    }
}

#![forbid(unsafe_code)]

//! Half-block pixel encoding.
//!
//! Terminals have no pixels, but the upper-half-block glyph `▀` paints the
//! top half of a cell in the foreground color and the bottom half in the
//! background color. Two vertically stacked RGBA pixels therefore resolve
//! to one cell, doubling the effective vertical resolution of a raster.
//!
//! Resolution per cell:
//!
//! | top visible | bottom visible | glyph | fg | bg |
//! |-------------|----------------|-------|----|----|
//! | no  | no  | space | -      | untouched |
//! | yes | no  | `▀`   | top    | untouched |
//! | no  | yes | `▄`   | bottom | untouched |
//! | yes | yes, same color | `█` | color | - |
//! | yes | yes | `▀`   | top    | bottom |
//!
//! Encoding is a pure function of the source pixels: identical input
//! rasters produce identical cells.

use crate::buffer::{OptimizedBuffer, SampleMode};
use crate::cell::{Cell, CellAttrs, CellContent, PackedRgba};

/// Alpha threshold below which a pixel reads as "not there".
const VISIBLE_ALPHA: u8 = 8;

/// Upper half block.
const UPPER: char = '▀';
/// Lower half block.
const LOWER: char = '▄';
/// Full block.
const FULL: char = '█';

/// An RGBA pixel in a raster handed to the encoder, 8 bits per channel.
pub type RasterPixel = [u8; 4];

fn pixel_color(p: RasterPixel) -> PackedRgba {
    PackedRgba::rgba(p[0], p[1], p[2], p[3])
}

fn visible(p: RasterPixel) -> bool {
    p[3] >= VISIBLE_ALPHA
}

/// Average two pixels channel-wise (used by [`SampleMode::Standard`] when
/// both halves are visible but the terminal cell budget forces one color).
fn average(a: RasterPixel, b: RasterPixel) -> RasterPixel {
    [
        ((a[0] as u16 + b[0] as u16) / 2) as u8,
        ((a[1] as u16 + b[1] as u16) / 2) as u8,
        ((a[2] as u16 + b[2] as u16) / 2) as u8,
        ((a[3] as u16 + b[3] as u16) / 2) as u8,
    ]
}

impl OptimizedBuffer {
    /// Encode an RGBA raster into half-block cells at `(dst_x, dst_y)`.
    ///
    /// `pixels` is row-major, `src_w` wide. In [`SampleMode::Standard`] the
    /// raster covers `src_h / 2` cell rows (odd trailing rows are treated
    /// as having a transparent bottom half); in [`SampleMode::PreSqueezed`]
    /// the caller already collapsed vertical pairs and each raster row is
    /// one cell row.
    ///
    /// Cells whose both halves are invisible are left untouched, so a
    /// sprite with transparent regions composites over existing content.
    pub fn super_sample_blit(
        &mut self,
        pixels: &[RasterPixel],
        src_w: usize,
        src_h: usize,
        dst_x: u16,
        dst_y: u16,
        mode: SampleMode,
    ) {
        if src_w == 0 || src_h == 0 || pixels.len() < src_w * src_h {
            return;
        }

        let cell_rows = match mode {
            SampleMode::Standard => src_h.div_ceil(2),
            SampleMode::PreSqueezed => src_h,
        };

        for cy in 0..cell_rows {
            let y = dst_y.saturating_add(cy as u16);
            if y >= self.height() {
                break;
            }
            for cx in 0..src_w {
                let x = dst_x.saturating_add(cx as u16);
                if x >= self.width() {
                    break;
                }

                let (top, bottom) = match mode {
                    SampleMode::Standard => {
                        let top = pixels[cy * 2 * src_w + cx];
                        let bottom = if cy * 2 + 1 < src_h {
                            pixels[(cy * 2 + 1) * src_w + cx]
                        } else {
                            [0, 0, 0, 0]
                        };
                        (top, bottom)
                    }
                    SampleMode::PreSqueezed => (pixels[cy * src_w + cx], [0, 0, 0, 0]),
                };

                if let Some(cell) = resolve_cell(top, bottom, self.get(x, y)) {
                    self.set_raw(x, y, cell);
                }
            }
        }
    }
}

/// Resolve one (top, bottom) pixel pair to a cell, or `None` to leave the
/// destination untouched.
fn resolve_cell(top: RasterPixel, bottom: RasterPixel, existing: Option<&Cell>) -> Option<Cell> {
    let existing_bg = existing.map_or(PackedRgba::TRANSPARENT, |c| c.bg);
    let top_vis = visible(top);
    let bottom_vis = visible(bottom);

    let cell = match (top_vis, bottom_vis) {
        (false, false) => return None,
        (true, false) => Cell {
            content: CellContent::from_char(UPPER),
            fg: pixel_color(top),
            bg: existing_bg,
            attrs: CellAttrs::NONE,
        },
        (false, true) => Cell {
            content: CellContent::from_char(LOWER),
            fg: pixel_color(bottom),
            bg: existing_bg,
            attrs: CellAttrs::NONE,
        },
        (true, true) => {
            let top_color = pixel_color(top);
            let bottom_color = pixel_color(bottom);
            if top_color == bottom_color {
                Cell {
                    content: CellContent::from_char(FULL),
                    fg: pixel_color(average(top, bottom)),
                    bg: existing_bg,
                    attrs: CellAttrs::NONE,
                }
            } else {
                Cell {
                    content: CellContent::from_char(UPPER),
                    fg: top_color,
                    bg: bottom_color,
                    attrs: CellAttrs::NONE,
                }
            }
        }
    };

    Some(cell)
}

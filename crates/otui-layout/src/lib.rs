#![forbid(unsafe_code)]

//! Flexbox layout for terminal cells.
//!
//! One call solves one container level: given the container's content
//! area, the styles of its children, and a measure callback for intrinsic
//! sizes, [`solve`] returns a rectangle per child. A scene tree lays
//! itself out by solving top-down, each node handing its children the
//! rect it was given.
//!
//! The supported subset is the common core of CSS flexbox:
//!
//! - direction row / column
//! - grow, shrink, basis (auto, cells, percent)
//! - gap, padding, per-item margin
//! - `align-items` start / center / end / stretch (+ per-item override)
//! - `justify-content` start / center / end / space-between
//! - min/max clamping on both axes
//! - absolute positioning against the container's content box
//!
//! # Failure semantics
//!
//! Non-finite percentages are a [`LayoutError`]; the caller keeps its
//! previous layout and flags the node rather than emitting a partial
//! result. All arithmetic saturates at the cell grid's bounds, so the
//! solver itself never panics.

use otui_core::geometry::{Rect, Sides, Size};

/// Main-axis direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlexDirection {
    /// Main axis is horizontal.
    #[default]
    Row,
    /// Main axis is vertical.
    Column,
}

/// Cross-axis alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlignItems {
    /// Pack at the cross-axis start.
    #[default]
    Start,
    /// Center on the cross axis.
    Center,
    /// Pack at the cross-axis end.
    End,
    /// Fill the container's cross size.
    Stretch,
}

/// Main-axis free-space distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JustifyContent {
    /// Pack at the main-axis start.
    #[default]
    Start,
    /// Center on the main axis.
    Center,
    /// Pack at the main-axis end.
    End,
    /// Distribute leftover space between items.
    SpaceBetween,
}

/// A size specification on one axis.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Dimension {
    /// Derive from content (measure) or stretch.
    #[default]
    Auto,
    /// Fixed number of cells.
    Cells(u16),
    /// Percentage of the container's content size on that axis (0–100).
    Percent(f32),
}

/// In-flow or absolutely positioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Position {
    /// Participates in flex flow.
    #[default]
    Relative,
    /// Removed from flow; placed against the content box via [`Inset`].
    Absolute,
}

/// Offsets for absolutely positioned items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Inset {
    pub left: Option<u16>,
    pub top: Option<u16>,
    pub right: Option<u16>,
    pub bottom: Option<u16>,
}

/// Container-level layout attributes.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ContainerStyle {
    pub direction: FlexDirection,
    pub padding: Sides,
    pub gap: u16,
    pub align_items: AlignItems,
    pub justify_content: JustifyContent,
}

/// Per-item layout attributes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemStyle {
    pub width: Dimension,
    pub height: Dimension,
    /// Main-axis basis; `Auto` falls back to the main-axis dimension,
    /// then to the measure callback.
    pub basis: Dimension,
    pub grow: f32,
    pub shrink: f32,
    pub min_width: Option<u16>,
    pub max_width: Option<u16>,
    pub min_height: Option<u16>,
    pub max_height: Option<u16>,
    pub margin: Sides,
    pub align_self: Option<AlignItems>,
    pub position: Position,
    pub inset: Inset,
}

impl Default for ItemStyle {
    fn default() -> Self {
        Self {
            width: Dimension::Auto,
            height: Dimension::Auto,
            basis: Dimension::Auto,
            grow: 0.0,
            shrink: 1.0,
            min_width: None,
            max_width: None,
            min_height: None,
            max_height: None,
            margin: Sides::default(),
            align_self: None,
            position: Position::Relative,
            inset: Inset::default(),
        }
    }
}

/// Layout failure: the previous layout should be kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutError {
    /// A percentage or flex factor was NaN or infinite.
    NonFiniteConstraint,
}

impl std::fmt::Display for LayoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonFiniteConstraint => write!(f, "non-finite layout constraint"),
        }
    }
}

impl std::error::Error for LayoutError {}

/// Solve one container level.
///
/// `measure(index, available)` reports an item's intrinsic size within
/// `available`; it is consulted for `Auto` dimensions on leaf content.
/// Returned rects are in the same coordinate space as `area` and clipped
/// to the cell grid (saturating, never panicking).
pub fn solve(
    container: &ContainerStyle,
    area: Rect,
    items: &[ItemStyle],
    mut measure: impl FnMut(usize, Size) -> Size,
) -> Result<Vec<Rect>, LayoutError> {
    validate(container, items)?;

    let content = area.inner(container.padding);
    let horizontal = container.direction == FlexDirection::Row;
    let main_size = if horizontal { content.width } else { content.height } as i64;
    let cross_size = if horizontal { content.height } else { content.width } as i64;

    let mut rects = vec![Rect::default(); items.len()];

    // ----- pass 1: main-axis base sizes of in-flow items -----

    struct Flow {
        index: usize,
        main: i64,
        min_main: i64,
        max_main: i64,
        grow: f64,
        shrink: f64,
        frozen: bool,
    }

    let mut flow: Vec<Flow> = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        if item.position == Position::Absolute {
            continue;
        }

        let main_dim = match item.basis {
            Dimension::Auto => main_axis_dim(item, horizontal),
            other => other,
        };
        let available = Size::new(content.width, content.height);
        let main = match main_dim {
            Dimension::Cells(v) => i64::from(v),
            Dimension::Percent(p) => percent_of(main_size, p),
            Dimension::Auto => {
                let measured = measure(i, available);
                i64::from(if horizontal { measured.width } else { measured.height })
            }
        };

        let (min_main, max_main) = main_axis_bounds(item, horizontal);
        flow.push(Flow {
            index: i,
            main: main.clamp(min_main, max_main),
            min_main,
            max_main,
            grow: f64::from(item.grow.max(0.0)),
            shrink: f64::from(item.shrink.max(0.0)),
            frozen: false,
        });
    }

    // ----- pass 2: distribute free space -----

    let gaps = i64::from(container.gap) * flow.len().saturating_sub(1) as i64;
    let margins: i64 = flow
        .iter()
        .map(|f| main_margin(&items[f.index], horizontal))
        .sum();

    let used: i64 = flow.iter().map(|f| f.main).sum::<i64>() + gaps + margins;
    let mut free = main_size - used;

    // Grow or shrink, freezing items that hit a bound and redistributing.
    for _ in 0..items.len().max(1) {
        let (factor_sum, any_open): (f64, bool) = flow.iter().filter(|f| !f.frozen).fold(
            (0.0, false),
            |(sum, _), f| {
                let factor = if free > 0 { f.grow } else { f.shrink };
                (sum + factor, true)
            },
        );
        if free == 0 || !any_open || factor_sum <= 0.0 {
            break;
        }

        let mut distributed = 0i64;
        let mut clamped = false;
        let share_base = free as f64;
        for f in flow.iter_mut().filter(|f| !f.frozen) {
            let factor = if free > 0 { f.grow } else { f.shrink };
            if factor <= 0.0 {
                f.frozen = true;
                continue;
            }
            let delta = (share_base * factor / factor_sum).round() as i64;
            let target = f.main + delta;
            let bounded = target.clamp(f.min_main, f.max_main);
            if bounded != target {
                clamped = true;
                f.frozen = true;
            }
            distributed += bounded - f.main;
            f.main = bounded;
        }

        free -= distributed;
        if !clamped {
            break;
        }
    }

    // ----- pass 3: positions (justify) and cross axis -----

    let leftover = (main_size
        - flow.iter().map(|f| f.main).sum::<i64>()
        - gaps
        - margins)
        .max(0);
    let (mut cursor, between) = match container.justify_content {
        JustifyContent::Start => (0i64, 0i64),
        JustifyContent::Center => (leftover / 2, 0),
        JustifyContent::End => (leftover, 0),
        JustifyContent::SpaceBetween => {
            if flow.len() > 1 {
                (0, leftover / (flow.len() as i64 - 1))
            } else {
                (0, 0)
            }
        }
    };

    for (pos, f) in flow.iter().enumerate() {
        let item = &items[f.index];
        let align = item.align_self.unwrap_or(container.align_items);
        let cross_margin = cross_margin(item, horizontal);

        // Cross size: explicit dimension, stretch, or measured.
        let cross_dim = cross_axis_dim(item, horizontal);
        let mut cross = match cross_dim {
            Dimension::Cells(v) => i64::from(v),
            Dimension::Percent(p) => percent_of(cross_size, p),
            Dimension::Auto => {
                if align == AlignItems::Stretch {
                    cross_size - cross_margin
                } else {
                    let avail = if horizontal {
                        Size::new(f.main.max(0) as u16, content.height)
                    } else {
                        Size::new(content.width, f.main.max(0) as u16)
                    };
                    let measured = measure(f.index, avail);
                    i64::from(if horizontal {
                        measured.height
                    } else {
                        measured.width
                    })
                }
            }
        };
        let (min_cross, max_cross) = cross_axis_bounds(item, horizontal);
        cross = cross.clamp(min_cross, max_cross);

        let cross_offset = match align {
            AlignItems::Start | AlignItems::Stretch => 0,
            AlignItems::Center => ((cross_size - cross - cross_margin) / 2).max(0),
            AlignItems::End => (cross_size - cross - cross_margin).max(0),
        };

        let main_start = cursor
            + i64::from(if horizontal {
                item.margin.left
            } else {
                item.margin.top
            });
        let cross_start = cross_offset
            + i64::from(if horizontal {
                item.margin.top
            } else {
                item.margin.left
            });

        rects[f.index] = place(
            content,
            horizontal,
            main_start,
            cross_start,
            f.main,
            cross,
        );

        cursor = main_start
            + f.main
            + i64::from(if horizontal {
                item.margin.right
            } else {
                item.margin.bottom
            })
            + i64::from(container.gap)
            + if pos + 1 < flow.len() { between } else { 0 };
    }

    // ----- absolute items -----

    for (i, item) in items.iter().enumerate() {
        if item.position != Position::Absolute {
            continue;
        }
        rects[i] = place_absolute(content, item, &mut measure, i);
    }

    Ok(rects)
}

fn validate(container: &ContainerStyle, items: &[ItemStyle]) -> Result<(), LayoutError> {
    let _ = container;
    for item in items {
        for dim in [item.width, item.height, item.basis] {
            if let Dimension::Percent(p) = dim {
                if !p.is_finite() {
                    return Err(LayoutError::NonFiniteConstraint);
                }
            }
        }
        if !item.grow.is_finite() || !item.shrink.is_finite() {
            return Err(LayoutError::NonFiniteConstraint);
        }
    }
    Ok(())
}

fn percent_of(total: i64, p: f32) -> i64 {
    ((total as f64) * f64::from(p.clamp(0.0, 100.0)) / 100.0).round() as i64
}

fn main_axis_dim(item: &ItemStyle, horizontal: bool) -> Dimension {
    if horizontal { item.width } else { item.height }
}

fn cross_axis_dim(item: &ItemStyle, horizontal: bool) -> Dimension {
    if horizontal { item.height } else { item.width }
}

fn main_axis_bounds(item: &ItemStyle, horizontal: bool) -> (i64, i64) {
    let (min, max) = if horizontal {
        (item.min_width, item.max_width)
    } else {
        (item.min_height, item.max_height)
    };
    sanitize_bounds(min, max)
}

fn cross_axis_bounds(item: &ItemStyle, horizontal: bool) -> (i64, i64) {
    let (min, max) = if horizontal {
        (item.min_height, item.max_height)
    } else {
        (item.min_width, item.max_width)
    };
    sanitize_bounds(min, max)
}

/// Contradictory min/max resolve with min winning, as in CSS.
fn sanitize_bounds(min: Option<u16>, max: Option<u16>) -> (i64, i64) {
    let min = min.map_or(0, i64::from);
    let max = max.map_or(i64::from(u16::MAX), i64::from);
    (min, max.max(min))
}

fn main_margin(item: &ItemStyle, horizontal: bool) -> i64 {
    i64::from(if horizontal {
        item.margin.horizontal_sum()
    } else {
        item.margin.vertical_sum()
    })
}

fn cross_margin(item: &ItemStyle, horizontal: bool) -> i64 {
    i64::from(if horizontal {
        item.margin.vertical_sum()
    } else {
        item.margin.horizontal_sum()
    })
}

/// Convert main/cross coordinates into a clamped rect within `content`.
fn place(
    content: Rect,
    horizontal: bool,
    main_start: i64,
    cross_start: i64,
    main: i64,
    cross: i64,
) -> Rect {
    let (x_off, y_off, w, h) = if horizontal {
        (main_start, cross_start, main, cross)
    } else {
        (cross_start, main_start, cross, main)
    };

    let x = i64::from(content.x) + x_off.max(0);
    let y = i64::from(content.y) + y_off.max(0);
    Rect {
        x: x.clamp(0, i64::from(u16::MAX)) as u16,
        y: y.clamp(0, i64::from(u16::MAX)) as u16,
        width: w.clamp(0, i64::from(u16::MAX)) as u16,
        height: h.clamp(0, i64::from(u16::MAX)) as u16,
    }
}

fn place_absolute(
    content: Rect,
    item: &ItemStyle,
    measure: &mut impl FnMut(usize, Size) -> Size,
    index: usize,
) -> Rect {
    let resolve = |dim: Dimension, total: u16, measured: u16| -> u16 {
        match dim {
            Dimension::Cells(v) => v,
            Dimension::Percent(p) => percent_of(i64::from(total), p).clamp(0, i64::from(u16::MAX)) as u16,
            Dimension::Auto => measured,
        }
    };

    let measured = measure(index, Size::new(content.width, content.height));
    let mut width = resolve(item.width, content.width, measured.width);
    let mut height = resolve(item.height, content.height, measured.height);

    // left+right (or top+bottom) with Auto size stretches between them.
    if item.width == Dimension::Auto {
        if let (Some(l), Some(r)) = (item.inset.left, item.inset.right) {
            width = content.width.saturating_sub(l).saturating_sub(r);
        }
    }
    if item.height == Dimension::Auto {
        if let (Some(t), Some(b)) = (item.inset.top, item.inset.bottom) {
            height = content.height.saturating_sub(t).saturating_sub(b);
        }
    }

    // Min wins over a contradictory max, as in CSS.
    width = width
        .min(item.max_width.unwrap_or(u16::MAX))
        .max(item.min_width.unwrap_or(0));
    height = height
        .min(item.max_height.unwrap_or(u16::MAX))
        .max(item.min_height.unwrap_or(0));

    let x = match (item.inset.left, item.inset.right) {
        (Some(l), _) => content.x.saturating_add(l),
        (None, Some(r)) => content
            .right()
            .saturating_sub(r)
            .saturating_sub(width),
        (None, None) => content.x,
    };
    let y = match (item.inset.top, item.inset.bottom) {
        (Some(t), _) => content.y.saturating_add(t),
        (None, Some(b)) => content
            .bottom()
            .saturating_sub(b)
            .saturating_sub(height),
        (None, None) => content.y,
    };

    Rect {
        x,
        y,
        width,
        height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_measure(_: usize, _: Size) -> Size {
        Size::new(0, 0)
    }

    fn fixed(width: u16, height: u16) -> ItemStyle {
        ItemStyle {
            width: Dimension::Cells(width),
            height: Dimension::Cells(height),
            ..Default::default()
        }
    }

    fn grower(grow: f32) -> ItemStyle {
        ItemStyle {
            grow,
            basis: Dimension::Cells(0),
            ..Default::default()
        }
    }

    #[test]
    fn row_places_items_left_to_right() {
        let container = ContainerStyle::default();
        let rects = solve(
            &container,
            Rect::new(0, 0, 20, 5),
            &[fixed(5, 5), fixed(7, 5)],
            no_measure,
        )
        .unwrap();

        assert_eq!(rects[0], Rect::new(0, 0, 5, 5));
        assert_eq!(rects[1], Rect::new(5, 0, 7, 5));
    }

    #[test]
    fn column_stacks_top_to_bottom() {
        let container = ContainerStyle {
            direction: FlexDirection::Column,
            ..Default::default()
        };
        let rects = solve(
            &container,
            Rect::new(0, 0, 10, 10),
            &[fixed(10, 3), fixed(10, 4)],
            no_measure,
        )
        .unwrap();

        assert_eq!(rects[0], Rect::new(0, 0, 10, 3));
        assert_eq!(rects[1], Rect::new(0, 3, 10, 4));
    }

    #[test]
    fn grow_splits_free_space_by_factor() {
        let container = ContainerStyle::default();
        let mut a = grower(1.0);
        let mut b = grower(3.0);
        a.height = Dimension::Cells(1);
        b.height = Dimension::Cells(1);

        let rects = solve(&container, Rect::new(0, 0, 40, 1), &[a, b], no_measure).unwrap();
        assert_eq!(rects[0].width, 10);
        assert_eq!(rects[1].width, 30);
        assert_eq!(rects[1].x, 10);
    }

    #[test]
    fn shrink_resolves_overflow() {
        let container = ContainerStyle::default();
        let rects = solve(
            &container,
            Rect::new(0, 0, 10, 1),
            &[fixed(8, 1), fixed(8, 1)],
            no_measure,
        )
        .unwrap();

        // 16 cells of content into 10: each shrinks by 3.
        assert_eq!(rects[0].width + rects[1].width, 10);
        assert_eq!(rects[1].x, rects[0].width);
    }

    #[test]
    fn min_width_blocks_shrink_and_redistributes() {
        let container = ContainerStyle::default();
        let mut pinned = fixed(8, 1);
        pinned.min_width = Some(8);
        let rects = solve(
            &container,
            Rect::new(0, 0, 10, 1),
            &[pinned, fixed(8, 1)],
            no_measure,
        )
        .unwrap();

        assert_eq!(rects[0].width, 8);
        assert_eq!(rects[1].width, 2);
    }

    #[test]
    fn max_width_caps_growth() {
        let container = ContainerStyle::default();
        let mut capped = grower(1.0);
        capped.max_width = Some(5);
        capped.height = Dimension::Cells(1);
        let mut open = grower(1.0);
        open.height = Dimension::Cells(1);

        let rects = solve(
            &container,
            Rect::new(0, 0, 20, 1),
            &[capped, open],
            no_measure,
        )
        .unwrap();

        assert_eq!(rects[0].width, 5);
        assert_eq!(rects[1].width, 15);
    }

    #[test]
    fn gap_separates_items() {
        let container = ContainerStyle {
            gap: 2,
            ..Default::default()
        };
        let rects = solve(
            &container,
            Rect::new(0, 0, 20, 1),
            &[fixed(4, 1), fixed(4, 1), fixed(4, 1)],
            no_measure,
        )
        .unwrap();

        assert_eq!(rects[0].x, 0);
        assert_eq!(rects[1].x, 6);
        assert_eq!(rects[2].x, 12);
    }

    #[test]
    fn padding_insets_content() {
        let container = ContainerStyle {
            padding: Sides::all(2),
            ..Default::default()
        };
        let rects = solve(
            &container,
            Rect::new(0, 0, 20, 10),
            &[fixed(5, 5)],
            no_measure,
        )
        .unwrap();

        assert_eq!(rects[0], Rect::new(2, 2, 5, 5));
    }

    #[test]
    fn margin_offsets_item() {
        let container = ContainerStyle::default();
        let mut item = fixed(5, 2);
        item.margin = Sides::new(1, 0, 0, 3);
        let rects = solve(&container, Rect::new(0, 0, 20, 10), &[item], no_measure).unwrap();
        assert_eq!(rects[0], Rect::new(3, 1, 5, 2));
    }

    #[test]
    fn justify_center_and_end() {
        let container = ContainerStyle {
            justify_content: JustifyContent::Center,
            ..Default::default()
        };
        let rects = solve(&container, Rect::new(0, 0, 10, 1), &[fixed(4, 1)], no_measure).unwrap();
        assert_eq!(rects[0].x, 3);

        let container = ContainerStyle {
            justify_content: JustifyContent::End,
            ..Default::default()
        };
        let rects = solve(&container, Rect::new(0, 0, 10, 1), &[fixed(4, 1)], no_measure).unwrap();
        assert_eq!(rects[0].x, 6);
    }

    #[test]
    fn justify_space_between() {
        let container = ContainerStyle {
            justify_content: JustifyContent::SpaceBetween,
            ..Default::default()
        };
        let rects = solve(
            &container,
            Rect::new(0, 0, 12, 1),
            &[fixed(3, 1), fixed(3, 1)],
            no_measure,
        )
        .unwrap();

        assert_eq!(rects[0].x, 0);
        assert_eq!(rects[1].x, 9);
    }

    #[test]
    fn align_items_variants() {
        let base = Rect::new(0, 0, 10, 6);
        for (align, expected_y) in [
            (AlignItems::Start, 0),
            (AlignItems::Center, 2),
            (AlignItems::End, 4),
        ] {
            let container = ContainerStyle {
                align_items: align,
                ..Default::default()
            };
            let rects = solve(&container, base, &[fixed(4, 2)], no_measure).unwrap();
            assert_eq!(rects[0].y, expected_y, "align {align:?}");
        }
    }

    #[test]
    fn stretch_fills_cross_axis() {
        let container = ContainerStyle {
            align_items: AlignItems::Stretch,
            ..Default::default()
        };
        let item = ItemStyle {
            width: Dimension::Cells(4),
            ..Default::default()
        };
        let rects = solve(&container, Rect::new(0, 0, 10, 6), &[item], no_measure).unwrap();
        assert_eq!(rects[0].height, 6);
    }

    #[test]
    fn align_self_overrides_container() {
        let container = ContainerStyle {
            align_items: AlignItems::Start,
            ..Default::default()
        };
        let mut item = fixed(4, 2);
        item.align_self = Some(AlignItems::End);
        let rects = solve(&container, Rect::new(0, 0, 10, 6), &[item], no_measure).unwrap();
        assert_eq!(rects[0].y, 4);
    }

    #[test]
    fn percent_dimensions_resolve_against_content() {
        let container = ContainerStyle::default();
        let item = ItemStyle {
            width: Dimension::Percent(50.0),
            height: Dimension::Cells(1),
            ..Default::default()
        };
        let rects = solve(&container, Rect::new(0, 0, 40, 1), &[item], no_measure).unwrap();
        assert_eq!(rects[0].width, 20);
    }

    #[test]
    fn measure_supplies_intrinsic_size() {
        let container = ContainerStyle::default();
        let item = ItemStyle::default();
        let rects = solve(&container, Rect::new(0, 0, 40, 5), &[item], |_, _| {
            Size::new(11, 2)
        })
        .unwrap();
        assert_eq!(rects[0].width, 11);
        assert_eq!(rects[0].height, 2);
    }

    #[test]
    fn absolute_positions_against_content_box() {
        let container = ContainerStyle {
            padding: Sides::all(1),
            ..Default::default()
        };
        let item = ItemStyle {
            position: Position::Absolute,
            width: Dimension::Cells(3),
            height: Dimension::Cells(2),
            inset: Inset {
                left: Some(2),
                top: Some(1),
                ..Default::default()
            },
            ..Default::default()
        };
        let rects = solve(&container, Rect::new(0, 0, 20, 10), &[item], no_measure).unwrap();
        assert_eq!(rects[0], Rect::new(3, 2, 3, 2));
    }

    #[test]
    fn absolute_right_bottom_anchoring() {
        let container = ContainerStyle::default();
        let item = ItemStyle {
            position: Position::Absolute,
            width: Dimension::Cells(4),
            height: Dimension::Cells(2),
            inset: Inset {
                right: Some(1),
                bottom: Some(1),
                ..Default::default()
            },
            ..Default::default()
        };
        let rects = solve(&container, Rect::new(0, 0, 20, 10), &[item], no_measure).unwrap();
        assert_eq!(rects[0], Rect::new(15, 7, 4, 2));
    }

    #[test]
    fn absolute_items_do_not_consume_flow_space() {
        let container = ContainerStyle::default();
        let abs = ItemStyle {
            position: Position::Absolute,
            width: Dimension::Cells(5),
            height: Dimension::Cells(5),
            ..Default::default()
        };
        let rects = solve(
            &container,
            Rect::new(0, 0, 10, 5),
            &[abs, fixed(4, 1)],
            no_measure,
        )
        .unwrap();
        assert_eq!(rects[1].x, 0, "flow item ignores the absolute sibling");
    }

    #[test]
    fn nan_percent_is_an_error() {
        let container = ContainerStyle::default();
        let item = ItemStyle {
            width: Dimension::Percent(f32::NAN),
            ..Default::default()
        };
        assert_eq!(
            solve(&container, Rect::new(0, 0, 10, 5), &[item], no_measure),
            Err(LayoutError::NonFiniteConstraint)
        );
    }

    #[test]
    fn zero_area_container_yields_zero_rects() {
        let container = ContainerStyle::default();
        let rects = solve(&container, Rect::default(), &[grower(1.0)], no_measure).unwrap();
        assert_eq!(rects[0].width, 0);
    }

    #[test]
    fn widths_never_go_negative() {
        // Content smaller than margins + gaps: widths clamp at zero.
        let container = ContainerStyle {
            gap: 5,
            ..Default::default()
        };
        let mut item = fixed(2, 1);
        item.margin = Sides::all(3);
        let rects = solve(
            &container,
            Rect::new(0, 0, 4, 4),
            &[item, item],
            no_measure,
        )
        .unwrap();
        for rect in rects {
            assert!(rect.width <= 4);
        }
    }
}

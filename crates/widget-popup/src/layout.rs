//! Pure popup placement.
//!
//! Everything here works on host coordinates and has no access to nodes;
//! the popup controller measures, calls [`resolve`] and hands the result to
//! the host.

use widget_graphics::{Point, Rect, Size};

use crate::side::{Align, Axis, Side};

/// Tunables for popup placement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PopupConfig {
    /// Distance kept from every viewport edge.
    pub margin: f32,
}

impl PopupConfig {
    pub fn with_margin(mut self, margin: f32) -> Self {
        self.margin = margin.max(0.0);
        self
    }
}

impl Default for PopupConfig {
    fn default() -> Self {
        Self { margin: 10.0 }
    }
}

/// Final popup coordinates plus the side and alignment actually used.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    pub x: f32,
    pub y: f32,
    pub side: Side,
    pub align: Align,
}

impl Placement {
    pub fn rect(&self, size: Size) -> Rect {
        Rect::new(self.x, self.y, size.width, size.height)
    }
}

/// Top-left corner of a `size` popup attached to `target` on `side`,
/// shifted along the cross axis by `align`.
pub fn layout(target: Rect, size: Size, side: Side, align: Align) -> Point {
    let (w, h) = (size.width, size.height);
    let (tx1, ty1, tx2, ty2) = (target.x, target.y, target.right(), target.bottom());
    let (x, y) = match side {
        Side::Right => (tx2, ty1),
        Side::Left => (tx1 - w, ty1),
        Side::Top => (tx1, ty1 - h),
        Side::Bottom => (tx1, ty2),
        Side::InnerRight => (tx2 - w, ty1),
        Side::InnerLeft | Side::InnerTop => (tx1, ty1),
        Side::InnerBottom => (tx1, ty2 - h),
        Side::InnerCenter => (
            tx1 + (target.width - w) / 2.0,
            ty1 + (target.height - h) / 2.0,
        ),
    };

    let Some(axis) = side.axis() else {
        return Point::new(x, y);
    };
    let slack = match axis {
        Axis::Vertical => target.width - w,
        Axis::Horizontal => target.height - h,
    };
    let shift = match align {
        Align::Start => 0.0,
        Align::Center => slack / 2.0,
        Align::End => slack,
    };
    match axis {
        Axis::Vertical => Point::new(x + shift, y),
        Axis::Horizontal => Point::new(x, y + shift),
    }
}

fn overflows(bounds: &Rect, origin: Point, size: Size, axis: Axis) -> bool {
    match axis {
        Axis::Horizontal => origin.x < bounds.x || origin.x + size.width > bounds.right(),
        Axis::Vertical => origin.y < bounds.y || origin.y + size.height > bounds.bottom(),
    }
}

fn cross(axis: Axis) -> Axis {
    match axis {
        Axis::Horizontal => Axis::Vertical,
        Axis::Vertical => Axis::Horizontal,
    }
}

// Keeps the popup inside `bounds`; when it cannot fit, the top-left edge
// stays visible.
fn clamp(bounds: &Rect, origin: Point, size: Size) -> Point {
    let x = origin.x.min(bounds.right() - size.width).max(bounds.x);
    let y = origin.y.min(bounds.bottom() - size.height).max(bounds.y);
    Point::new(x, y)
}

/// Places a `size` popup next to `target` inside `viewport`.
///
/// If the requested side overflows on its axis the opposite side is tried
/// once, and if a start/end alignment overflows on the cross axis the other
/// alignment is tried once. A flip is only kept when it fits; whatever
/// overflow remains is clamped away. Resolving again from the returned side
/// and alignment yields the same placement.
pub fn resolve(
    target: Rect,
    size: Size,
    viewport: Rect,
    side: Side,
    align: Align,
    config: &PopupConfig,
) -> Placement {
    let bounds = viewport.inset(config.margin);
    let (mut side, mut align) = (side, align);
    let mut origin = layout(target, size, side, align);

    if let (Some(axis), Some(flipped)) = (side.axis(), side.flipped()) {
        if overflows(&bounds, origin, size, axis) {
            let candidate = layout(target, size, flipped, align);
            if !overflows(&bounds, candidate, size, axis) {
                side = flipped;
                origin = candidate;
            }
        }
    }

    if let (Some(axis), Some(flipped)) = (side.axis(), align.flipped()) {
        let axis = cross(axis);
        if overflows(&bounds, origin, size, axis) {
            let candidate = layout(target, size, side, flipped);
            if !overflows(&bounds, candidate, size, axis) {
                align = flipped;
                origin = candidate;
            }
        }
    }

    let origin = clamp(&bounds, origin, size);
    Placement {
        x: origin.x,
        y: origin.y,
        side,
        align,
    }
}

#[cfg(test)]
#[path = "tests/layout_tests.rs"]
mod tests;

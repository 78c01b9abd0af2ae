//! Pure geometry for the widget runtime.
//!
//! Rectangles here use the host's coordinate space: `x` grows to the right,
//! `y` grows downwards and the origin is the viewport's top-left corner.

mod geometry;

pub use geometry::*;

pub mod prelude {
    pub use crate::geometry::{Point, Rect, Size};
}

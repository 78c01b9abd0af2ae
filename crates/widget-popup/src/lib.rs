//! Popups for the widget runtime: nodes positioned next to a target node
//! instead of inside the normal layout flow.

mod layout;
mod popup;
mod side;

pub use layout::{layout, resolve, Placement, PopupConfig};
pub use popup::{
    make_popup, PopupController, PopupHost, POPUP_ALIGN, POPUP_FIXED, POPUP_OX, POPUP_OY, POPUP_SIDE,
    POPUP_TARGET_RECT, POPUP_X1, POPUP_X2, POPUP_Y1, POPUP_Y2,
};
pub use side::{Align, Axis, ParseError, Side};

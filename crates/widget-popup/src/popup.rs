//! Popup behavior for widget nodes.
//!
//! [`make_popup`] turns a node into a popup: it installs the private
//! `popup_*` props and a controller that measures the popup and its target
//! during the measure phase and places the popup during the position phase.
//! The target is the node's positioning anchor, so the scheduler always
//! lays the target out first. While bound, the popup is positioned again
//! whenever its target finishes an update or the host reports a layout
//! change.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use widget_core::{
    EventKind, ListenerId, Measurable, Node, ObserverId, Positionable, PropSpec, Value, WeakNode,
    WidgetError,
};
use widget_graphics::{Point, Rect, Size};

use crate::layout::{resolve, Placement, PopupConfig};
use crate::side::{Align, Side};

pub const POPUP_SIDE: &str = "popup_side";
pub const POPUP_ALIGN: &str = "popup_align";
pub const POPUP_OX: &str = "popup_ox";
pub const POPUP_OY: &str = "popup_oy";
pub const POPUP_FIXED: &str = "popup_fixed";
pub const POPUP_X1: &str = "popup_x1";
pub const POPUP_Y1: &str = "popup_y1";
pub const POPUP_X2: &str = "popup_x2";
pub const POPUP_Y2: &str = "popup_y2";
pub const POPUP_TARGET_RECT: &str = "popup_target_rect";

/// What the popup needs from the host's layout engine.
pub trait PopupHost {
    /// Laid-out rectangle of `node` in viewport coordinates, `None` while the
    /// node is hidden.
    fn rect(&self, node: &Node) -> Option<Rect>;

    fn viewport(&self) -> Rect;

    /// Viewport position of the context `node` is placed in.
    fn context_origin(&self, _node: &Node) -> Point {
        Point::ZERO
    }

    /// Document scroll, added to the coordinates of `popup_fixed` popups.
    fn scroll_offset(&self) -> Point {
        Point::ZERO
    }

    /// Receives the final coordinates, relative to the context origin.
    fn place(&self, node: &Node, placement: &Placement);
}

#[derive(Clone, Copy, Debug)]
struct Measurement {
    popup: Size,
    target: Rect,
    viewport: Rect,
    origin: Point,
    scroll: Point,
}

struct TargetWatch {
    target: WeakNode,
    observer: ObserverId,
}

/// Measure/position hooks of one popup node.
pub struct PopupController {
    host: Rc<dyn PopupHost>,
    config: PopupConfig,
    measured: Cell<Option<Measurement>>,
    placement: Cell<Option<Placement>>,
    watch: RefCell<Option<TargetWatch>>,
    layout_listener: Cell<Option<ListenerId>>,
}

impl PopupController {
    /// Placement reported to the host by the last position phase.
    pub fn placement(&self) -> Option<Placement> {
        self.placement.get()
    }

    pub fn config(&self) -> PopupConfig {
        self.config
    }

    /// Re-anchors `popup` to `target`, or to its tree parent with `None`.
    pub fn set_target(&self, popup: &Node, target: Option<&Node>) {
        popup.set_anchor(target);
        if popup.is_bound() {
            self.watch_target(popup);
        }
        popup.position();
    }

    fn set_bound(&self, popup: &Node, on: bool) {
        if on {
            self.watch_target(popup);
            if self.layout_listener.get().is_none() {
                if let Some(runtime) = popup.runtime() {
                    let weak = popup.downgrade();
                    let listener = runtime.listen_all(EventKind::LayoutChanged, move |_| {
                        if let Some(popup) = weak.upgrade() {
                            popup.position();
                        }
                    });
                    self.layout_listener.set(Some(listener));
                }
            }
        } else {
            self.unwatch_target();
            if let (Some(listener), Some(runtime)) =
                (self.layout_listener.take(), popup.runtime())
            {
                runtime.unlisten(listener);
            }
        }
    }

    // Observes updates of the current positioning parent.
    fn watch_target(&self, popup: &Node) {
        let target = popup.positioning_parent();
        let watched = self
            .watch
            .borrow()
            .as_ref()
            .and_then(|watch| watch.target.upgrade());
        if watched == target {
            return;
        }
        self.unwatch_target();
        let Some(target) = target else {
            return;
        };
        let weak = popup.downgrade();
        let observer = target.observe_updates(move |target| {
            if let Some(popup) = weak.upgrade() {
                if popup.positioning_parent().as_ref() == Some(target) {
                    popup.position();
                }
            }
        });
        log::trace!("popup {popup:?} follows {target:?}");
        *self.watch.borrow_mut() = Some(TargetWatch {
            target: target.downgrade(),
            observer,
        });
    }

    fn unwatch_target(&self) {
        let watch = self.watch.borrow_mut().take();
        if let Some(watch) = watch {
            if let Some(target) = watch.target.upgrade() {
                target.unobserve_updates(watch.observer);
            }
        }
    }

    // Sub-rectangle of the target rect selected by popup_x1..popup_y2.
    fn target_span(popup: &Node, target: Rect) -> Rect {
        let read = |name: &str, fallback: f32| {
            popup
                .get_f64(name)
                .map(|value| value as f32)
                .unwrap_or(fallback)
        };
        Rect::from_corners(
            target.x + read(POPUP_X1, 0.0),
            target.y + read(POPUP_Y1, 0.0),
            target.x + read(POPUP_X2, target.width),
            target.y + read(POPUP_Y2, target.height),
        )
    }
}

impl Measurable for PopupController {
    fn do_measure(&self, node: &Node) -> Result<(), WidgetError> {
        if node.is_bound() {
            self.watch_target(node);
        }
        let target = node
            .positioning_parent()
            .and_then(|target| self.host.rect(&target));
        let measured = match (self.host.rect(node), target) {
            (Some(popup), Some(target)) => Some(Measurement {
                popup: popup.size(),
                target: Self::target_span(node, target),
                viewport: self.host.viewport(),
                origin: self.host.context_origin(node),
                scroll: self.host.scroll_offset(),
            }),
            _ => {
                log::trace!("popup {node:?} or its target is hidden");
                None
            }
        };
        self.measured.set(measured);
        Ok(())
    }
}

impl Positionable for PopupController {
    fn do_position(&self, node: &Node) -> Result<(), WidgetError> {
        let Some(measured) = self.measured.get() else {
            return Ok(());
        };
        let side = read_enum::<Side>(node, POPUP_SIDE)?;
        let align = read_enum::<Align>(node, POPUP_ALIGN)?;
        let resolved = resolve(
            measured.target,
            measured.popup,
            measured.viewport,
            side,
            align,
            &self.config,
        );

        let ox = node.get_f64(POPUP_OX).unwrap_or(0.0) as f32;
        let oy = node.get_f64(POPUP_OY).unwrap_or(0.0) as f32;
        let scroll = if node.get_bool(POPUP_FIXED) {
            measured.scroll
        } else {
            Point::ZERO
        };
        let placement = Placement {
            x: resolved.x + ox + scroll.x - measured.origin.x,
            y: resolved.y + oy + scroll.y - measured.origin.y,
            ..resolved
        };
        if (placement.side, placement.align) != (side, align) {
            log::trace!(
                "popup {node:?} moved from {side}/{align} to {}/{}",
                placement.side,
                placement.align
            );
        }
        self.placement.set(Some(placement));
        self.host.place(node, &placement);
        Ok(())
    }
}

fn read_enum<T>(node: &Node, prop: &str) -> Result<T, WidgetError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let text = node.get_str(prop).unwrap_or_default();
    text.parse::<T>()
        .map_err(|err| WidgetError::conversion(prop, err.to_string()))
}

fn enum_prop<T>(default: &str) -> PropSpec
where
    T: std::str::FromStr + std::fmt::Display + 'static,
    T::Err: std::fmt::Display,
{
    PropSpec::new()
        .private()
        .with_default(default)
        .convert(|value, _| {
            let text = value.to_text().ok_or("a value is required")?;
            let parsed = text.parse::<T>().map_err(|err| err.to_string())?;
            Ok(Value::from(parsed.to_string()))
        })
}

/// Makes `node` a popup attached to `target` (its tree parent with `None`).
pub fn make_popup(
    node: &Node,
    target: Option<&Node>,
    side: Side,
    align: Align,
    host: Rc<dyn PopupHost>,
    config: PopupConfig,
) -> Result<Rc<PopupController>, WidgetError> {
    node.prop(POPUP_SIDE, enum_prop::<Side>(side.as_str()))?;
    node.prop(POPUP_ALIGN, enum_prop::<Align>(align.as_str()))?;
    for offset in [POPUP_OX, POPUP_OY] {
        node.prop(offset, PropSpec::new().private().number().with_default(0))?;
    }
    node.prop(POPUP_FIXED, PropSpec::new().private().bool().with_default(false))?;
    for corner in [POPUP_X1, POPUP_Y1, POPUP_X2, POPUP_Y2] {
        node.prop(corner, PropSpec::new().private().number())?;
    }
    node.prop(
        POPUP_TARGET_RECT,
        PropSpec::computed(read_target_rect)
            .private()
            .setter(write_target_rect),
    )?;

    node.set_anchor(target);
    let controller = Rc::new(PopupController {
        host,
        config,
        measured: Cell::new(None),
        placement: Cell::new(None),
        watch: RefCell::new(None),
        layout_listener: Cell::new(None),
    });
    node.add_measurable(controller.clone());
    node.add_positionable(controller.clone());
    let bound = Rc::downgrade(&controller);
    node.on_bind(move |popup, on| {
        if let Some(controller) = bound.upgrade() {
            controller.set_bound(popup, on);
        }
    });
    if node.is_bound() {
        controller.set_bound(node, true);
    }
    log::debug!("{node:?} is a popup ({side}/{align})");
    Ok(controller)
}

const CORNERS: [&str; 4] = [POPUP_X1, POPUP_Y1, POPUP_X2, POPUP_Y2];

fn read_target_rect(node: &Node) -> Value {
    let corners: Vec<Value> = CORNERS.iter().map(|name| node.get(name)).collect();
    if corners.iter().all(Value::is_null) {
        return Value::Null;
    }
    Value::List(corners)
}

// Accepts `[x1, y1, x2, y2]` or null to clear the span.
fn write_target_rect(node: &Node, value: &Value, _previous: &Value) -> Result<(), WidgetError> {
    let corners: Vec<Value> = match value {
        Value::Null => vec![Value::Null; 4],
        Value::List(items) if items.len() == 4 => items.clone(),
        _ => {
            return Err(WidgetError::conversion(
                POPUP_TARGET_RECT,
                "expected four corner coordinates",
            ))
        }
    };
    for (name, corner) in CORNERS.iter().zip(corners) {
        node.set(name, corner)?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/popup_tests.rs"]
mod tests;

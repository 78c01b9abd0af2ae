use super::*;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;
use widget_core::{CreateOptions, DefaultScheduler, NodeKey, Runtime};

#[derive(Default)]
struct FakeHost {
    rects: RefCell<HashMap<NodeKey, Rect>>,
    origin: Point,
    scroll: Point,
    placed: RefCell<Vec<Placement>>,
}

impl FakeHost {
    fn show(&self, node: &Node, rect: Rect) {
        self.rects.borrow_mut().insert(node.key(), rect);
    }
}

impl PopupHost for FakeHost {
    fn rect(&self, node: &Node) -> Option<Rect> {
        self.rects.borrow().get(&node.key()).copied()
    }

    fn viewport(&self) -> Rect {
        Rect::new(0.0, 0.0, 800.0, 600.0)
    }

    fn context_origin(&self, _node: &Node) -> Point {
        self.origin
    }

    fn scroll_offset(&self) -> Point {
        self.scroll
    }

    fn place(&self, _node: &Node, placement: &Placement) {
        self.placed.borrow_mut().push(*placement);
    }
}

struct Fixture {
    runtime: Runtime,
    root: Node,
    anchor: Node,
    popup: Node,
}

fn fixture() -> Fixture {
    let runtime = Runtime::new(Arc::new(DefaultScheduler));
    runtime.register("box", |_| Ok(None)).expect("register");
    let root = runtime.create("box", CreateOptions::new()).expect("root");
    let anchor = runtime.create("box", CreateOptions::new()).expect("anchor");
    let popup = runtime.create("box", CreateOptions::new()).expect("popup");
    root.append_child(&anchor).expect("append");
    root.append_child(&popup).expect("append");
    Fixture {
        runtime,
        root,
        anchor,
        popup,
    }
}

fn install(fixture: &Fixture, host: Rc<FakeHost>, side: Side, align: Align) -> Rc<PopupController> {
    make_popup(
        &fixture.popup,
        Some(&fixture.anchor),
        side,
        align,
        host,
        PopupConfig::default(),
    )
    .expect("make popup")
}

#[test]
fn invalid_side_text_is_a_conversion_failure() {
    let fixture = fixture();
    install(&fixture, Rc::new(FakeHost::default()), Side::Bottom, Align::Start);

    let err = fixture
        .popup
        .set(POPUP_SIDE, "sideways")
        .expect_err("invalid side");
    assert!(matches!(err, WidgetError::ConversionFailure { ref prop, .. } if prop == POPUP_SIDE));
    assert_eq!(fixture.popup.get_str(POPUP_SIDE).as_deref(), Some("bottom"));

    fixture.popup.set(POPUP_ALIGN, "end").expect("valid align");
    assert_eq!(fixture.popup.get_str(POPUP_ALIGN).as_deref(), Some("end"));
}

#[test]
fn offsets_and_context_origin_apply_to_the_final_position() {
    let fixture = fixture();
    let host = Rc::new(FakeHost {
        origin: Point::new(50.0, 20.0),
        ..FakeHost::default()
    });
    host.show(&fixture.anchor, Rect::new(200.0, 100.0, 100.0, 40.0));
    host.show(&fixture.popup, Rect::new(0.0, 0.0, 60.0, 30.0));
    let controller = install(&fixture, host.clone(), Side::Bottom, Align::Start);
    fixture.popup.set(POPUP_OX, 4).expect("ox");
    fixture.popup.set(POPUP_OY, -2).expect("oy");

    fixture.runtime.mount(&fixture.root).expect("mount");
    fixture.runtime.update_all().expect("flush");

    let placement = controller.placement().expect("placed");
    assert_eq!(placement.x, 200.0 + 4.0 - 50.0);
    assert_eq!(placement.y, 140.0 - 2.0 - 20.0);
    assert_eq!(host.placed.borrow().len(), 1);
}

#[test]
fn target_span_narrows_the_anchor_rect() {
    let fixture = fixture();
    let host = Rc::new(FakeHost::default());
    host.show(&fixture.anchor, Rect::new(100.0, 100.0, 300.0, 200.0));
    host.show(&fixture.popup, Rect::new(0.0, 0.0, 40.0, 20.0));
    let controller = install(&fixture, host.clone(), Side::Right, Align::Start);

    fixture
        .popup
        .set(
            POPUP_TARGET_RECT,
            Value::List(vec![10.into(), 20.into(), 60.into(), 50.into()]),
        )
        .expect("span");
    assert_eq!(fixture.popup.get_f64(POPUP_X2), Some(60.0));

    fixture.runtime.mount(&fixture.root).expect("mount");
    fixture.runtime.update_all().expect("flush");
    let placement = controller.placement().expect("placed");
    assert_eq!((placement.x, placement.y), (160.0, 120.0));

    assert!(fixture.popup.set(POPUP_TARGET_RECT, 3).is_err());
    fixture
        .popup
        .set(POPUP_TARGET_RECT, Value::Null)
        .expect("clear span");
    assert!(fixture.popup.get(POPUP_TARGET_RECT).is_null());
}

#[test]
fn hidden_popups_are_not_placed() {
    let fixture = fixture();
    let host = Rc::new(FakeHost::default());
    host.show(&fixture.anchor, Rect::new(100.0, 100.0, 50.0, 50.0));
    let controller = install(&fixture, host.clone(), Side::Top, Align::Center);

    fixture.runtime.mount(&fixture.root).expect("mount");
    fixture.runtime.update_all().expect("flush");
    assert!(controller.placement().is_none());
    assert!(host.placed.borrow().is_empty());
}

#[test]
fn fixed_popups_follow_the_document_scroll() {
    let fixture = fixture();
    let host = Rc::new(FakeHost {
        scroll: Point::new(0.0, 300.0),
        ..FakeHost::default()
    });
    host.show(&fixture.anchor, Rect::new(200.0, 100.0, 100.0, 40.0));
    host.show(&fixture.popup, Rect::new(0.0, 0.0, 60.0, 30.0));
    let controller = install(&fixture, host.clone(), Side::Bottom, Align::Start);
    assert!(!fixture.popup.get_bool(POPUP_FIXED));

    fixture.runtime.mount(&fixture.root).expect("mount");
    fixture.runtime.update_all().expect("flush");
    let placement = controller.placement().expect("placed");
    assert_eq!((placement.x, placement.y), (200.0, 140.0));

    fixture.popup.set(POPUP_FIXED, true).expect("fixed");
    fixture.popup.position();
    fixture.runtime.update_all().expect("flush");
    let placement = controller.placement().expect("placed");
    assert_eq!((placement.x, placement.y), (200.0, 440.0));
}

#[test]
fn anchor_updates_reposition_the_popup() {
    let fixture = fixture();
    let host = Rc::new(FakeHost::default());
    host.show(&fixture.anchor, Rect::new(200.0, 100.0, 100.0, 40.0));
    host.show(&fixture.popup, Rect::new(0.0, 0.0, 60.0, 30.0));
    let controller = install(&fixture, host.clone(), Side::Bottom, Align::Start);
    fixture.runtime.mount(&fixture.root).expect("mount");
    fixture.runtime.update_all().expect("flush");

    host.show(&fixture.anchor, Rect::new(20.0, 10.0, 100.0, 40.0));
    fixture.anchor.update();
    fixture.runtime.update_all().expect("flush");
    let placement = controller.placement().expect("placed");
    assert_eq!((placement.x, placement.y), (20.0, 50.0));
    assert_eq!(host.placed.borrow().len(), 2);

    controller.set_target(&fixture.popup, None);
    fixture.runtime.update_all().expect("flush");
    let placed = host.placed.borrow().len();
    fixture.anchor.update();
    fixture.runtime.update_all().expect("flush");
    assert_eq!(host.placed.borrow().len(), placed);
}

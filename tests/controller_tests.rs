use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use livepreview::preview::{
    ContainerState, ControllerState, DocumentController, DocumentSize, EventDisposition,
    HostEvent, Modifiers, Patch, PageColor, PreviewError, PreviewOptions, RenderMode, Topology,
    WheelEvent,
};
use livepreview::test_utils::test_helpers::{
    HostRecord, RecordingHost, ScriptedSession, SessionRecord,
};

const DOC: DocumentSize = DocumentSize::new(400.0, 400.0);

struct Fixture {
    controller: DocumentController,
    host: Rc<RefCell<HostRecord>>,
    session: Rc<RefCell<SessionRecord>>,
}

fn attach(container: ContainerState, pages: usize, options: PreviewOptions) -> Fixture {
    let (host, host_record) = RecordingHost::new(container);
    let (session, session_record) = ScriptedSession::new(DOC, pages);
    let controller = DocumentController::attach(Box::new(host), Box::new(session), options)
        .unwrap_or_else(|e| panic!("attach failed: {e}"));
    Fixture {
        controller,
        host: host_record,
        session: session_record,
    }
}

fn loaded(container: ContainerState, pages: usize, options: PreviewOptions) -> (Fixture, Instant) {
    let mut fx = attach(container, pages, options);
    let now = Instant::now();
    fx.controller.submit_patch(Patch::full_snapshot(b"doc".to_vec()), now);
    fx.controller.drain(now);
    assert_eq!(fx.controller.state(), ControllerState::Idle);
    (fx, now)
}

fn ctrl_wheel(delta_y: f64, client_x: f64, client_y: f64) -> HostEvent {
    HostEvent::Wheel(WheelEvent {
        delta_y,
        client_x,
        client_y,
        modifiers: Modifiers {
            ctrl: true,
            ..Modifiers::default()
        },
    })
}

#[test]
fn paginated_snapshot_redraws_once_and_updates_indicator() {
    let options = PreviewOptions::default().with_topology(Topology::Paginated);
    let mut fx = attach(ContainerState::new(800.0, 600.0), 3, options);
    let now = Instant::now();

    fx.controller.submit_patch(Patch::full_snapshot(b"slides".to_vec()), now);
    assert_eq!(fx.controller.state(), ControllerState::Rendering);
    assert!(fx.controller.needs_frame());

    fx.controller.on_animation_frame(now);

    assert_eq!(fx.controller.state(), ControllerState::Idle);
    assert!(!fx.controller.needs_frame());
    // min(800/400, 600/400)
    assert_eq!(fx.controller.scale().real_scale, 1.5);

    let host = fx.host.borrow();
    assert_eq!(host.markup.len(), 1);
    assert_eq!(host.transforms, vec![1.5]);
    assert_eq!(host.page_indicators, vec![3]);
    assert_eq!(fx.session.borrow().resets, 1);
}

#[test]
fn continuous_topology_fits_width_only() {
    let (fx, _) = loaded(ContainerState::new(800.0, 100.0), 1, PreviewOptions::default());

    assert_eq!(fx.controller.scale().real_scale, 2.0);
    assert!(fx.host.borrow().page_indicators.is_empty());
}

#[test]
fn full_snapshot_drops_earlier_queued_patches() {
    let mut fx = attach(ContainerState::new(800.0, 600.0), 1, PreviewOptions::default());
    let now = Instant::now();

    fx.controller.submit_patch(Patch::diff(b"a".to_vec()), now);
    fx.controller.submit_patch(Patch::diff(b"b".to_vec()), now);
    fx.controller.submit_patch(Patch::full_snapshot(b"c".to_vec()), now);
    assert_eq!(fx.controller.queue().len(), 1);

    fx.controller.drain(now);

    assert_eq!(fx.session.borrow().merges, vec![b"c".to_vec()]);
    assert_eq!(fx.controller.stats().patches_applied, 1);
}

#[test]
fn viewport_storm_while_rendering_applies_one_viewport_change() {
    let (mut fx, start) = loaded(ContainerState::new(800.0, 600.0), 1, PreviewOptions::default());
    let redraws_before = fx.controller.stats().redraws;

    fx.controller.submit_patch(Patch::diff(b"edit".to_vec()), start);
    assert_eq!(fx.controller.state(), ControllerState::Rendering);

    for i in 0..10 {
        let at = start + Duration::from_millis(5 * i);
        fx.controller.handle_event(HostEvent::Resize, at);
    }
    assert_eq!(fx.controller.queue().len(), 1);
    assert!(fx.controller.queue().pending_viewport().is_some());

    let later = start + Duration::from_secs(1);
    for _ in 0..10 {
        fx.controller.on_animation_frame(later);
    }

    assert_eq!(fx.controller.state(), ControllerState::Idle);
    assert!(fx.controller.queue().is_idle());
    // the diff plus a single coalesced viewport change
    assert_eq!(fx.controller.stats().redraws - redraws_before, 2);
}

#[test]
fn deferred_viewport_waits_for_debounce() {
    let options = PreviewOptions {
        default_debounce: Duration::from_millis(100),
        ..PreviewOptions::default()
    };
    let mut fx = attach(ContainerState::new(800.0, 600.0), 1, options);
    let start = Instant::now();

    fx.controller.submit_patch(Patch::full_snapshot(b"doc".to_vec()), start);
    fx.controller.submit_patch(Patch::viewport_changed(), start);
    let due = fx.controller.queue().pending_viewport().unwrap();
    assert_eq!(due, start + Duration::from_millis(100));

    fx.controller.on_animation_frame(start);
    assert_eq!(fx.controller.state(), ControllerState::Idle);
    assert!(fx.controller.needs_frame());

    // Not due yet
    fx.controller.on_animation_frame(start + Duration::from_millis(50));
    assert_eq!(fx.controller.stats().redraws, 1);

    fx.controller.on_animation_frame(due);
    assert_eq!(fx.controller.stats().redraws, 2);
    assert!(!fx.controller.needs_frame());
}

#[test]
fn partial_page_out_of_range_is_rejected() {
    let (mut fx, now) = loaded(ContainerState::new(800.0, 600.0), 3, PreviewOptions::default());

    assert!(!fx.controller.set_partial_page(5, now));
    assert!(!fx.controller.set_partial_page(0, now));
    assert_eq!(fx.controller.partial_page(), None);
    assert!(fx.controller.queue().is_idle());

    assert!(fx.controller.set_partial_page(2, now));
    fx.controller.drain(now);
    let session = fx.session.borrow();
    let last = session.vector_renders.last().unwrap();
    assert_eq!(last.partial_page, Some(1));
}

#[test]
fn clearing_partial_page_renders_everything_again() {
    let (mut fx, now) = loaded(ContainerState::new(800.0, 600.0), 3, PreviewOptions::default());
    assert!(fx.controller.set_partial_page(3, now));
    fx.controller.drain(now);

    fx.controller.clear_partial_page(now);
    fx.controller.drain(now);

    let session = fx.session.borrow();
    assert_eq!(session.vector_renders.last().unwrap().partial_page, None);
}

#[test]
fn ctrl_wheel_steps_zoom_and_keeps_anchor() {
    let container = ContainerState::new(800.0, 600.0).with_origin(10.0, 20.0);
    let (mut fx, now) = loaded(container, 1, PreviewOptions::default());

    let disposition = fx.controller.handle_event(ctrl_wheel(-100.0, 110.0, 220.0), now);
    assert_eq!(disposition, EventDisposition::Consumed);
    assert_eq!(fx.controller.zoom_ratio(), 1.1);

    let (x, y) = fx.host.borrow().scroll;
    assert!((x - 10.0).abs() < 1e-3, "x = {x}");
    assert!((y - 20.0).abs() < 1e-3, "y = {y}");

    fx.controller.drain(now);
    let effective = fx.controller.scale().effective();
    assert!((effective - 2.2).abs() < 1e-5);

    fx.controller.handle_event(ctrl_wheel(100.0, 110.0, 220.0), now);
    assert_eq!(fx.controller.zoom_ratio(), 1.0);
    let (x, y) = fx.host.borrow().scroll;
    assert!(x.abs() < 1e-3 && y.abs() < 1e-3, "scroll = ({x}, {y})");
}

#[test]
fn plain_wheel_is_left_to_the_host() {
    let (mut fx, now) = loaded(ContainerState::new(800.0, 600.0), 1, PreviewOptions::default());

    let event = HostEvent::Wheel(WheelEvent {
        delta_y: -100.0,
        client_x: 0.0,
        client_y: 0.0,
        modifiers: Modifiers::default(),
    });
    assert_eq!(
        fx.controller.handle_event(event, now),
        EventDisposition::Ignored
    );
    assert_eq!(fx.controller.zoom_ratio(), 1.0);
    assert!(fx.controller.queue().is_idle());
}

#[test]
fn zoom_stops_at_ladder_end() {
    let (mut fx, now) = loaded(ContainerState::new(800.0, 600.0), 1, PreviewOptions::default());
    fx.controller.set_zoom_ratio(10.0, now);
    fx.controller.drain(now);

    let disposition = fx.controller.handle_event(ctrl_wheel(-50.0, 0.0, 0.0), now);
    assert_eq!(disposition, EventDisposition::Consumed);
    assert_eq!(fx.controller.zoom_ratio(), 10.0);
    assert!(fx.controller.queue().is_idle());
}

#[test]
fn apply_failure_aborts_cycle_and_recovers() {
    let (mut fx, now) = loaded(ContainerState::new(800.0, 600.0), 1, PreviewOptions::default());

    fx.controller.submit_patch(Patch::diff(b"bad diff".to_vec()), now);
    fx.controller.submit_patch(Patch::diff(b"dropped".to_vec()), now);
    fx.controller.drain(now);

    assert_eq!(fx.controller.state(), ControllerState::Idle);
    assert!(matches!(
        fx.controller.last_error(),
        Some(PreviewError::Apply { .. })
    ));
    assert_eq!(fx.controller.stats().failed_cycles, 1);
    assert!(fx.controller.queue().is_empty());

    fx.controller.submit_patch(Patch::diff(b"fixed".to_vec()), now);
    fx.controller.drain(now);

    let session = fx.session.borrow();
    assert_eq!(session.merges.last().unwrap(), b"fixed");
    assert!(!session.merges.iter().any(|m| m == b"dropped"));
}

#[test]
fn degenerate_container_skips_redraw_until_resized() {
    let mut fx = attach(ContainerState::new(0.0, 0.0), 1, PreviewOptions::default());
    let now = Instant::now();

    fx.controller.submit_patch(Patch::full_snapshot(b"doc".to_vec()), now);
    fx.controller.drain(now);

    assert_eq!(fx.controller.stats().skipped_redraws, 1);
    assert!(fx.host.borrow().markup.is_empty());
    assert!(!fx.controller.scale().is_ready());

    fx.host.borrow_mut().container = ContainerState::new(400.0, 300.0);
    fx.controller.handle_event(HostEvent::Resize, now);
    fx.controller.drain(now);

    assert_eq!(fx.host.borrow().markup.len(), 1);
    assert_eq!(fx.controller.scale().real_scale, 1.0);
}

#[test]
fn source_hooks_follow_every_vector_redraw() {
    let options = PreviewOptions::default().with_source_mapping(true);
    let (mut fx, now) = loaded(ContainerState::new(800.0, 600.0), 1, options);
    assert_eq!(fx.host.borrow().source_hook_installs, 1);

    fx.controller.submit_patch(Patch::diff(b"more".to_vec()), now);
    fx.controller.drain(now);
    assert_eq!(fx.host.borrow().source_hook_installs, 2);
    assert!(fx.session.borrow().vector_renders[0].source_mapping);
}

#[test]
fn page_color_change_redraws_with_new_color() {
    let (mut fx, now) = loaded(ContainerState::new(800.0, 600.0), 1, PreviewOptions::default());
    let dark = PageColor::rgb(0x24, 0x24, 0x24);

    fx.controller.set_page_color(dark, now);
    fx.controller.drain(now);

    let session = fx.session.borrow();
    assert_eq!(session.vector_renders.last().unwrap().page_color, dark);
    assert_eq!(fx.controller.page_color(), dark);
}

#[test]
fn cursor_is_range_checked_and_shown_when_idle() {
    let (mut fx, _) = loaded(ContainerState::new(800.0, 600.0), 2, PreviewOptions::default());

    assert!(!fx.controller.set_cursor(2, 1.0, 1.0));
    assert_eq!(fx.controller.cursor(), None);

    assert!(fx.controller.set_cursor(1, 10.0, 20.0));
    let shown = *fx.host.borrow().cursors.last().unwrap();
    assert_eq!(shown.map(|c| c.page), Some(1));

    fx.controller.clear_cursor();
    assert_eq!(*fx.host.borrow().cursors.last().unwrap(), None);
}

#[test]
fn dispose_is_idempotent_and_ignores_later_patches() {
    let (mut fx, now) = loaded(ContainerState::new(800.0, 600.0), 1, PreviewOptions::default());
    assert_eq!(fx.host.borrow().listeners.len(), 2);

    fx.controller.dispose();
    fx.controller.dispose();

    {
        let host = fx.host.borrow();
        assert!(host.listeners.is_empty());
        assert_eq!(host.removed_listeners.len(), 2);
    }
    assert!(fx.controller.is_disposed());

    fx.controller.submit_patch(Patch::diff(b"late".to_vec()), now);
    fx.controller.on_animation_frame(now);
    assert!(fx.controller.queue().is_idle());
    assert!(!fx.controller.needs_frame());
    assert_eq!(fx.controller.page_count(), 0);
    assert_eq!(fx.session.borrow().merges.len(), 1);
}

#[test]
fn unsupported_mode_fails_attach_without_side_effects() {
    let (host, record) = RecordingHost::new(ContainerState::new(800.0, 600.0));
    let host = host.supporting(&[RenderMode::Vector]);
    let (session, _) = ScriptedSession::new(DOC, 1);

    let result = DocumentController::attach(
        Box::new(host),
        Box::new(session),
        PreviewOptions::default().with_render_mode(RenderMode::Raster),
    );

    let Err(err) = result else {
        panic!("raster attach should fail on a vector-only host");
    };
    assert!(matches!(err, PreviewError::UnsupportedMode(RenderMode::Raster)));
    assert!(record.borrow().listeners.is_empty());
}

#[test]
fn shrinking_document_drops_out_of_range_cursor_and_partial_page() {
    let (host, host_record) = RecordingHost::new(ContainerState::new(800.0, 600.0));
    let (session, session_record) = ScriptedSession::new(DOC, 5);
    let pages = session.pages_handle();
    let mut controller =
        DocumentController::attach(Box::new(host), Box::new(session), PreviewOptions::default())
            .unwrap_or_else(|e| panic!("attach failed: {e}"));
    let now = Instant::now();

    controller.submit_patch(Patch::full_snapshot(b"long".to_vec()), now);
    controller.drain(now);
    assert!(controller.set_partial_page(5, now));
    assert!(controller.set_cursor(4, 1.0, 2.0));
    controller.drain(now);

    pages.set(2);
    controller.submit_patch(Patch::full_snapshot(b"short".to_vec()), now);
    controller.drain(now);

    assert_eq!(controller.page_count(), 2);
    assert_eq!(controller.partial_page(), None);
    assert_eq!(controller.cursor(), None);
    let session = session_record.borrow();
    assert_eq!(session.vector_renders.last().unwrap().partial_page, None);
    assert_eq!(*host_record.borrow().cursors.last().unwrap(), None);
}

#[test]
fn in_range_cursor_survives_a_diff() {
    let (host, _) = RecordingHost::new(ContainerState::new(800.0, 600.0));
    let (session, _) = ScriptedSession::new(DOC, 3);
    let pages = session.pages_handle();
    let mut controller =
        DocumentController::attach(Box::new(host), Box::new(session), PreviewOptions::default())
            .unwrap_or_else(|e| panic!("attach failed: {e}"));
    let now = Instant::now();

    controller.submit_patch(Patch::full_snapshot(b"doc".to_vec()), now);
    controller.drain(now);
    assert!(controller.set_cursor(1, 0.0, 0.0));
    assert!(controller.set_partial_page(2, now));
    controller.drain(now);

    pages.set(2);
    controller.submit_patch(Patch::diff(b"trim".to_vec()), now);
    controller.drain(now);

    assert_eq!(controller.cursor().map(|c| c.page), Some(1));
    assert_eq!(controller.partial_page(), Some(1));
}

#[test]
fn vector_render_failure_aborts_cycle_and_recovers() {
    let (host, host_record) = RecordingHost::new(ContainerState::new(800.0, 600.0));
    let (session, _) = ScriptedSession::new(DOC, 1);
    let failures = session.render_failures();
    let mut controller =
        DocumentController::attach(Box::new(host), Box::new(session), PreviewOptions::default())
            .unwrap_or_else(|e| panic!("attach failed: {e}"));
    let now = Instant::now();

    controller.submit_patch(Patch::full_snapshot(b"doc".to_vec()), now);
    controller.drain(now);

    failures.store(true, Ordering::Release);
    controller.submit_patch(Patch::diff(b"edit".to_vec()), now);
    controller.submit_patch(Patch::diff(b"dropped".to_vec()), now);
    controller.drain(now);

    assert_eq!(controller.state(), ControllerState::Idle);
    assert!(matches!(
        controller.last_error(),
        Some(PreviewError::Redraw(_))
    ));
    assert_eq!(controller.stats().failed_cycles, 1);
    assert!(controller.queue().is_empty());
    assert_eq!(host_record.borrow().markup.len(), 1);

    failures.store(false, Ordering::Release);
    controller.submit_patch(Patch::diff(b"again".to_vec()), now);
    controller.drain(now);

    assert_eq!(host_record.borrow().markup.len(), 2);
    assert_eq!(controller.stats().redraws, 2);
}

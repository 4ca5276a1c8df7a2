use super::*;
use crate::foundation::core::Rect;
use crate::manager::collab::{ChannelDiscovery, FirstVideo, InMemoryMetadata, PinnedVideo};
use crate::overlay::controller::OverlayState;
use crate::overlay::host::{RecordingCanvasFactory, StaticVideo};
use crate::render::registry::RecordingRenderer;
use crate::render::surface::DrawCmd;
use serde_json::json;

fn video(key: u64) -> (Arc<StaticVideo>, Arc<dyn VideoElement>) {
    let v = StaticVideo::new(key, Rect::new(0.0, 0.0, 640.0, 360.0));
    let d: Arc<dyn VideoElement> = v.clone();
    (v, d)
}

fn alert_metadata() -> serde_json::Value {
    json!({
        "detections": [
            { "id": "d1", "startMs": 1000, "endMs": 5000, "bbox": [0.1, 0.1, 0.2, 0.3], "label": "person" }
        ],
        "captions": [
            { "id": "c1", "startMs": 0, "endMs": 8000, "text": "Motion at gate" }
        ]
    })
}

struct Rig {
    factory: RecordingCanvasFactory,
    discovery: ChannelDiscovery,
    metadata: Arc<InMemoryMetadata>,
    mgr: AnnotationManager,
}

fn rig(videos: Vec<Arc<dyn VideoElement>>) -> Rig {
    let factory = RecordingCanvasFactory::new();
    let discovery = ChannelDiscovery::new(videos);
    let metadata = Arc::new(
        InMemoryMetadata::new()
            .with("a-1", alert_metadata())
            .with("empty", json!({ "detections": [] }))
            .failing("broken", "upstream timeout"),
    );
    let mut mgr = AnnotationManager::new(
        factory.clone(),
        discovery.clone(),
        FirstVideo,
        metadata.clone(),
    );
    mgr.start();
    Rig {
        factory,
        discovery,
        metadata,
        mgr,
    }
}

#[test]
fn start_attaches_overlays_to_initial_snapshot() {
    let (_v1, d1) = video(1);
    let (_v2, d2) = video(2);
    let r = rig(vec![d1, d2]);
    assert_eq!(r.mgr.video_keys(), vec![VideoKey(1), VideoKey(2)]);
    assert_eq!(r.factory.created(), 2);
    assert!(r.discovery.is_running());
}

#[test]
fn start_is_idempotent() {
    let (_v1, d1) = video(1);
    let mut r = rig(vec![d1]);
    r.mgr.start();
    assert_eq!(r.factory.created(), 1);
}

#[test]
fn rediscovering_a_video_reuses_its_overlay() {
    let (_v1, d1) = video(1);
    let mut r = rig(vec![d1.clone()]);
    r.discovery.add(d1.clone());
    assert_eq!(r.mgr.pump(), 1);
    assert!(r.mgr.controller_for(&d1).is_some());
    assert_eq!(r.factory.created(), 1);
    assert_eq!(r.mgr.overlay_count(), 1);
}

#[test]
fn added_and_removed_events_create_and_destroy_overlays() {
    let mut r = rig(vec![]);
    let (_v3, d3) = video(3);
    r.discovery.add(d3);
    r.mgr.pump();
    assert_eq!(r.mgr.video_keys(), vec![VideoKey(3)]);

    r.discovery.remove(VideoKey(3));
    r.mgr.pump();
    assert!(r.mgr.controller(VideoKey(3)).is_none());
    assert!(r.factory.surface_for(VideoKey(3)).unwrap().is_detached());
}

#[test]
fn time_update_events_drive_render_passes() {
    let (_v1, d1) = video(1);
    let mut r = rig(vec![d1]);
    assert!(pollster::block_on(r.mgr.load_annotations_for_alert("a-1", &["detection"])));

    r.discovery.time_update(VideoKey(1), 2000.0);
    r.mgr.pump();
    let ctl = r.mgr.controller(VideoKey(1)).unwrap();
    assert_eq!(ctl.last_report().drawn, 1);

    r.discovery.time_update(VideoKey(1), 9000.0);
    r.mgr.pump();
    assert_eq!(r.mgr.controller(VideoKey(1)).unwrap().last_report().visible, 0);
}

#[test]
fn alert_load_installs_and_shows_on_target_video() {
    let (v1, d1) = video(1);
    v1.seek(2000.0);
    let mut r = rig(vec![d1]);

    let cats: [&str; 0] = [];
    assert!(pollster::block_on(r.mgr.load_annotations_for_alert("a-1", &cats)));
    assert_eq!(r.metadata.fetches(), vec!["a-1"]);

    let ctl = r.mgr.controller(VideoKey(1)).unwrap();
    assert_eq!(ctl.state(), OverlayState::Active);
    assert_eq!(ctl.manifest().unwrap().count(), 2);

    let surface = r.factory.surface_for(VideoKey(1)).unwrap();
    assert!(surface.is_visible());
    assert_eq!(surface.last_frame_texts(), vec!["person", "Motion at gate"]);
}

#[test]
fn alert_load_failures_return_false() {
    let (_v1, d1) = video(1);
    let mut r = rig(vec![d1]);

    assert!(!pollster::block_on(r.mgr.load_annotations_for_alert("missing", &["detection"])));
    assert!(!pollster::block_on(r.mgr.load_annotations_for_alert("empty", &["detection"])));
    assert!(!pollster::block_on(r.mgr.load_annotations_for_alert("broken", &["detection"])));
    assert!(!pollster::block_on(r.mgr.load_annotations_for_alert("a-1", &["ufo"])));
    assert!(r.mgr.controller(VideoKey(1)).unwrap().manifest().is_none());
}

#[test]
fn alert_load_without_videos_returns_false() {
    let mut r = rig(vec![]);
    assert!(!pollster::block_on(r.mgr.load_annotations_for_alert("a-1", &["detection"])));
}

#[test]
fn overlays_are_independent_per_video() {
    let (v1, d1) = video(1);
    let (v2, d2) = video(2);
    v1.seek(2000.0);
    v2.seek(2000.0);
    let mut r = rig(vec![d1, d2]);
    let s2 = r.factory.surface_for(VideoKey(2)).unwrap();
    let before = s2.commands();

    assert!(pollster::block_on(r.mgr.load_annotations_for_alert("a-1", &["detection"])));
    assert_eq!(s2.commands(), before);
    assert!(r.mgr.controller(VideoKey(2)).unwrap().manifest().is_none());

    r.mgr.tick();
    assert!(s2.last_frame().iter().all(|c| !c.is_paint()));
    let s1 = r.factory.surface_for(VideoKey(1)).unwrap();
    assert!(s1.last_frame().iter().any(DrawCmd::is_paint));
}

#[test]
fn prepared_results_can_be_installed_out_of_order() {
    let (_v1, d1) = video(1);
    let (_v2, d2) = video(2);
    let mut r = rig(vec![d1, d2]);
    r.metadata.insert(
        "a-2",
        json!({ "captions": [{ "id": "late", "startMs": 0, "endMs": 10, "text": "second" }] }),
    );

    let first = pollster::block_on(r.mgr.prepare_alert("a-1", &["text"])).unwrap();
    let second = pollster::block_on(r.mgr.prepare_alert("a-2", &["text"])).unwrap();
    assert!(r.mgr.load_manifest_into(VideoKey(2), second));
    assert!(r.mgr.load_manifest_into(VideoKey(2), first));

    let m = r.mgr.controller(VideoKey(2)).unwrap().manifest().unwrap();
    assert!(m.get("c1").is_some());
    assert!(m.get("late").is_none());
}

#[test]
fn pinned_resolver_targets_its_video() {
    let (_v1, d1) = video(1);
    let (_v2, d2) = video(2);
    let metadata = Arc::new(InMemoryMetadata::new().with("a-1", alert_metadata()));
    let mut mgr = AnnotationManager::new(
        RecordingCanvasFactory::new(),
        ChannelDiscovery::new(vec![d1, d2]),
        PinnedVideo(VideoKey(2)),
        metadata,
    );
    mgr.start();
    assert!(pollster::block_on(mgr.load_annotations_for_alert("a-1", &["text"])));
    assert!(mgr.controller(VideoKey(1)).unwrap().manifest().is_none());
    assert!(mgr.controller(VideoKey(2)).unwrap().manifest().is_some());
}

#[test]
fn dropped_videos_are_pruned() {
    let (v1, d1) = video(1);
    let (_v2, d2) = video(2);
    let mut r = rig(vec![d1, d2]);
    r.discovery.remove(VideoKey(1));
    drop(v1);

    assert_eq!(r.mgr.prune(), 1);
    assert_eq!(r.mgr.video_keys(), vec![VideoKey(2)]);
    assert!(r.factory.surface_for(VideoKey(1)).unwrap().is_detached());
}

#[test]
fn bulk_operations_reach_every_overlay() {
    let (_v1, d1) = video(1);
    let (_v2, d2) = video(2);
    let mut r = rig(vec![d1, d2]);
    let surfaces = [
        r.factory.surface_for(VideoKey(1)).unwrap(),
        r.factory.surface_for(VideoKey(2)).unwrap(),
    ];

    r.mgr.show_all();
    assert!(surfaces.iter().all(|s| s.is_visible()));
    r.mgr.hide_all();
    assert!(surfaces.iter().all(|s| !s.is_visible()));
    r.mgr.set_debug_borders(true);
    assert!(surfaces.iter().all(|s| s.has_debug_border()));

    assert!(r.mgr.load_sample());
    r.mgr.clear_all();
    assert!(r.mgr.controller(VideoKey(1)).unwrap().manifest().is_none());
}

#[test]
fn settings_carry_over_to_new_overlays() {
    let mut r = rig(vec![]);
    r.mgr.set_debug_borders(true);
    r.mgr.toggle_renderer("text", false);

    let (_v5, d5) = video(5);
    r.discovery.add(d5);
    r.mgr.pump();
    let ctl = r.mgr.controller(VideoKey(5)).unwrap();
    assert!(!ctl.is_renderer_enabled("text"));
    assert!(ctl.is_renderer_enabled("detection"));
    assert!(r.factory.surface_for(VideoKey(5)).unwrap().has_debug_border());
}

#[test]
fn register_renderer_hot_swaps_for_every_overlay() {
    let (v1, d1) = video(1);
    v1.seek(2000.0);
    let mut r = rig(vec![d1]);
    assert!(pollster::block_on(r.mgr.load_annotations_for_alert("a-1", &["detection"])));

    let recorder = Arc::new(RecordingRenderer::new("detection"));
    r.mgr.register_renderer(recorder.clone()).unwrap();
    assert_eq!(recorder.rendered_ids(), vec!["d1"]);
}

#[test]
fn destroy_tears_everything_down_once() {
    let (_v1, d1) = video(1);
    let mut r = rig(vec![d1]);
    r.mgr.destroy();

    assert!(r.mgr.is_destroyed());
    assert_eq!(r.mgr.overlay_count(), 0);
    assert!(!r.discovery.is_running());
    assert!(r.factory.surface_for(VideoKey(1)).unwrap().is_detached());

    r.mgr.destroy();
    r.mgr.start();
    let (_v2, d2) = video(2);
    assert!(r.mgr.controller_for(&d2).is_none());
    assert!(!pollster::block_on(r.mgr.load_annotations_for_alert("a-1", &["text"])));
}

#[test]
fn failing_canvas_factory_leaves_no_overlay() {
    let (_v1, d1) = video(1);
    let factory = |_: &dyn VideoElement| -> OverlayResult<Box<dyn crate::overlay::host::OverlayCanvas>> {
        Err(OverlayError::render("no canvas support"))
    };
    let mut mgr = AnnotationManager::new(
        factory,
        ChannelDiscovery::new(vec![d1.clone()]),
        FirstVideo,
        Arc::new(InMemoryMetadata::new()),
    );
    mgr.start();
    assert_eq!(mgr.overlay_count(), 0);
    assert!(mgr.controller_for(&d1).is_none());
}

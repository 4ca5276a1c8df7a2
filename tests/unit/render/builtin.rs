use super::*;
use crate::foundation::core::TimeRange;
use crate::render::surface::{DrawCmd, RecordingSurface};
use serde_json::json;

fn ann(category: &str, data: serde_json::Value) -> Annotation {
    Annotation {
        id: format!("{category}-1"),
        category: category.to_owned(),
        time_range: TimeRange::new(1000.0, 5000.0).unwrap(),
        data,
    }
}

fn draw(r: &dyn Renderer, a: &Annotation, t: f64) -> (RecordingSurface, OverlayResult<()>) {
    let mut s = RecordingSurface::new(640.0, 360.0);
    let res = r.render(a, t, Viewport::new(640.0, 360.0), &mut s);
    (s, res)
}

#[test]
fn detection_draws_scaled_box_and_tag_above() {
    let a = ann(
        DETECTION,
        json!({ "bbox": { "x": 0.1, "y": 0.5, "width": 0.2, "height": 0.3 }, "label": "person", "confidence": 0.87 }),
    );
    let (s, res) = draw(&DetectionRenderer::default(), &a, 3000.0);
    res.unwrap();

    let cmds = s.commands();
    assert_eq!(cmds.first(), Some(&DrawCmd::Save));
    assert_eq!(cmds.last(), Some(&DrawCmd::Restore));

    let stroke = cmds
        .iter()
        .find_map(|c| match c {
            DrawCmd::StrokeRect { rect, .. } => Some(*rect),
            _ => None,
        })
        .unwrap();
    assert!((stroke.x0 - 64.0).abs() < 1e-9);
    assert!((stroke.y0 - 180.0).abs() < 1e-9);
    assert!((stroke.x1 - 192.0).abs() < 1e-9);
    assert!((stroke.y1 - 288.0).abs() < 1e-9);

    let (text, anchor) = cmds
        .iter()
        .find_map(|c| match c {
            DrawCmd::FillText { text, anchor, .. } => Some((text.clone(), *anchor)),
            _ => None,
        })
        .unwrap();
    assert_eq!(text, "person 87%");
    assert!(anchor.y < stroke.y0);
    assert_eq!(s.save_depth(), 0);
}

#[test]
fn detection_tag_moves_inside_when_box_touches_top() {
    let a = ann(
        DETECTION,
        json!({ "bbox": [0.0, 0.0, 0.5, 0.5], "label": "car" }),
    );
    let (s, res) = draw(&DetectionRenderer::default(), &a, 1000.0);
    res.unwrap();
    let anchor_y = s
        .commands()
        .iter()
        .find_map(|c| match c {
            DrawCmd::FillText { anchor, .. } => Some(anchor.y),
            _ => None,
        })
        .unwrap();
    assert!(anchor_y >= 0.0);
}

#[test]
fn detection_without_label_draws_only_the_box() {
    let a = ann(DETECTION, json!({ "bbox": [0.1, 0.1, 0.2, 0.2] }));
    let (s, res) = draw(&DetectionRenderer::default(), &a, 2000.0);
    res.unwrap();
    let paints: Vec<DrawCmd> = s.commands().into_iter().filter(DrawCmd::is_paint).collect();
    assert_eq!(paints.len(), 1);
    assert!(matches!(paints[0], DrawCmd::StrokeRect { .. }));
}

#[test]
fn detection_uses_payload_color() {
    let a = ann(
        DETECTION,
        json!({ "bbox": [0.1, 0.1, 0.2, 0.2], "color": "#112233" }),
    );
    let (s, _) = draw(&DetectionRenderer::default(), &a, 2000.0);
    assert!(s.commands().iter().any(|c| matches!(
        c,
        DrawCmd::StrokeRect { color, .. } if *color == Rgba8::rgb(0x11, 0x22, 0x33)
    )));
}

#[test]
fn renderers_skip_annotations_outside_their_window() {
    let a = ann(DETECTION, json!({ "bbox": [0.1, 0.1, 0.2, 0.2] }));
    let (s, res) = draw(&DetectionRenderer::default(), &a, 5001.0);
    res.unwrap();
    assert_eq!(s.command_count(), 0);

    let t = ann(TEXT, json!({ "message": "late" }));
    let (s, res) = draw(&TextRenderer::default(), &t, 999.0);
    res.unwrap();
    assert_eq!(s.command_count(), 0);
}

#[test]
fn malformed_payloads_are_render_errors() {
    let no_box = ann(DETECTION, json!({ "label": "x" }));
    assert!(matches!(
        draw(&DetectionRenderer::default(), &no_box, 2000.0).1,
        Err(OverlayError::Render(_))
    ));
    let bad_box = ann(DETECTION, json!({ "bbox": [0.1, 0.1] }));
    assert!(draw(&DetectionRenderer::default(), &bad_box, 2000.0).1.is_err());
    let no_msg = ann(TEXT, json!({}));
    assert!(draw(&TextRenderer::default(), &no_msg, 2000.0).1.is_err());
    let no_pos = ann(CROSS, json!({ "x": 0.5 }));
    assert!(draw(&CrossRenderer::default(), &no_pos, 2000.0).1.is_err());
}

#[test]
fn text_is_centered_at_fixed_offset() {
    let style = OverlayStyle::default();
    let a = ann(TEXT, json!({ "text": "Hello" }));
    let (s, res) = draw(&TextRenderer::new(style.clone()), &a, 1000.0);
    res.unwrap();
    let cmds = s.commands();
    let (anchor, align) = cmds
        .iter()
        .find_map(|c| match c {
            DrawCmd::FillText { anchor, align, .. } => Some((*anchor, *align)),
            _ => None,
        })
        .unwrap();
    assert_eq!(align, TextAlign::Center);
    assert_eq!(anchor, Point::new(320.0, style.text_offset_y_px));

    let backing = cmds
        .iter()
        .find_map(|c| match c {
            DrawCmd::FillRect { rect, .. } => Some(*rect),
            _ => None,
        })
        .unwrap();
    assert!((backing.center().x - 320.0).abs() < 1e-9);
}

#[test]
fn cross_draws_two_arms_centered_on_point() {
    let a = ann(CROSS, json!({ "x": 0.5, "y": 0.5, "size": 10.0, "label": "impact" }));
    let (s, res) = draw(&CrossRenderer::default(), &a, 1500.0);
    res.unwrap();
    let rects: Vec<Rect> = s
        .commands()
        .into_iter()
        .filter_map(|c| match c {
            DrawCmd::FillRect { rect, .. } => Some(rect),
            _ => None,
        })
        .collect();
    assert_eq!(rects.len(), 2);
    for r in &rects {
        assert!((r.center().x - 320.0).abs() < 1e-9);
        assert!((r.center().y - 180.0).abs() < 1e-9);
    }
    assert_eq!(rects[0].width(), 20.0);
    assert_eq!(rects[1].height(), 20.0);
    assert_eq!(s.last_frame_texts(), ["impact"]);
}

#[test]
fn builtin_registry_covers_three_categories() {
    let reg = builtin_registry(&OverlayStyle::default());
    assert_eq!(reg.categories(), ["cross", "detection", "text"]);
    for cat in reg.categories() {
        assert_eq!(reg.get(&cat).kind(), cat);
    }
}

#[test]
fn style_state_does_not_leak_between_renderers() {
    let mut s = RecordingSurface::new(640.0, 360.0);
    s.set_fill_color(Rgba8::rgb(7, 7, 7));
    let vp = Viewport::new(640.0, 360.0);
    TextRenderer::default()
        .render(&ann(TEXT, json!({ "message": "a" })), 2000.0, vp, &mut s)
        .unwrap();
    s.fill_rect(Rect::new(0.0, 0.0, 1.0, 1.0));
    assert!(matches!(
        s.commands().last(),
        Some(DrawCmd::FillRect { color, .. }) if *color == Rgba8::rgb(7, 7, 7)
    ));
}

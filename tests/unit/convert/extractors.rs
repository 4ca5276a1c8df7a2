use super::*;

fn opts() -> ConvertOpts {
    ConvertOpts::default()
}

#[test]
fn detection_with_explicit_range_passes_through() {
    let raw = json!({ "detections": [
        { "id": "d1", "startMs": 1000, "endMs": 5000,
          "bbox": { "x": 0.1, "y": 0.1, "width": 0.2, "height": 0.3 },
          "label": "person", "confidence": 0.9, "color": "#ff0000" }
    ]});
    let out = extract_detections(&raw, &opts()).unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0]["id"], "d1");
    assert_eq!(out[0]["timeRange"], json!({ "startMs": 1000.0, "endMs": 5000.0 }));
    assert_eq!(out[0]["data"]["label"], "person");
    assert_eq!(out[0]["data"]["color"], "#ff0000");
    assert_eq!(out[0]["data"]["bbox"]["width"], 0.2);
}

#[test]
fn pixel_bbox_is_normalized_by_frame_size() {
    let raw = json!({ "frameWidth": 1000, "frameHeight": 500, "detections": [
        { "timestampMs": 200, "bbox": [100, 50, 200, 250] }
    ]});
    let out = extract_detections(&raw, &opts()).unwrap();
    assert_eq!(out[0]["data"]["bbox"], json!({ "x": 0.1, "y": 0.1, "width": 0.2, "height": 0.5 }));
    assert_eq!(out[0]["timeRange"], json!({ "startMs": 200.0, "endMs": 1200.0 }));
    assert!(out[0].get("id").is_none());
}

#[test]
fn pixel_bbox_without_frame_size_is_dropped() {
    let raw = json!({ "detections": [
        { "timestampMs": 0, "bbox": [100, 50, 200, 250] },
        { "timestampMs": 0, "bbox": [0.1, 0.1, 0.1, 0.1] }
    ]});
    assert_eq!(extract_detections(&raw, &opts()).unwrap().len(), 1);
}

#[test]
fn frame_index_uses_fps() {
    let raw = json!({ "fps": 25, "detections": [
        { "frame": 50, "bbox": [0.0, 0.0, 0.5, 0.5] }
    ]});
    let out = extract_detections(&raw, &opts().with_point_duration(40.0)).unwrap();
    assert_eq!(out[0]["timeRange"], json!({ "startMs": 2000.0, "endMs": 2040.0 }));

    let no_fps = json!({ "detections": [{ "frame": 50, "bbox": [0.0, 0.0, 0.5, 0.5] }] });
    assert!(extract_detections(&no_fps, &opts()).unwrap().is_empty());
}

#[test]
fn confidence_floor_drops_weak_detections() {
    let raw = json!({ "detections": [
        { "id": "weak", "timestampMs": 0, "bbox": [0, 0, 0.1, 0.1], "confidence": 0.2 },
        { "id": "strong", "timestampMs": 0, "bbox": [0, 0, 0.1, 0.1], "confidence": 0.8 },
        { "id": "unscored", "timestampMs": 0, "bbox": [0, 0, 0.1, 0.1] }
    ]});
    let out = extract_detections(&raw, &opts().with_min_confidence(0.5)).unwrap();
    let ids: Vec<_> = out.iter().map(|v| v["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["strong", "unscored"]);
}

#[test]
fn time_offset_shifts_and_clamps() {
    let raw = json!({ "captions": [
        { "startMs": 100, "endMs": 600, "text": "a" },
        { "startMs": 2000, "endMs": 3000, "message": "b" }
    ]});
    let out = extract_captions(&raw, &opts().with_time_offset(-500.0)).unwrap();
    assert_eq!(out[0]["timeRange"], json!({ "startMs": 0.0, "endMs": 100.0 }));
    assert_eq!(out[1]["timeRange"], json!({ "startMs": 1500.0, "endMs": 2500.0 }));
    assert_eq!(out[1]["data"]["message"], "b");
}

#[test]
fn bad_entries_are_dropped_individually() {
    let raw = json!({ "captions": [
        { "startMs": 0, "endMs": 10, "text": "   " },
        { "startMs": 50, "endMs": 10, "text": "backwards" },
        "not an object",
        { "startMs": 0, "endMs": 10, "text": "kept" }
    ]});
    let out = extract_captions(&raw, &opts()).unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0]["data"]["message"], "kept");
}

#[test]
fn missing_key_is_empty_but_wrong_type_is_an_error() {
    assert!(extract_markers(&json!({}), &opts()).unwrap().is_empty());
    assert!(extract_markers(&json!({ "markers": null }), &opts()).unwrap().is_empty());

    let err = extract_markers(&json!({ "markers": { "x": 1 } }), &opts()).unwrap_err();
    assert!(matches!(err, OverlayError::MalformedAnnotation(_)));
    assert!(err.to_string().contains("'markers' must be an array"));
}

#[test]
fn markers_normalize_pixel_positions() {
    let raw = json!({ "frameWidth": 800, "frameHeight": 400, "markers": [
        { "id": 7, "timestampMs": 1200, "x": 400, "y": 100, "label": "entry", "size": 8 },
        { "timestampMs": 1200, "x": 0.25, "y": 0.75 }
    ]});
    let out = extract_markers(&raw, &opts()).unwrap();
    assert_eq!(out[0]["id"], 7);
    assert_eq!(out[0]["data"]["x"], 0.5);
    assert_eq!(out[0]["data"]["y"], 0.25);
    assert_eq!(out[0]["data"]["size"], 8);
    assert_eq!(out[1]["data"]["x"], 0.25);
}

#[test]
fn builtins_are_installed_under_renderer_categories() {
    let reg = ExtractorRegistry::with_builtins();
    assert_eq!(reg.categories(), vec!["cross", "detection", "text"]);
}

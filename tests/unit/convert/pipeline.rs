use super::*;
use crate::foundation::error::OverlayError;

fn metadata() -> Value {
    json!({
        "alertId": "a-17",
        "frameWidth": 1000,
        "frameHeight": 500,
        "detections": [
            { "id": "d1", "startMs": 1000, "endMs": 5000, "bbox": { "x": 0.1, "y": 0.1, "width": 0.2, "height": 0.3 }, "label": "person" }
        ],
        "captions": [
            { "startMs": 0, "endMs": 2000, "text": "Intruder at gate" }
        ]
    })
}

#[test]
fn unknown_category_is_skipped_not_an_error() {
    let m = convert_to_manifest(&metadata(), &["detection", "ufo"], &ConvertOpts::default())
        .unwrap();
    assert_eq!(m.categories().collect::<Vec<_>>(), vec!["detection"]);
    assert_eq!(m.count(), 1);
    assert!(m.validate());
}

#[test]
fn nothing_extracted_returns_none() {
    let raw = json!({ "detections": [] });
    assert!(convert_to_manifest(&raw, &["detection", "text"], &ConvertOpts::default()).is_none());
    assert!(convert_to_manifest(&metadata(), &["ufo"], &ConvertOpts::default()).is_none());
    let none: [&str; 0] = [];
    assert!(convert_to_manifest(&metadata(), &none, &ConvertOpts::default()).is_none());
}

#[test]
fn conversion_is_deterministic() {
    let cats = ["text", "detection"];
    let a = convert_to_manifest(&metadata(), &cats, &ConvertOpts::default()).unwrap();
    let b = convert_to_manifest(&metadata(), &cats, &ConvertOpts::default()).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.to_raw(), b.to_raw());
}

#[test]
fn repeated_category_is_extracted_once() {
    let m = convert_to_manifest(
        &metadata(),
        &["detection", "detection"],
        &ConvertOpts::default(),
    )
    .unwrap();
    assert_eq!(m.count(), 1);
}

#[test]
fn failing_extractor_omits_only_its_category() {
    let mut reg = ExtractorRegistry::with_builtins();
    reg.register(
        "text",
        Arc::new(|_: &Value, _: &ConvertOpts| -> OverlayResult<Vec<Value>> {
            Err(OverlayError::malformed("captions are garbage"))
        }),
    );
    let m = reg
        .convert(&metadata(), &["detection", "text"], &ConvertOpts::default())
        .unwrap();
    assert_eq!(m.counts_by_category(), BTreeMap::from([("detection".to_owned(), 1)]));
}

#[test]
fn custom_extractor_entries_are_filed_under_requested_category() {
    let mut reg = ExtractorRegistry::new();
    reg.register(
        "zone",
        Arc::new(|_: &Value, _: &ConvertOpts| -> OverlayResult<Vec<Value>> {
            Ok(vec![json!({ "id": "z1", "timeRange": { "startMs": 0, "endMs": 10 }, "data": {} })])
        }),
    );
    assert!(reg.contains("zone"));
    let m = reg.convert(&Value::Null, &["zone"], &ConvertOpts::default()).unwrap();
    assert_eq!(m.get("z1").unwrap().category, "zone");
}

#[test]
fn metadata_carries_source_fields_and_extracted_categories() {
    let m = convert_to_manifest(&metadata(), &["text", "detection", "cross"], &ConvertOpts::default())
        .unwrap();
    assert_eq!(m.metadata()["alertId"], "a-17");
    assert_eq!(m.metadata()["frameWidth"], 1000);
    assert_eq!(m.metadata()["categories"], json!(["detection", "text"]));
}

#[test]
fn opts_deserialize_with_defaults() {
    let o: ConvertOpts = serde_json::from_value(json!({ "timeOffsetMs": 250 })).unwrap();
    assert_eq!(o.time_offset_ms, 250.0);
    assert_eq!(o.point_duration_ms, 1000.0);
    assert_eq!(o.min_confidence, 0.0);
}

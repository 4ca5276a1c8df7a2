use super::*;

#[test]
fn time_range_contains_both_boundaries() {
    let r = TimeRange::new(1000.0, 5000.0).unwrap();
    assert!(!r.contains(999.9));
    assert!(r.contains(1000.0));
    assert!(r.contains(3000.0));
    assert!(r.contains(5000.0));
    assert!(!r.contains(5000.1));
}

#[test]
fn abutting_ranges_both_match_at_shared_instant() {
    let a = TimeRange::new(0.0, 100.0).unwrap();
    let b = TimeRange::new(100.0, 200.0).unwrap();
    assert!(a.contains(100.0) && b.contains(100.0));
}

#[test]
fn time_range_rejects_reversed_negative_and_nan() {
    assert!(TimeRange::new(10.0, 5.0).is_err());
    assert!(TimeRange::new(-1.0, 5.0).is_err());
    assert!(TimeRange::new(f64::NAN, 5.0).is_err());
    assert!(TimeRange::new(0.0, f64::INFINITY).is_err());
    assert!(TimeRange::new(7.0, 7.0).is_ok());
}

#[test]
fn shift_clamps_at_zero() {
    let r = TimeRange::new(100.0, 300.0).unwrap().shift(-200.0);
    assert_eq!(r.start_ms, 0.0);
    assert_eq!(r.end_ms, 100.0);
}

#[test]
fn project_box_scales_by_viewport() {
    let vp = Viewport::new(640.0, 360.0);
    let r = vp.project_box(NormBox {
        x: 0.1,
        y: 0.1,
        width: 0.2,
        height: 0.3,
    });
    assert!((r.x0 - 64.0).abs() < 1e-9);
    assert!((r.y0 - 36.0).abs() < 1e-9);
    assert!((r.width() - 128.0).abs() < 1e-9);
    assert!((r.height() - 108.0).abs() < 1e-9);
}

#[test]
fn project_box_clamps_out_of_range_components() {
    let vp = Viewport::new(100.0, 100.0);
    let r = vp.project_box(NormBox {
        x: 0.9,
        y: -0.5,
        width: 0.5,
        height: 0.7,
    });
    assert_eq!(r, Rect::new(90.0, 0.0, 100.0, 20.0));
}

#[test]
fn normalized_box_checks() {
    let ok = NormBox {
        x: 0.5,
        y: 0.5,
        width: 0.5,
        height: 0.5,
    };
    assert!(ok.is_normalized());
    let px = NormBox {
        x: 10.0,
        y: 20.0,
        width: 100.0,
        height: 50.0,
    };
    assert!(px.is_finite());
    assert!(!px.is_normalized());
}

#[test]
fn norm_box_reads_object_and_array_forms() {
    let want = NormBox {
        x: 0.1,
        y: 0.2,
        width: 0.3,
        height: 0.4,
    };
    let obj = serde_json::json!({ "x": 0.1, "y": 0.2, "width": 0.3, "height": 0.4 });
    let arr = serde_json::json!([0.1, 0.2, 0.3, 0.4]);
    assert_eq!(NormBox::from_json(&obj), Some(want));
    assert_eq!(NormBox::from_json(&arr), Some(want));
    assert_eq!(NormBox::from_json(&serde_json::json!([1, 2, 3])), None);
    assert_eq!(NormBox::from_json(&serde_json::json!({ "x": 1 })), None);
}

#[test]
fn pixel_box_normalizes_against_frame() {
    let b = NormBox {
        x: 192.0,
        y: 108.0,
        width: 384.0,
        height: 216.0,
    }
    .normalized_by(1920.0, 1080.0);
    assert!((b.x - 0.1).abs() < 1e-12 && (b.height - 0.2).abs() < 1e-12);
}

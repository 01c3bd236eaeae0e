use yolopost::{
    AnchorBank, ClassMode, DetectConfig, Detector, ModelSpec, RawOutput, ScaleSpec,
    SuppressionMode,
};

fn two_scale_spec() -> ModelSpec {
    ModelSpec {
        num_classes: 3,
        input_width: 64,
        input_height: 64,
        scales: vec![
            ScaleSpec {
                stride: 8,
                anchors: vec![[16.0, 16.0], [32.0, 32.0]],
            },
            ScaleSpec {
                stride: 16,
                anchors: vec![[48.0, 48.0]],
            },
        ],
    }
}

/// Inverse sigmoid, for planting known activations in raw tensors.
fn logit(p: f32) -> f32 {
    (p / (1.0 - p)).ln()
}

/// Flat offset of cell `(gx, gy)` for `anchor` in a `(gw, gh)` scale tensor
/// with `num_attributes` trailing attributes.
fn cell_base(anchor: usize, gx: usize, gy: usize, gw: usize, gh: usize, num_attributes: usize) -> usize {
    ((anchor * gh + gy) * gw + gx) * num_attributes
}

/// Writes a centered prediction: box params at logit(0.5) = 0, given
/// objectness, and one hot class logit.
fn plant(raw: &mut [f32], base: usize, objectness: f32, class_id: usize, class_prob: f32) {
    raw[base] = 0.0;
    raw[base + 1] = 0.0;
    raw[base + 2] = 0.0;
    raw[base + 3] = 0.0;
    raw[base + 4] = logit(objectness);
    raw[base + 5 + class_id] = logit(class_prob);
}

fn quiet_tensors() -> (Vec<f32>, Vec<f32>) {
    (vec![-12.0f32; 2 * 8 * 8 * 8], vec![-12.0f32; 4 * 4 * 8])
}

#[test]
fn detect_finds_planted_objects_across_scales() {
    let bank = AnchorBank::compile(&two_scale_spec()).unwrap();
    let detector = Detector::new(bank);

    let (mut scale0, mut scale1) = quiet_tensors();
    // Anchor 1 at cell (3, 4): center (28, 36), 32x32 box, class 1.
    plant(&mut scale0, cell_base(1, 3, 4, 8, 8, 8), 0.9, 1, 0.8);
    // Anchor 0 at cell (1, 1): center (24, 24), 48x48 box, class 2.
    plant(&mut scale1, cell_base(0, 1, 1, 4, 4, 8), 0.85, 2, 0.9);

    let detections = detector
        .detect(&[RawOutput::from_slice(&scale0), RawOutput::from_slice(&scale1)])
        .unwrap();

    assert_eq!(detections.len(), 2);

    // Score-descending: the coarse-scale box fuses to 0.85 * 0.9 = 0.765.
    let coarse = detections[0];
    assert_eq!(coarse.class_id, 2);
    assert!((coarse.score - 0.765).abs() < 1e-4);
    assert!((coarse.x1 - 0.0).abs() < 1e-3);
    assert!((coarse.y1 - 0.0).abs() < 1e-3);
    assert!((coarse.x2 - 48.0).abs() < 1e-3);
    assert!((coarse.y2 - 48.0).abs() < 1e-3);

    let fine = detections[1];
    assert_eq!(fine.class_id, 1);
    assert!((fine.score - 0.72).abs() < 1e-4);
    assert!((fine.x1 - 12.0).abs() < 1e-3);
    assert!((fine.y1 - 20.0).abs() < 1e-3);
    assert!((fine.x2 - 44.0).abs() < 1e-3);
    assert!((fine.y2 - 52.0).abs() < 1e-3);

    // Nothing below the filter threshold leaks through.
    for det in &detections {
        assert!(det.score > detector.config().conf_threshold);
    }
}

#[test]
fn multi_label_emits_one_detection_per_qualifying_class() {
    let bank = AnchorBank::compile(&two_scale_spec()).unwrap();

    let (scale0, mut scale1) = quiet_tensors();
    let base = cell_base(0, 1, 1, 4, 4, 8);
    plant(&mut scale1, base, 0.9, 0, 0.8);
    scale1[base + 5 + 1] = logit(0.7); // second class on the same cell

    let outputs = [RawOutput::from_slice(&scale0), RawOutput::from_slice(&scale1)];

    let multi = DetectConfig {
        class_mode: ClassMode::MultiLabel {
            class_threshold: 0.5,
        },
        ..DetectConfig::default()
    };
    let detector = Detector::new(bank).with_config(multi);
    let detections = detector.detect(&outputs).unwrap();

    assert_eq!(detections.len(), 2);
    assert_eq!(detections[0].class_id, 0);
    assert!((detections[0].score - 0.72).abs() < 1e-4);
    assert_eq!(detections[1].class_id, 1);
    assert!((detections[1].score - 0.63).abs() < 1e-4);
    assert_eq!(detections[0].corners(), detections[1].corners());

    // Class-agnostic suppression collapses the pair to the best class.
    let agnostic = DetectConfig {
        suppression: SuppressionMode::ClassAgnostic,
        ..multi
    };
    let detections = detector.detect_with(&outputs, &agnostic).unwrap();
    assert_eq!(detections.len(), 1);
    assert_eq!(detections[0].class_id, 0);

    // Single-label keeps only the argmax class.
    let single = DetectConfig::default();
    let detections = detector.detect_with(&outputs, &single).unwrap();
    assert_eq!(detections.len(), 1);
    assert_eq!(detections[0].class_id, 0);
    assert!((detections[0].score - 0.72).abs() < 1e-4);
}

#[test]
fn no_survivors_is_an_empty_result_not_an_error() {
    let bank = AnchorBank::compile(&two_scale_spec()).unwrap();
    let detector = Detector::new(bank);
    let (scale0, scale1) = quiet_tensors();

    let detections = detector
        .detect(&[RawOutput::from_slice(&scale0), RawOutput::from_slice(&scale1)])
        .unwrap();
    assert!(detections.is_empty());
}

#[test]
fn per_call_threshold_overrides_stored_config() {
    let bank = AnchorBank::compile(&two_scale_spec()).unwrap();
    let detector = Detector::new(bank);

    let (scale0, mut scale1) = quiet_tensors();
    plant(&mut scale1, cell_base(0, 2, 2, 4, 4, 8), 0.6, 0, 0.9);
    let outputs = [RawOutput::from_slice(&scale0), RawOutput::from_slice(&scale1)];

    // Fused score 0.54 clears the stored 0.5 threshold...
    assert_eq!(detector.detect(&outputs).unwrap().len(), 1);

    // ...but not a stricter per-call one.
    let strict = DetectConfig {
        conf_threshold: 0.7,
        ..DetectConfig::default()
    };
    assert!(detector.detect_with(&outputs, &strict).unwrap().is_empty());
}

//! Parallel decode must match the serial path bit for bit.
#![cfg(feature = "rayon")]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use yolopost::{AnchorBank, DetectConfig, Detector, ModelSpec, RawOutput, ScaleSpec};

#[test]
fn parallel_and_serial_detect_agree() {
    let spec = ModelSpec {
        num_classes: 5,
        input_width: 96,
        input_height: 96,
        scales: vec![
            ScaleSpec {
                stride: 8,
                anchors: vec![[10.0, 13.0], [16.0, 30.0]],
            },
            ScaleSpec {
                stride: 16,
                anchors: vec![[30.0, 61.0], [62.0, 45.0]],
            },
            ScaleSpec {
                stride: 32,
                anchors: vec![[116.0, 90.0]],
            },
        ],
    };
    let bank = AnchorBank::compile(&spec).unwrap();

    let mut rng = StdRng::seed_from_u64(1234);
    let tensors: Vec<Vec<f32>> = bank
        .layouts()
        .iter()
        .map(|layout| {
            (0..layout.element_count())
                .map(|_| rng.random_range(-6.0f32..3.0))
                .collect()
        })
        .collect();
    let outputs: Vec<RawOutput<'_>> = tensors
        .iter()
        .map(|data| RawOutput::from_slice(data))
        .collect();

    let detector = Detector::new(bank);
    let serial = DetectConfig {
        conf_threshold: 0.3,
        ..DetectConfig::default()
    };
    let parallel = DetectConfig {
        parallel: true,
        ..serial
    };

    let serial_result = detector.detect_with(&outputs, &serial).unwrap();
    let parallel_result = detector.detect_with(&outputs, &parallel).unwrap();
    assert_eq!(serial_result, parallel_result);
    assert!(!serial_result.is_empty());
}

//! Detection orchestration: decode, filter, classify, suppress.
//!
//! The detector owns a compiled [`AnchorBank`] and a default
//! [`DetectConfig`]; every call is an independent, side-effect-free pass over
//! borrowed raw outputs. Working buffers are call-local, so callers may run
//! detect calls from multiple threads against one detector.

use crate::bank::AnchorBank;
use crate::decode::{decode_scale, Candidates, RawOutput};
use crate::suppress::{suppress, SuppressParams, SuppressionMode, DEFAULT_CLASS_OFFSET};
use crate::trace::{trace_event, trace_span};
use crate::util::{YoloPostError, YoloPostResult};
#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// One detected object in model-input pixel coordinates.
///
/// Mapping back to the original image's coordinate space (undoing the
/// preprocessing resize) is the caller's responsibility.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detection {
    /// Left edge.
    pub x1: f32,
    /// Top edge.
    pub y1: f32,
    /// Right edge.
    pub x2: f32,
    /// Bottom edge.
    pub y2: f32,
    /// Fused objectness times class probability.
    pub score: f32,
    /// Class index in `[0, num_classes)`.
    pub class_id: usize,
}

impl Detection {
    /// Corner-form coordinates as an array.
    #[inline]
    pub fn corners(&self) -> [f32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    /// Box width in pixels.
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    /// Box height in pixels.
    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }
}

/// Class assignment policy applied to confidence survivors.
///
/// The two modes change the shape of the output (multi-label can emit several
/// detections per spatial candidate) and the suppression grouping, so the
/// choice is an explicit configuration, never inferred.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ClassMode {
    /// Keep the single best-scoring class per candidate.
    SingleLabel,
    /// Emit one detection per class whose fused score exceeds the threshold.
    MultiLabel {
        /// Secondary per-class cutoff on the fused score.
        class_threshold: f32,
    },
}

/// Tunable detection parameters, settable per detector or per call.
#[derive(Clone, Copy, Debug)]
pub struct DetectConfig {
    /// Objectness cutoff; in single-label mode the fused score must clear it
    /// as well.
    pub conf_threshold: f32,
    /// Overlap above which a lower-scoring box is discarded.
    pub iou_threshold: f32,
    /// Hard cap on returned detections.
    pub max_detections: usize,
    /// Single best class vs one detection per qualifying class.
    pub class_mode: ClassMode,
    /// Whether boxes of different classes may suppress each other.
    pub suppression: SuppressionMode,
    /// Decode scales on the rayon pool (requires the `rayon` feature).
    pub parallel: bool,
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            conf_threshold: 0.5,
            iou_threshold: 0.45,
            max_detections: 300,
            class_mode: ClassMode::SingleLabel,
            suppression: SuppressionMode::ClassAware,
            parallel: false,
        }
    }
}

impl DetectConfig {
    fn validate(&self) -> YoloPostResult<()> {
        if !(0.0..=1.0).contains(&self.conf_threshold) {
            return Err(YoloPostError::InvalidConfig {
                reason: "conf_threshold must be within [0, 1]",
            });
        }
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            return Err(YoloPostError::InvalidConfig {
                reason: "iou_threshold must be within [0, 1]",
            });
        }
        if self.max_detections == 0 {
            return Err(YoloPostError::InvalidConfig {
                reason: "max_detections must be at least 1",
            });
        }
        if let ClassMode::MultiLabel { class_threshold } = self.class_mode {
            if !(0.0..=1.0).contains(&class_threshold) {
                return Err(YoloPostError::InvalidConfig {
                    reason: "class_threshold must be within [0, 1]",
                });
            }
        }
        Ok(())
    }
}

/// Detection pipeline over a compiled anchor bank.
pub struct Detector {
    bank: AnchorBank,
    config: DetectConfig,
}

impl Detector {
    /// Creates a detector with the default configuration.
    pub fn new(bank: AnchorBank) -> Self {
        Self {
            bank,
            config: DetectConfig::default(),
        }
    }

    /// Replaces the stored configuration.
    pub fn with_config(mut self, config: DetectConfig) -> Self {
        self.config = config;
        self
    }

    /// The compiled bank this detector decodes against.
    pub fn bank(&self) -> &AnchorBank {
        &self.bank
    }

    /// The stored configuration.
    pub fn config(&self) -> &DetectConfig {
        &self.config
    }

    /// Runs the full pipeline with the stored configuration.
    pub fn detect(&self, outputs: &[RawOutput<'_>]) -> YoloPostResult<Vec<Detection>> {
        self.detect_with(outputs, &self.config)
    }

    /// Runs the full pipeline with per-call parameters.
    ///
    /// Decodes every scale, concatenates the candidates, keeps those whose
    /// objectness clears `conf_threshold`, assigns classes per `class_mode`
    /// and suppresses overlaps. Zero survivors is a normal empty result.
    pub fn detect_with(
        &self,
        outputs: &[RawOutput<'_>],
        config: &DetectConfig,
    ) -> YoloPostResult<Vec<Detection>> {
        config.validate()?;
        if outputs.is_empty() {
            return Err(YoloPostError::EmptyInput);
        }
        if outputs.len() != self.bank.num_scales() {
            return Err(YoloPostError::ScaleCountMismatch {
                expected: self.bank.num_scales(),
                got: outputs.len(),
            });
        }

        let _span = trace_span!("detect", scales = outputs.len()).entered();

        #[cfg(feature = "rayon")]
        let candidates = if config.parallel {
            self.decode_all_par(outputs)?
        } else {
            self.decode_all(outputs)?
        };
        #[cfg(not(feature = "rayon"))]
        let candidates = self.decode_all(outputs)?;

        trace_event!("decoded", count = candidates.len());

        let survivors = assign_classes(&candidates, config);
        trace_event!("survivors", count = survivors.len());

        let params = SuppressParams {
            iou_threshold: config.iou_threshold,
            max_detections: config.max_detections,
            mode: config.suppression,
            class_offset: DEFAULT_CLASS_OFFSET.max(self.bank.coord_bound()),
        };
        let kept = suppress(&survivors, params);
        trace_event!("kept", count = kept.len());
        Ok(kept)
    }

    fn decode_all(&self, outputs: &[RawOutput<'_>]) -> YoloPostResult<Candidates> {
        let total = self.bank.layouts().iter().map(|l| l.num_candidates()).sum();
        let mut merged = Candidates::with_capacity(self.bank.num_classes(), total);
        for (layout, raw) in self.bank.layouts().iter().zip(outputs) {
            merged.append(decode_scale(layout, *raw)?);
        }
        Ok(merged)
    }

    /// Decodes scales on the rayon pool; results merge in scale order, so the
    /// output is identical to the serial path.
    #[cfg(feature = "rayon")]
    fn decode_all_par(&self, outputs: &[RawOutput<'_>]) -> YoloPostResult<Candidates> {
        let results: Vec<_> = self
            .bank
            .layouts()
            .par_iter()
            .zip(outputs.par_iter())
            .map(|(layout, raw)| decode_scale(layout, *raw))
            .collect();

        let total = self.bank.layouts().iter().map(|l| l.num_candidates()).sum();
        let mut merged = Candidates::with_capacity(self.bank.num_classes(), total);
        for result in results {
            merged.append(result?);
        }
        Ok(merged)
    }
}

/// Applies the confidence filter and class assignment to decoded candidates.
fn assign_classes(candidates: &Candidates, config: &DetectConfig) -> Vec<Detection> {
    let mut survivors = Vec::new();
    for i in 0..candidates.len() {
        if candidates.objectness()[i] <= config.conf_threshold {
            continue;
        }
        let [x1, y1, x2, y2] = candidates.corners(i);
        match config.class_mode {
            ClassMode::SingleLabel => {
                let (class_id, score) = candidates.best_class(i);
                if score > config.conf_threshold {
                    survivors.push(Detection {
                        x1,
                        y1,
                        x2,
                        y2,
                        score,
                        class_id,
                    });
                }
            }
            ClassMode::MultiLabel { class_threshold } => {
                for (class_id, &score) in candidates.class_scores_for(i).iter().enumerate() {
                    if score > class_threshold {
                        survivors.push(Detection {
                            x1,
                            y1,
                            x2,
                            y2,
                            score,
                            class_id,
                        });
                    }
                }
            }
        }
    }
    survivors
}

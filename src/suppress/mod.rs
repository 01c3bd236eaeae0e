//! Greedy non-maximum suppression over scored detections.
//!
//! Suppression consumes confidence-filtered, class-fused detections and keeps
//! the highest-scoring representative of each group of mutually overlapping
//! boxes. Class-aware grouping uses the coordinate offset trick: shifting
//! every box by `class_id * offset` before a single global pass makes
//! cross-class overlap geometrically impossible, provided the offset exceeds
//! the coordinate range. Pairwise comparison is O(n²) over the survivors,
//! which confidence filtering has already reduced by orders of magnitude.

use crate::detect::Detection;

/// Grouping policy for suppression.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SuppressionMode {
    /// Boxes of different classes never suppress each other.
    ClassAware,
    /// Overlap alone decides, regardless of class.
    ClassAgnostic,
}

/// Fallback class separation offset.
///
/// [`SuppressParams::class_offset`] must exceed every coordinate magnitude in
/// the input; the detector widens it from the bank geometry when anchors or
/// input resolution outgrow this value.
pub const DEFAULT_CLASS_OFFSET: f32 = 4096.0;

/// Parameters for one suppression pass.
#[derive(Clone, Copy, Debug)]
pub struct SuppressParams {
    /// Overlap above which a lower-scoring box is discarded.
    pub iou_threshold: f32,
    /// Hard cap on kept boxes; iteration stops once reached.
    pub max_detections: usize,
    /// Grouping policy.
    pub mode: SuppressionMode,
    /// Per-class coordinate shift used by [`SuppressionMode::ClassAware`].
    pub class_offset: f32,
}

impl Default for SuppressParams {
    fn default() -> Self {
        Self {
            iou_threshold: 0.45,
            max_detections: 300,
            mode: SuppressionMode::ClassAware,
            class_offset: DEFAULT_CLASS_OFFSET,
        }
    }
}

/// Intersection-over-union of two corner-form boxes.
///
/// Defined as 0 when the union area is 0, so degenerate boxes never divide by
/// zero and never suppress anything.
pub fn iou(a: [f32; 4], b: [f32; 4]) -> f32 {
    let ix = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let iy = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let intersection = ix * iy;

    let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
    let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
    let union = area_a + area_b - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

/// Sorts indices by descending score with deterministic tie-breaking: equal
/// scores keep their original relative order.
fn sorted_indices_desc(detections: &[Detection]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..detections.len()).collect();
    order.sort_by(|&a, &b| {
        detections[b]
            .score
            .total_cmp(&detections[a].score)
            .then_with(|| a.cmp(&b))
    });
    order
}

/// Runs one greedy suppression pass and returns the kept detections in
/// score-descending order.
///
/// Suppression decisions are made on class-shifted copies when the mode is
/// class-aware; returned detections are taken from the unshifted input, so
/// coordinates pass through bit-exact. An empty input yields an empty output.
pub fn suppress(detections: &[Detection], params: SuppressParams) -> Vec<Detection> {
    if detections.is_empty() || params.max_detections == 0 {
        return Vec::new();
    }

    let shifted: Vec<[f32; 4]> = match params.mode {
        SuppressionMode::ClassAware => detections
            .iter()
            .map(|det| {
                let offset = det.class_id as f32 * params.class_offset;
                [
                    det.x1 + offset,
                    det.y1 + offset,
                    det.x2 + offset,
                    det.y2 + offset,
                ]
            })
            .collect(),
        SuppressionMode::ClassAgnostic => detections.iter().map(Detection::corners).collect(),
    };

    let order = sorted_indices_desc(detections);
    let mut kept: Vec<usize> = Vec::new();
    'outer: for &idx in &order {
        for &prev in &kept {
            if iou(shifted[idx], shifted[prev]) > params.iou_threshold {
                continue 'outer;
            }
        }
        kept.push(idx);
        if kept.len() == params.max_detections {
            break;
        }
    }

    kept.into_iter().map(|idx| detections[idx]).collect()
}

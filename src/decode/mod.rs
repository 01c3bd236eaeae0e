//! Raw tensor decoding into pixel-space candidates.
//!
//! Decoding is pure geometry: every raw attribute passes through the logistic
//! activation exactly once, centers and sizes are mapped through the grid,
//! stride and anchor tables, and nothing is thresholded here. Filtering is
//! policy and belongs to the detector.

use std::cmp::Ordering;

use crate::bank::ScaleLayout;
use crate::util::math::sigmoid;
use crate::util::{YoloPostError, YoloPostResult};

/// Borrowed flat view over one scale's raw output tensor.
///
/// The engine hands over a flat `f32` buffer with logical shape
/// `(anchors, gh, gw, num_classes + 5)`; the element count is checked against
/// the scale layout at decode time. The buffer is read-only and can be
/// discarded once decoding returns.
#[derive(Clone, Copy, Debug)]
pub struct RawOutput<'a> {
    data: &'a [f32],
}

impl<'a> RawOutput<'a> {
    /// Wraps an engine-produced flat buffer.
    pub fn from_slice(data: &'a [f32]) -> Self {
        Self { data }
    }

    /// Returns the element count of the buffer.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true when the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the backing slice.
    pub fn as_slice(&self) -> &'a [f32] {
        self.data
    }
}

/// Decoded candidates in struct-of-arrays form.
///
/// Boxes are corner-form `[x1, y1, x2, y2]` in model-input pixels; class
/// scores are already fused with objectness (`sigmoid(class) * objectness`)
/// and stored flat, `num_classes` entries per candidate.
#[derive(Clone, Debug)]
pub struct Candidates {
    num_classes: usize,
    boxes: Vec<[f32; 4]>,
    objectness: Vec<f32>,
    class_scores: Vec<f32>,
}

impl Candidates {
    pub(crate) fn with_capacity(num_classes: usize, len: usize) -> Self {
        Self {
            num_classes,
            boxes: Vec::with_capacity(len),
            objectness: Vec::with_capacity(len),
            class_scores: Vec::with_capacity(len * num_classes),
        }
    }

    /// Number of candidates held.
    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    /// Returns true when no candidates are held.
    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// Number of classes per candidate.
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Corner-form box for candidate `i`.
    #[inline]
    pub fn corners(&self, i: usize) -> [f32; 4] {
        self.boxes[i]
    }

    /// Objectness per candidate, decode order.
    pub fn objectness(&self) -> &[f32] {
        &self.objectness
    }

    /// Fused per-class scores for candidate `i`.
    #[inline]
    pub fn class_scores_for(&self, i: usize) -> &[f32] {
        let start = i * self.num_classes;
        &self.class_scores[start..start + self.num_classes]
    }

    /// Best class and its fused score for candidate `i`.
    ///
    /// Ties resolve to the lowest class id for reproducible output.
    pub fn best_class(&self, i: usize) -> (usize, f32) {
        let scores = self.class_scores_for(i);
        let mut best = 0usize;
        for (class_id, score) in scores.iter().enumerate().skip(1) {
            if score.total_cmp(&scores[best]) == Ordering::Greater {
                best = class_id;
            }
        }
        (best, scores[best])
    }

    /// Appends another scale's candidates. Class counts must agree; the bank
    /// guarantees this for layouts compiled from one spec.
    pub(crate) fn append(&mut self, mut other: Candidates) {
        debug_assert_eq!(self.num_classes, other.num_classes);
        self.boxes.append(&mut other.boxes);
        self.objectness.append(&mut other.objectness);
        self.class_scores.append(&mut other.class_scores);
    }
}

/// Decodes one scale's raw output into pixel-space candidates.
///
/// Emits one candidate per anchor and grid cell, anchor-major then row-major,
/// matching the tensor layout. Errors with
/// [`ShapeMismatch`](YoloPostError::ShapeMismatch) when the buffer length
/// differs from the layout's element count.
pub fn decode_scale(layout: &ScaleLayout, raw: RawOutput<'_>) -> YoloPostResult<Candidates> {
    let expected = layout.element_count();
    if raw.len() != expected {
        return Err(YoloPostError::ShapeMismatch {
            scale: layout.index(),
            expected,
            got: raw.len(),
        });
    }

    let (grid_width, grid_height) = layout.grid_size();
    let num_attributes = layout.num_attributes();
    let num_classes = num_attributes - 5;
    let stride = layout.stride();
    let grid = layout.grid();
    let data = raw.as_slice();

    let mut out = Candidates::with_capacity(num_classes, layout.num_candidates());
    for (anchor_idx, anchor) in layout.anchors().iter().enumerate() {
        for gy in 0..grid_height {
            for gx in 0..grid_width {
                let base = ((anchor_idx * grid_height + gy) * grid_width + gx) * num_attributes;
                let cell = &data[base..base + num_attributes];
                let [offset_x, offset_y] = grid.offset(gx, gy);

                let cx = (sigmoid(cell[0]) * 2.0 - 0.5 + offset_x) * stride;
                let cy = (sigmoid(cell[1]) * 2.0 - 0.5 + offset_y) * stride;
                let sw = sigmoid(cell[2]) * 2.0;
                let sh = sigmoid(cell[3]) * 2.0;
                let w = sw * sw * anchor[0];
                let h = sh * sh * anchor[1];
                let objectness = sigmoid(cell[4]);

                out.boxes
                    .push([cx - w * 0.5, cy - h * 0.5, cx + w * 0.5, cy + h * 0.5]);
                out.objectness.push(objectness);
                for &class_logit in &cell[5..] {
                    out.class_scores.push(sigmoid(class_logit) * objectness);
                }
            }
        }
    }
    Ok(out)
}

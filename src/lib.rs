//! Post-processing for YOLO-style detector outputs.
//!
//! yolopost turns the raw multi-scale tensors of an exported YOLO detector
//! into a filtered list of pixel-space bounding boxes: grid/anchor coordinate
//! decoding, objectness and class score fusion, confidence thresholding and
//! greedy non-maximum suppression. The inference engine and the image
//! preprocessing that feed it are external collaborators; this crate starts
//! where the engine's flat output buffers end.
//!
//! Per-scale constants (grids, anchors, strides) are compiled once into an
//! immutable [`AnchorBank`]; each detect call is an independent, synchronous
//! pass with no shared mutable state. Optional per-scale parallel decoding is
//! available via the `rayon` feature, and span/event instrumentation via the
//! `tracing` feature.

pub mod bank;
pub mod decode;
pub mod detect;
pub mod grid;
pub mod suppress;
mod trace;
pub mod util;

pub use bank::{AnchorBank, ModelSpec, ScaleLayout, ScaleSpec};
pub use decode::{decode_scale, Candidates, RawOutput};
pub use detect::{ClassMode, DetectConfig, Detection, Detector};
pub use grid::{make_grid, Grid};
pub use suppress::{iou, suppress, SuppressParams, SuppressionMode, DEFAULT_CLASS_OFFSET};
pub use util::{YoloPostError, YoloPostResult};

//! Compiled per-scale decoding constants.
//!
//! Compiling the model spec once amortizes grid construction across detect
//! calls and front-loads configuration validation. The resulting bank is
//! immutable; callers on different threads share it read-only.

use crate::grid::{make_grid, Grid};
use crate::util::{YoloPostError, YoloPostResult};

/// Static description of one detection head.
#[derive(Clone, Debug)]
pub struct ScaleSpec {
    /// Pixels of model input covered by one grid cell.
    pub stride: u32,
    /// Anchor (width, height) size priors in pixels.
    pub anchors: Vec<[f32; 2]>,
}

/// Static model configuration, loaded once and compiled into an [`AnchorBank`].
#[derive(Clone, Debug)]
pub struct ModelSpec {
    /// Number of object classes.
    pub num_classes: usize,
    /// Model input width in pixels.
    pub input_width: u32,
    /// Model input height in pixels.
    pub input_height: u32,
    /// Detection heads, finest first.
    pub scales: Vec<ScaleSpec>,
}

impl ModelSpec {
    /// Standard COCO YOLOv5 geometry: 640x640 input, strides 8/16/32.
    pub fn yolov5_coco() -> Self {
        Self {
            num_classes: 80,
            input_width: 640,
            input_height: 640,
            scales: vec![
                ScaleSpec {
                    stride: 8,
                    anchors: vec![[10.0, 13.0], [16.0, 30.0], [33.0, 23.0]],
                },
                ScaleSpec {
                    stride: 16,
                    anchors: vec![[30.0, 61.0], [62.0, 45.0], [59.0, 119.0]],
                },
                ScaleSpec {
                    stride: 32,
                    anchors: vec![[116.0, 90.0], [156.0, 198.0], [373.0, 326.0]],
                },
            ],
        }
    }
}

/// Compiled constants for one scale: grid, anchors, stride and derived shape.
#[derive(Clone, Debug)]
pub struct ScaleLayout {
    index: usize,
    stride: f32,
    grid_width: usize,
    grid_height: usize,
    anchors: Vec<[f32; 2]>,
    grid: Grid,
    num_attributes: usize,
}

impl ScaleLayout {
    /// Position of this scale in the bank.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Pixels per grid cell.
    pub fn stride(&self) -> f32 {
        self.stride
    }

    /// Grid dimensions `(gw, gh)` in cells.
    pub fn grid_size(&self) -> (usize, usize) {
        (self.grid_width, self.grid_height)
    }

    /// Anchor size priors for this scale.
    pub fn anchors(&self) -> &[[f32; 2]] {
        &self.anchors
    }

    /// Attributes per prediction: `num_classes + 5`.
    pub fn num_attributes(&self) -> usize {
        self.num_attributes
    }

    /// Predictions this scale emits: `anchors * gw * gh`.
    pub fn num_candidates(&self) -> usize {
        self.anchors.len() * self.grid_width * self.grid_height
    }

    /// Element count a raw output buffer must carry for this scale.
    pub fn element_count(&self) -> usize {
        self.num_candidates() * self.num_attributes
    }

    pub(crate) fn grid(&self) -> &Grid {
        &self.grid
    }
}

/// Immutable compiled per-scale constants shared across detect calls.
#[derive(Clone, Debug)]
pub struct AnchorBank {
    num_classes: usize,
    input_width: u32,
    input_height: u32,
    layouts: Vec<ScaleLayout>,
    coord_bound: f32,
}

impl AnchorBank {
    /// Validates a model spec and compiles its per-scale layouts.
    pub fn compile(spec: &ModelSpec) -> YoloPostResult<Self> {
        if spec.num_classes == 0 {
            return Err(YoloPostError::InvalidConfig {
                reason: "num_classes must be at least 1",
            });
        }
        if spec.input_width == 0 || spec.input_height == 0 {
            return Err(YoloPostError::InvalidConfig {
                reason: "input resolution must be nonzero",
            });
        }
        if spec.scales.is_empty() {
            return Err(YoloPostError::InvalidConfig {
                reason: "at least one scale is required",
            });
        }

        let num_attributes = spec.num_classes + 5;
        let mut layouts = Vec::with_capacity(spec.scales.len());
        let mut max_anchor = 0.0f32;
        let mut max_stride = 0.0f32;
        for (index, scale) in spec.scales.iter().enumerate() {
            if scale.stride == 0 {
                return Err(YoloPostError::InvalidConfig {
                    reason: "stride must be nonzero",
                });
            }
            if spec.input_width % scale.stride != 0 || spec.input_height % scale.stride != 0 {
                return Err(YoloPostError::InvalidConfig {
                    reason: "stride must divide the input resolution",
                });
            }
            if scale.anchors.is_empty() {
                return Err(YoloPostError::InvalidConfig {
                    reason: "each scale needs at least one anchor",
                });
            }
            for anchor in &scale.anchors {
                if !(anchor[0].is_finite() && anchor[1].is_finite())
                    || anchor[0] <= 0.0
                    || anchor[1] <= 0.0
                {
                    return Err(YoloPostError::InvalidConfig {
                        reason: "anchor dimensions must be positive and finite",
                    });
                }
                max_anchor = max_anchor.max(anchor[0]).max(anchor[1]);
            }

            let grid_width = (spec.input_width / scale.stride) as usize;
            let grid_height = (spec.input_height / scale.stride) as usize;
            max_stride = max_stride.max(scale.stride as f32);
            layouts.push(ScaleLayout {
                index,
                stride: scale.stride as f32,
                grid_width,
                grid_height,
                anchors: scale.anchors.clone(),
                grid: make_grid(grid_width, grid_height),
                num_attributes,
            });
        }

        // A decoded center stays within half a stride of the input frame and a
        // decoded side never exceeds four times its anchor, so this bounds
        // every corner coordinate the decode can produce.
        let input_max = spec.input_width.max(spec.input_height) as f32;
        let coord_bound = input_max + 0.5 * max_stride + 2.0 * max_anchor;

        Ok(Self {
            num_classes: spec.num_classes,
            input_width: spec.input_width,
            input_height: spec.input_height,
            layouts,
            coord_bound,
        })
    }

    /// Number of compiled scales.
    pub fn num_scales(&self) -> usize {
        self.layouts.len()
    }

    /// Number of object classes.
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Model input resolution `(width, height)` in pixels.
    pub fn input_size(&self) -> (u32, u32) {
        (self.input_width, self.input_height)
    }

    /// All compiled scale layouts, in spec order.
    pub fn layouts(&self) -> &[ScaleLayout] {
        &self.layouts
    }

    /// Layout for one scale, if in range.
    pub fn layout(&self, scale: usize) -> Option<&ScaleLayout> {
        self.layouts.get(scale)
    }

    /// Upper bound on any coordinate the decode can emit; class-aware
    /// suppression uses it to keep per-class coordinate ranges disjoint.
    pub(crate) fn coord_bound(&self) -> f32 {
        self.coord_bound
    }
}

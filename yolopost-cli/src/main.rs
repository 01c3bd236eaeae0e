use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use yolopost::{
    AnchorBank, ClassMode, DetectConfig, Detection, Detector, ModelSpec, RawOutput, ScaleSpec,
    SuppressionMode,
};

const SCHEMA_JSON: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.schema.json"));
const EXAMPLE_JSON: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.example.json"));

#[derive(Parser, Debug)]
#[command(author, version, about = "yolopost CLI (JSON config driven)")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,
    /// Print the JSON schema and exit.
    #[arg(long)]
    print_schema: bool,
    /// Print an example config and exit.
    #[arg(long)]
    print_example: bool,
    /// Enable tracing output for performance profiling.
    #[arg(long)]
    trace: bool,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ClassModeConfig {
    SingleLabel,
    MultiLabel,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum SuppressionConfig {
    ClassAware,
    ClassAgnostic,
}

impl From<SuppressionConfig> for SuppressionMode {
    fn from(value: SuppressionConfig) -> Self {
        match value {
            SuppressionConfig::ClassAware => SuppressionMode::ClassAware,
            SuppressionConfig::ClassAgnostic => SuppressionMode::ClassAgnostic,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ScaleJson {
    stride: u32,
    anchors: Vec<[f32; 2]>,
}

#[derive(Debug, Deserialize)]
struct ModelJson {
    num_classes: usize,
    input_width: u32,
    input_height: u32,
    scales: Vec<ScaleJson>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct DetectJson {
    conf_threshold: f32,
    iou_threshold: f32,
    max_detections: usize,
    class_mode: ClassModeConfig,
    class_threshold: f32,
    suppression: SuppressionConfig,
    parallel: bool,
}

impl Default for DetectJson {
    fn default() -> Self {
        let cfg = DetectConfig::default();
        Self {
            conf_threshold: cfg.conf_threshold,
            iou_threshold: cfg.iou_threshold,
            max_detections: cfg.max_detections,
            class_mode: ClassModeConfig::SingleLabel,
            class_threshold: 0.1,
            suppression: SuppressionConfig::ClassAware,
            parallel: cfg.parallel,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Config {
    model: ModelJson,
    /// One raw little-endian f32 dump per scale, in scale order.
    tensor_paths: Vec<String>,
    output_path: Option<String>,
    #[serde(default)]
    detect: DetectJson,
}

#[derive(Debug, Serialize)]
struct DetectionRecord {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    score: f32,
    class_id: usize,
}

impl From<Detection> for DetectionRecord {
    fn from(value: Detection) -> Self {
        Self {
            x1: value.x1,
            y1: value.y1,
            x2: value.x2,
            y2: value.y2,
            score: value.score,
            class_id: value.class_id,
        }
    }
}

#[derive(Debug, Serialize)]
struct Output {
    count: usize,
    detections: Vec<DetectionRecord>,
}

fn read_tensor(path: &str) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
    let bytes = fs::read(path)?;
    if bytes.len() % 4 != 0 {
        return Err(format!("{path}: byte length {} is not a multiple of 4", bytes.len()).into());
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.trace {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env().add_directive("yolopost=info".parse()?))
            .with_target(false)
            .init();
    }

    if cli.print_schema {
        println!("{SCHEMA_JSON}");
        return Ok(());
    }
    if cli.print_example {
        println!("{EXAMPLE_JSON}");
        return Ok(());
    }

    let config_text = fs::read_to_string(&cli.config)?;
    let config: Config = serde_json::from_str(&config_text)?;
    if config.tensor_paths.is_empty() {
        return Err("tensor_paths must list one dump per scale".into());
    }

    let spec = ModelSpec {
        num_classes: config.model.num_classes,
        input_width: config.model.input_width,
        input_height: config.model.input_height,
        scales: config
            .model
            .scales
            .iter()
            .map(|scale| ScaleSpec {
                stride: scale.stride,
                anchors: scale.anchors.clone(),
            })
            .collect(),
    };
    let bank = AnchorBank::compile(&spec)?;

    let class_mode = match config.detect.class_mode {
        ClassModeConfig::SingleLabel => ClassMode::SingleLabel,
        ClassModeConfig::MultiLabel => ClassMode::MultiLabel {
            class_threshold: config.detect.class_threshold,
        },
    };
    let detector = Detector::new(bank).with_config(DetectConfig {
        conf_threshold: config.detect.conf_threshold,
        iou_threshold: config.detect.iou_threshold,
        max_detections: config.detect.max_detections,
        class_mode,
        suppression: config.detect.suppression.into(),
        parallel: config.detect.parallel,
    });

    let tensors: Vec<Vec<f32>> = config
        .tensor_paths
        .iter()
        .map(|path| read_tensor(path))
        .collect::<Result<_, _>>()?;
    let outputs: Vec<RawOutput<'_>> = tensors
        .iter()
        .map(|data| RawOutput::from_slice(data))
        .collect();

    let detections = detector.detect(&outputs)?;
    let output = Output {
        count: detections.len(),
        detections: detections.into_iter().map(DetectionRecord::from).collect(),
    };
    let json = serde_json::to_string_pretty(&output)?;

    match config.output_path {
        Some(path) => fs::write(path, json)?,
        None => println!("{json}"),
    }

    Ok(())
}

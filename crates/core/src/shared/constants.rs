pub const DETECTOR_MODEL_NAME: &str = "yolov8n.onnx";
pub const DETECTOR_MODEL_URL: &str =
    "https://github.com/reidtag/reidtag/releases/download/v0.1.0/yolov8n.onnx";

pub const REID_MODEL_NAME: &str = "osnet_x1_0.onnx";
pub const REID_MODEL_URL: &str =
    "https://github.com/reidtag/reidtag/releases/download/v0.1.0/osnet_x1_0.onnx";

/// Embedding length produced by the OSNet export.
pub const EMBEDDING_DIM: usize = 512;

/// Squared-L2 distance at or below which an embedding is considered the
/// same person as a stored one.
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.7;

/// Detector score floor for person candidates.
pub const DEFAULT_CONFIDENCE: f32 = 0.4;

/// Max frames a track can be lost before its short-term id is retired
/// (~1 second at 30 fps).
pub const TRACKER_MAX_LOST: usize = 30;

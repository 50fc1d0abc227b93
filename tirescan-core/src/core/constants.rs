//! Constants shared by the inference service and the training job.

/// Side length, in pixels, of the square image the backbone expects.
pub const INPUT_SIZE: u32 = 224;

/// Number of color channels fed to the backbone.
pub const INPUT_CHANNELS: usize = 3;

/// Divisor applied to 8-bit pixel values to bring them into `[0, 1]`.
pub const PIXEL_MAX: f32 = 255.0;

/// Scores strictly above this value are classified as `Normal`.
pub const DECISION_THRESHOLD: f32 = 0.5;

/// Class labels in index order. Index 0 is the negative class of the sigmoid output.
pub const CLASS_LABELS: [&str; 2] = ["Cracked", "Normal"];

/// Name reported by the health endpoint and the model-not-loaded error.
pub const MODEL_DISPLAY_NAME: &str = "MobileNet";

/// Default file name of the frozen backbone.
pub const DEFAULT_BACKBONE_FILE: &str = "mobilenet_v2_backbone.onnx";

/// Default file name of the trained classification head.
pub const DEFAULT_HEAD_FILE: &str = "tire_classifier.safetensors";

/// File extensions recognized as images when scanning a dataset directory.
pub const IMAGE_EXTENSIONS: [&str; 8] = ["png", "jpg", "jpeg", "bmp", "ppm", "tif", "tiff", "webp"];

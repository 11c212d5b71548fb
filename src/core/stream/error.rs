use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to spawn decoder `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Decoder stdout unavailable")]
    StdoutUnavailable,
    #[error("JPEG decode failed: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Invalid config: {0}")]
    Config(#[from] ConfigError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("stream_url is empty")]
    EmptyUrl,
    #[error("crop_ratio must be in (0, 1], got {0}")]
    CropRatio(f64),
    #[error("fps must be positive, got {0}")]
    Fps(f32),
    #[error("scale_width must be positive")]
    ScaleWidth,
    #[error("{0} must be at least 1")]
    Capacity(&'static str),
    #[error("JSON config error: {0}")]
    Json(#[from] serde_json::Error),
}

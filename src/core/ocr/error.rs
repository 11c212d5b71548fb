use thiserror::Error;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("OCR inference failed: {0}")]
    Inference(String),
}

/// 单帧处理错误，记录后跳过该帧
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Unsupported channel count: {0}")]
    UnsupportedChannels(u8),
    #[error("Pixel buffer length {actual} does not match {width}x{height}x{channels}")]
    InvalidFrame {
        width: u32,
        height: u32,
        channels: u8,
        actual: usize,
    },
    #[error("Crop region is empty for {width}x{height}")]
    EmptyCrop { width: u32, height: u32 },
    #[error(transparent)]
    Ocr(#[from] OcrError),
    #[error("OCR engine panicked: {0}")]
    OcrPanicked(String),
}

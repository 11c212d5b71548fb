pub mod classifier;
pub mod cropper;
pub mod error;
pub mod result;
pub mod types;

pub use classifier::{ContentAnalysis, ContentClassifier, ReplayIndicator, TimeEntry};
pub use cropper::{CropRect, RegionCropper};
pub use error::{AnalysisError, OcrError};
pub use result::AnalysisResult;
pub use types::{MockOcrEngine, OcrEngine, OcrLine, OcrResult};

use super::error::OcrError;
use image::RgbImage;
use serde::{Deserialize, Serialize};

/// 多边形边框，每个点为 [x, y]
pub type BBox = Vec<[f32; 2]>;

/// 一行识别结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrLine {
    pub line_id: u32,
    pub text: String,
    /// 0.0 - 1.0
    pub confidence: f32,
    pub bbox: BBox,
}

impl OcrLine {
    pub fn new(line_id: u32, text: impl Into<String>, confidence: f32, bbox: BBox) -> Self {
        Self {
            line_id,
            text: text.into(),
            confidence,
            bbox,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrResult {
    pub texts: Vec<OcrLine>,
    pub avg_confidence: f32,
    pub time_ms: u64,
}

impl OcrResult {
    /// 由识别行构建结果，平均置信度按行计算
    pub fn from_lines(texts: Vec<OcrLine>, time_ms: u64) -> Self {
        let avg_confidence = if texts.is_empty() {
            0.0
        } else {
            texts.iter().map(|l| l.confidence).sum::<f32>() / texts.len() as f32
        };
        Self {
            texts,
            avg_confidence,
            time_ms,
        }
    }

    pub fn empty() -> Self {
        Self::from_lines(Vec::new(), 0)
    }
}

/// OCR 引擎：输入 3 通道 8 位图像，同步返回识别结果
pub trait OcrEngine: Send + Sync {
    fn infer(&self, image: &RgbImage) -> Result<OcrResult, OcrError>;
}

/// 返回固定文字的 OCR 引擎（用于测试和降级场景）
pub struct MockOcrEngine {
    responder: Box<dyn Fn(&RgbImage) -> Result<OcrResult, OcrError> + Send + Sync>,
}

impl MockOcrEngine {
    /// 每次返回同样的几行文字
    pub fn with_texts(texts: Vec<&str>) -> Self {
        let lines: Vec<OcrLine> = texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| OcrLine::new(i as u32, text, 0.95, default_bbox()))
            .collect();
        Self {
            responder: Box::new(move |_| Ok(OcrResult::from_lines(lines.clone(), 1))),
        }
    }

    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&RgbImage) -> Result<OcrResult, OcrError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
        }
    }
}

impl Default for MockOcrEngine {
    fn default() -> Self {
        Self::with_texts(Vec::new())
    }
}

impl OcrEngine for MockOcrEngine {
    fn infer(&self, image: &RgbImage) -> Result<OcrResult, OcrError> {
        (self.responder)(image)
    }
}

fn default_bbox() -> BBox {
    vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]
}

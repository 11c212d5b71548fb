use super::classifier::{ContentAnalysis, ReplayIndicator, TimeEntry};
use super::types::OcrResult;
use serde::{Deserialize, Serialize};

/// 单帧分析结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// 分析完成时间 (ms since UNIX epoch)
    pub timestamp_ms: u64,
    pub frame_number: u64,
    pub original_size: (u32, u32),
    pub cropped_size: (u32, u32),
    pub process_time_ms: u64,
    pub ocr_result: OcrResult,
    pub content_analysis: ContentAnalysis,
}

impl AnalysisResult {
    pub fn has_time(&self) -> bool {
        self.content_analysis.has_time
    }

    pub fn is_replay(&self) -> bool {
        self.content_analysis.is_replay
    }

    pub fn time_entries(&self) -> &[TimeEntry] {
        &self.content_analysis.time_entries
    }

    pub fn replay_indicators(&self) -> &[ReplayIndicator] {
        &self.content_analysis.replay_indicators
    }

    /// 当前帧的代表时间
    pub fn elapsed_seconds(&self) -> Option<u32> {
        self.content_analysis.max_time_sec
    }

    pub fn reached_20_min(&self) -> bool {
        self.content_analysis.reached_20_min
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ocr::classifier::ContentClassifier;
    use crate::core::ocr::types::OcrLine;

    #[test]
    fn test_accessors_and_json() {
        let lines = vec![
            OcrLine::new(0, "21:30", 0.9, vec![[1.0, 2.0]]),
            OcrLine::new(1, "回看", 0.8, vec![]),
        ];
        let content_analysis = ContentClassifier::new().analyze_texts(&lines);
        let result = AnalysisResult {
            timestamp_ms: 1,
            frame_number: 3,
            original_size: (1280, 720),
            cropped_size: (320, 180),
            process_time_ms: 15,
            ocr_result: OcrResult::from_lines(lines, 10),
            content_analysis,
        };

        assert!(result.has_time());
        assert!(result.is_replay());
        assert!(result.reached_20_min());
        assert_eq!(result.elapsed_seconds(), Some(1290));
        assert_eq!(result.time_entries().len(), 1);
        assert_eq!(result.replay_indicators()[0].text, "回看");

        let json = result.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["content_analysis"]["max_time_sec"], 1290);
        assert_eq!(value["cropped_size"][0], 320);

        let back: AnalysisResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
    }
}

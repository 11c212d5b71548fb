//! 内容分析器 - 识别时间、重播等特定内容

use super::types::{BBox, OcrLine};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// MM + 分隔符 + SS。前后不能紧挨数字的约束在匹配后手动检查（regex 不支持环视）
static TIME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([0-9]{1,2})[:：.．\x{3000} ]\s?([0-9]{2})").expect("time regex is valid")
});

/// 20 分钟
pub const KEY_MOMENT_SECS: u32 = 20 * 60;

/// 重播相关关键词
pub const REPLAY_KEYWORDS: &[&str] = &[
    "播",     // 重播、回播
    "重播",
    "回播",
    "录播",
    "重放",
    "REPLAY",
    "RERUN",
    "精选",   // 精选重播
    "回看",
];

/// 直播相关关键词（用于排除误判）
pub const LIVE_KEYWORDS: &[&str] = &["直播", "现场", "LIVE", "实况", "正在播出"];

/// 一条时间识别结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeEntry {
    /// 原始行文本
    pub text: String,
    /// 规范化的 MM:SS
    pub norm: String,
    pub minutes: u32,
    pub seconds: u32,
    pub total_seconds: u32,
    pub confidence: f32,
    pub bbox: BBox,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayIndicator {
    pub text: String,
    pub confidence: f32,
    pub bbox: BBox,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentAnalysis {
    pub time_entries: Vec<TimeEntry>,
    pub replay_indicators: Vec<ReplayIndicator>,
    pub is_replay: bool,
    pub has_time: bool,
    /// 当前帧的代表时间（所有时间中的最大值）
    pub max_time_sec: Option<u32>,
    /// 是否已到达 20 分钟
    pub reached_20_min: bool,
}

pub struct ContentClassifier {
    replay_keywords: Vec<String>,
    live_keywords: Vec<String>,
}

impl ContentClassifier {
    pub fn new() -> Self {
        Self::with_keywords(REPLAY_KEYWORDS, LIVE_KEYWORDS)
    }

    pub fn with_keywords(replay_keywords: &[&str], live_keywords: &[&str]) -> Self {
        Self {
            replay_keywords: replay_keywords.iter().map(|k| k.to_uppercase()).collect(),
            live_keywords: live_keywords.iter().map(|k| k.to_uppercase()).collect(),
        }
    }

    /// 判断是否为时间格式
    pub fn is_time_text(&self, text: &str) -> bool {
        !find_times(&normalize_for_time(text)).is_empty()
    }

    /// 首个时间，格式化为 HH:MM:SS
    pub fn extract_time(&self, text: &str) -> Option<String> {
        self.extract_time_sec(text)
            .map(|sec| format!("{:02}:{:02}:{:02}", sec / 3600, (sec / 60) % 60, sec % 60))
    }

    /// 首个时间的秒数
    pub fn extract_time_sec(&self, text: &str) -> Option<u32> {
        find_times(&normalize_for_time(text))
            .first()
            .map(|(mm, ss)| mm * 60 + ss)
    }

    /// 从多行 OCR 文本中提取全部时间，按行序、行内出现顺序
    pub fn extract_all_times(&self, lines: &[OcrLine]) -> Vec<TimeEntry> {
        let mut entries = Vec::new();
        for line in lines {
            let norm = normalize_for_time(&line.text);
            for (mm, ss) in find_times(&norm) {
                entries.push(TimeEntry {
                    text: line.text.clone(),
                    norm: format!("{:02}:{:02}", mm, ss),
                    minutes: mm,
                    seconds: ss,
                    total_seconds: mm * 60 + ss,
                    confidence: line.confidence,
                    bbox: line.bbox.clone(),
                });
            }
        }
        entries
    }

    /// 判断 OCR 行文本中是否存在 >= 20:00 的时间
    pub fn has_reached_20_min(&self, lines: &[OcrLine]) -> bool {
        self.extract_all_times(lines)
            .iter()
            .map(|t| t.total_seconds)
            .max()
            .is_some_and(|max| max >= KEY_MOMENT_SECS)
    }

    /// 判断是否为重播指示器：先排除直播关键词，再匹配重播关键词
    pub fn is_replay_indicator(&self, text: &str) -> bool {
        let upper = text.to_uppercase();
        if self.live_keywords.iter().any(|k| upper.contains(k.as_str())) {
            return false;
        }
        self.replay_keywords.iter().any(|k| upper.contains(k.as_str()))
    }

    /// 分析 OCR 结果中的时间和重播信息
    pub fn analyze_texts(&self, lines: &[OcrLine]) -> ContentAnalysis {
        let mut result = ContentAnalysis::default();

        let time_entries = self.extract_all_times(lines);
        if !time_entries.is_empty() {
            let max_sec = time_entries.iter().map(|t| t.total_seconds).max();
            result.has_time = true;
            result.max_time_sec = max_sec;
            result.reached_20_min = max_sec.is_some_and(|s| s >= KEY_MOMENT_SECS);
            result.time_entries = time_entries;
        }

        for line in lines {
            let text = line.text.trim();
            if text.is_empty() {
                continue;
            }
            if self.is_replay_indicator(text) {
                result.replay_indicators.push(ReplayIndicator {
                    text: text.to_string(),
                    confidence: line.confidence,
                    bbox: line.bbox.clone(),
                });
                result.is_replay = true;
            }
        }

        result
    }
}

impl Default for ContentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// 时间识别前的规整
/// - 全角转半角
/// - 常见混淆字符：'O'/'o'/'〇'/'零' -> '0'，'：' -> ':'，'。'/'．'/'·'/'・' -> '.'
pub fn normalize_for_time(text: &str) -> String {
    text.chars()
        .map(fold_width)
        .map(|c| match c {
            'O' | 'o' | '〇' | '零' => '0',
            '：' => ':',
            '。' | '．' | '·' | '・' | '｡' => '.',
            other => other,
        })
        .collect()
}

/// 便捷函数：判断文本是否包含时间
pub fn is_time_text(text: &str) -> bool {
    !find_times(&normalize_for_time(text)).is_empty()
}

fn fold_width(c: char) -> char {
    match c {
        '\u{FF01}'..='\u{FF5E}' => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
        '\u{3000}' => ' ',
        '\u{FF65}' => '・',
        other => other,
    }
}

/// 返回所有合法的 (MM, SS)
fn find_times(norm: &str) -> Vec<(u32, u32)> {
    let bytes = norm.as_bytes();
    let mut found = Vec::new();
    let mut pos = 0;

    while let Some(caps) = TIME_REGEX.captures_at(norm, pos) {
        let (Some(whole), Some(mm), Some(ss)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            break;
        };

        let digit_before = whole.start() > 0 && bytes[whole.start() - 1].is_ascii_digit();
        let digit_after = bytes.get(whole.end()).is_some_and(|b| b.is_ascii_digit());

        if digit_before || digit_after {
            // 同一起点不可能有其他匹配，从下一个字符继续
            pos = next_char_boundary(norm, whole.start());
            continue;
        }

        if let (Ok(mm), Ok(ss)) = (mm.as_str().parse::<u32>(), ss.as_str().parse::<u32>()) {
            if mm <= 99 && ss <= 59 {
                found.push((mm, ss));
            }
        }
        pos = whole.end();
    }

    found
}

fn next_char_boundary(text: &str, from: usize) -> usize {
    text[from..]
        .chars()
        .next()
        .map(|c| from + c.len_utf8())
        .unwrap_or(text.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(text: &str) -> OcrLine {
        OcrLine::new(0, text, 0.9, vec![[0.0, 0.0], [10.0, 0.0], [10.0, 5.0], [0.0, 5.0]])
    }

    fn lines(texts: &[&str]) -> Vec<OcrLine> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| OcrLine::new(i as u32, *t, 0.8, vec![]))
            .collect()
    }

    #[test]
    fn test_basic_time_values() {
        let classifier = ContentClassifier::new();
        assert_eq!(classifier.extract_time_sec("01:23"), Some(83));
        assert_eq!(classifier.extract_time_sec("99:59"), Some(5999));
        assert_eq!(classifier.extract_time_sec("12:75"), None);
        assert_eq!(classifier.extract_time_sec("1234"), None);
        assert_eq!(classifier.extract_time_sec("时间 5:07"), Some(307));
    }

    #[test]
    fn test_separators() {
        let classifier = ContentClassifier::new();
        assert_eq!(classifier.extract_time_sec("12.34"), Some(754));
        assert_eq!(classifier.extract_time_sec("12：34"), Some(754));
        assert_eq!(classifier.extract_time_sec("12．34"), Some(754));
        assert_eq!(classifier.extract_time_sec("12 34"), Some(754));
        assert_eq!(classifier.extract_time_sec("12: 34"), Some(754));
        assert_eq!(classifier.extract_time_sec("12\u{3000}34"), Some(754));
    }

    #[test]
    fn test_full_width_matches_half_width() {
        let classifier = ContentClassifier::new();
        let full = classifier.extract_all_times(&[line("０１：２３")]);
        let half = classifier.extract_all_times(&[line("01:23")]);
        assert_eq!(full.len(), 1);
        assert_eq!(full[0].norm, half[0].norm);
        assert_eq!(full[0].total_seconds, 83);
        assert_eq!(full[0].text, "０１：２３");
    }

    #[test]
    fn test_ocr_confusions() {
        assert_eq!(normalize_for_time("O1:2o"), "01:20");
        assert_eq!(normalize_for_time("〇5·3零"), "05.30");
        let classifier = ContentClassifier::new();
        assert_eq!(classifier.extract_time_sec("1O:OO"), Some(600));
    }

    #[test]
    fn test_digit_adjacency_guard() {
        let classifier = ContentClassifier::new();
        assert_eq!(classifier.extract_time_sec("123:45"), None);
        assert_eq!(classifier.extract_time_sec("12:345"), None);
        // 被拒绝的候选之后的合法时间仍能找到
        assert_eq!(classifier.extract_time_sec("123 45:06"), Some(2706));
        assert!(!classifier.is_time_text("2024"));
    }

    #[test]
    fn test_multiple_times_per_line_and_frame() {
        let classifier = ContentClassifier::new();
        let entries = classifier.extract_all_times(&lines(&["03:10 / 21:05", "无", "07:00"]));
        let secs: Vec<u32> = entries.iter().map(|e| e.total_seconds).collect();
        assert_eq!(secs, vec![190, 1265, 420]);
        assert_eq!(entries[1].text, "03:10 / 21:05");
    }

    #[test]
    fn test_extract_time_format() {
        let classifier = ContentClassifier::new();
        assert_eq!(classifier.extract_time("99:59").as_deref(), Some("01:39:59"));
        assert_eq!(classifier.extract_time("05:09").as_deref(), Some("00:05:09"));
        assert_eq!(classifier.extract_time("abc"), None);
    }

    #[test]
    fn test_has_time_and_20_min_flag() {
        let classifier = ContentClassifier::new();

        let analysis = classifier.analyze_texts(&lines(&["19:59", "05:00"]));
        assert!(analysis.has_time);
        assert_eq!(analysis.max_time_sec, Some(1199));
        assert!(!analysis.reached_20_min);

        let analysis = classifier.analyze_texts(&lines(&["05:00", "20:00"]));
        assert_eq!(analysis.max_time_sec, Some(1200));
        assert!(analysis.reached_20_min);
        assert!(classifier.has_reached_20_min(&lines(&["20:00"])));

        let analysis = classifier.analyze_texts(&lines(&["no time here", "12:75"]));
        assert!(!analysis.has_time);
        assert_eq!(analysis.max_time_sec, None);
        assert!(!analysis.reached_20_min);
        assert!(!classifier.has_reached_20_min(&[]));
    }

    #[test]
    fn test_live_keyword_excludes_replay() {
        let classifier = ContentClassifier::new();
        assert!(!classifier.is_replay_indicator("直播中"));
        assert!(!classifier.is_replay_indicator("LIVE 重播"));
        assert!(!classifier.is_replay_indicator("正在播出"));
        assert!(classifier.is_replay_indicator("重播"));
        assert!(classifier.is_replay_indicator("精选回看"));
        assert!(classifier.is_replay_indicator("Replay"));
        assert!(!classifier.is_replay_indicator("12:34"));
    }

    #[test]
    fn test_analyze_replay_indicators_in_line_order() {
        let classifier = ContentClassifier::new();
        let analysis =
            classifier.analyze_texts(&lines(&["  录播  ", "", "直播 回播", "RERUN", "   "]));

        assert!(analysis.is_replay);
        let texts: Vec<&str> = analysis
            .replay_indicators
            .iter()
            .map(|r| r.text.as_str())
            .collect();
        assert_eq!(texts, vec!["录播", "RERUN"]);
    }

    #[test]
    fn test_no_replay() {
        let analysis = ContentClassifier::new().analyze_texts(&lines(&["现场 12:00"]));
        assert!(!analysis.is_replay);
        assert!(analysis.replay_indicators.is_empty());
        assert!(analysis.has_time);
    }

    #[test]
    fn test_custom_keywords() {
        let classifier = ContentClassifier::with_keywords(&["rerun"], &["on air"]);
        assert!(classifier.is_replay_indicator("RERUN tonight"));
        assert!(!classifier.is_replay_indicator("On Air rerun"));
    }

    #[test]
    fn test_module_level_filter() {
        assert!(is_time_text("比赛时间 45:00"));
        assert!(!is_time_text("没有时间"));
    }
}

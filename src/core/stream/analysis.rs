//! 帧处理任务 - 裁剪右上角并做 OCR + 内容分析

use super::frame::{now_ms, Frame, FrameInfo};
use super::queue::BoundedQueue;
use super::stats::PipelineStats;
use crate::core::ocr::classifier::ContentClassifier;
use crate::core::ocr::cropper::RegionCropper;
use crate::core::ocr::error::AnalysisError;
use crate::core::ocr::result::AnalysisResult;
use crate::core::ocr::types::OcrEngine;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub struct AnalysisTask {
    engine: Arc<dyn OcrEngine>,
    cropper: RegionCropper,
    classifier: ContentClassifier,
    frames: Arc<BoundedQueue<Frame>>,
    results: Arc<BoundedQueue<AnalysisResult>>,
    running: Arc<AtomicBool>,
    stats: Arc<Mutex<PipelineStats>>,
    frame_wait: Duration,
}

impl AnalysisTask {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        engine: Arc<dyn OcrEngine>,
        cropper: RegionCropper,
        classifier: ContentClassifier,
        frames: Arc<BoundedQueue<Frame>>,
        results: Arc<BoundedQueue<AnalysisResult>>,
        running: Arc<AtomicBool>,
        stats: Arc<Mutex<PipelineStats>>,
        frame_wait: Duration,
    ) -> Self {
        Self {
            engine,
            cropper,
            classifier,
            frames,
            results,
            running,
            stats,
            frame_wait,
        }
    }

    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("stream-analysis".to_string())
            .spawn(move || self.run())
    }

    /// 运行直到停止信号；停止信号只在等待帧超时后检查
    pub fn run(&self) {
        info!("🔍 OCR处理线程已启动");
        let mut processed = 0u64;

        while self.running.load(Ordering::SeqCst) {
            let Some(frame) = self.frames.pop_timeout(self.frame_wait) else {
                debug!("⏰ 帧队列超时，继续等待...");
                continue;
            };

            processed += 1;
            let info = FrameInfo::from_frame(&frame);
            info!(
                "🎯 开始处理第{}帧 (frame #{})，原始尺寸: {}x{}",
                processed, info.frame_number, info.width, info.height
            );

            match self.process_frame(&frame) {
                Ok(result) => {
                    self.stats.lock().record_analyzed(result.process_time_ms);
                    if self.results.push(result).is_some() {
                        self.stats.lock().record_result_drop();
                        warn!("⚠️  结果队列已满，丢弃最旧结果");
                    }
                }
                Err(e) => {
                    self.stats.lock().record_analysis_failure();
                    error!(
                        "❌ 帧处理失败 (frame #{}, {}x{}, {} 通道, {} bytes): {}",
                        info.frame_number,
                        info.width,
                        info.height,
                        frame.channels,
                        frame.data.len(),
                        e
                    );
                }
            }
        }

        info!("🔍 OCR处理线程结束，共处理 {} 帧", processed);
    }

    /// 单帧：裁剪 → 转 RGB → OCR → 内容分析
    pub fn process_frame(&self, frame: &Frame) -> Result<AnalysisResult, AnalysisError> {
        let start = Instant::now();

        let rgb = self.cropper.crop_to_rgb(frame)?;
        let cropped_size = rgb.dimensions();
        info!("✂️  裁剪完成，裁剪后尺寸: {}x{}", cropped_size.0, cropped_size.1);

        let ocr_result = panic::catch_unwind(AssertUnwindSafe(|| self.engine.infer(&rgb)))
            .map_err(|payload| AnalysisError::OcrPanicked(panic_message(payload.as_ref())))??;
        let process_time_ms = start.elapsed().as_millis() as u64;

        info!(
            "✅ OCR识别完成，耗时: {}ms，识别到{}行文本",
            process_time_ms,
            ocr_result.texts.len()
        );
        for (i, line) in ocr_result.texts.iter().enumerate() {
            debug!(
                "   第{}行: '{}' (置信度: {:.3})",
                i + 1,
                line.text,
                line.confidence
            );
        }

        let content_analysis = self.classifier.analyze_texts(&ocr_result.texts);
        info!(
            "🎯 分析结果 - 时间: {} ({:?}), 重播: {}, 关键时刻: {}",
            content_analysis.has_time,
            content_analysis.max_time_sec,
            content_analysis.is_replay,
            content_analysis.reached_20_min
        );

        Ok(AnalysisResult {
            timestamp_ms: now_ms(),
            frame_number: frame.frame_number,
            original_size: frame.size(),
            cropped_size,
            process_time_ms,
            ocr_result,
            content_analysis,
        })
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

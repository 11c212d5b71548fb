//! 直播流 OCR 监控器

use crate::core::ocr::classifier::{ContentClassifier, ReplayIndicator, TimeEntry};
use crate::core::ocr::cropper::RegionCropper;
use crate::core::ocr::result::AnalysisResult;
use crate::core::ocr::types::OcrEngine;
use crate::core::stream::analysis::AnalysisTask;
use crate::core::stream::capture::{CaptureState, CaptureTask};
use crate::core::stream::command::{CommandBuilder, FfmpegCommand};
use crate::core::stream::config::StreamConfig;
use crate::core::stream::error::StreamError;
use crate::core::stream::frame::Frame;
use crate::core::stream::process::{terminate_slot, ProcessSlot};
use crate::core::stream::queue::BoundedQueue;
use crate::core::stream::stats::{PipelineStats, StatsSnapshot};
use log::{info, warn};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// 一次 start → stop 周期内的共享状态
///
/// 每次启动都重新创建，被放弃的旧线程不会影响下一次运行。
struct PipelineRun {
    running: Arc<AtomicBool>,
    process: ProcessSlot,
    capture_state: Arc<Mutex<CaptureState>>,
    capture: Option<JoinHandle<()>>,
    analysis: Option<JoinHandle<()>>,
}

/// 直播流 OCR 监控器 - 后台抽帧 + 右上角 OCR + 时间/重播分析
///
/// ```ignore
/// let mut monitor = StreamOcrMonitor::new(StreamConfig::new(url), engine)?;
/// monitor.start()?;
/// if let Some(result) = monitor.latest_result() {
///     println!("{:?}", result.elapsed_seconds());
/// }
/// monitor.stop();
/// ```
pub struct StreamOcrMonitor {
    config: StreamConfig,
    engine: Arc<dyn OcrEngine>,
    command: Arc<dyn CommandBuilder>,
    frames: Arc<BoundedQueue<Frame>>,
    results: Arc<BoundedQueue<AnalysisResult>>,
    stats: Arc<Mutex<PipelineStats>>,
    run: Option<PipelineRun>,
}

impl StreamOcrMonitor {
    /// 使用 FFmpeg 作为解码进程
    pub fn new(config: StreamConfig, engine: Arc<dyn OcrEngine>) -> Result<Self, StreamError> {
        let command = Arc::new(FfmpegCommand::live_capture(&config));
        Self::with_command_builder(config, engine, command)
    }

    /// 自定义解码命令
    pub fn with_command_builder(
        config: StreamConfig,
        engine: Arc<dyn OcrEngine>,
        command: Arc<dyn CommandBuilder>,
    ) -> Result<Self, StreamError> {
        config.validate()?;
        info!(
            "🎬 StreamOcrMonitor: created (url: {}, crop: {}, fps: {})",
            config.stream_url, config.crop_ratio, config.fps
        );

        Ok(Self {
            frames: Arc::new(BoundedQueue::new(config.max_queue_size)),
            results: Arc::new(BoundedQueue::new(config.result_queue_size)),
            stats: Arc::new(Mutex::new(PipelineStats::new())),
            config,
            engine,
            command,
            run: None,
        })
    }

    /// 启动捕获和分析线程；已在运行时只记录警告
    pub fn start(&mut self) -> Result<(), StreamError> {
        if self.is_running() {
            warn!("⚠️ 监控已在运行中");
            return Ok(());
        }

        // 上一次运行遗留的帧不再分析
        let stale = self.frames.drain().len();
        if stale > 0 {
            info!("🧹 丢弃上次运行遗留的 {} 帧", stale);
        }

        let running = Arc::new(AtomicBool::new(true));
        let process: ProcessSlot = Arc::new(Mutex::new(None));
        let capture_state = Arc::new(Mutex::new(CaptureState::Idle));

        let capture = CaptureTask::new(
            Arc::clone(&self.command),
            Arc::clone(&self.frames),
            Arc::clone(&running),
            Arc::clone(&process),
            Arc::clone(&self.stats),
            Arc::clone(&capture_state),
            self.config.max_frame_bytes,
            self.config.terminate_timeout(),
        )
        .spawn()?;

        let mut run = PipelineRun {
            running,
            process,
            capture_state,
            capture: Some(capture),
            analysis: None,
        };

        let analysis = AnalysisTask::new(
            Arc::clone(&self.engine),
            RegionCropper::new(self.config.crop_ratio),
            ContentClassifier::new(),
            Arc::clone(&self.frames),
            Arc::clone(&self.results),
            Arc::clone(&run.running),
            Arc::clone(&self.stats),
            self.config.frame_wait(),
        )
        .spawn();

        match analysis {
            Ok(handle) => run.analysis = Some(handle),
            Err(e) => {
                self.run = Some(run);
                self.stop();
                return Err(e.into());
            }
        }
        self.run = Some(run);

        thread::sleep(self.config.startup_grace());
        if let Some(run) = &self.run {
            info!(
                "✅ 监控已启动 - 捕获线程: {}, 处理线程: {}",
                alive(&run.capture),
                alive(&run.analysis)
            );
        }
        Ok(())
    }

    /// 停止所有线程并结束解码进程；可重复调用
    pub fn stop(&mut self) {
        let Some(mut run) = self.run.take() else {
            return;
        };

        info!("🛑 正在停止监控...");
        run.running.store(false, Ordering::SeqCst);

        if terminate_slot(&run.process, self.config.terminate_timeout()) {
            info!("解码进程已结束");
        }

        let timeout = self.config.join_timeout();
        if let Some(handle) = run.capture.take() {
            join_with_timeout(handle, "捕获", timeout);
        }
        if let Some(handle) = run.analysis.take() {
            join_with_timeout(handle, "处理", timeout);
        }

        info!("✅ 监控已停止");
    }

    pub fn is_running(&self) -> bool {
        self.run
            .as_ref()
            .map(|run| run.running.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    pub fn capture_state(&self) -> CaptureState {
        self.run
            .as_ref()
            .map(|run| *run.capture_state.lock())
            .unwrap_or(CaptureState::Idle)
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.lock().snapshot()
    }

    /// 取出最早的一条结果（非阻塞）
    pub fn latest_result(&self) -> Option<AnalysisResult> {
        self.results.try_pop()
    }

    /// 取出所有待处理结果，按时间先后排列
    pub fn all_pending_results(&self) -> Vec<AnalysisResult> {
        self.results.drain()
    }

    /// 以下查询都会消费一条结果
    pub fn is_currently_replay(&self) -> Option<bool> {
        self.latest_result().map(|r| r.is_replay())
    }

    pub fn current_time_info(&self) -> Option<Vec<TimeEntry>> {
        self.latest_result().map(|r| r.content_analysis.time_entries)
    }

    pub fn replay_indicators(&self) -> Option<Vec<ReplayIndicator>> {
        self.latest_result()
            .map(|r| r.content_analysis.replay_indicators)
    }
}

impl Drop for StreamOcrMonitor {
    fn drop(&mut self) {
        self.stop();
        info!("🗑️ StreamOcrMonitor: released");
    }
}

fn alive(handle: &Option<JoinHandle<()>>) -> bool {
    handle.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
}

/// 超时未结束的线程直接放弃（JoinHandle 被 drop 即 detach）
fn join_with_timeout(handle: JoinHandle<()>, name: &str, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            warn!("⚠️ {}线程在 {:?} 内未结束，放弃等待", name, timeout);
            return false;
        }
        thread::sleep(JOIN_POLL_INTERVAL);
    }
    if handle.join().is_err() {
        warn!("⚠️ {}线程异常退出", name);
    }
    true
}

//! 帧捕获任务 - 从解码进程的 stdout 读取 JPEG 帧

use super::command::CommandBuilder;
use super::demux::{decode_jpeg, JpegDemuxer};
use super::error::StreamError;
use super::frame::Frame;
use super::process::{terminate_slot, DecoderProcess, ProcessSlot};
use super::queue::BoundedQueue;
use super::stats::PipelineStats;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use serde::Serialize;
use std::io::{ErrorKind, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub const READ_CHUNK_SIZE: usize = 4096;

/// 进程存活但暂无数据时的退避间隔
const IDLE_BACKOFF: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CaptureState {
    Idle,
    Launching,
    Streaming,
    Terminating,
}

pub struct CaptureTask {
    command: Arc<dyn CommandBuilder>,
    frames: Arc<BoundedQueue<Frame>>,
    running: Arc<AtomicBool>,
    process: ProcessSlot,
    stats: Arc<Mutex<PipelineStats>>,
    state: Arc<Mutex<CaptureState>>,
    max_frame_bytes: usize,
    terminate_timeout: Duration,
}

/// 离开作用域时结束槽位中的进程（包括 panic 路径）
struct SlotGuard<'a> {
    slot: &'a ProcessSlot,
    state: &'a Mutex<CaptureState>,
    timeout: Duration,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        *self.state.lock() = CaptureState::Terminating;
        terminate_slot(self.slot, self.timeout);
        *self.state.lock() = CaptureState::Idle;
    }
}

impl CaptureTask {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        command: Arc<dyn CommandBuilder>,
        frames: Arc<BoundedQueue<Frame>>,
        running: Arc<AtomicBool>,
        process: ProcessSlot,
        stats: Arc<Mutex<PipelineStats>>,
        state: Arc<Mutex<CaptureState>>,
        max_frame_bytes: usize,
        terminate_timeout: Duration,
    ) -> Self {
        Self {
            command,
            frames,
            running,
            process,
            stats,
            state,
            max_frame_bytes,
            terminate_timeout,
        }
    }

    /// 在独立线程中运行，错误只结束本任务
    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("stream-capture".to_string())
            .spawn(move || match self.run() {
                Ok(count) => info!("📭 帧捕获线程结束，共解析 {} 帧", count),
                Err(e) => error!("❌ 帧捕获线程异常: {}", e),
            })
    }

    /// Idle → Launching → Streaming → Terminating → Idle，返回成功解析的帧数
    pub fn run(&self) -> Result<u64, StreamError> {
        *self.state.lock() = CaptureState::Launching;
        let argv = self.command.build_command();
        info!("🎬 启动解码命令: {}", argv.join(" "));

        let (process, stdout) = match DecoderProcess::spawn(&argv) {
            Ok(spawned) => spawned,
            Err(e) => {
                *self.state.lock() = CaptureState::Idle;
                return Err(e);
            }
        };
        *self.process.lock() = Some(process);

        let _guard = SlotGuard {
            slot: &self.process,
            state: &self.state,
            timeout: self.terminate_timeout,
        };

        *self.state.lock() = CaptureState::Streaming;
        info!("🔄 开始读取解码输出流...");
        self.stream(stdout)
    }

    /// 读取字节流直到停止信号或进程退出
    pub fn stream<R: Read>(&self, mut reader: R) -> Result<u64, StreamError> {
        let mut demuxer = JpegDemuxer::with_max_frame_bytes(self.max_frame_bytes);
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        let mut frame_count = 0u64;
        let mut oversized_seen = 0u64;

        while self.running.load(Ordering::SeqCst) {
            let n = match reader.read(&mut chunk) {
                Ok(0) => {
                    if !self.process_alive() {
                        debug!("解码进程已退出，停止读取");
                        break;
                    }
                    thread::sleep(IDLE_BACKOFF);
                    continue;
                }
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };

            self.stats.lock().record_chunk(n);
            debug!(
                "📦 读取数据块: {} bytes, 缓冲区: {} bytes",
                n,
                demuxer.pending_len()
            );

            for jpeg in demuxer.feed(&chunk[..n]) {
                if self.handle_jpeg(&jpeg, frame_count + 1) {
                    frame_count += 1;
                }
            }

            let oversized = demuxer.oversized_discards();
            if oversized > oversized_seen {
                self.stats.lock().record_oversized(oversized - oversized_seen);
                oversized_seen = oversized;
            }
        }

        Ok(frame_count)
    }

    fn handle_jpeg(&self, jpeg: &[u8], frame_number: u64) -> bool {
        match decode_jpeg(jpeg, frame_number) {
            Ok(frame) => {
                info!(
                    "🖼️  成功解析第{}帧，尺寸: {}x{}",
                    frame_number, frame.width, frame.height
                );
                self.stats.lock().record_decoded();
                if self.frames.push(frame).is_some() {
                    warn!("⚠️  帧队列已满，丢弃旧帧");
                    self.stats.lock().record_frame_drop();
                }
                true
            }
            Err(e) => {
                warn!("解析JPEG帧失败 ({} bytes): {}", jpeg.len(), e);
                self.stats.lock().record_decode_failure();
                false
            }
        }
    }

    /// 槽位为空（已被控制器取走）也视为进程结束
    fn process_alive(&self) -> bool {
        match self.process.lock().as_mut() {
            Some(process) => process.is_running(),
            None => false,
        }
    }
}

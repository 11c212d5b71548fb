use super::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 流处理配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// 直播流地址 (HLS/DASH/RTMP...)
    pub stream_url: String,
    /// 右上角裁剪比例，(0, 1]
    pub crop_ratio: f64,
    /// 抽帧帧率
    pub fps: f32,
    /// 缩放宽度，高度按比例自动计算
    pub scale_width: u32,
    /// 帧队列容量
    pub max_queue_size: usize,
    /// 结果队列容量
    pub result_queue_size: usize,
    pub ffmpeg_path: String,
    pub log_level: String,
    pub reconnect: bool,
    pub no_buffer: bool,
    /// 最多输出帧数 (`-vframes`)，None 表示不限制
    pub max_frames: Option<u32>,
    /// 单帧最大字节数，超过后丢弃当前未闭合的帧
    pub max_frame_bytes: usize,
    pub terminate_timeout_ms: u64,
    pub join_timeout_ms: u64,
    pub frame_wait_ms: u64,
    pub startup_grace_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            stream_url: String::new(),
            crop_ratio: 0.25,
            fps: 1.0,
            scale_width: 1280,
            max_queue_size: 10,
            result_queue_size: 10,
            ffmpeg_path: "ffmpeg".to_string(),
            log_level: "error".to_string(),
            reconnect: true,
            no_buffer: true,
            max_frames: None,
            max_frame_bytes: 16 * 1024 * 1024,
            terminate_timeout_ms: 5000,
            join_timeout_ms: 2000,
            frame_wait_ms: 1000,
            startup_grace_ms: 500,
        }
    }
}

impl StreamConfig {
    pub fn new(stream_url: impl Into<String>) -> Self {
        Self {
            stream_url: stream_url.into(),
            ..Default::default()
        }
    }

    /// 低延迟：小队列，快速丢弃旧帧
    pub fn low_latency(stream_url: impl Into<String>) -> Self {
        Self {
            stream_url: stream_url.into(),
            fps: 2.0,
            scale_width: 960,
            max_queue_size: 2,
            result_queue_size: 5,
            ..Default::default()
        }
    }

    /// 高精度：更大的分辨率和裁剪区域
    pub fn high_accuracy(stream_url: impl Into<String>) -> Self {
        Self {
            stream_url: stream_url.into(),
            crop_ratio: 0.3,
            scale_width: 1920,
            ..Default::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_crop_ratio(mut self, crop_ratio: f64) -> Self {
        self.crop_ratio = crop_ratio;
        self
    }

    pub fn with_fps(mut self, fps: f32) -> Self {
        self.fps = fps;
        self
    }

    pub fn with_scale_width(mut self, scale_width: u32) -> Self {
        self.scale_width = scale_width;
        self
    }

    pub fn with_queue_sizes(mut self, frames: usize, results: usize) -> Self {
        self.max_queue_size = frames;
        self.result_queue_size = results;
        self
    }

    pub fn with_max_frames(mut self, max_frames: Option<u32>) -> Self {
        self.max_frames = max_frames;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stream_url.trim().is_empty() {
            return Err(ConfigError::EmptyUrl);
        }
        if !(self.crop_ratio > 0.0 && self.crop_ratio <= 1.0) {
            return Err(ConfigError::CropRatio(self.crop_ratio));
        }
        if !(self.fps > 0.0) || !self.fps.is_finite() {
            return Err(ConfigError::Fps(self.fps));
        }
        if self.scale_width == 0 {
            return Err(ConfigError::ScaleWidth);
        }
        if self.max_queue_size == 0 {
            return Err(ConfigError::Capacity("max_queue_size"));
        }
        if self.result_queue_size == 0 {
            return Err(ConfigError::Capacity("result_queue_size"));
        }
        Ok(())
    }

    pub fn terminate_timeout(&self) -> Duration {
        Duration::from_millis(self.terminate_timeout_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    pub fn frame_wait(&self) -> Duration {
        Duration::from_millis(self.frame_wait_ms)
    }

    pub fn startup_grace(&self) -> Duration {
        Duration::from_millis(self.startup_grace_ms)
    }
}

//! 直播流帧捕获
//!
//! 解码进程 stdout → JPEG 分帧 → 帧队列 → 右上角裁剪 + OCR → 结果队列

pub mod analysis;
pub mod capture;
pub mod command;
pub mod config;
pub mod demux;
pub mod error;
pub mod frame;
pub mod process;
pub mod queue;
pub mod stats;

pub use analysis::AnalysisTask;
pub use capture::{CaptureState, CaptureTask};
pub use command::{CommandBuilder, FfmpegCommand};
pub use config::StreamConfig;
pub use demux::{decode_jpeg, JpegDemuxer};
pub use error::{ConfigError, StreamError};
pub use frame::{Frame, FrameInfo};
pub use process::{DecoderProcess, ProcessSlot};
pub use queue::BoundedQueue;
pub use stats::{PipelineStats, StatsSnapshot};

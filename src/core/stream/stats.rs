use serde::{Deserialize, Serialize};
use std::time::Instant;

/// 流水线诊断统计，由控制器创建后显式传入各个任务
pub struct PipelineStats {
    chunks_read: u64,
    bytes_read: u64,
    frames_decoded: u64,
    decode_failures: u64,
    oversized_discards: u64,
    frames_dropped: u64,
    frames_analyzed: u64,
    analysis_failures: u64,
    results_dropped: u64,
    total_process_ms: u64,
    start_time: Instant,
}

/// 可序列化的统计快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub chunks_read: u64,
    pub bytes_read: u64,
    pub frames_decoded: u64,
    pub decode_failures: u64,
    pub oversized_discards: u64,
    pub frames_dropped: u64,
    pub frames_analyzed: u64,
    pub analysis_failures: u64,
    pub results_dropped: u64,
    pub avg_process_ms: f64,
    pub decode_fps: f64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self {
            chunks_read: 0,
            bytes_read: 0,
            frames_decoded: 0,
            decode_failures: 0,
            oversized_discards: 0,
            frames_dropped: 0,
            frames_analyzed: 0,
            analysis_failures: 0,
            results_dropped: 0,
            total_process_ms: 0,
            start_time: Instant::now(),
        }
    }

    pub fn record_chunk(&mut self, bytes: usize) {
        self.chunks_read += 1;
        self.bytes_read += bytes as u64;
    }

    pub fn record_decoded(&mut self) {
        self.frames_decoded += 1;
    }

    pub fn record_decode_failure(&mut self) {
        self.decode_failures += 1;
    }

    pub fn record_oversized(&mut self, count: u64) {
        self.oversized_discards += count;
    }

    pub fn record_frame_drop(&mut self) {
        self.frames_dropped += 1;
    }

    pub fn record_analyzed(&mut self, process_ms: u64) {
        self.frames_analyzed += 1;
        self.total_process_ms += process_ms;
    }

    pub fn record_analysis_failure(&mut self) {
        self.analysis_failures += 1;
    }

    pub fn record_result_drop(&mut self) {
        self.results_dropped += 1;
    }

    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }

    pub fn frames_analyzed(&self) -> u64 {
        self.frames_analyzed
    }

    pub fn avg_process_ms(&self) -> f64 {
        if self.frames_analyzed == 0 {
            return 0.0;
        }
        self.total_process_ms as f64 / self.frames_analyzed as f64
    }

    pub fn decode_fps(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed < 0.001 {
            return 0.0;
        }
        self.frames_decoded as f64 / elapsed
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            chunks_read: self.chunks_read,
            bytes_read: self.bytes_read,
            frames_decoded: self.frames_decoded,
            decode_failures: self.decode_failures,
            oversized_discards: self.oversized_discards,
            frames_dropped: self.frames_dropped,
            frames_analyzed: self.frames_analyzed,
            analysis_failures: self.analysis_failures,
            results_dropped: self.results_dropped,
            avg_process_ms: self.avg_process_ms(),
            decode_fps: self.decode_fps(),
        }
    }
}

impl Default for PipelineStats {
    fn default() -> Self {
        Self::new()
    }
}

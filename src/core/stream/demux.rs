//! JPEG 字节流分帧
//!
//! ffmpeg `image2pipe` 输出的是首尾相接的 JPEG，用 SOI (`FF D8`) / EOI (`FF D9`) 切分。
//! 只向前扫描：未匹配到 SOI 之前的字节直接丢弃，已找到 SOI 但还没有 EOI 时保留缓冲等待更多数据。

use super::error::StreamError;
use super::frame::Frame;
use image::ImageFormat;
use log::{debug, warn};

pub const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];
pub const JPEG_EOI: [u8; 2] = [0xFF, 0xD9];

pub const DEFAULT_MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

pub struct JpegDemuxer {
    buffer: Vec<u8>,
    /// 缓冲区是否以 SOI 开头（有一帧正在等待 EOI）
    in_frame: bool,
    /// 下一次查找 EOI 的起点，避免重复扫描
    scan_from: usize,
    max_frame_bytes: usize,
    oversized_discards: u64,
}

impl JpegDemuxer {
    pub fn new() -> Self {
        Self::with_max_frame_bytes(DEFAULT_MAX_FRAME_BYTES)
    }

    pub fn with_max_frame_bytes(max_frame_bytes: usize) -> Self {
        Self {
            buffer: Vec::new(),
            in_frame: false,
            scan_from: 0,
            max_frame_bytes: max_frame_bytes.max(JPEG_SOI.len() + JPEG_EOI.len()),
            oversized_discards: 0,
        }
    }

    /// 追加一块数据，返回其中所有完整的 JPEG 字节段（含首尾标记），按出现顺序
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();

        loop {
            if !self.in_frame {
                match find_marker(&self.buffer, &JPEG_SOI, 0) {
                    Some(start) => {
                        if start > 0 {
                            debug!("🗑️ 丢弃 SOI 之前的 {} 字节", start);
                        }
                        self.buffer.drain(..start);
                        self.in_frame = true;
                        self.scan_from = JPEG_SOI.len();
                    }
                    None => {
                        // 末尾的 0xFF 可能是被切开的 SOI 的前半部分
                        let keep = usize::from(self.buffer.last() == Some(&0xFF));
                        let discard = self.buffer.len() - keep;
                        self.buffer.drain(..discard);
                        break;
                    }
                }
            }

            match find_marker(&self.buffer, &JPEG_EOI, self.scan_from) {
                Some(end) => {
                    let frame: Vec<u8> = self.buffer.drain(..end + JPEG_EOI.len()).collect();
                    frames.push(frame);
                    self.in_frame = false;
                    self.scan_from = 0;
                }
                None => {
                    self.scan_from = self.buffer.len().saturating_sub(1).max(JPEG_SOI.len());

                    if self.buffer.len() > self.max_frame_bytes {
                        warn!(
                            "⚠️ 未闭合的帧超过 {} 字节，丢弃并重新同步",
                            self.max_frame_bytes
                        );
                        self.oversized_discards += 1;
                        self.buffer.drain(..JPEG_SOI.len());
                        self.in_frame = false;
                        self.scan_from = 0;
                        continue;
                    }
                    break;
                }
            }
        }

        frames
    }

    /// 当前缓冲（尚未闭合的帧）字节数
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn has_partial_frame(&self) -> bool {
        self.in_frame
    }

    pub fn oversized_discards(&self) -> u64 {
        self.oversized_discards
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.in_frame = false;
        self.scan_from = 0;
    }
}

impl Default for JpegDemuxer {
    fn default() -> Self {
        Self::new()
    }
}

/// 把一段 JPEG 字节解码为帧
pub fn decode_jpeg(data: &[u8], frame_number: u64) -> Result<Frame, StreamError> {
    let image = image::load_from_memory_with_format(data, ImageFormat::Jpeg)?;
    Ok(Frame::from_image(image, frame_number))
}

fn find_marker(haystack: &[u8], marker: &[u8; 2], from: usize) -> Option<usize> {
    if from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(marker.len())
        .position(|w| w == marker)
        .map(|pos| pos + from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageOutputFormat, RgbImage};
    use std::io::Cursor;

    fn fake_jpeg(body: &[u8]) -> Vec<u8> {
        let mut data = JPEG_SOI.to_vec();
        data.extend_from_slice(body);
        data.extend_from_slice(&JPEG_EOI);
        data
    }

    fn sample_stream() -> (Vec<u8>, Vec<Vec<u8>>) {
        let frames = vec![
            fake_jpeg(b"first"),
            fake_jpeg(&[0x01, 0xFF, 0x00, 0xFF, 0xD8, 0x02]),
            fake_jpeg(b""),
            fake_jpeg(&[0xFF; 7]),
        ];
        let mut stream = b"junk before \xFF any frame".to_vec();
        for frame in &frames {
            stream.extend_from_slice(frame);
        }
        (stream, frames)
    }

    #[test]
    fn test_single_feed_emits_all_frames() {
        let (stream, expected) = sample_stream();
        let mut demuxer = JpegDemuxer::new();
        let frames = demuxer.feed(&stream);
        assert_eq!(frames, expected);
        assert!(!demuxer.has_partial_frame());
    }

    #[test]
    fn test_chunk_boundary_independence() {
        let (stream, expected) = sample_stream();

        for chunk_size in 1..=stream.len() {
            let mut demuxer = JpegDemuxer::new();
            let mut frames = Vec::new();
            for chunk in stream.chunks(chunk_size) {
                frames.extend(demuxer.feed(chunk));
            }
            assert_eq!(frames, expected, "chunk_size = {}", chunk_size);
        }
    }

    #[test]
    fn test_unterminated_frame_waits_for_more_data() {
        let mut demuxer = JpegDemuxer::new();
        assert!(demuxer.feed(&[0x00, 0xFF, 0xD8, 0x10, 0x20]).is_empty());
        assert!(demuxer.has_partial_frame());
        assert_eq!(demuxer.pending_len(), 4);

        for _ in 0..100 {
            assert!(demuxer.feed(&[0x11; 64]).is_empty());
        }

        let frames = demuxer.feed(&JPEG_EOI);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0][..2], JPEG_SOI);
        assert_eq!(frames[0][frames[0].len() - 2..], JPEG_EOI);
        assert_eq!(demuxer.pending_len(), 0);
    }

    #[test]
    fn test_junk_without_marker_is_not_retained() {
        let mut demuxer = JpegDemuxer::new();
        assert!(demuxer.feed(&[0x01; 1000]).is_empty());
        assert_eq!(demuxer.pending_len(), 0);

        // 末尾的 0xFF 需要保留
        assert!(demuxer.feed(&[0x01, 0x02, 0xFF]).is_empty());
        assert_eq!(demuxer.pending_len(), 1);
        let frames = demuxer.feed(&[0xD8, 0xAA, 0xFF, 0xD9]);
        assert_eq!(frames, vec![vec![0xFF, 0xD8, 0xAA, 0xFF, 0xD9]]);
    }

    #[test]
    fn test_end_marker_must_follow_start() {
        let mut demuxer = JpegDemuxer::new();
        // EOI 出现在 SOI 之前会被当作垃圾数据
        let frames = demuxer.feed(&[0xFF, 0xD9, 0xFF, 0xD8, 0x05, 0xFF, 0xD9]);
        assert_eq!(frames, vec![vec![0xFF, 0xD8, 0x05, 0xFF, 0xD9]]);
    }

    #[test]
    fn test_oversized_frame_is_discarded_and_resynced() {
        let mut demuxer = JpegDemuxer::with_max_frame_bytes(16);
        let mut stream = vec![0xFF, 0xD8];
        stream.extend_from_slice(&[0x00; 32]);
        assert!(demuxer.feed(&stream).is_empty());
        assert_eq!(demuxer.oversized_discards(), 1);
        assert!(!demuxer.has_partial_frame());

        let frames = demuxer.feed(&fake_jpeg(b"ok"));
        assert_eq!(frames, vec![fake_jpeg(b"ok")]);
    }

    #[test]
    fn test_reset_clears_partial_frame() {
        let mut demuxer = JpegDemuxer::new();
        demuxer.feed(&[0xFF, 0xD8, 0x01]);
        demuxer.reset();
        assert_eq!(demuxer.pending_len(), 0);
        assert!(demuxer.feed(&[0xFF, 0xD9]).is_empty());
    }

    #[test]
    fn test_decode_real_jpeg() {
        let img = RgbImage::from_pixel(32, 16, image::Rgb([200, 10, 10]));
        let mut buffer = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut buffer, ImageOutputFormat::Jpeg(80))
            .unwrap();
        let bytes = buffer.into_inner();

        let mut demuxer = JpegDemuxer::new();
        let frames = demuxer.feed(&bytes);
        assert_eq!(frames.len(), 1);

        let frame = decode_jpeg(&frames[0], 7).unwrap();
        assert_eq!(frame.size(), (32, 16));
        assert_eq!(frame.channels, 3);
        assert_eq!(frame.frame_number, 7);
    }

    #[test]
    fn test_decode_garbage_is_error() {
        let result = decode_jpeg(&fake_jpeg(b"not a jpeg"), 1);
        assert!(matches!(result, Err(StreamError::Decode(_))));
    }
}

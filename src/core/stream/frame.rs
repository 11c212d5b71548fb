use image::{DynamicImage, GenericImageView};
use std::time::{SystemTime, UNIX_EPOCH};

/// 帧数据结构 - 交错存储的 8 位像素
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// 每像素通道数：1 (灰度) / 3 (RGB) / 4 (RGBA)，其他值在裁剪后归一化时报错
    pub channels: u8,
    pub data: Vec<u8>,
    pub timestamp_ms: u64,
    pub frame_number: u64,
}

impl Frame {
    pub fn new(
        width: u32,
        height: u32,
        channels: u8,
        data: Vec<u8>,
        timestamp_ms: u64,
        frame_number: u64,
    ) -> Self {
        Self {
            width,
            height,
            channels,
            data,
            timestamp_ms,
            frame_number,
        }
    }

    /// 从解码后的图像构建帧，保留原始通道布局
    pub fn from_image(image: DynamicImage, frame_number: u64) -> Self {
        let (width, height) = image.dimensions();
        let (channels, data) = match image {
            DynamicImage::ImageLuma8(img) => (1, img.into_raw()),
            DynamicImage::ImageLumaA8(img) => (2, img.into_raw()),
            DynamicImage::ImageRgb8(img) => (3, img.into_raw()),
            DynamicImage::ImageRgba8(img) => (4, img.into_raw()),
            // 16 位 / 浮点格式统一降为 RGB8
            other => (3, other.to_rgb8().into_raw()),
        };

        Self::new(width, height, channels, data, now_ms(), frame_number)
    }

    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// 像素缓冲区长度与宽高、通道数是否一致
    pub fn is_consistent(&self) -> bool {
        self.data.len() == self.pixel_count() * self.channels as usize
    }
}

/// 帧元数据（轻量级，用于传递信息）
#[derive(Debug, Clone, Copy)]
pub struct FrameInfo {
    pub width: u32,
    pub height: u32,
    pub timestamp_ms: u64,
    pub frame_number: u64,
}

impl FrameInfo {
    pub fn from_frame(frame: &Frame) -> Self {
        Self {
            width: frame.width,
            height: frame.height,
            timestamp_ms: frame.timestamp_ms,
            frame_number: frame.frame_number,
        }
    }
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

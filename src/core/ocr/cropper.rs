use super::error::AnalysisError;
use crate::core::stream::frame::Frame;
use image::RgbImage;
use log::debug;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CROP_RATIO: f64 = 0.25;

/// 裁剪区域 (left, top, right, bottom)，右/下为开区间
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl CropRect {
    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}

/// 右上角区域裁剪器
#[derive(Debug, Clone, Copy)]
pub struct RegionCropper {
    crop_ratio: f64,
}

impl RegionCropper {
    /// 比例被限制在 (0, 1]
    pub fn new(crop_ratio: f64) -> Self {
        let crop_ratio = if crop_ratio.is_nan() {
            DEFAULT_CROP_RATIO
        } else {
            crop_ratio.clamp(f64::MIN_POSITIVE, 1.0)
        };
        Self { crop_ratio }
    }

    pub fn crop_ratio(&self) -> f64 {
        self.crop_ratio
    }

    /// 计算右上角裁剪坐标，不涉及像素
    pub fn crop_coordinates(&self, width: u32, height: u32) -> CropRect {
        let crop_width = (width as f64 * self.crop_ratio).floor() as u32;
        let crop_height = (height as f64 * self.crop_ratio).floor() as u32;

        CropRect {
            left: width - crop_width.min(width),
            top: 0,
            right: width,
            bottom: crop_height.min(height),
        }
    }

    /// 裁剪右上角，保留原通道布局
    pub fn crop(&self, frame: &Frame) -> Result<Frame, AnalysisError> {
        check_buffer(frame)?;

        let rect = self.crop_coordinates(frame.width, frame.height);
        if rect.is_empty() {
            return Err(AnalysisError::EmptyCrop {
                width: frame.width,
                height: frame.height,
            });
        }

        let channels = frame.channels as usize;
        let src_stride = frame.width as usize * channels;
        let row_start = rect.left as usize * channels;
        let row_len = rect.width() as usize * channels;

        let mut data = Vec::with_capacity(row_len * rect.height() as usize);
        for y in rect.top as usize..rect.bottom as usize {
            let offset = y * src_stride + row_start;
            data.extend_from_slice(&frame.data[offset..offset + row_len]);
        }

        debug!(
            "裁剪区域: ({}, {}, {}, {}), 原尺寸: {}x{}, 裁剪后: {}x{}",
            rect.left,
            rect.top,
            rect.right,
            rect.bottom,
            frame.width,
            frame.height,
            rect.width(),
            rect.height()
        );

        Ok(Frame::new(
            rect.width(),
            rect.height(),
            frame.channels,
            data,
            frame.timestamp_ms,
            frame.frame_number,
        ))
    }

    pub fn crop_to_rgb(&self, frame: &Frame) -> Result<RgbImage, AnalysisError> {
        let cropped = self.crop(frame)?;
        to_rgb(&cropped)
    }
}

impl Default for RegionCropper {
    fn default() -> Self {
        Self::new(DEFAULT_CROP_RATIO)
    }
}

/// 统一转换为 3 通道 8 位：灰度复制三份，RGBA 去掉 alpha
pub fn to_rgb(frame: &Frame) -> Result<RgbImage, AnalysisError> {
    check_buffer(frame)?;

    let rgb: Vec<u8> = match frame.channels {
        1 => frame.data.iter().flat_map(|&v| [v, v, v]).collect(),
        3 => frame.data.clone(),
        4 => frame
            .data
            .chunks_exact(4)
            .flat_map(|px| [px[0], px[1], px[2]])
            .collect(),
        other => return Err(AnalysisError::UnsupportedChannels(other)),
    };

    RgbImage::from_raw(frame.width, frame.height, rgb).ok_or(AnalysisError::InvalidFrame {
        width: frame.width,
        height: frame.height,
        channels: 3,
        actual: frame.pixel_count() * 3,
    })
}

fn check_buffer(frame: &Frame) -> Result<(), AnalysisError> {
    if frame.is_consistent() {
        Ok(())
    } else {
        Err(AnalysisError::InvalidFrame {
            width: frame.width,
            height: frame.height,
            channels: frame.channels,
            actual: frame.data.len(),
        })
    }
}

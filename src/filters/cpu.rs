// SPDX-License-Identifier: GPL-3.0-only

//! CPU filter engine (software fallback when no GPU is available)
//!
//! Operates on RGBA frames: applies sensor rotation, optional horizontal
//! mirror, and the selected per-pixel color transform in one pass.

use super::{apply_filter_rgb, FilterType, RenderedFrame};
use crate::camera::{CameraFrame, PixelFormat, SensorRotation};
use crate::errors::RenderError;
use std::sync::Arc;

/// Software renderer producing packed RGBA output
#[derive(Debug, Default)]
pub struct CpuFilterEngine;

impl CpuFilterEngine {
    pub fn new() -> Self {
        Self
    }

    /// Render one frame: rotate upright, mirror if requested, apply filter
    pub fn render(
        &self,
        frame: &CameraFrame,
        filter: FilterType,
        rotation: SensorRotation,
        mirror: bool,
    ) -> Result<RenderedFrame, RenderError> {
        let src_width = frame.width as usize;
        let src_height = frame.height as usize;
        let stride = frame.stride as usize;

        if src_width == 0 || src_height == 0 {
            return Err(RenderError::FilterFailed("empty frame".to_string()));
        }

        let (out_width, out_height) = if rotation.swaps_dimensions() {
            (src_height, src_width)
        } else {
            (src_width, src_height)
        };

        let expected = frame.min_buffer_len();
        if frame.data.len() < expected {
            return Err(RenderError::FilterFailed(format!(
                "frame buffer too small: {} < {}",
                frame.data.len(),
                expected
            )));
        }

        let mut out = vec![0u8; out_width * out_height * 4];

        for oy in 0..out_height {
            for ox in 0..out_width {
                // Mirror flips the upright image horizontally
                let ux = if mirror { out_width - 1 - ox } else { ox };

                // Map upright output coordinates back to source coordinates
                let (sx, sy) = match rotation {
                    SensorRotation::None => (ux, oy),
                    SensorRotation::Rotate90 => (oy, src_height - 1 - ux),
                    SensorRotation::Rotate180 => (src_width - 1 - ux, src_height - 1 - oy),
                    SensorRotation::Rotate270 => (src_width - 1 - oy, ux),
                };

                let (mut r, mut g, mut b, a) = match frame.format {
                    PixelFormat::RGBA => {
                        let idx = sy * stride + sx * 4;
                        (
                            frame.data[idx] as f32 / 255.0,
                            frame.data[idx + 1] as f32 / 255.0,
                            frame.data[idx + 2] as f32 / 255.0,
                            frame.data[idx + 3],
                        )
                    }
                    PixelFormat::Gray8 => {
                        let idx = sy * stride + sx;
                        let v = frame.data[idx] as f32 / 255.0;
                        (v, v, v, 255)
                    }
                };

                apply_filter_rgb(&mut r, &mut g, &mut b, filter);

                let out_idx = (oy * out_width + ox) * 4;
                out[out_idx] = (r * 255.0) as u8;
                out[out_idx + 1] = (g * 255.0) as u8;
                out[out_idx + 2] = (b * 255.0) as u8;
                out[out_idx + 3] = a;
            }
        }

        Ok(RenderedFrame {
            width: out_width as u32,
            height: out_height as u32,
            data: Arc::from(out),
            filter,
            sequence: frame.sequence,
            captured_at: frame.captured_at,
            sensor_timestamp_ns: frame.sensor_timestamp_ns,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn frame_2x1(pixels: [[u8; 4]; 2]) -> CameraFrame {
        let mut data = Vec::new();
        for p in pixels {
            data.extend_from_slice(&p);
        }
        CameraFrame {
            width: 2,
            height: 1,
            data: Arc::from(data),
            format: PixelFormat::RGBA,
            stride: 8,
            sequence: 7,
            captured_at: Instant::now(),
            sensor_timestamp_ns: Some(42),
        }
    }

    #[test]
    fn test_standard_passthrough_keeps_pixels() {
        let engine = CpuFilterEngine::new();
        let frame = frame_2x1([[255, 0, 0, 255], [0, 0, 255, 255]]);
        let out = engine
            .render(&frame, FilterType::Standard, SensorRotation::None, false)
            .unwrap();
        assert_eq!(out.width, 2);
        assert_eq!(out.height, 1);
        assert_eq!(&out.data[0..4], &[255, 0, 0, 255]);
        assert_eq!(&out.data[4..8], &[0, 0, 255, 255]);
        assert_eq!(out.sequence, 7);
        assert_eq!(out.sensor_timestamp_ns, Some(42));
    }

    #[test]
    fn test_mirror_flips_horizontally() {
        let engine = CpuFilterEngine::new();
        let frame = frame_2x1([[255, 0, 0, 255], [0, 0, 255, 255]]);
        let out = engine
            .render(&frame, FilterType::Standard, SensorRotation::None, true)
            .unwrap();
        assert_eq!(&out.data[0..4], &[0, 0, 255, 255]);
        assert_eq!(&out.data[4..8], &[255, 0, 0, 255]);
    }

    #[test]
    fn test_rotation_90_swaps_dimensions() {
        let engine = CpuFilterEngine::new();
        let frame = frame_2x1([[255, 0, 0, 255], [0, 0, 255, 255]]);
        let out = engine
            .render(&frame, FilterType::Standard, SensorRotation::Rotate90, false)
            .unwrap();
        assert_eq!(out.width, 1);
        assert_eq!(out.height, 2);
    }

    #[test]
    fn test_mono_output_is_gray() {
        let engine = CpuFilterEngine::new();
        let frame = frame_2x1([[255, 0, 0, 255], [0, 0, 255, 255]]);
        let out = engine
            .render(&frame, FilterType::Mono, SensorRotation::None, false)
            .unwrap();
        assert_eq!(out.data[0], out.data[1]);
        assert_eq!(out.data[1], out.data[2]);
    }

    #[test]
    fn test_short_buffer_is_rejected() {
        let engine = CpuFilterEngine::new();
        let mut frame = frame_2x1([[255, 0, 0, 255], [0, 0, 255, 255]]);
        frame.data = Arc::from(vec![0u8; 4]);
        assert!(matches!(
            engine.render(&frame, FilterType::Standard, SensorRotation::None, false),
            Err(RenderError::FilterFailed(_))
        ));
    }
}

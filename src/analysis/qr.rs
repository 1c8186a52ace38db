// SPDX-License-Identifier: GPL-3.0-only

//! QR code detection
//!
//! Decodes QR codes from camera frames with `rqrr` and parses the payload
//! into a typed action. Decoding cost is bounded by downscaling the frame
//! to at most [`QR_MAX_DIMENSION`] on its longer side before detection.

use crate::camera::{CameraFrame, PixelFormat};
use crate::constants::QR_MAX_DIMENSION;
use crate::errors::AnalysisError;
use image::GrayImage;

/// Where a detection sits within the frame, normalized to `0.0..=1.0`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameRegion {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Typed interpretation of a QR payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QrAction {
    /// Web link
    Url(String),
    /// WiFi network credentials
    WiFi {
        ssid: String,
        password: Option<String>,
        security: Option<String>,
    },
    /// Telephone number
    Phone(String),
    /// Email address
    Email(String),
    /// Anything else
    Text(String),
}

/// A decoded QR code
#[derive(Debug, Clone, PartialEq)]
pub struct QrDetection {
    /// Raw decoded payload
    pub payload: String,
    /// Parsed action
    pub action: QrAction,
    /// Location within the frame
    pub region: FrameRegion,
}

/// Parse a QR payload into the action it encodes
pub fn parse_action(payload: &str) -> QrAction {
    let trimmed = payload.trim();
    let lower = trimmed.to_ascii_lowercase();

    if lower.starts_with("http://") || lower.starts_with("https://") {
        return QrAction::Url(trimmed.to_string());
    }
    if let Some(number) = lower.strip_prefix("tel:") {
        return QrAction::Phone(trimmed[trimmed.len() - number.len()..].to_string());
    }
    if let Some(address) = lower.strip_prefix("mailto:") {
        return QrAction::Email(trimmed[trimmed.len() - address.len()..].to_string());
    }
    if lower.starts_with("wifi:") {
        return parse_wifi(trimmed);
    }
    QrAction::Text(trimmed.to_string())
}

/// Parse the `WIFI:T:WPA;S:name;P:secret;;` payload format
fn parse_wifi(payload: &str) -> QrAction {
    let mut ssid = None;
    let mut password = None;
    let mut security = None;

    let body = &payload["WIFI:".len()..];
    for field in body.split(';') {
        if let Some(value) = field.strip_prefix("S:") {
            ssid = Some(value.to_string());
        } else if let Some(value) = field.strip_prefix("P:") {
            if !value.is_empty() {
                password = Some(value.to_string());
            }
        } else if let Some(value) = field.strip_prefix("T:") {
            if !value.is_empty() {
                security = Some(value.to_string());
            }
        }
    }

    match ssid {
        Some(ssid) => QrAction::WiFi {
            ssid,
            password,
            security,
        },
        // Malformed credentials degrade to plain text
        None => QrAction::Text(payload.to_string()),
    }
}

/// Convert a frame to grayscale, downscaled for bounded decode cost
fn to_decode_image(frame: &CameraFrame) -> Result<GrayImage, AnalysisError> {
    if frame.data.len() < frame.min_buffer_len() {
        return Err(AnalysisError::DecodeFailed(format!(
            "frame buffer too small: {} < {}",
            frame.data.len(),
            frame.min_buffer_len()
        )));
    }

    let width = frame.width;
    let height = frame.height;
    let stride = frame.stride as usize;

    let mut gray = GrayImage::new(width, height);
    for y in 0..height as usize {
        for x in 0..width as usize {
            let luma = match frame.format {
                PixelFormat::RGBA => {
                    let idx = y * stride + x * 4;
                    let (r, g, b) = (
                        frame.data[idx] as f32,
                        frame.data[idx + 1] as f32,
                        frame.data[idx + 2] as f32,
                    );
                    (0.299 * r + 0.587 * g + 0.114 * b) as u8
                }
                PixelFormat::Gray8 => frame.data[y * stride + x],
            };
            gray.put_pixel(x as u32, y as u32, image::Luma([luma]));
        }
    }

    let longest = width.max(height);
    if longest > QR_MAX_DIMENSION {
        let scale = QR_MAX_DIMENSION as f32 / longest as f32;
        let new_width = ((width as f32 * scale) as u32).max(1);
        let new_height = ((height as f32 * scale) as u32).max(1);
        gray = image::imageops::resize(
            &gray,
            new_width,
            new_height,
            image::imageops::FilterType::Triangle,
        );
    }
    Ok(gray)
}

/// Decode the first QR code found in a frame.
///
/// Blocking; run under `spawn_blocking`. `Ok(None)` means no code in the
/// frame, which is the common case and not an error.
pub fn detect_qr(frame: &CameraFrame) -> Result<Option<QrDetection>, AnalysisError> {
    if frame.width == 0 || frame.height == 0 {
        return Err(AnalysisError::DecodeFailed("empty frame".to_string()));
    }

    let gray = to_decode_image(frame)?;
    let (img_width, img_height) = (gray.width() as f32, gray.height() as f32);

    let mut prepared = rqrr::PreparedImage::prepare(gray);
    let grids = prepared.detect_grids();
    let Some(grid) = grids.first() else {
        return Ok(None);
    };

    let (_meta, payload) = grid
        .decode()
        .map_err(|e| AnalysisError::DecodeFailed(e.to_string()))?;

    let xs = grid.bounds.iter().map(|p| p.x as f32);
    let ys = grid.bounds.iter().map(|p| p.y as f32);
    let min_x = xs.clone().fold(f32::INFINITY, f32::min).max(0.0);
    let max_x = xs.fold(f32::NEG_INFINITY, f32::max).min(img_width);
    let min_y = ys.clone().fold(f32::INFINITY, f32::min).max(0.0);
    let max_y = ys.fold(f32::NEG_INFINITY, f32::max).min(img_height);

    let action = parse_action(&payload);
    Ok(Some(QrDetection {
        payload,
        action,
        region: FrameRegion {
            x: min_x / img_width,
            y: min_y / img_height,
            width: (max_x - min_x) / img_width,
            height: (max_y - min_y) / img_height,
        },
    }))
}

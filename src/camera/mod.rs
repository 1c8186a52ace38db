// SPDX-License-Identifier: GPL-3.0-only

//! Shared frame and device types

pub mod source;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

pub use source::{FrameSource, FrameSourceHandle, SourceDescriptor, TestPatternSource};

/// Pixel format for camera frames
///
/// The pipeline renders RGBA; Gray8 exists for monochrome/IR sources and
/// is expanded to RGBA on upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// RGBA - 32-bit with alpha (4 bytes per pixel). Canonical pipeline format.
    RGBA,
    /// Gray8 - 8-bit grayscale (single channel)
    Gray8,
}

impl PixelFormat {
    /// Bytes per pixel for this format
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            Self::RGBA => 4,
            Self::Gray8 => 1,
        }
    }
}

/// Sensor rotation in degrees (clockwise)
///
/// Camera sensors may be physically mounted at various angles relative to
/// the device. The render transform accounts for this so outputs always
/// receive upright frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SensorRotation {
    /// No rotation (sensor is oriented correctly)
    #[default]
    None,
    /// 90 degrees clockwise
    Rotate90,
    /// 180 degrees (upside down)
    Rotate180,
    /// 270 degrees clockwise
    Rotate270,
}

impl SensorRotation {
    /// Create rotation from an integer degree value (normalised to 0-360)
    pub fn from_degrees(degrees: i32) -> Self {
        match degrees.rem_euclid(360) {
            90 => SensorRotation::Rotate90,
            180 => SensorRotation::Rotate180,
            270 => SensorRotation::Rotate270,
            _ => SensorRotation::None,
        }
    }

    /// Rotation in degrees
    pub fn degrees(&self) -> u32 {
        match self {
            SensorRotation::None => 0,
            SensorRotation::Rotate90 => 90,
            SensorRotation::Rotate180 => 180,
            SensorRotation::Rotate270 => 270,
        }
    }

    /// Check if rotation swaps width and height
    pub fn swaps_dimensions(&self) -> bool {
        matches!(self, SensorRotation::Rotate90 | SensorRotation::Rotate270)
    }

    /// Rotation code for the GPU shader (0=None, 1=90CW, 2=180, 3=270CW)
    pub fn gpu_rotation_code(&self) -> u32 {
        match self {
            SensorRotation::None => 0,
            SensorRotation::Rotate90 => 1,
            SensorRotation::Rotate180 => 2,
            SensorRotation::Rotate270 => 3,
        }
    }
}

impl std::fmt::Display for SensorRotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// Framerate as a fraction (numerator/denominator)
///
/// Stores exact framerate to handle NTSC rates like 59.94fps (60000/1001).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Framerate {
    pub num: u32,
    pub denom: u32,
}

impl Framerate {
    /// Create a new framerate from numerator and denominator
    pub fn new(num: u32, denom: u32) -> Self {
        Self {
            num,
            denom: if denom == 0 { 1 } else { denom },
        }
    }

    /// Create a framerate from an integer (e.g., 30 becomes 30/1)
    pub fn from_int(fps: u32) -> Self {
        Self { num: fps, denom: 1 }
    }

    /// Framerate as a floating point value
    pub fn as_f64(&self) -> f64 {
        self.num as f64 / self.denom as f64
    }

    /// Rounded integer framerate
    pub fn as_int(&self) -> u32 {
        self.num / self.denom
    }

    /// Duration of a single frame at this rate
    pub fn frame_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(self.denom as f64 / self.num as f64)
    }
}

impl Default for Framerate {
    fn default() -> Self {
        Self { num: 30, denom: 1 }
    }
}

impl std::fmt::Display for Framerate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.denom != 1 {
            write!(f, "{:.2}", self.as_f64())
        } else {
            write!(f, "{}", self.num)
        }
    }
}

/// Where the camera sits on the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LensFacing {
    /// Rear camera
    #[default]
    Back,
    /// Front (selfie) camera
    Front,
    /// External USB camera
    External,
}

/// Extension capabilities a lens may support
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LensExtension {
    /// Multi-frame noise reduction for low light
    NightMode,
    /// HDR fusion
    Hdr,
    /// Background blur
    Bokeh,
}

/// Represents a camera device and its control ranges
#[derive(Debug, Clone)]
pub struct CameraDevice {
    /// Human-readable device name
    pub name: String,
    /// Stable device identifier
    pub id: String,
    /// Which way the lens faces
    pub facing: LensFacing,
    /// Sensor mounting rotation
    pub rotation: SensorRotation,
    /// Zoom ratio bounds (min, max)
    pub zoom_range: (f32, f32),
    /// Exposure compensation index bounds (min, max)
    pub exposure_range: (i32, i32),
    /// Exposure compensation step per index
    pub exposure_step: f32,
    /// Extensions available on this lens
    pub extensions: Vec<LensExtension>,
}

impl CameraDevice {
    /// A plain device with neutral control ranges, for tests and defaults
    pub fn basic(name: &str, id: &str) -> Self {
        Self {
            name: name.to_string(),
            id: id.to_string(),
            facing: LensFacing::Back,
            rotation: SensorRotation::None,
            zoom_range: (1.0, 1.0),
            exposure_range: (0, 0),
            exposure_step: 0.0,
            extensions: Vec::new(),
        }
    }
}

/// Camera format specification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraFormat {
    pub width: u32,
    pub height: u32,
    /// None for photo mode
    pub framerate: Option<Framerate>,
}

impl std::fmt::Display for CameraFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(fps) = &self.framerate {
            write!(f, "{}x{} @ {}fps", self.width, self.height, fps)
        } else {
            write!(f, "{}x{}", self.width, self.height)
        }
    }
}

/// A single frame from the camera
///
/// Pixel data is reference counted: the pipeline, the analysis dispatcher
/// and any in-flight analyzer each hold a clone, and the buffer is freed
/// when the last clone drops. Frames are never queued — a consumer that
/// holds on too long simply misses newer frames.
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    /// Pixel data (see `format` for layout)
    pub data: Arc<[u8]>,
    /// Pixel format of the data
    pub format: PixelFormat,
    /// Row stride in bytes (may include padding)
    pub stride: u32,
    /// Monotonically increasing frame sequence number
    pub sequence: u64,
    /// Timestamp when the frame was captured (for latency diagnostics)
    pub captured_at: Instant,
    /// Sensor timestamp in nanoseconds, propagated to encoder outputs
    /// so recorded PTS stays consistent with capture time.
    pub sensor_timestamp_ns: Option<u64>,
}

impl CameraFrame {
    /// Minimum buffer length implied by the dimensions, stride and format.
    ///
    /// Consumers that index pixel data directly check `data.len()` against
    /// this before touching the buffer.
    pub fn min_buffer_len(&self) -> usize {
        if self.width == 0 || self.height == 0 {
            return 0;
        }
        (self.height as usize - 1) * self.stride as usize
            + self.width as usize * self.format.bytes_per_pixel() as usize
    }

    /// Copy pixel data into a tightly packed buffer (stride padding removed)
    pub fn packed_data(&self) -> Vec<u8> {
        let bpp = self.format.bytes_per_pixel() as usize;
        let width = self.width as usize;
        let height = self.height as usize;
        let stride = self.stride as usize;
        let row_bytes = width * bpp;

        if stride == row_bytes {
            return self.data.to_vec();
        }

        let mut packed = Vec::with_capacity(row_bytes * height);
        for y in 0..height {
            let start = y * stride;
            let end = start + row_bytes;
            if end <= self.data.len() {
                packed.extend_from_slice(&self.data[start..end]);
            }
        }
        packed
    }
}

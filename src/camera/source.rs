// SPDX-License-Identifier: GPL-3.0-only

//! Frame sources
//!
//! A [`FrameSource`] is the single producer of raw frames, bound to exactly
//! one camera device. It is owned exclusively by the frame pipeline and is
//! recreated whenever the device or resolution changes. Frames are handed
//! to a callback on whatever thread the source captures on; the pipeline
//! turns that into a coalesced render signal.

use super::{CameraDevice, CameraFormat, CameraFrame, PixelFormat};
use crate::errors::ConfigError;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Everything needed to open a frame source
#[derive(Debug, Clone)]
pub struct SourceDescriptor {
    /// Device to bind
    pub device: CameraDevice,
    /// Requested capture format
    pub format: CameraFormat,
}

/// Handle returned from a successful pipeline configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSourceHandle {
    /// Configuration generation; bumped on every successful configure
    pub generation: u64,
    /// Device the source is bound to
    pub device_id: String,
    /// Format the source actually achieved
    pub achieved: CameraFormat,
}

/// Callback invoked for every captured frame, on an arbitrary thread
pub type FrameCallback = Arc<dyn Fn(Arc<CameraFrame>) + Send + Sync>;

/// A running producer of camera frames
pub trait FrameSource: Send {
    /// The descriptor this source was opened with
    fn descriptor(&self) -> &SourceDescriptor;

    /// The format the device actually delivers (may differ from requested)
    fn achieved_format(&self) -> CameraFormat;

    /// Start delivering frames to `on_frame`
    fn start(&mut self, on_frame: FrameCallback) -> Result<(), ConfigError>;

    /// Stop delivering frames and release the device
    fn stop(&mut self);
}

/// Opens frame sources for descriptors; the platform binding lives behind
/// this seam so the pipeline can be driven by real cameras or test sources.
pub trait FrameSourceProvider: Send + Sync {
    fn open(&self, descriptor: &SourceDescriptor) -> Result<Box<dyn FrameSource>, ConfigError>;
}

/// Synthetic frame source producing a moving gradient test pattern
///
/// Runs a dedicated capture thread paced to the requested framerate.
/// Used by tests and as a stand-in when no camera hardware is present.
pub struct TestPatternSource {
    descriptor: SourceDescriptor,
    stop_signal: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
    sequence: Arc<AtomicU64>,
}

impl TestPatternSource {
    pub fn new(descriptor: SourceDescriptor) -> Self {
        Self {
            descriptor,
            stop_signal: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    fn generate_frame(width: u32, height: u32, sequence: u64) -> CameraFrame {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        let phase = (sequence % 255) as u8;
        for y in 0..height {
            for x in 0..width {
                data.push(((x * 255) / width.max(1)) as u8);
                data.push(((y * 255) / height.max(1)) as u8);
                data.push(phase);
                data.push(255);
            }
        }
        CameraFrame {
            width,
            height,
            data: Arc::from(data),
            format: PixelFormat::RGBA,
            stride: width * 4,
            sequence,
            captured_at: Instant::now(),
            sensor_timestamp_ns: None,
        }
    }
}

impl FrameSource for TestPatternSource {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    fn achieved_format(&self) -> CameraFormat {
        self.descriptor.format.clone()
    }

    fn start(&mut self, on_frame: FrameCallback) -> Result<(), ConfigError> {
        if self.thread_handle.is_some() {
            return Err(ConfigError::DeviceUnavailable(
                "source already started".to_string(),
            ));
        }

        let width = self.descriptor.format.width;
        let height = self.descriptor.format.height;
        let frame_duration = self
            .descriptor
            .format
            .framerate
            .unwrap_or_default()
            .frame_duration();
        let stop_signal = Arc::clone(&self.stop_signal);
        let sequence = Arc::clone(&self.sequence);
        let device = self.descriptor.device.id.clone();

        info!(device = %device, width, height, "Starting test pattern source");

        let handle = thread::Builder::new()
            .name("frame-source".to_string())
            .spawn(move || {
                debug!(device = %device, "Capture thread started");
                loop {
                    if stop_signal.load(Ordering::SeqCst) {
                        debug!(device = %device, "Stop signal received");
                        break;
                    }
                    let seq = sequence.fetch_add(1, Ordering::SeqCst);
                    let frame = Self::generate_frame(width, height, seq);
                    on_frame(Arc::new(frame));
                    thread::sleep(frame_duration);
                }
                debug!(device = %device, "Capture thread exiting");
            })
            .map_err(|e| ConfigError::DeviceUnavailable(e.to_string()))?;

        self.thread_handle = Some(handle);
        Ok(())
    }

    fn stop(&mut self) {
        self.stop_signal.store(true, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                warn!("Capture thread panicked during shutdown");
            }
        }
    }
}

impl Drop for TestPatternSource {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Provider opening [`TestPatternSource`] instances
#[derive(Debug, Default)]
pub struct TestPatternProvider;

impl FrameSourceProvider for TestPatternProvider {
    fn open(&self, descriptor: &SourceDescriptor) -> Result<Box<dyn FrameSource>, ConfigError> {
        if descriptor.format.width == 0 || descriptor.format.height == 0 {
            return Err(ConfigError::FormatUnsupported(format!(
                "invalid dimensions {}x{}",
                descriptor.format.width, descriptor.format.height
            )));
        }
        Ok(Box::new(TestPatternSource::new(descriptor.clone())))
    }
}

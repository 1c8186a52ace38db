// SPDX-License-Identifier: GPL-3.0-only

//! Live camera capture core
//!
//! Frame processing for a camera application: a dedicated render thread
//! that filters and fans frames out to preview, encoder, and still-capture
//! outputs; an analysis dispatcher for QR decoding and scene
//! classification; and a session actor owning the recording state machine
//! and timelapse pulsing.
//!
//! The crate is UI-free. Embedders provide the camera binding
//! ([`camera::source::FrameSourceProvider`]), the media sink
//! ([`session::RecordingSink`]), and display surfaces
//! ([`pipeline::OutputSurface`]); everything between the sensor callback
//! and those seams lives here.

pub mod analysis;
pub mod camera;
pub mod config;
pub mod constants;
pub mod errors;
pub mod filters;
pub mod pipeline;
pub mod session;
pub mod storage;

pub use analysis::{
    AnalysisEvent, AnalysisTap, FrameAnalysisDispatcher, QrAction, QrDetection, SceneClassifier,
    SceneLabel,
};
pub use camera::{CameraDevice, CameraFormat, CameraFrame, PixelFormat, SensorRotation};
pub use config::Config;
pub use errors::{CaptureError, CaptureResult, ConfigError, RecordingError, RenderError};
pub use filters::{FilterType, RenderedFrame, ShaderFilterRenderer};
pub use pipeline::{FrameProcessingPipeline, OutputHandle, OutputSurface};
pub use session::{
    CaptureMode, CaptureSessionController, MediaLocation, RecordingSink, RecordingState,
    SessionSnapshot, SinkDescriptor,
};

// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the capture core

use std::fmt;

/// Result type alias using CaptureError
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Top-level error type for the capture core
#[derive(Debug, Clone)]
pub enum CaptureError {
    /// Pipeline/session configuration errors
    Config(ConfigError),
    /// Per-output render errors
    Render(RenderError),
    /// Recording/encoder errors
    Recording(RecordingError),
    /// Frame analysis errors
    Analysis(AnalysisError),
    /// Storage/filesystem errors
    Storage(String),
    /// Generic error with message
    Other(String),
}

/// Configuration errors
///
/// Reported synchronously to the command issuer. The previous configuration
/// stays live; no partial reconfiguration is left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Requested camera device is not available
    DeviceUnavailable(String),
    /// Requested resolution or format is not supported by the device
    FormatUnsupported(String),
    /// Requested extension/capability is not available on the active lens
    ExtensionUnavailable(String),
    /// GPU context or surface creation failed
    GpuInitFailed(String),
    /// Reconfiguration was requested while a recording is active
    RecordingActive,
    /// The pipeline has been released; no further commands are accepted
    Released,
}

/// Per-output, per-frame render errors
///
/// Never fatal to the frame: a failing output is disabled until re-attached
/// while the remaining outputs still receive the frame.
#[derive(Debug, Clone)]
pub enum RenderError {
    /// The destination surface was detached or torn down mid-pass
    SurfaceLost(String),
    /// The destination rejected the frame (full, closed, wrong size)
    PresentFailed(String),
    /// Shader/filter execution failed
    FilterFailed(String),
}

/// Recording/encoder errors
///
/// Force the session to Stopping then Idle with an error payload.
#[derive(Debug, Clone)]
pub enum RecordingError {
    /// Failed to start the media sink
    StartFailed(String),
    /// Failed to stop/finalize the media sink
    StopFailed(String),
    /// Sink failed while recording was in progress
    SinkFailed(String),
    /// Recording already in progress
    AlreadyRecording,
    /// No recording in progress
    NotRecording,
}

/// Per-frame, per-analyzer errors
///
/// Logged and treated as "no result"; the analyzer stays enabled.
#[derive(Debug, Clone)]
pub enum AnalysisError {
    /// QR decoding failed on this frame
    DecodeFailed(String),
    /// Scene classifier returned an error for this frame
    ClassifierFailed(String),
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::Config(e) => write!(f, "Configuration error: {}", e),
            CaptureError::Render(e) => write!(f, "Render error: {}", e),
            CaptureError::Recording(e) => write!(f, "Recording error: {}", e),
            CaptureError::Analysis(e) => write!(f, "Analysis error: {}", e),
            CaptureError::Storage(msg) => write!(f, "Storage error: {}", msg),
            CaptureError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::DeviceUnavailable(msg) => write!(f, "Device unavailable: {}", msg),
            ConfigError::FormatUnsupported(msg) => write!(f, "Format unsupported: {}", msg),
            ConfigError::ExtensionUnavailable(msg) => write!(f, "Extension unavailable: {}", msg),
            ConfigError::GpuInitFailed(msg) => write!(f, "GPU initialization failed: {}", msg),
            ConfigError::RecordingActive => {
                write!(f, "Cannot reconfigure while recording; stop first")
            }
            ConfigError::Released => write!(f, "Pipeline has been released"),
        }
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::SurfaceLost(msg) => write!(f, "Surface lost: {}", msg),
            RenderError::PresentFailed(msg) => write!(f, "Present failed: {}", msg),
            RenderError::FilterFailed(msg) => write!(f, "Filter failed: {}", msg),
        }
    }
}

impl fmt::Display for RecordingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordingError::StartFailed(msg) => write!(f, "Failed to start recording: {}", msg),
            RecordingError::StopFailed(msg) => write!(f, "Failed to stop recording: {}", msg),
            RecordingError::SinkFailed(msg) => write!(f, "Media sink failed: {}", msg),
            RecordingError::AlreadyRecording => write!(f, "Recording already in progress"),
            RecordingError::NotRecording => write!(f, "No recording in progress"),
        }
    }
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisError::DecodeFailed(msg) => write!(f, "QR decode failed: {}", msg),
            AnalysisError::ClassifierFailed(msg) => write!(f, "Classifier failed: {}", msg),
        }
    }
}

impl std::error::Error for CaptureError {}
impl std::error::Error for ConfigError {}
impl std::error::Error for RenderError {}
impl std::error::Error for RecordingError {}
impl std::error::Error for AnalysisError {}

// Conversions from sub-errors to CaptureError
impl From<ConfigError> for CaptureError {
    fn from(err: ConfigError) -> Self {
        CaptureError::Config(err)
    }
}

impl From<RenderError> for CaptureError {
    fn from(err: RenderError) -> Self {
        CaptureError::Render(err)
    }
}

impl From<RecordingError> for CaptureError {
    fn from(err: RecordingError) -> Self {
        CaptureError::Recording(err)
    }
}

impl From<AnalysisError> for CaptureError {
    fn from(err: AnalysisError) -> Self {
        CaptureError::Analysis(err)
    }
}

impl From<std::io::Error> for CaptureError {
    fn from(err: std::io::Error) -> Self {
        CaptureError::Storage(err.to_string())
    }
}

impl From<String> for CaptureError {
    fn from(msg: String) -> Self {
        CaptureError::Other(msg)
    }
}

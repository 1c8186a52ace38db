// SPDX-License-Identifier: GPL-3.0-only

//! Recording state machine and the media sink seam
//!
//! Exactly one recording exists per session; every transition goes through
//! the session actor, so states can never race. The media sink (encoder,
//! muxer, storage) lives behind [`RecordingSink`] and is a black box to
//! this crate.

use crate::camera::Framerate;
use crate::errors::RecordingError;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

/// Lifecycle of the single per-session recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordingState {
    /// No recording; the only state that allows reconfiguration
    #[default]
    Idle,
    /// Sink start requested, not yet confirmed
    Starting,
    /// Sink is consuming frames
    Recording,
    /// Sink is started but paused
    Paused,
    /// Sink stop requested, finalization in progress
    Stopping,
}

impl RecordingState {
    /// Whether a recording exists in any form
    pub fn is_active(&self) -> bool {
        !matches!(self, RecordingState::Idle)
    }
}

impl std::fmt::Display for RecordingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RecordingState::Idle => "idle",
            RecordingState::Starting => "starting",
            RecordingState::Recording => "recording",
            RecordingState::Paused => "paused",
            RecordingState::Stopping => "stopping",
        };
        write!(f, "{}", name)
    }
}

/// Everything a sink needs to start a recording
#[derive(Debug, Clone)]
pub struct SinkDescriptor {
    /// Unique id of this recording session
    pub session_id: Uuid,
    /// Destination file path
    pub destination: PathBuf,
    /// Human-readable name, e.g. `video_2026-08-23_14-03-52.mkv`
    pub display_name: String,
    /// Encoded frame width
    pub width: u32,
    /// Encoded frame height
    pub height: u32,
    /// Target framerate
    pub framerate: Framerate,
    /// Target bitrate in kbps
    pub bitrate_kbps: u32,
}

/// Where a finished recording ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaLocation {
    pub path: PathBuf,
    pub display_name: String,
}

/// Media sink: encoder plus muxer plus storage.
///
/// Calls are made from the session actor only and in a fixed order:
/// `start`, any interleaving of `pause`/`resume`, then `stop`. `start`
/// confirms synchronously; failures after confirmation are reported
/// asynchronously through
/// [`CaptureSessionController::report_sink_failure`](crate::session::CaptureSessionController::report_sink_failure).
pub trait RecordingSink: Send + Sync {
    /// Begin a recording; returning `Ok` confirms frames are being consumed
    fn start(&self, descriptor: &SinkDescriptor) -> Result<(), RecordingError>;

    /// Suspend encoding without finalizing
    fn pause(&self) -> Result<(), RecordingError>;

    /// Resume a paused recording
    fn resume(&self) -> Result<(), RecordingError>;

    /// Finalize and return where the media landed
    fn stop(&self) -> Result<MediaLocation, RecordingError>;

    /// Wall-clock duration recorded so far, if the sink tracks it
    fn recorded_duration(&self) -> Option<Duration> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_idle_is_inactive() {
        assert!(!RecordingState::Idle.is_active());
        assert!(RecordingState::Starting.is_active());
        assert!(RecordingState::Recording.is_active());
        assert!(RecordingState::Paused.is_active());
        assert!(RecordingState::Stopping.is_active());
    }
}

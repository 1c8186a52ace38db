// SPDX-License-Identifier: GPL-3.0-only

//! Published session state
//!
//! The session actor is the single writer of [`SessionSnapshot`]; consumers
//! observe it through a `tokio::sync::watch` receiver and never talk to the
//! actor to read state.

use crate::analysis::{QrDetection, SceneLabel};
use crate::camera::{CameraFormat, LensExtension};
use crate::filters::FilterType;
use crate::session::recording::RecordingState;
use std::time::Duration;

/// What the session is capturing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureMode {
    #[default]
    Photo,
    Video,
}

impl std::fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureMode::Photo => write!(f, "photo"),
            CaptureMode::Video => write!(f, "video"),
        }
    }
}

/// Point-in-time view of the whole session
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    /// Capture mode; timelapse only applies in Video
    pub mode: CaptureMode,
    /// Timelapse pulsing enabled for the next/current recording
    pub timelapse: bool,
    /// Recording lifecycle state
    pub recording_state: RecordingState,
    /// Convenience flag: a recording exists and is not paused
    pub recording: bool,
    /// Convenience flag: a recording exists and is paused
    pub paused: bool,
    /// Active recording duration, excluding time spent paused
    pub elapsed: Duration,
    /// Frames captured by the timelapse pulse in the current recording
    pub timelapse_frames: u64,

    /// Current zoom ratio and the device's bounds
    pub zoom_ratio: f32,
    pub zoom_range: (f32, f32),
    /// Exposure compensation index, bounds, and step
    pub exposure_index: i32,
    pub exposure_range: (i32, i32),
    pub exposure_step: f32,

    /// Filter applied to rendered output
    pub active_filter: FilterType,
    /// Filters selectable on this device (always all five today)
    pub available_filters: Vec<FilterType>,
    /// Extensions the active lens supports
    pub available_extensions: Vec<LensExtension>,
    /// Extension currently engaged
    pub active_extension: Option<LensExtension>,

    /// Resolution the source actually achieved
    pub achieved_format: Option<CameraFormat>,

    /// QR decoding of the rendered stream enabled
    pub qr_detection: bool,
    /// Scene classification of the rendered stream enabled
    pub scene_detection: bool,
    /// Most recent QR detection; sticky until cleared
    pub last_qr: Option<QrDetection>,
    /// Most recent scene classification; last one wins
    pub last_scene: Option<Vec<SceneLabel>>,

    /// Last recording failure, cleared when a new recording starts
    pub last_error: Option<String>,
}

impl SessionSnapshot {
    /// Recompute the convenience flags from the recording state
    pub(crate) fn sync_flags(&mut self) {
        self.recording = matches!(
            self.recording_state,
            RecordingState::Starting | RecordingState::Recording | RecordingState::Stopping
        );
        self.paused = self.recording_state == RecordingState::Paused;
    }
}

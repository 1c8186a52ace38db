// SPDX-License-Identifier: GPL-3.0-only

//! Capture session controller
//!
//! A single actor task owns every piece of session state: capture mode,
//! device and resolution selection, the recording state machine, and the
//! timelapse pulse. Commands arrive over a channel and are processed one
//! at a time, so recording transitions can never interleave. Consumers
//! read state through a `watch` snapshot instead of querying the actor.

pub mod recording;
pub mod state;
pub mod timelapse;

use crate::analysis::{AnalysisEvent, AnalysisTap, FrameAnalysisDispatcher};
use crate::camera::source::SourceDescriptor;
use crate::camera::{CameraDevice, CameraFormat, Framerate, LensExtension};
use crate::config::Config;
use crate::constants::ResolutionTier;
use crate::errors::{CaptureError, ConfigError, RecordingError, RenderError};
use crate::filters::{FilterType, RenderedFrame};
use crate::pipeline::{FrameProcessingPipeline, StillCaptureSurface};
use crate::storage::{self, MediaKind};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub use recording::{MediaLocation, RecordingSink, RecordingState, SinkDescriptor};
pub use state::{CaptureMode, SessionSnapshot};
pub use timelapse::TimelapsePulse;

/// How long a still capture waits for the next rendered frame
const PHOTO_CAPTURE_TIMEOUT: Duration = Duration::from_secs(5);

enum Command {
    SetMode(CaptureMode, oneshot::Sender<Result<(), ConfigError>>),
    SetTimelapse(bool, oneshot::Sender<Result<(), ConfigError>>),
    SelectDevice(CameraDevice, oneshot::Sender<Result<(), ConfigError>>),
    SetResolutionTier(ResolutionTier, oneshot::Sender<Result<(), ConfigError>>),
    SetExtension(
        Option<LensExtension>,
        oneshot::Sender<Result<(), ConfigError>>,
    ),
    SetFilter(FilterType),
    SetZoom(f32),
    SetExposure(i32),
    SetQrDetection(bool),
    SetSceneDetection(bool),
    ClearQr,
    CapturePhoto(oneshot::Sender<Result<RenderedFrame, CaptureError>>),
    StartRecording(oneshot::Sender<Result<(), RecordingError>>),
    PauseRecording(oneshot::Sender<Result<(), RecordingError>>),
    ResumeRecording(oneshot::Sender<Result<(), RecordingError>>),
    StopRecording(oneshot::Sender<Result<MediaLocation, RecordingError>>),
    SinkFailure(RecordingError),
    Shutdown(oneshot::Sender<()>),
}

/// Handle to the session actor
///
/// Cloneable; all methods queue commands. Methods returning a `Result`
/// resolve once the actor has processed the command.
#[derive(Clone)]
pub struct CaptureSessionController {
    commands: mpsc::UnboundedSender<Command>,
    snapshot: watch::Receiver<SessionSnapshot>,
}

impl CaptureSessionController {
    /// Spawn the session actor onto the current runtime.
    ///
    /// The actor immediately configures the pipeline for `device` at the
    /// config's resolution tier, applies the config's default filter and
    /// mirror preference, and tees rendered frames into `dispatcher`.
    /// `analysis_events` is normally the receiver the dispatcher was
    /// created with; its events land in the published snapshot.
    pub fn spawn(
        pipeline: Arc<FrameProcessingPipeline>,
        sink: Arc<dyn RecordingSink>,
        dispatcher: Arc<FrameAnalysisDispatcher>,
        analysis_events: mpsc::UnboundedReceiver<AnalysisEvent>,
        config: Config,
        device: CameraDevice,
    ) -> Self {
        let mut snapshot = SessionSnapshot {
            active_filter: config.default_filter,
            available_filters: FilterType::ALL.to_vec(),
            available_extensions: device.extensions.clone(),
            zoom_ratio: device.zoom_range.0,
            zoom_range: device.zoom_range,
            exposure_range: device.exposure_range,
            exposure_step: device.exposure_step,
            ..SessionSnapshot::default()
        };
        snapshot.sync_flags();
        let (snapshot_tx, snapshot_rx) = watch::channel(snapshot.clone());
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (ticks_tx, ticks_rx) = mpsc::unbounded_channel();

        let actor = SessionActor {
            pipeline,
            sink,
            dispatcher,
            config,
            device,
            mode: CaptureMode::default(),
            timelapse: false,
            tier: ResolutionTier::default(),
            extension: None,
            pulse: None,
            record_started: None,
            accumulated: Duration::ZERO,
            snapshot,
            snapshot_tx,
            ticks_tx,
        };
        tokio::spawn(actor.run(commands_rx, analysis_events, ticks_rx));

        Self {
            commands: commands_tx,
            snapshot: snapshot_rx,
        }
    }

    /// Current session state
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver for observing state changes
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.clone()
    }

    async fn config_request(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<(), ConfigError>>) -> Command,
    ) -> Result<(), ConfigError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .map_err(|_| ConfigError::Released)?;
        rx.await.map_err(|_| ConfigError::Released)?
    }

    /// Switch between photo and video capture. Idle only.
    pub async fn set_mode(&self, mode: CaptureMode) -> Result<(), ConfigError> {
        self.config_request(|tx| Command::SetMode(mode, tx)).await
    }

    /// Enable timelapse pulsing for the next video recording. Idle only.
    pub async fn set_timelapse(&self, enabled: bool) -> Result<(), ConfigError> {
        self.config_request(|tx| Command::SetTimelapse(enabled, tx))
            .await
    }

    /// Switch to another camera device. Idle only.
    pub async fn select_device(&self, device: CameraDevice) -> Result<(), ConfigError> {
        self.config_request(|tx| Command::SelectDevice(device, tx))
            .await
    }

    /// Change the capture resolution tier. Idle only.
    pub async fn set_resolution_tier(&self, tier: ResolutionTier) -> Result<(), ConfigError> {
        self.config_request(|tx| Command::SetResolutionTier(tier, tx))
            .await
    }

    /// Engage or clear a lens extension. Idle only.
    pub async fn set_extension(
        &self,
        extension: Option<LensExtension>,
    ) -> Result<(), ConfigError> {
        self.config_request(|tx| Command::SetExtension(extension, tx))
            .await
    }

    /// Select the render filter; allowed at any time
    pub fn set_filter(&self, filter: FilterType) {
        let _ = self.commands.send(Command::SetFilter(filter));
    }

    /// Set the zoom ratio, clamped to the device bounds
    pub fn set_zoom(&self, ratio: f32) {
        let _ = self.commands.send(Command::SetZoom(ratio));
    }

    /// Set the exposure compensation index, clamped to the device bounds
    pub fn set_exposure(&self, index: i32) {
        let _ = self.commands.send(Command::SetExposure(index));
    }

    /// Enable or disable QR decoding of the rendered stream
    pub fn set_qr_detection(&self, enabled: bool) {
        let _ = self.commands.send(Command::SetQrDetection(enabled));
    }

    /// Enable or disable scene classification of the rendered stream
    pub fn set_scene_detection(&self, enabled: bool) {
        let _ = self.commands.send(Command::SetSceneDetection(enabled));
    }

    /// Clear the sticky QR detection from the snapshot
    pub fn clear_qr(&self) {
        let _ = self.commands.send(Command::ClearQr);
    }

    /// Capture one still frame through a one-shot output.
    ///
    /// Does not touch the recording state; photos can be taken while a
    /// video recording runs.
    pub async fn capture_photo(&self) -> Result<RenderedFrame, CaptureError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::CapturePhoto(tx))
            .map_err(|_| CaptureError::Config(ConfigError::Released))?;
        rx.await
            .map_err(|_| CaptureError::Config(ConfigError::Released))?
    }

    /// Begin a video recording
    pub async fn start_recording(&self) -> Result<(), RecordingError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::StartRecording(tx))
            .map_err(|_| RecordingError::StartFailed("session terminated".to_string()))?;
        rx.await
            .map_err(|_| RecordingError::StartFailed("session terminated".to_string()))?
    }

    /// Pause the recording; already paused is a no-op
    pub async fn pause_recording(&self) -> Result<(), RecordingError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::PauseRecording(tx))
            .map_err(|_| RecordingError::NotRecording)?;
        rx.await.map_err(|_| RecordingError::NotRecording)?
    }

    /// Resume the recording; already recording is a no-op
    pub async fn resume_recording(&self) -> Result<(), RecordingError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::ResumeRecording(tx))
            .map_err(|_| RecordingError::NotRecording)?;
        rx.await.map_err(|_| RecordingError::NotRecording)?
    }

    /// Stop and finalize the recording
    pub async fn stop_recording(&self) -> Result<MediaLocation, RecordingError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::StopRecording(tx))
            .map_err(|_| RecordingError::StopFailed("session terminated".to_string()))?;
        rx.await
            .map_err(|_| RecordingError::StopFailed("session terminated".to_string()))?
    }

    /// Report an asynchronous media sink failure.
    ///
    /// For sink integrations whose errors surface outside the start/stop
    /// call path. Treated as stop-with-error.
    pub fn report_sink_failure(&self, error: RecordingError) {
        let _ = self.commands.send(Command::SinkFailure(error));
    }

    /// Stop any recording and terminate the actor
    pub async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(Command::Shutdown(tx)).is_ok() {
            let _ = rx.await;
        }
    }
}

struct SessionActor {
    pipeline: Arc<FrameProcessingPipeline>,
    sink: Arc<dyn RecordingSink>,
    dispatcher: Arc<FrameAnalysisDispatcher>,
    config: Config,
    device: CameraDevice,
    mode: CaptureMode,
    timelapse: bool,
    tier: ResolutionTier,
    extension: Option<LensExtension>,
    pulse: Option<TimelapsePulse>,
    /// When the current active (unpaused) stretch began
    record_started: Option<Instant>,
    /// Active duration accumulated before the current stretch
    accumulated: Duration,
    snapshot: SessionSnapshot,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    ticks_tx: mpsc::UnboundedSender<u64>,
}

impl SessionActor {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut analysis: mpsc::UnboundedReceiver<AnalysisEvent>,
        mut ticks: mpsc::UnboundedReceiver<u64>,
    ) {
        info!(device = %self.device.id, "Session actor started");

        self.tier = self.config.resolution_tier;
        let _ = self.pipeline.set_filter(self.config.default_filter);
        let _ = self.pipeline.set_mirror(self.config.mirror_preview);
        self.snapshot.mode = self.mode;
        if let Err(e) = self.configure_source().await {
            warn!(error = %e, "Initial pipeline configuration failed");
        }
        // Every rendered frame is offered to the analyzers; the dispatcher
        // drops frames itself while nothing is enabled
        let tap = AnalysisTap::new(Arc::clone(&self.dispatcher));
        if let Err(e) = self.pipeline.attach_output(Box::new(tap)) {
            warn!(error = %e, "Failed to attach the analysis tap");
        }
        self.publish();

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => {
                        if self.handle_command(command).await {
                            break;
                        }
                    }
                    None => break,
                },
                Some(event) = analysis.recv() => self.handle_analysis(event),
                Some(count) = ticks.recv() => {
                    // A tick can sit in the channel across a stop; only a
                    // live pulse may move the counter
                    if self.pulse.is_some() {
                        self.snapshot.timelapse_frames = count;
                        self.publish();
                    }
                }
            }
        }

        if let Some(pulse) = self.pulse.take() {
            pulse.cancel();
        }
        info!("Session actor exiting");
    }

    /// Returns true on shutdown
    async fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::SetMode(mode, reply) => {
                let _ = reply.send(self.reconfigure(|actor| actor.mode = mode).await);
            }
            Command::SetTimelapse(enabled, reply) => {
                let result = if self.snapshot.recording_state.is_active() {
                    Err(ConfigError::RecordingActive)
                } else {
                    self.timelapse = enabled;
                    self.snapshot.timelapse = enabled;
                    self.publish();
                    Ok(())
                };
                let _ = reply.send(result);
            }
            Command::SelectDevice(device, reply) => {
                let _ = reply
                    .send(self.reconfigure(|actor| actor.set_device(device)).await);
            }
            Command::SetResolutionTier(tier, reply) => {
                let _ = reply.send(self.reconfigure(|actor| actor.tier = tier).await);
            }
            Command::SetExtension(extension, reply) => {
                let result = if let Some(ext) = extension {
                    if self.device.extensions.contains(&ext) {
                        self.reconfigure(|actor| actor.extension = Some(ext)).await
                    } else {
                        Err(ConfigError::ExtensionUnavailable(format!(
                            "{:?} not supported by {}",
                            ext, self.device.id
                        )))
                    }
                } else {
                    self.reconfigure(|actor| actor.extension = None).await
                };
                let _ = reply.send(result);
            }
            Command::SetFilter(filter) => {
                if let Err(e) = self.pipeline.set_filter(filter) {
                    warn!(error = %e, "Failed to set filter");
                    return false;
                }
                self.snapshot.active_filter = filter;
                self.publish();
            }
            Command::SetZoom(ratio) => {
                let (min, max) = self.device.zoom_range;
                self.snapshot.zoom_ratio = ratio.clamp(min, max);
                self.publish();
            }
            Command::SetExposure(index) => {
                let (min, max) = self.device.exposure_range;
                self.snapshot.exposure_index = index.clamp(min, max);
                self.publish();
            }
            Command::SetQrDetection(enabled) => {
                self.dispatcher.set_qr_enabled(enabled);
                self.snapshot.qr_detection = enabled;
                self.publish();
            }
            Command::SetSceneDetection(enabled) => {
                self.dispatcher.set_scene_enabled(enabled);
                self.snapshot.scene_detection = enabled;
                self.publish();
            }
            Command::ClearQr => {
                self.snapshot.last_qr = None;
                self.publish();
            }
            Command::CapturePhoto(reply) => self.capture_photo(reply),
            Command::StartRecording(reply) => {
                let _ = reply.send(self.start_recording());
            }
            Command::PauseRecording(reply) => {
                let _ = reply.send(self.pause_recording());
            }
            Command::ResumeRecording(reply) => {
                let _ = reply.send(self.resume_recording());
            }
            Command::StopRecording(reply) => {
                let _ = reply.send(self.stop_recording());
            }
            Command::SinkFailure(error) => self.sink_failed(error),
            Command::Shutdown(ack) => {
                if self.snapshot.recording_state.is_active() {
                    let _ = self.stop_recording();
                }
                let _ = ack.send(());
                return true;
            }
        }
        false
    }

    fn handle_analysis(&mut self, event: AnalysisEvent) {
        match event {
            AnalysisEvent::Qr(detection) => {
                self.snapshot.last_qr = Some(detection);
                self.publish();
            }
            AnalysisEvent::Scene { labels, sequence } => {
                debug!(sequence, count = labels.len(), "Scene classified");
                self.snapshot.last_scene = Some(labels);
                self.publish();
            }
        }
    }

    fn set_device(&mut self, device: CameraDevice) {
        self.snapshot.zoom_range = device.zoom_range;
        self.snapshot.zoom_ratio = device.zoom_range.0;
        self.snapshot.exposure_range = device.exposure_range;
        self.snapshot.exposure_step = device.exposure_step;
        self.snapshot.exposure_index = 0;
        self.snapshot.available_extensions = device.extensions.clone();
        self.extension = None;
        self.snapshot.active_extension = None;
        self.device = device;
    }

    /// Apply a configuration change and rebind the pipeline.
    ///
    /// Only valid while Idle. On pipeline failure the previous settings
    /// are restored and the old source stays live.
    async fn reconfigure(
        &mut self,
        apply: impl FnOnce(&mut Self),
    ) -> Result<(), ConfigError> {
        if self.snapshot.recording_state.is_active() {
            return Err(ConfigError::RecordingActive);
        }

        let previous = (
            self.mode,
            self.tier,
            self.device.clone(),
            self.extension,
        );
        apply(self);

        match self.configure_source().await {
            Ok(()) => {
                self.snapshot.mode = self.mode;
                self.snapshot.active_extension = self.extension;
                self.publish();
                Ok(())
            }
            Err(e) => {
                self.mode = previous.0;
                self.tier = previous.1;
                self.extension = previous.3;
                self.set_device(previous.2);
                Err(e)
            }
        }
    }

    async fn configure_source(&mut self) -> Result<(), ConfigError> {
        let (width, height) = self.tier.dimensions();
        let descriptor = SourceDescriptor {
            device: self.device.clone(),
            format: CameraFormat {
                width,
                height,
                framerate: match self.mode {
                    CaptureMode::Photo => None,
                    CaptureMode::Video => Some(Framerate::from_int(30)),
                },
            },
        };
        let handle = self.pipeline.configure(descriptor).await?;
        self.snapshot.achieved_format = Some(handle.achieved);
        Ok(())
    }

    fn capture_photo(&mut self, reply: oneshot::Sender<Result<RenderedFrame, CaptureError>>) {
        let (surface, receiver) = StillCaptureSurface::channel();
        match self.pipeline.attach_output(Box::new(surface)) {
            Ok(handle) => {
                debug!(handle = ?handle, "Still capture armed");
                tokio::spawn(async move {
                    let result = match tokio::time::timeout(PHOTO_CAPTURE_TIMEOUT, receiver).await
                    {
                        Ok(Ok(frame)) => Ok(frame),
                        Ok(Err(_)) => Err(CaptureError::Render(RenderError::SurfaceLost(
                            "pipeline released before capture".to_string(),
                        ))),
                        Err(_) => {
                            Err(CaptureError::Other("photo capture timed out".to_string()))
                        }
                    };
                    let _ = reply.send(result);
                });
            }
            Err(e) => {
                let _ = reply.send(Err(CaptureError::Config(e)));
            }
        }
    }

    fn start_recording(&mut self) -> Result<(), RecordingError> {
        if self.snapshot.recording_state.is_active() {
            return Err(RecordingError::AlreadyRecording);
        }
        if self.mode != CaptureMode::Video {
            return Err(RecordingError::StartFailed(
                "not in video mode".to_string(),
            ));
        }

        self.snapshot.last_error = None;
        self.set_state(RecordingState::Starting);

        let result = self.begin_sink();
        if let Err(ref e) = result {
            error!(error = %e, "Recording start failed");
            self.set_state(RecordingState::Idle);
        }
        result
    }

    fn begin_sink(&mut self) -> Result<(), RecordingError> {
        let kind = if self.timelapse {
            MediaKind::Timelapse
        } else {
            MediaKind::Video
        };
        let destination = storage::destination(kind)
            .map_err(|e| RecordingError::StartFailed(e.to_string()))?;
        let display_name = destination
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let format = self
            .snapshot
            .achieved_format
            .clone()
            .unwrap_or_else(|| {
                let (width, height) = self.tier.dimensions();
                CameraFormat {
                    width,
                    height,
                    framerate: Some(Framerate::from_int(30)),
                }
            });
        let descriptor = SinkDescriptor {
            session_id: Uuid::new_v4(),
            display_name,
            width: format.width,
            height: format.height,
            framerate: format.framerate.unwrap_or_default(),
            bitrate_kbps: self
                .config
                .bitrate_preset
                .bitrate_kbps(format.width, format.height),
            destination,
        };

        info!(
            session = %descriptor.session_id,
            destination = %descriptor.destination.display(),
            bitrate_kbps = descriptor.bitrate_kbps,
            timelapse = self.timelapse,
            "Starting recording"
        );
        self.sink.start(&descriptor)?;

        self.record_started = Some(Instant::now());
        self.accumulated = Duration::ZERO;
        self.snapshot.timelapse_frames = 0;
        self.set_state(RecordingState::Recording);

        if self.timelapse {
            // The sink idles paused; the pulse briefly resumes it on each
            // interval
            if let Err(e) = self.sink.pause() {
                warn!(error = %e, "Initial timelapse pause failed");
            }
            self.pulse = Some(TimelapsePulse::spawn(
                Arc::clone(&self.sink),
                Duration::from_millis(self.config.timelapse_interval_ms),
                self.ticks_tx.clone(),
                0,
            ));
        }
        Ok(())
    }

    fn pause_recording(&mut self) -> Result<(), RecordingError> {
        match self.snapshot.recording_state {
            // During timelapse the pulse owns the sink cadence; pausing
            // means quiescing the pulse first, then making sure the sink
            // itself ends up paused
            RecordingState::Recording if self.pulse.is_some() => {
                let Some(pulse) = self.pulse.take() else {
                    return Ok(());
                };
                pulse.cancel();
                self.snapshot.timelapse_frames = pulse.frame_count();
                if pulse.sink_is_resumed() {
                    self.sink.pause()?;
                }
                if let Some(started) = self.record_started.take() {
                    self.accumulated += started.elapsed();
                }
                self.set_state(RecordingState::Paused);
                Ok(())
            }
            RecordingState::Recording => {
                self.sink.pause()?;
                if let Some(started) = self.record_started.take() {
                    self.accumulated += started.elapsed();
                }
                self.set_state(RecordingState::Paused);
                Ok(())
            }
            // Duplicate pause: exactly zero additional sink calls
            RecordingState::Paused => Ok(()),
            _ => Err(RecordingError::NotRecording),
        }
    }

    fn resume_recording(&mut self) -> Result<(), RecordingError> {
        match self.snapshot.recording_state {
            RecordingState::Paused => {
                if self.timelapse {
                    // The sink stays paused; a fresh pulse picks the
                    // cadence back up, counting on from where it stopped
                    self.pulse = Some(TimelapsePulse::spawn(
                        Arc::clone(&self.sink),
                        Duration::from_millis(self.config.timelapse_interval_ms),
                        self.ticks_tx.clone(),
                        self.snapshot.timelapse_frames,
                    ));
                } else {
                    self.sink.resume()?;
                }
                self.record_started = Some(Instant::now());
                self.set_state(RecordingState::Recording);
                Ok(())
            }
            // Duplicate resume: no-op
            RecordingState::Recording => Ok(()),
            _ => Err(RecordingError::NotRecording),
        }
    }

    fn stop_recording(&mut self) -> Result<MediaLocation, RecordingError> {
        match self.snapshot.recording_state {
            RecordingState::Recording | RecordingState::Paused | RecordingState::Starting => {}
            _ => return Err(RecordingError::NotRecording),
        }

        self.set_state(RecordingState::Stopping);

        // Pulse must be fully quiesced before the sink is finalized
        if let Some(pulse) = self.pulse.take() {
            pulse.cancel();
        }

        let result = self.sink.stop();
        match &result {
            Ok(location) => {
                info!(path = %location.path.display(), "Recording finished")
            }
            Err(e) => {
                error!(error = %e, "Recording stop failed");
                self.snapshot.last_error = Some(e.to_string());
            }
        }

        self.reset_counters();
        self.set_state(RecordingState::Idle);
        result
    }

    /// Asynchronous sink failure: treated as stop-with-error
    fn sink_failed(&mut self, error: RecordingError) {
        if !self.snapshot.recording_state.is_active() {
            debug!(error = %error, "Sink failure with no active recording, ignored");
            return;
        }
        error!(error = %error, "Media sink failed");

        self.set_state(RecordingState::Stopping);
        if let Some(pulse) = self.pulse.take() {
            pulse.cancel();
        }
        let _ = self.sink.stop();

        self.snapshot.last_error = Some(error.to_string());
        self.reset_counters();
        self.set_state(RecordingState::Idle);
    }

    fn reset_counters(&mut self) {
        self.record_started = None;
        self.accumulated = Duration::ZERO;
        self.snapshot.timelapse_frames = 0;
    }

    fn set_state(&mut self, state: RecordingState) {
        if self.snapshot.recording_state != state {
            debug!(from = %self.snapshot.recording_state, to = %state, "Recording state");
            self.snapshot.recording_state = state;
        }
        self.publish();
    }

    fn publish(&mut self) {
        self.snapshot.sync_flags();
        self.snapshot.elapsed = self.accumulated
            + self
                .record_started
                .map(|at| at.elapsed())
                .unwrap_or(Duration::ZERO);
        self.snapshot.timelapse = self.timelapse;
        let _ = self.snapshot_tx.send(self.snapshot.clone());
    }
}

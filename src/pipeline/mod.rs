// SPDX-License-Identifier: GPL-3.0-only

//! Frame processing pipeline
//!
//! [`FrameProcessingPipeline`] is the public handle to the dedicated render
//! thread. Every method queues a command; nothing touches the GPU from the
//! caller's thread. Commands are applied in order with two exceptions:
//! frame signals coalesce (one render per drained batch, newest frame) and
//! only the last of several queued configurations is applied.

pub(crate) mod render_thread;
pub mod surfaces;

use crate::camera::source::{FrameSourceHandle, FrameSourceProvider, SourceDescriptor};
use crate::camera::CameraFrame;
use crate::errors::ConfigError;
use crate::filters::renderer::ShaderFilterRenderer;
use crate::filters::FilterType;
use render_thread::{FrameIntake, PipelineCommand, RenderThread};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

pub use surfaces::{
    EncoderSurface, OutputHandle, OutputRole, OutputSurface, PresentOutcome, PreviewSurface,
    StillCaptureSurface,
};

/// Handle to the render thread
///
/// Cheap to share behind an `Arc`; all methods take `&self`. After
/// [`release`](Self::release) every command fails with
/// [`ConfigError::Released`].
pub struct FrameProcessingPipeline {
    commands: mpsc::UnboundedSender<PipelineCommand>,
    intake: Arc<FrameIntake>,
    released: AtomicBool,
    next_output_id: AtomicU64,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl FrameProcessingPipeline {
    /// Spawn the render thread, preferring the GPU filter engine
    pub fn new(provider: Arc<dyn FrameSourceProvider>) -> Self {
        Self::spawn(provider, false)
    }

    /// Spawn the render thread with the software filter engine only.
    ///
    /// For headless environments and tests.
    pub fn with_software_renderer(provider: Arc<dyn FrameSourceProvider>) -> Self {
        Self::spawn(provider, true)
    }

    fn spawn(provider: Arc<dyn FrameSourceProvider>, software_only: bool) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let intake = Arc::new(FrameIntake::new(tx.clone()));

        let thread_intake = Arc::clone(&intake);
        let handle = std::thread::Builder::new()
            .name("frame-render".to_string())
            .spawn(move || {
                // The renderer (and any GPU context) is created on the
                // thread that will own it for its whole lifetime
                let renderer = if software_only {
                    ShaderFilterRenderer::software(false)
                } else {
                    ShaderFilterRenderer::new(false)
                };
                RenderThread::new(provider, thread_intake, rx, renderer).run();
            })
            .unwrap_or_else(|e| panic!("failed to spawn render thread: {e}"));

        Self {
            commands: tx,
            intake,
            released: AtomicBool::new(false),
            next_output_id: AtomicU64::new(1),
            thread: Mutex::new(Some(handle)),
        }
    }

    fn guard(&self) -> Result<(), ConfigError> {
        if self.released.load(Ordering::SeqCst) {
            return Err(ConfigError::Released);
        }
        Ok(())
    }

    fn send(&self, command: PipelineCommand) -> Result<(), ConfigError> {
        self.guard()?;
        self.commands
            .send(command)
            .map_err(|_| ConfigError::Released)
    }

    /// Bind the pipeline to a camera device and capture format.
    ///
    /// Resolves once the render thread has applied (or rejected) the
    /// configuration. When several configurations are queued back to back
    /// only the last is applied; the superseded calls resolve with the
    /// final configuration's result. On error the previous configuration
    /// stays live.
    pub async fn configure(
        &self,
        descriptor: SourceDescriptor,
    ) -> Result<FrameSourceHandle, ConfigError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.send(PipelineCommand::Configure {
            descriptor,
            ack: ack_tx,
        })?;
        ack_rx.await.map_err(|_| ConfigError::Released)?
    }

    /// Attach an output surface; returns its handle immediately.
    ///
    /// The surface starts receiving frames from the first render pass after
    /// the attach command is processed; a pass already executing when the
    /// attach is queued does not include it.
    pub fn attach_output(
        &self,
        surface: Box<dyn OutputSurface>,
    ) -> Result<OutputHandle, ConfigError> {
        let handle = OutputHandle(self.next_output_id.fetch_add(1, Ordering::SeqCst));
        self.send(PipelineCommand::AttachOutput { handle, surface })?;
        Ok(handle)
    }

    /// Detach an output; unknown handles are ignored
    pub fn detach_output(&self, handle: OutputHandle) -> Result<(), ConfigError> {
        self.send(PipelineCommand::DetachOutput(handle))
    }

    /// Select the filter applied from the next render pass onward
    pub fn set_filter(&self, filter: FilterType) -> Result<(), ConfigError> {
        self.send(PipelineCommand::SetFilter(filter))
    }

    /// Toggle horizontal mirroring of the rendered output
    pub fn set_mirror(&self, mirror: bool) -> Result<(), ConfigError> {
        self.send(PipelineCommand::SetMirror(mirror))
    }

    /// Publish a frame directly into the intake slot.
    ///
    /// This is the same path a configured [`FrameSource`](crate::camera::source::FrameSource)
    /// uses; it exists so callers can drive the pipeline without a device.
    pub fn frame_available(&self, frame: Arc<CameraFrame>) {
        if self.released.load(Ordering::SeqCst) {
            return;
        }
        self.intake.submit(frame);
    }

    /// Stop the source, drop all outputs, and shut the render thread down.
    ///
    /// Resolves once the thread has exited. Idempotent; all later commands
    /// fail with [`ConfigError::Released`].
    pub async fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }

        let (ack_tx, ack_rx) = oneshot::channel();
        if self
            .commands
            .send(PipelineCommand::Release { ack: Some(ack_tx) })
            .is_ok()
        {
            let _ = ack_rx.await;
        }

        let handle = self.thread.lock().unwrap().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("Render thread panicked during release");
            }
        }
    }
}

impl Drop for FrameProcessingPipeline {
    fn drop(&mut self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            let _ = self.commands.send(PipelineCommand::Release { ack: None });
        }
    }
}

impl std::fmt::Debug for FrameProcessingPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameProcessingPipeline")
            .field("released", &self.released.load(Ordering::SeqCst))
            .finish()
    }
}

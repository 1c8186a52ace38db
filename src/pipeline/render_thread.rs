// SPDX-License-Identifier: GPL-3.0-only

//! Dedicated render thread
//!
//! The thread owns everything graphics: the filter renderer (and with it
//! any GPU context), the active frame source, and the attached outputs.
//! All mutation arrives through a single command queue, drained in batches.
//! Frame arrival is a coalesced signal, never a queued frame: however many
//! frames landed since the last pass, exactly one render happens and it
//! uses the newest frame.

use crate::camera::source::{FrameSource, FrameSourceHandle, FrameSourceProvider, SourceDescriptor};
use crate::camera::{CameraFrame, SensorRotation};
use crate::errors::ConfigError;
use crate::filters::renderer::ShaderFilterRenderer;
use crate::filters::FilterType;
use crate::pipeline::surfaces::{OutputHandle, OutputSurface, PresentOutcome};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Commands accepted by the render thread
pub(crate) enum PipelineCommand {
    Configure {
        descriptor: SourceDescriptor,
        ack: oneshot::Sender<Result<FrameSourceHandle, ConfigError>>,
    },
    AttachOutput {
        handle: OutputHandle,
        surface: Box<dyn OutputSurface>,
    },
    DetachOutput(OutputHandle),
    SetFilter(FilterType),
    SetMirror(bool),
    /// A new frame landed in the intake slot; coalesced per batch
    FrameAvailable,
    Release {
        ack: Option<oneshot::Sender<()>>,
    },
}

/// Shared slot the frame source writes into
///
/// Holds at most one frame. A newer frame replaces an unrendered older one,
/// dropping the old frame's refcount immediately. The pending flag keeps
/// the command queue at no more than one outstanding FrameAvailable.
pub(crate) struct FrameIntake {
    latest: Mutex<Option<Arc<CameraFrame>>>,
    render_pending: AtomicBool,
    commands: mpsc::UnboundedSender<PipelineCommand>,
}

impl FrameIntake {
    pub(crate) fn new(commands: mpsc::UnboundedSender<PipelineCommand>) -> Self {
        Self {
            latest: Mutex::new(None),
            render_pending: AtomicBool::new(false),
            commands,
        }
    }

    /// Publish a frame as the latest; signal the render thread if it is not
    /// already signalled. Called from the capture thread.
    pub(crate) fn submit(&self, frame: Arc<CameraFrame>) {
        *self.latest.lock().unwrap() = Some(frame);
        if !self.render_pending.swap(true, Ordering::SeqCst) {
            // Send failure means the thread is gone; the frame just ages out
            let _ = self.commands.send(PipelineCommand::FrameAvailable);
        }
    }

    fn take_latest(&self) -> Option<Arc<CameraFrame>> {
        // Clear the flag before taking so a frame arriving mid-render
        // re-signals instead of being lost
        self.render_pending.store(false, Ordering::SeqCst);
        self.latest.lock().unwrap().take()
    }
}

pub(crate) struct RenderThread {
    provider: Arc<dyn FrameSourceProvider>,
    intake: Arc<FrameIntake>,
    commands: mpsc::UnboundedReceiver<PipelineCommand>,
    renderer: ShaderFilterRenderer,
    source: Option<Box<dyn FrameSource>>,
    rotation: SensorRotation,
    outputs: Vec<(OutputHandle, Box<dyn OutputSurface>)>,
    generation: u64,
}

impl RenderThread {
    pub(crate) fn new(
        provider: Arc<dyn FrameSourceProvider>,
        intake: Arc<FrameIntake>,
        commands: mpsc::UnboundedReceiver<PipelineCommand>,
        renderer: ShaderFilterRenderer,
    ) -> Self {
        Self {
            provider,
            intake,
            commands,
            renderer,
            source: None,
            rotation: SensorRotation::None,
            outputs: Vec::new(),
            generation: 0,
        }
    }

    /// Command loop; returns when released or when all senders are gone
    pub(crate) fn run(mut self) {
        info!("Render thread started");

        while let Some(first) = self.commands.blocking_recv() {
            let mut batch = vec![first];
            while let Ok(next) = self.commands.try_recv() {
                batch.push(next);
            }
            if self.process_batch(batch) {
                break;
            }
        }

        self.shutdown();
        info!("Render thread exiting");
    }

    /// Apply one drained batch; returns true when the thread should stop
    fn process_batch(&mut self, batch: Vec<PipelineCommand>) -> bool {
        // Only the last queued configuration is applied; earlier ones in
        // the same batch are superseded and answer with the final result
        let last_configure = batch
            .iter()
            .rposition(|c| matches!(c, PipelineCommand::Configure { .. }));

        let mut superseded_acks: Vec<oneshot::Sender<Result<FrameSourceHandle, ConfigError>>> =
            Vec::new();
        let mut want_render = false;
        let mut release_ack = None;
        let mut released = false;

        for (index, command) in batch.into_iter().enumerate() {
            match command {
                PipelineCommand::Configure { descriptor, ack } => {
                    if Some(index) == last_configure {
                        let result = self.apply_configure(descriptor);
                        for stale in superseded_acks.drain(..) {
                            let _ = stale.send(result.clone());
                        }
                        let _ = ack.send(result);
                    } else {
                        debug!(device = %descriptor.device.id, "Configuration superseded");
                        superseded_acks.push(ack);
                    }
                }
                PipelineCommand::AttachOutput { handle, surface } => {
                    debug!(handle = handle.0, role = %surface.role(), "Output attached");
                    self.outputs.push((handle, surface));
                }
                PipelineCommand::DetachOutput(handle) => {
                    let before = self.outputs.len();
                    self.outputs.retain(|(h, _)| *h != handle);
                    if self.outputs.len() < before {
                        debug!(handle = handle.0, "Output detached");
                    }
                }
                PipelineCommand::SetFilter(filter) => self.renderer.set_filter(filter),
                PipelineCommand::SetMirror(mirror) => self.renderer.set_mirror(mirror),
                PipelineCommand::FrameAvailable => want_render = true,
                PipelineCommand::Release { ack } => {
                    released = true;
                    release_ack = ack;
                }
            }
        }

        if released {
            self.shutdown();
            if let Some(ack) = release_ack {
                let _ = ack.send(());
            }
            return true;
        }

        if want_render {
            self.render_pass();
        }
        false
    }

    /// Bind a new source. The previous source keeps running until the new
    /// one is started, so a failed configure leaves the old stream live.
    fn apply_configure(
        &mut self,
        descriptor: SourceDescriptor,
    ) -> Result<FrameSourceHandle, ConfigError> {
        let mut source = self.provider.open(&descriptor)?;

        let intake = Arc::clone(&self.intake);
        source.start(Arc::new(move |frame| intake.submit(frame)))?;

        if let Some(mut old) = self.source.take() {
            old.stop();
        }

        self.generation += 1;
        self.rotation = descriptor.device.rotation;
        let achieved = source.achieved_format();
        info!(
            device = %descriptor.device.id,
            width = achieved.width,
            height = achieved.height,
            generation = self.generation,
            "Pipeline configured"
        );

        let handle = FrameSourceHandle {
            generation: self.generation,
            device_id: descriptor.device.id.clone(),
            achieved,
        };
        self.source = Some(source);
        Ok(handle)
    }

    /// Render the newest frame once and fan it out to every output.
    ///
    /// A failing output is detached on the spot; the others still get the
    /// frame in this same pass.
    fn render_pass(&mut self) {
        let Some(frame) = self.intake.take_latest() else {
            return;
        };

        let rendered = match self.renderer.render(&frame, self.rotation) {
            Ok(rendered) => rendered,
            Err(e) => {
                warn!(error = %e, sequence = frame.sequence, "Render failed, frame skipped");
                return;
            }
        };

        self.outputs.retain_mut(|(handle, surface)| {
            match surface.present(&rendered) {
                Ok(PresentOutcome::Retained) => true,
                Ok(PresentOutcome::Finished) => {
                    debug!(handle = handle.0, role = %surface.role(), "Output finished");
                    false
                }
                Err(e) => {
                    warn!(
                        handle = handle.0,
                        role = %surface.role(),
                        error = %e,
                        "Output failed, detaching"
                    );
                    false
                }
            }
        });
    }

    fn shutdown(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.stop();
        }
        self.outputs.clear();
    }
}

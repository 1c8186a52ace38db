// SPDX-License-Identifier: GPL-3.0-only

//! Output surfaces
//!
//! An [`OutputSurface`] is any destination a rendered frame can be written
//! to. Surfaces are attached and detached through queued pipeline commands
//! and are only ever touched from the render thread. A surface that fails
//! to present is detached and logged; the remaining surfaces still receive
//! the frame in the same pass.

use crate::errors::RenderError;
use crate::filters::RenderedFrame;
use tokio::sync::{mpsc, oneshot};
use tracing::trace;

/// What a surface is used for (logging and encoder timestamp handling)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputRole {
    /// Live preview display
    Preview,
    /// Video encoder feed
    Encoder,
    /// One-shot still capture target
    StillCapture,
    /// Frame analysis tee
    Analysis,
}

impl std::fmt::Display for OutputRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputRole::Preview => write!(f, "preview"),
            OutputRole::Encoder => write!(f, "encoder"),
            OutputRole::StillCapture => write!(f, "still-capture"),
            OutputRole::Analysis => write!(f, "analysis"),
        }
    }
}

/// Opaque identifier for an attached output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutputHandle(pub(crate) u64);

/// What the pipeline should do with a surface after a successful present
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    /// Keep the surface attached
    Retained,
    /// The surface is done (e.g. one-shot capture); detach it quietly
    Finished,
}

/// A destination for rendered frames
pub trait OutputSurface: Send {
    /// Role of this surface
    fn role(&self) -> OutputRole;

    /// Deliver one rendered frame.
    ///
    /// Called on the render thread only. Implementations must not block on
    /// slow consumers — drop the frame instead (bounded staleness is the
    /// pipeline-wide policy, unbounded queueing is not allowed).
    fn present(&mut self, frame: &RenderedFrame) -> Result<PresentOutcome, RenderError>;
}

/// Preview surface backed by a bounded channel
///
/// When the consumer lags the channel fills and new frames are dropped,
/// mirroring an on-screen view that simply shows the most recent frame it
/// managed to take.
pub struct PreviewSurface {
    sender: mpsc::Sender<RenderedFrame>,
}

impl PreviewSurface {
    /// Create a preview surface and the receiver for its frames.
    ///
    /// `capacity` of 2 matches a double-buffered display.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<RenderedFrame>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }
}

impl OutputSurface for PreviewSurface {
    fn role(&self) -> OutputRole {
        OutputRole::Preview
    }

    fn present(&mut self, frame: &RenderedFrame) -> Result<PresentOutcome, RenderError> {
        match self.sender.try_send(frame.clone()) {
            Ok(()) => Ok(PresentOutcome::Retained),
            Err(mpsc::error::TrySendError::Full(_)) => {
                // Consumer is behind; this frame is stale by the time it
                // would be shown anyway
                trace!("Preview consumer behind, dropping frame");
                Ok(PresentOutcome::Retained)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(RenderError::SurfaceLost(
                "preview receiver dropped".to_string(),
            )),
        }
    }
}

/// Encoder surface feeding rendered frames to a recording task
///
/// The frame's sensor timestamp rides along inside [`RenderedFrame`]; the
/// recording task uses it for PTS so recorded timing matches capture
/// timing even when the render path adds latency.
pub struct EncoderSurface {
    sender: mpsc::Sender<RenderedFrame>,
}

impl EncoderSurface {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<RenderedFrame>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }
}

impl OutputSurface for EncoderSurface {
    fn role(&self) -> OutputRole {
        OutputRole::Encoder
    }

    fn present(&mut self, frame: &RenderedFrame) -> Result<PresentOutcome, RenderError> {
        match self.sender.try_send(frame.clone()) {
            Ok(()) => Ok(PresentOutcome::Retained),
            Err(mpsc::error::TrySendError::Full(_)) => {
                // Encoder can't keep up; dropping beats queueing unboundedly
                trace!("Encoder behind, dropping frame");
                Ok(PresentOutcome::Retained)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(RenderError::SurfaceLost(
                "encoder receiver dropped".to_string(),
            )),
        }
    }
}

/// One-shot still-capture surface
///
/// Delivers exactly one rendered frame to the waiting capture task, then
/// reports itself finished so the pipeline detaches it.
pub struct StillCaptureSurface {
    sender: Option<oneshot::Sender<RenderedFrame>>,
}

impl StillCaptureSurface {
    pub fn channel() -> (Self, oneshot::Receiver<RenderedFrame>) {
        let (sender, receiver) = oneshot::channel();
        (
            Self {
                sender: Some(sender),
            },
            receiver,
        )
    }
}

impl OutputSurface for StillCaptureSurface {
    fn role(&self) -> OutputRole {
        OutputRole::StillCapture
    }

    fn present(&mut self, frame: &RenderedFrame) -> Result<PresentOutcome, RenderError> {
        match self.sender.take() {
            Some(sender) => {
                if sender.send(frame.clone()).is_err() {
                    return Err(RenderError::SurfaceLost(
                        "still capture receiver dropped".to_string(),
                    ));
                }
                Ok(PresentOutcome::Finished)
            }
            None => Err(RenderError::SurfaceLost(
                "still capture already delivered".to_string(),
            )),
        }
    }
}

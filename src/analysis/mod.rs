// SPDX-License-Identifier: GPL-3.0-only

//! Frame analysis dispatch
//!
//! Receives refcounted frames from the capture path and fans them out to
//! the enabled analyzers. QR decoding is cheap and bounded, so it runs for
//! every frame; scene classification has unbounded latency, so it is
//! throttled by a cooldown and a single-flight guard. Frames are never
//! queued: a frame that is not admitted is dropped on the spot.

pub mod qr;
pub mod scene;

use crate::camera::{CameraFrame, PixelFormat, SensorRotation};
use crate::constants::SCENE_CLASSIFY_COOLDOWN;
use crate::errors::RenderError;
use crate::filters::RenderedFrame;
use crate::pipeline::surfaces::{OutputRole, OutputSurface, PresentOutcome};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

pub use qr::{FrameRegion, QrAction, QrDetection};
pub use scene::{BrightnessClassifier, SceneClassifier, SceneLabel};

/// Results emitted by the dispatcher
#[derive(Debug, Clone)]
pub enum AnalysisEvent {
    /// A QR code was decoded. Sticky: the consumer decides when the
    /// detection stops being shown.
    Qr(QrDetection),
    /// Scene classification completed. Last one wins; stale results
    /// (an older frame than the last published) are never emitted.
    Scene {
        labels: Vec<SceneLabel>,
        sequence: u64,
    },
}

/// Admission state for scene classification
struct SceneGate {
    in_flight: AtomicBool,
    last_attempt: Mutex<Option<Instant>>,
    /// Sequence of the last published result, plus one (0 = none yet)
    published_watermark: AtomicU64,
    cooldown: Duration,
}

impl SceneGate {
    fn new(cooldown: Duration) -> Self {
        Self {
            in_flight: AtomicBool::new(false),
            last_attempt: Mutex::new(None),
            published_watermark: AtomicU64::new(0),
            cooldown,
        }
    }

    /// Admit a classification attempt if none is in flight and the
    /// cooldown (measured from the previous attempt's start) has passed
    fn try_begin(&self) -> bool {
        let mut last_attempt = self.last_attempt.lock().unwrap();
        if self.in_flight.load(Ordering::SeqCst) {
            return false;
        }
        if let Some(at) = *last_attempt {
            if at.elapsed() < self.cooldown {
                return false;
            }
        }
        self.in_flight.store(true, Ordering::SeqCst);
        *last_attempt = Some(Instant::now());
        true
    }

    fn finish(&self) {
        self.in_flight.store(false, Ordering::SeqCst);
    }

    /// Claim the publish slot for `sequence`; false if a newer result
    /// already went out
    fn claim_publish(&self, sequence: u64) -> bool {
        let watermark = sequence + 1;
        self.published_watermark
            .fetch_max(watermark, Ordering::SeqCst)
            < watermark
    }
}

/// Fans admitted frames out to the enabled analyzers
///
/// Created inside a tokio runtime; analysis work is spawned onto that
/// runtime so `process_frame` is safe to call from the capture thread.
pub struct FrameAnalysisDispatcher {
    qr_enabled: AtomicBool,
    scene_enabled: AtomicBool,
    classifier: Option<Arc<dyn SceneClassifier>>,
    events: mpsc::UnboundedSender<AnalysisEvent>,
    runtime: tokio::runtime::Handle,
    gate: Arc<SceneGate>,
}

impl FrameAnalysisDispatcher {
    /// Create a dispatcher with the standard scene cooldown.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        classifier: Option<Arc<dyn SceneClassifier>>,
    ) -> (Self, mpsc::UnboundedReceiver<AnalysisEvent>) {
        Self::with_cooldown(classifier, SCENE_CLASSIFY_COOLDOWN)
    }

    /// Create a dispatcher with an explicit scene cooldown
    pub fn with_cooldown(
        classifier: Option<Arc<dyn SceneClassifier>>,
        cooldown: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<AnalysisEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        (
            Self {
                qr_enabled: AtomicBool::new(false),
                scene_enabled: AtomicBool::new(false),
                classifier,
                events,
                runtime: tokio::runtime::Handle::current(),
                gate: Arc::new(SceneGate::new(cooldown)),
            },
            receiver,
        )
    }

    /// Enable or disable QR decoding; effective from the next frame
    pub fn set_qr_enabled(&self, enabled: bool) {
        self.qr_enabled.store(enabled, Ordering::SeqCst);
    }

    /// Enable or disable scene classification; effective from the next frame
    pub fn set_scene_enabled(&self, enabled: bool) {
        self.scene_enabled.store(enabled, Ordering::SeqCst);
    }

    /// Offer one frame for analysis.
    ///
    /// Never blocks. The frame's refcount is held only by the analyses
    /// actually launched; with nothing enabled the frame drops immediately.
    pub fn process_frame(&self, frame: Arc<CameraFrame>, rotation: SensorRotation) {
        let run_qr = self.qr_enabled.load(Ordering::SeqCst);
        let run_scene = self.scene_enabled.load(Ordering::SeqCst)
            && self.classifier.is_some()
            && self.gate.try_begin();

        if run_qr {
            let events = self.events.clone();
            let qr_frame = Arc::clone(&frame);
            self.runtime.spawn(async move {
                let sequence = qr_frame.sequence;
                let result =
                    tokio::task::spawn_blocking(move || qr::detect_qr(&qr_frame)).await;
                match result {
                    Ok(Ok(Some(detection))) => {
                        debug!(sequence, payload = %detection.payload, "QR detected");
                        let _ = events.send(AnalysisEvent::Qr(detection));
                    }
                    Ok(Ok(None)) => {}
                    Ok(Err(e)) => debug!(sequence, error = %e, "QR decode failed"),
                    Err(e) => warn!(sequence, error = %e, "QR decode task panicked"),
                }
            });
        }

        if run_scene {
            let classifier = Arc::clone(self.classifier.as_ref().unwrap());
            let events = self.events.clone();
            let gate = Arc::clone(&self.gate);
            let sequence = frame.sequence;
            self.runtime.spawn(async move {
                let result = classifier.classify(frame, rotation).await;
                gate.finish();
                match result {
                    Ok(labels) => {
                        if gate.claim_publish(sequence) {
                            let _ = events.send(AnalysisEvent::Scene { labels, sequence });
                        } else {
                            debug!(sequence, "Stale scene result dropped");
                        }
                    }
                    Err(e) => warn!(sequence, error = %e, "Scene classification failed"),
                }
            });
        }
    }
}

/// Output surface teeing rendered frames into a dispatcher
///
/// Attached to the pipeline alongside the preview and encoder outputs, so
/// the analyzers see exactly what the user sees. Rendering has already
/// applied the sensor rotation, so frames arrive upright.
pub struct AnalysisTap {
    dispatcher: Arc<FrameAnalysisDispatcher>,
}

impl AnalysisTap {
    pub fn new(dispatcher: Arc<FrameAnalysisDispatcher>) -> Self {
        Self { dispatcher }
    }
}

impl OutputSurface for AnalysisTap {
    fn role(&self) -> OutputRole {
        OutputRole::Analysis
    }

    fn present(&mut self, frame: &RenderedFrame) -> Result<PresentOutcome, RenderError> {
        let frame = Arc::new(CameraFrame {
            width: frame.width,
            height: frame.height,
            data: Arc::clone(&frame.data),
            format: PixelFormat::RGBA,
            stride: frame.width * 4,
            sequence: frame.sequence,
            captured_at: frame.captured_at,
            sensor_timestamp_ns: frame.sensor_timestamp_ns,
        });
        self.dispatcher.process_frame(frame, SensorRotation::None);
        Ok(PresentOutcome::Retained)
    }
}

impl std::fmt::Debug for FrameAnalysisDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameAnalysisDispatcher")
            .field("qr_enabled", &self.qr_enabled.load(Ordering::SeqCst))
            .field("scene_enabled", &self.scene_enabled.load(Ordering::SeqCst))
            .finish()
    }
}

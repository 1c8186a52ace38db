// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the capture session controller
//!
//! Exercise the recording state machine against a mock media sink; the
//! pipeline runs headlessly with the software filter engine and the test
//! pattern source.

use capture_core::analysis::{
    AnalysisEvent, BrightnessClassifier, FrameAnalysisDispatcher, FrameRegion, QrAction,
    QrDetection, SceneLabel,
};
use capture_core::camera::source::TestPatternProvider;
use capture_core::camera::CameraDevice;
use capture_core::constants::ResolutionTier;
use capture_core::errors::{ConfigError, RecordingError};
use capture_core::pipeline::FrameProcessingPipeline;
use capture_core::session::{
    CaptureMode, CaptureSessionController, MediaLocation, RecordingSink, RecordingState,
    SessionSnapshot, SinkDescriptor,
};
use capture_core::Config;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Default)]
struct MockSink {
    starts: AtomicU64,
    pauses: AtomicU64,
    resumes: AtomicU64,
    stops: AtomicU64,
    fail_start: bool,
    fail_stop: bool,
    last_descriptor: Mutex<Option<SinkDescriptor>>,
}

impl MockSink {
    fn failing_start() -> Self {
        Self {
            fail_start: true,
            ..Self::default()
        }
    }
}

impl RecordingSink for MockSink {
    fn start(&self, descriptor: &SinkDescriptor) -> Result<(), RecordingError> {
        if self.fail_start {
            return Err(RecordingError::StartFailed("mock refused".to_string()));
        }
        self.starts.fetch_add(1, Ordering::SeqCst);
        *self.last_descriptor.lock().unwrap() = Some(descriptor.clone());
        Ok(())
    }

    fn pause(&self) -> Result<(), RecordingError> {
        self.pauses.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn resume(&self) -> Result<(), RecordingError> {
        self.resumes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) -> Result<MediaLocation, RecordingError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        if self.fail_stop {
            return Err(RecordingError::StopFailed("mock refused".to_string()));
        }
        let descriptor = self.last_descriptor.lock().unwrap();
        let (path, display_name) = descriptor
            .as_ref()
            .map(|d| (d.destination.clone(), d.display_name.clone()))
            .unwrap_or_else(|| ("/tmp/out.mkv".into(), "out.mkv".to_string()));
        Ok(MediaLocation { path, display_name })
    }
}

/// Sink whose burst-ending pauses block, widening the window in which a
/// stop can race the pulse
struct StallingSink {
    pauses: AtomicU64,
    resumes: AtomicU64,
    stall: Duration,
}

impl StallingSink {
    fn new(stall: Duration) -> Self {
        Self {
            pauses: AtomicU64::new(0),
            resumes: AtomicU64::new(0),
            stall,
        }
    }
}

impl RecordingSink for StallingSink {
    fn start(&self, _descriptor: &SinkDescriptor) -> Result<(), RecordingError> {
        Ok(())
    }

    fn pause(&self) -> Result<(), RecordingError> {
        // The first pause is the idle pause right after start; the later
        // ones end a pulse burst and are the slow path under test
        if self.pauses.fetch_add(1, Ordering::SeqCst) >= 1 {
            std::thread::sleep(self.stall);
        }
        Ok(())
    }

    fn resume(&self) -> Result<(), RecordingError> {
        self.resumes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) -> Result<MediaLocation, RecordingError> {
        Ok(MediaLocation {
            path: "/tmp/timelapse.mkv".into(),
            display_name: "timelapse.mkv".to_string(),
        })
    }
}

struct Harness {
    controller: CaptureSessionController,
    sink: Arc<MockSink>,
    analysis_tx: mpsc::UnboundedSender<AnalysisEvent>,
    pipeline: Arc<FrameProcessingPipeline>,
}

async fn video_session_with(sink: MockSink, config: Config) -> Harness {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    let sink = Arc::new(sink);
    let pipeline = Arc::new(FrameProcessingPipeline::with_software_renderer(Arc::new(
        TestPatternProvider,
    )));
    let (analysis_tx, analysis_rx) = mpsc::unbounded_channel();
    // Events are injected through analysis_tx; the dispatcher itself stays
    // disabled so it contributes none of its own
    let (dispatcher, _dispatcher_rx) = FrameAnalysisDispatcher::new(None);
    let controller = CaptureSessionController::spawn(
        Arc::clone(&pipeline),
        Arc::clone(&sink) as Arc<dyn RecordingSink>,
        Arc::new(dispatcher),
        analysis_rx,
        config,
        CameraDevice::basic("Test Camera", "cam-0"),
    );
    controller
        .set_mode(CaptureMode::Video)
        .await
        .expect("video mode");
    Harness {
        controller,
        sink,
        analysis_tx,
        pipeline,
    }
}

fn test_config() -> Config {
    Config {
        resolution_tier: ResolutionTier::SD,
        timelapse_interval_ms: 50,
        ..Config::default()
    }
}

async fn wait_for(
    controller: &CaptureSessionController,
    what: &str,
    predicate: impl Fn(&SessionSnapshot) -> bool,
) -> SessionSnapshot {
    let mut watch = controller.watch();
    tokio::time::timeout(Duration::from_secs(30), async {
        loop {
            {
                let snapshot = watch.borrow_and_update();
                if predicate(&*snapshot) {
                    return snapshot.clone();
                }
            }
            watch.changed().await.expect("session actor gone");
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {}", what))
}

#[tokio::test]
async fn test_pause_and_resume_are_idempotent() {
    let h = video_session_with(MockSink::default(), test_config()).await;

    h.controller.start_recording().await.unwrap();
    assert_eq!(h.controller.snapshot().recording_state, RecordingState::Recording);

    h.controller.pause_recording().await.unwrap();
    h.controller.pause_recording().await.unwrap();
    assert_eq!(h.sink.pauses.load(Ordering::SeqCst), 1);
    assert_eq!(h.controller.snapshot().recording_state, RecordingState::Paused);

    h.controller.resume_recording().await.unwrap();
    h.controller.resume_recording().await.unwrap();
    assert_eq!(h.sink.resumes.load(Ordering::SeqCst), 1);
    assert_eq!(h.controller.snapshot().recording_state, RecordingState::Recording);

    let location = h.controller.stop_recording().await.unwrap();
    assert!(location.display_name.starts_with("video_"));
    assert_eq!(h.controller.snapshot().recording_state, RecordingState::Idle);
    h.controller.shutdown().await;
    h.pipeline.release().await;
}

#[tokio::test]
async fn test_double_start_is_rejected() {
    let h = video_session_with(MockSink::default(), test_config()).await;

    h.controller.start_recording().await.unwrap();
    assert!(matches!(
        h.controller.start_recording().await,
        Err(RecordingError::AlreadyRecording)
    ));
    assert_eq!(h.sink.starts.load(Ordering::SeqCst), 1);

    h.controller.stop_recording().await.unwrap();
    h.controller.shutdown().await;
    h.pipeline.release().await;
}

#[tokio::test]
async fn test_stop_without_recording_is_an_error() {
    let h = video_session_with(MockSink::default(), test_config()).await;
    assert!(matches!(
        h.controller.stop_recording().await,
        Err(RecordingError::NotRecording)
    ));
    assert!(matches!(
        h.controller.pause_recording().await,
        Err(RecordingError::NotRecording)
    ));
    h.controller.shutdown().await;
    h.pipeline.release().await;
}

#[tokio::test]
async fn test_recording_requires_video_mode() {
    let h = video_session_with(MockSink::default(), test_config()).await;
    h.controller.set_mode(CaptureMode::Photo).await.unwrap();

    assert!(matches!(
        h.controller.start_recording().await,
        Err(RecordingError::StartFailed(_))
    ));
    h.controller.shutdown().await;
    h.pipeline.release().await;
}

#[tokio::test]
async fn test_start_failure_returns_to_idle() {
    let h = video_session_with(MockSink::failing_start(), test_config()).await;

    assert!(matches!(
        h.controller.start_recording().await,
        Err(RecordingError::StartFailed(_))
    ));
    let snapshot = h.controller.snapshot();
    assert_eq!(snapshot.recording_state, RecordingState::Idle);
    assert!(!snapshot.recording);
    h.controller.shutdown().await;
    h.pipeline.release().await;
}

#[tokio::test]
async fn test_reconfiguration_is_blocked_while_recording() {
    let h = video_session_with(MockSink::default(), test_config()).await;
    h.controller.start_recording().await.unwrap();

    assert_eq!(
        h.controller.set_resolution_tier(ResolutionTier::HD).await,
        Err(ConfigError::RecordingActive)
    );
    assert_eq!(
        h.controller.set_mode(CaptureMode::Photo).await,
        Err(ConfigError::RecordingActive)
    );
    assert_eq!(
        h.controller.set_timelapse(true).await,
        Err(ConfigError::RecordingActive)
    );

    h.controller.stop_recording().await.unwrap();
    // Idle again: reconfiguration works
    h.controller.set_resolution_tier(ResolutionTier::HD).await.unwrap();
    h.controller.shutdown().await;
    h.pipeline.release().await;
}

#[tokio::test]
async fn test_async_sink_failure_stops_with_error() {
    let h = video_session_with(MockSink::default(), test_config()).await;
    h.controller.start_recording().await.unwrap();

    h.controller
        .report_sink_failure(RecordingError::SinkFailed("encoder died".to_string()));

    let snapshot = wait_for(&h.controller, "idle after sink failure", |s| {
        s.recording_state == RecordingState::Idle
    })
    .await;
    assert!(snapshot.last_error.as_deref().unwrap().contains("encoder died"));
    assert_eq!(h.sink.stops.load(Ordering::SeqCst), 1);
    h.controller.shutdown().await;
    h.pipeline.release().await;
}

#[tokio::test(start_paused = true)]
async fn test_timelapse_pulses_and_stop_resets() {
    let h = video_session_with(MockSink::default(), test_config()).await;
    h.controller.set_timelapse(true).await.unwrap();
    h.controller.start_recording().await.unwrap();

    // The sink idles paused between pulses
    assert!(h.sink.pauses.load(Ordering::SeqCst) >= 1);

    let snapshot = wait_for(&h.controller, "five timelapse pulses", |s| {
        s.timelapse_frames >= 5
    })
    .await;
    assert!(snapshot.recording);
    assert!(h.sink.resumes.load(Ordering::SeqCst) >= 5);

    h.controller.stop_recording().await.unwrap();
    let snapshot = h.controller.snapshot();
    assert_eq!(snapshot.recording_state, RecordingState::Idle);
    assert_eq!(snapshot.timelapse_frames, 0);

    // No pulse survives the stop acknowledgement
    let resumes_after_stop = h.sink.resumes.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(h.sink.resumes.load(Ordering::SeqCst), resumes_after_stop);

    h.controller.shutdown().await;
    h.pipeline.release().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_stop_during_a_blocked_pause_keeps_the_counter_reset() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    let sink = Arc::new(StallingSink::new(Duration::from_millis(300)));
    let pipeline = Arc::new(FrameProcessingPipeline::with_software_renderer(Arc::new(
        TestPatternProvider,
    )));
    let (dispatcher, analysis_rx) = FrameAnalysisDispatcher::new(None);
    let controller = CaptureSessionController::spawn(
        Arc::clone(&pipeline),
        Arc::clone(&sink) as Arc<dyn RecordingSink>,
        Arc::new(dispatcher),
        analysis_rx,
        test_config(),
        CameraDevice::basic("Test Camera", "cam-0"),
    );
    controller.set_mode(CaptureMode::Video).await.unwrap();
    controller.set_timelapse(true).await.unwrap();
    controller.start_recording().await.unwrap();

    // Wait until the pulse is inside the blocking pause that ends a burst
    tokio::time::timeout(Duration::from_secs(10), async {
        while sink.pauses.load(Ordering::SeqCst) < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("pulse never reached its burst pause");

    controller.stop_recording().await.unwrap();

    // A tick emitted by that raced cycle must not move the counter of an
    // idle session
    tokio::time::sleep(Duration::from_millis(200)).await;
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.recording_state, RecordingState::Idle);
    assert_eq!(snapshot.timelapse_frames, 0);

    controller.shutdown().await;
    pipeline.release().await;
}

#[tokio::test(start_paused = true)]
async fn test_manual_pause_suspends_the_timelapse_pulse() {
    let h = video_session_with(MockSink::default(), test_config()).await;
    h.controller.set_timelapse(true).await.unwrap();
    h.controller.start_recording().await.unwrap();

    wait_for(&h.controller, "two timelapse pulses", |s| {
        s.timelapse_frames >= 2
    })
    .await;

    h.controller.pause_recording().await.unwrap();
    let snapshot = h.controller.snapshot();
    assert_eq!(snapshot.recording_state, RecordingState::Paused);
    let frames_at_pause = snapshot.timelapse_frames;
    let resumes_at_pause = h.sink.resumes.load(Ordering::SeqCst);

    // The pulse is quiesced: the sink sees no activity while paused
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(h.sink.resumes.load(Ordering::SeqCst), resumes_at_pause);
    assert_eq!(h.controller.snapshot().timelapse_frames, frames_at_pause);

    h.controller.resume_recording().await.unwrap();
    assert_eq!(
        h.controller.snapshot().recording_state,
        RecordingState::Recording
    );

    // Counting continues from where it stopped instead of restarting
    wait_for(&h.controller, "pulses after resume", |s| {
        s.timelapse_frames >= frames_at_pause + 2
    })
    .await;

    h.controller.stop_recording().await.unwrap();
    assert_eq!(h.controller.snapshot().timelapse_frames, 0);
    h.controller.shutdown().await;
    h.pipeline.release().await;
}

#[tokio::test]
async fn test_rendered_frames_reach_the_scene_classifier() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    let sink = Arc::new(MockSink::default());
    let pipeline = Arc::new(FrameProcessingPipeline::with_software_renderer(Arc::new(
        TestPatternProvider,
    )));
    let (dispatcher, analysis_rx) =
        FrameAnalysisDispatcher::new(Some(Arc::new(BrightnessClassifier)));
    let controller = CaptureSessionController::spawn(
        Arc::clone(&pipeline),
        Arc::clone(&sink) as Arc<dyn RecordingSink>,
        Arc::new(dispatcher),
        analysis_rx,
        test_config(),
        CameraDevice::basic("Test Camera", "cam-0"),
    );

    controller.set_scene_detection(true);
    let snapshot = wait_for(&controller, "scene labels from the stream", |s| {
        s.last_scene.is_some()
    })
    .await;
    assert!(snapshot.scene_detection);
    let labels = snapshot.last_scene.unwrap();
    assert!(["dark", "normal", "bright"].contains(&labels[0].label.as_str()));

    // Disabling stops the stream from producing further results
    controller.set_scene_detection(false);
    wait_for(&controller, "detection disabled", |s| !s.scene_detection).await;

    controller.shutdown().await;
    pipeline.release().await;
}

#[tokio::test]
async fn test_photo_capture_returns_a_rendered_frame() {
    let h = video_session_with(MockSink::default(), test_config()).await;
    h.controller.set_mode(CaptureMode::Photo).await.unwrap();

    let frame = h.controller.capture_photo().await.unwrap();
    assert_eq!(frame.width, 640);
    assert_eq!(frame.height, 480);

    h.controller.shutdown().await;
    h.pipeline.release().await;
}

#[tokio::test]
async fn test_photo_capture_does_not_touch_recording_state() {
    let h = video_session_with(MockSink::default(), test_config()).await;
    h.controller.start_recording().await.unwrap();

    let frame = h.controller.capture_photo().await.unwrap();
    assert!(frame.width > 0);
    assert_eq!(h.controller.snapshot().recording_state, RecordingState::Recording);

    h.controller.stop_recording().await.unwrap();
    h.controller.shutdown().await;
    h.pipeline.release().await;
}

#[tokio::test]
async fn test_analysis_results_reach_the_snapshot() {
    let h = video_session_with(MockSink::default(), test_config()).await;

    h.analysis_tx
        .send(AnalysisEvent::Qr(QrDetection {
            payload: "https://example.com".to_string(),
            action: QrAction::Url("https://example.com".to_string()),
            region: FrameRegion {
                x: 0.1,
                y: 0.1,
                width: 0.3,
                height: 0.3,
            },
        }))
        .unwrap();
    let snapshot = wait_for(&h.controller, "QR in snapshot", |s| s.last_qr.is_some()).await;
    assert_eq!(snapshot.last_qr.unwrap().payload, "https://example.com");

    h.analysis_tx
        .send(AnalysisEvent::Scene {
            labels: vec![SceneLabel {
                label: "sunset".to_string(),
                confidence: 0.8,
            }],
            sequence: 10,
        })
        .unwrap();
    let snapshot = wait_for(&h.controller, "scene in snapshot", |s| s.last_scene.is_some()).await;
    assert_eq!(snapshot.last_scene.unwrap()[0].label, "sunset");

    // QR detections are sticky until explicitly cleared
    h.controller.clear_qr();
    wait_for(&h.controller, "QR cleared", |s| s.last_qr.is_none()).await;

    h.controller.shutdown().await;
    h.pipeline.release().await;
}

#[tokio::test]
async fn test_zoom_and_exposure_are_clamped_to_device_bounds() {
    let h = video_session_with(MockSink::default(), test_config()).await;

    let mut device = CameraDevice::basic("Wide", "cam-1");
    device.zoom_range = (1.0, 4.0);
    device.exposure_range = (-6, 6);
    device.exposure_step = 0.5;
    h.controller.select_device(device).await.unwrap();

    h.controller.set_zoom(9.0);
    h.controller.set_exposure(-20);
    let snapshot = wait_for(&h.controller, "clamped controls", |s| {
        s.zoom_ratio == 4.0 && s.exposure_index == -6
    })
    .await;
    assert_eq!(snapshot.zoom_range, (1.0, 4.0));
    assert_eq!(snapshot.exposure_step, 0.5);

    h.controller.shutdown().await;
    h.pipeline.release().await;
}

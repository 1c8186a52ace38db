// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the frame analysis dispatcher

use capture_core::analysis::{
    AnalysisEvent, FrameAnalysisDispatcher, SceneClassifier, SceneLabel,
};
use capture_core::camera::{CameraFrame, PixelFormat, SensorRotation};
use futures::future::BoxFuture;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn frame(sequence: u64) -> Arc<CameraFrame> {
    Arc::new(CameraFrame {
        width: 8,
        height: 8,
        data: Arc::from(vec![200u8; 8 * 8 * 4]),
        format: PixelFormat::RGBA,
        stride: 32,
        sequence,
        captured_at: Instant::now(),
        sensor_timestamp_ns: None,
    })
}

/// Classifier with configurable latency and failure behavior
struct SlowClassifier {
    calls: Arc<AtomicU64>,
    latency: Duration,
    fail: bool,
}

impl SceneClassifier for SlowClassifier {
    fn classify(
        &self,
        frame: Arc<CameraFrame>,
        _rotation: SensorRotation,
    ) -> BoxFuture<'static, Result<Vec<SceneLabel>, String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let latency = self.latency;
        let fail = self.fail;
        Box::pin(async move {
            tokio::time::sleep(latency).await;
            if fail {
                return Err("classifier unavailable".to_string());
            }
            Ok(vec![SceneLabel {
                label: format!("scene-{}", frame.sequence),
                confidence: 0.9,
            }])
        })
    }
}

#[tokio::test(start_paused = true)]
async fn test_slow_classifier_is_throttled() {
    let calls = Arc::new(AtomicU64::new(0));
    let classifier = Arc::new(SlowClassifier {
        calls: Arc::clone(&calls),
        latency: Duration::from_secs(2),
        fail: false,
    });
    let (dispatcher, _rx) =
        FrameAnalysisDispatcher::with_cooldown(Some(classifier), Duration::from_millis(500));
    dispatcher.set_scene_enabled(true);

    // 10 seconds of frames at ~30fps against a 2s classifier: the
    // single-flight guard caps classification at roughly one call per
    // classifier latency
    for sequence in 0..300 {
        dispatcher.process_frame(frame(sequence), SensorRotation::None);
        tokio::time::sleep(Duration::from_millis(33)).await;
    }

    let total = calls.load(Ordering::SeqCst);
    assert!(total <= 6, "expected at most ~5 calls, got {}", total);
    assert!(total >= 3, "expected classification to keep running, got {}", total);
}

#[tokio::test]
async fn test_toggle_takes_effect_on_next_frame() {
    let calls = Arc::new(AtomicU64::new(0));
    let classifier = Arc::new(SlowClassifier {
        calls: Arc::clone(&calls),
        latency: Duration::ZERO,
        fail: false,
    });
    let (dispatcher, mut rx) =
        FrameAnalysisDispatcher::with_cooldown(Some(classifier), Duration::ZERO);

    dispatcher.process_frame(frame(1), SensorRotation::None);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    dispatcher.set_scene_enabled(true);
    dispatcher.process_frame(frame(2), SensorRotation::None);

    let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out")
        .expect("channel closed");
    match event {
        AnalysisEvent::Scene { labels, sequence } => {
            assert_eq!(sequence, 2);
            assert_eq!(labels[0].label, "scene-2");
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn test_classifier_errors_do_not_disable_analysis() {
    let calls = Arc::new(AtomicU64::new(0));
    let classifier = Arc::new(SlowClassifier {
        calls: Arc::clone(&calls),
        latency: Duration::ZERO,
        fail: true,
    });
    let (dispatcher, mut rx) =
        FrameAnalysisDispatcher::with_cooldown(Some(classifier), Duration::ZERO);
    dispatcher.set_scene_enabled(true);

    dispatcher.process_frame(frame(1), SensorRotation::None);
    tokio::time::sleep(Duration::from_millis(50)).await;
    dispatcher.process_frame(frame(2), SensorRotation::None);
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Both frames were attempted despite the failures, and no result event
    // was emitted for either
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_frame_without_qr_code_emits_nothing() {
    let (dispatcher, mut rx) = FrameAnalysisDispatcher::new(None);
    dispatcher.set_qr_enabled(true);

    dispatcher.process_frame(frame(1), SensorRotation::None);
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_nothing_enabled_drops_frames_immediately() {
    let (dispatcher, mut rx) = FrameAnalysisDispatcher::new(None);

    let f = frame(1);
    dispatcher.process_frame(Arc::clone(&f), SensorRotation::None);
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Only our local clone holds the frame: the dispatcher launched nothing
    assert_eq!(Arc::strong_count(&f), 1);
    assert!(rx.try_recv().is_err());
}

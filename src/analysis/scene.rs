// SPDX-License-Identifier: GPL-3.0-only

//! Scene classification
//!
//! [`SceneClassifier`] is the seam for platform vision services. The crate
//! treats implementations as black boxes with unbounded latency; the
//! dispatcher throttles calls, classifiers never have to.

use crate::camera::{CameraFrame, PixelFormat, SensorRotation};
use futures::future::BoxFuture;
use std::sync::Arc;

/// One classification result
#[derive(Debug, Clone, PartialEq)]
pub struct SceneLabel {
    pub label: String,
    /// Classifier confidence, `0.0..=1.0`
    pub confidence: f32,
}

/// Classifies the content of a camera frame
pub trait SceneClassifier: Send + Sync {
    /// Classify one frame. May take arbitrarily long; the dispatcher
    /// guarantees at most one call is in flight.
    fn classify(
        &self,
        frame: Arc<CameraFrame>,
        rotation: SensorRotation,
    ) -> BoxFuture<'static, Result<Vec<SceneLabel>, String>>;
}

/// Built-in classifier labelling frames by average brightness
///
/// Useful as a default when no platform vision service is wired up, and
/// as a deterministic fixture.
#[derive(Debug, Default)]
pub struct BrightnessClassifier;

impl BrightnessClassifier {
    fn average_luma(frame: &CameraFrame) -> f32 {
        let stride = frame.stride as usize;
        let mut total = 0u64;
        let mut count = 0u64;
        for y in 0..frame.height as usize {
            for x in 0..frame.width as usize {
                let luma = match frame.format {
                    PixelFormat::RGBA => {
                        let idx = y * stride + x * 4;
                        (0.299 * frame.data[idx] as f32
                            + 0.587 * frame.data[idx + 1] as f32
                            + 0.114 * frame.data[idx + 2] as f32) as u64
                    }
                    PixelFormat::Gray8 => frame.data[y * stride + x] as u64,
                };
                total += luma;
                count += 1;
            }
        }
        if count == 0 {
            return 0.0;
        }
        total as f32 / count as f32 / 255.0
    }
}

impl SceneClassifier for BrightnessClassifier {
    fn classify(
        &self,
        frame: Arc<CameraFrame>,
        _rotation: SensorRotation,
    ) -> BoxFuture<'static, Result<Vec<SceneLabel>, String>> {
        Box::pin(async move {
            if frame.width == 0 || frame.height == 0 {
                return Err("empty frame".to_string());
            }
            if frame.data.len() < frame.min_buffer_len() {
                return Err(format!(
                    "frame buffer too small: {} < {}",
                    frame.data.len(),
                    frame.min_buffer_len()
                ));
            }
            let luma = Self::average_luma(&frame);
            let label = if luma < 0.2 {
                "dark"
            } else if luma > 0.8 {
                "bright"
            } else {
                "normal"
            };
            // Confidence peaks at the extremes and dips near thresholds
            let confidence = ((luma - 0.5).abs() * 2.0).clamp(0.4, 1.0);
            Ok(vec![SceneLabel {
                label: label.to_string(),
                confidence,
            }])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn gray_frame(value: u8) -> Arc<CameraFrame> {
        Arc::new(CameraFrame {
            width: 4,
            height: 4,
            data: Arc::from(vec![value; 16]),
            format: PixelFormat::Gray8,
            stride: 4,
            sequence: 0,
            captured_at: Instant::now(),
            sensor_timestamp_ns: None,
        })
    }

    #[tokio::test]
    async fn test_dark_frame_is_labelled_dark() {
        let labels = BrightnessClassifier
            .classify(gray_frame(10), SensorRotation::None)
            .await
            .unwrap();
        assert_eq!(labels[0].label, "dark");
    }

    #[tokio::test]
    async fn test_short_buffer_is_an_error_not_a_panic() {
        let frame = Arc::new(CameraFrame {
            width: 8,
            height: 8,
            data: Arc::from(vec![0u8; 4]),
            format: PixelFormat::Gray8,
            stride: 8,
            sequence: 0,
            captured_at: Instant::now(),
            sensor_timestamp_ns: None,
        });
        let err = BrightnessClassifier
            .classify(frame, SensorRotation::None)
            .await
            .unwrap_err();
        assert!(err.contains("too small"));
    }

    #[tokio::test]
    async fn test_bright_frame_is_labelled_bright() {
        let labels = BrightnessClassifier
            .classify(gray_frame(250), SensorRotation::None)
            .await
            .unwrap();
        assert_eq!(labels[0].label, "bright");
        assert!(labels[0].confidence > 0.9);
    }
}

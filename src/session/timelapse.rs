// SPDX-License-Identifier: GPL-3.0-only

//! Timelapse pulse
//!
//! While a timelapse recording is live the sink spends most of its time
//! paused; a periodic task briefly resumes it to capture a burst of frames.
//! The pulse never assumes it is still wanted: liveness is re-checked
//! immediately before every resume and pause call, and cancellation takes
//! the same lock the sink calls are made under, so once `cancel` returns
//! no further resume can begin.

use crate::constants::{TIMELAPSE_BURST_DURATION, TIMELAPSE_STABILIZATION_DELAY};
use crate::session::recording::RecordingSink;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Handle to a running pulse task
pub struct TimelapsePulse {
    live: Arc<AtomicBool>,
    call_lock: Arc<Mutex<()>>,
    frames: Arc<AtomicU64>,
    sink_resumed: Arc<AtomicBool>,
    task: tokio::task::JoinHandle<()>,
}

impl TimelapsePulse {
    /// Spawn the pulse onto the current runtime.
    ///
    /// The sink must already be started and paused. Each completed pulse
    /// reports the running frame count on `ticks`; `start_count` seeds the
    /// count so a pulse respawned after a manual pause keeps counting from
    /// where it left off.
    pub fn spawn(
        sink: Arc<dyn RecordingSink>,
        interval: Duration,
        ticks: mpsc::UnboundedSender<u64>,
        start_count: u64,
    ) -> Self {
        let live = Arc::new(AtomicBool::new(true));
        let call_lock = Arc::new(Mutex::new(()));
        let frames = Arc::new(AtomicU64::new(start_count));
        let sink_resumed = Arc::new(AtomicBool::new(false));

        let task_live = Arc::clone(&live);
        let task_lock = Arc::clone(&call_lock);
        let task_frames = Arc::clone(&frames);
        let task_resumed = Arc::clone(&sink_resumed);

        let task = tokio::spawn(async move {
            debug!(interval_ms = interval.as_millis() as u64, "Timelapse pulse started");
            tokio::time::sleep(TIMELAPSE_STABILIZATION_DELAY).await;

            loop {
                // Resume under the lock so cancellation can never observe
                // a resume it did not wait for
                {
                    let _guard = task_lock.lock().unwrap();
                    if !task_live.load(Ordering::SeqCst) {
                        break;
                    }
                    if let Err(e) = sink.resume() {
                        warn!(error = %e, "Pulse resume failed, stopping pulse");
                        break;
                    }
                    task_resumed.store(true, Ordering::SeqCst);
                }

                tokio::time::sleep(TIMELAPSE_BURST_DURATION).await;

                {
                    let _guard = task_lock.lock().unwrap();
                    if !task_live.load(Ordering::SeqCst) {
                        break;
                    }
                    if let Err(e) = sink.pause() {
                        warn!(error = %e, "Pulse pause failed, stopping pulse");
                        break;
                    }
                    task_resumed.store(false, Ordering::SeqCst);
                    // Cancellation may have raced the pause call; a tick
                    // emitted now would land after the recording was torn
                    // down, so liveness gates the count as well
                    if !task_live.load(Ordering::SeqCst) {
                        break;
                    }
                    let count = task_frames.fetch_add(1, Ordering::SeqCst) + 1;
                    let _ = ticks.send(count);
                }

                tokio::time::sleep(interval).await;
            }
            debug!("Timelapse pulse exiting");
        });

        Self {
            live,
            call_lock,
            frames,
            sink_resumed,
            task,
        }
    }

    /// Frames captured so far
    pub fn frame_count(&self) -> u64 {
        self.frames.load(Ordering::SeqCst)
    }

    /// Whether the last sink call left it resumed (cancelled mid-burst)
    pub fn sink_is_resumed(&self) -> bool {
        self.sink_resumed.load(Ordering::SeqCst)
    }

    /// Cancel the pulse.
    ///
    /// Synchronous: when this returns, any in-progress sink call has
    /// finished and no further resume or pause will be issued. Safe to
    /// call the sink's `stop` immediately afterwards.
    pub fn cancel(&self) {
        self.live.store(false, Ordering::SeqCst);
        // Wait out a sink call in flight; liveness is checked under this
        // same lock before every call
        drop(self.call_lock.lock().unwrap());
        self.task.abort();
    }
}

impl Drop for TimelapsePulse {
    fn drop(&mut self) {
        self.live.store(false, Ordering::SeqCst);
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RecordingError;
    use crate::session::recording::{MediaLocation, SinkDescriptor};

    #[derive(Default)]
    struct CountingSink {
        resumes: AtomicU64,
        pauses: AtomicU64,
    }

    impl RecordingSink for CountingSink {
        fn start(&self, _descriptor: &SinkDescriptor) -> Result<(), RecordingError> {
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
            Ok(MediaLocation {
                path: "/tmp/x".into(),
                display_name: "x".into(),
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_pulse_counts_complete_cycles() {
        let sink = Arc::new(CountingSink::default());
        let (ticks_tx, mut ticks_rx) = mpsc::unbounded_channel();
        let pulse = TimelapsePulse::spawn(
            Arc::clone(&sink) as Arc<dyn RecordingSink>,
            Duration::from_millis(50),
            ticks_tx,
            0,
        );

        // Stabilization (1500ms) + a few cycles
        tokio::time::sleep(Duration::from_millis(2100)).await;
        pulse.cancel();

        let count = pulse.frame_count();
        assert!(count >= 2, "expected at least 2 pulses, got {}", count);
        // Cancellation may land mid-burst, leaving at most one resume
        // without its matching pause
        let resumes = sink.resumes.load(Ordering::SeqCst);
        let pauses = sink.pauses.load(Ordering::SeqCst);
        assert!(resumes >= pauses && resumes - pauses <= 1);
        assert_eq!(ticks_rx.recv().await, Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_further_resumes() {
        let sink = Arc::new(CountingSink::default());
        let (ticks_tx, mut ticks_rx) = mpsc::unbounded_channel();
        let pulse = TimelapsePulse::spawn(
            Arc::clone(&sink) as Arc<dyn RecordingSink>,
            Duration::from_millis(10),
            ticks_tx,
            0,
        );

        tokio::time::sleep(Duration::from_millis(1800)).await;
        pulse.cancel();
        let resumes_at_cancel = sink.resumes.load(Ordering::SeqCst);

        // Drain the ticks emitted before cancellation
        while ticks_rx.try_recv().is_ok() {}

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(sink.resumes.load(Ordering::SeqCst), resumes_at_cancel);
        assert!(ticks_rx.try_recv().is_err(), "no tick after cancel");
    }

    #[tokio::test(start_paused = true)]
    async fn test_respawn_continues_the_frame_count() {
        let sink = Arc::new(CountingSink::default());
        let (ticks_tx, mut ticks_rx) = mpsc::unbounded_channel();
        let pulse = TimelapsePulse::spawn(
            Arc::clone(&sink) as Arc<dyn RecordingSink>,
            Duration::from_millis(50),
            ticks_tx,
            7,
        );

        tokio::time::sleep(Duration::from_millis(1700)).await;
        pulse.cancel();
        assert_eq!(ticks_rx.recv().await, Some(8));
        assert!(pulse.frame_count() >= 8);
    }
}

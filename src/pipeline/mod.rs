//! Pipeline controller
//!
//! Orchestrates capture, detection, styling, and the dual-sink fan-out.
//! Owns the lifecycle state machine and the fixed-rate processing loop that
//! runs on its own named thread, decoupled from the camera's capture rate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use parking_lot::Mutex;

use crate::camera::FrameSource;
use crate::detect::FaceDetector;
use crate::effects::StyleEngine;
use crate::output::{Broadcaster, DeviceSink, FrameSink};

/// How long `stop()` waits for the processing loop to exit.
const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Pipeline lifecycle states.
///
/// Transitions happen only inside the controller, serialized on its state
/// lock; `start` while Running and `stop` while Stopped are idempotent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl PipelineState {
    pub fn can_transition_to(&self, target: PipelineState) -> bool {
        use PipelineState::*;
        matches!(
            (self, target),
            (Stopped, Starting)
                | (Starting, Running)
                | (Starting, Stopped)
                | (Running, Stopping)
                | (Stopping, Stopped)
        ) || *self == target
    }

    pub fn is_running(&self) -> bool {
        matches!(self, PipelineState::Running)
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PipelineState::Stopped => "Stopped",
            PipelineState::Starting => "Starting",
            PipelineState::Running => "Running",
            PipelineState::Stopping => "Stopping",
        };
        write!(f, "{}", s)
    }
}

/// Snapshot of pipeline availability for status reporting.
#[derive(Clone, Copy, Debug)]
pub struct PipelineStatus {
    pub camera_active: bool,
    pub virtualcam_active: bool,
    pub detector_available: bool,
}

struct ProcessThread {
    handle: JoinHandle<()>,
    done_rx: Receiver<()>,
}

type SharedDetector = Arc<Mutex<Option<Box<dyn FaceDetector>>>>;

pub struct PipelineController {
    source: Arc<dyn FrameSource>,
    detector: SharedDetector,
    detector_available: bool,
    engine: Arc<StyleEngine>,
    device: Arc<dyn DeviceSink>,
    broadcaster: Arc<Broadcaster>,
    process_fps: u32,
    state: Mutex<PipelineState>,
    running: Arc<AtomicBool>,
    thread: Mutex<Option<ProcessThread>>,
}

impl PipelineController {
    pub fn new(
        source: Arc<dyn FrameSource>,
        detector: Option<Box<dyn FaceDetector>>,
        engine: Arc<StyleEngine>,
        device: Arc<dyn DeviceSink>,
        broadcaster: Arc<Broadcaster>,
        process_fps: u32,
    ) -> Self {
        Self {
            source,
            detector_available: detector.is_some(),
            detector: Arc::new(Mutex::new(detector)),
            engine,
            device,
            broadcaster,
            process_fps: process_fps.max(1),
            state: Mutex::new(PipelineState::Stopped),
            running: Arc::new(AtomicBool::new(false)),
            thread: Mutex::new(None),
        }
    }

    pub fn style_engine(&self) -> &Arc<StyleEngine> {
        &self.engine
    }

    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }

    pub fn state(&self) -> PipelineState {
        *self.state.lock()
    }

    pub fn status(&self) -> PipelineStatus {
        PipelineStatus {
            camera_active: self.state().is_running(),
            virtualcam_active: self.device.is_active(),
            detector_available: self.detector_available,
        }
    }

    /// Start the pipeline: camera first, then the virtual camera (which may
    /// degrade), then the processing loop. Holding the state lock for the
    /// whole call makes concurrent starts idempotent.
    pub fn start(&self) -> Result<(), String> {
        let mut state = self.state.lock();
        if matches!(*state, PipelineState::Running | PipelineState::Starting) {
            return Ok(());
        }
        debug_assert!(state.can_transition_to(PipelineState::Starting));
        *state = PipelineState::Starting;

        if let Err(e) = self.source.start() {
            *state = PipelineState::Stopped;
            log::error!("Pipeline start failed: {}", e);
            return Err(e);
        }

        if !self.device.open() {
            log::warn!("Continuing without virtual camera output");
        }

        self.running.store(true, Ordering::Release);
        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(1);

        let source = self.source.clone();
        let detector = self.detector.clone();
        let engine = self.engine.clone();
        let device = self.device.clone();
        let broadcaster = self.broadcaster.clone();
        let running = self.running.clone();
        let period = Duration::from_secs_f64(1.0 / self.process_fps as f64);

        let handle = std::thread::Builder::new()
            .name("pipeline-process".to_string())
            .spawn(move || {
                process_loop(source, detector, engine, device, broadcaster, running, period);
                let _ = done_tx.send(());
            })
            .map_err(|e| {
                self.running.store(false, Ordering::Release);
                self.source.stop();
                self.device.close();
                *state = PipelineState::Stopped;
                format!("Failed to spawn processing thread: {}", e)
            })?;

        *self.thread.lock() = Some(ProcessThread { handle, done_rx });
        *state = PipelineState::Running;
        log::info!("Pipeline running at {} fps", self.process_fps);
        Ok(())
    }

    /// Stop the pipeline: signal the loop, join it (bounded), then tear down
    /// the camera and the virtual camera in that order. Teardown failures
    /// are logged; the state always reaches Stopped.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        if matches!(*state, PipelineState::Stopped | PipelineState::Stopping) {
            return;
        }
        *state = PipelineState::Stopping;

        self.running.store(false, Ordering::Release);
        if let Some(ProcessThread { handle, done_rx }) = self.thread.lock().take() {
            match done_rx.recv_timeout(JOIN_TIMEOUT) {
                Ok(()) => {
                    let _ = handle.join();
                }
                Err(_) => {
                    log::error!("Processing thread did not exit within {:?}", JOIN_TIMEOUT);
                }
            }
        }

        self.source.stop();
        self.device.close();

        *state = PipelineState::Stopped;
        log::info!("Pipeline stopped");
    }
}

/// Steady-state tick loop: pull the freshest frame, locate the face, style,
/// and fan out to both sinks. Each sink isolates its own failures, so one
/// sink can never block or drop the frame for the other.
fn process_loop(
    source: Arc<dyn FrameSource>,
    detector: SharedDetector,
    engine: Arc<StyleEngine>,
    device: Arc<dyn DeviceSink>,
    broadcaster: Arc<Broadcaster>,
    running: Arc<AtomicBool>,
    period: Duration,
) {
    log::info!("Processing loop started");
    let mut next_tick = Instant::now() + period;

    while running.load(Ordering::Acquire) {
        // Skip the tick entirely until the first capture lands.
        if let Some(frame) = source.latest() {
            let region = detector.lock().as_mut().and_then(|d| d.detect(&frame));
            let styled = engine.apply(&frame, region.as_ref());

            device.send(&styled);
            broadcaster.send(&styled);
        }

        let now = Instant::now();
        if next_tick > now {
            std::thread::sleep(next_tick - now);
        }
        next_tick += period;
        if next_tick < Instant::now() {
            // Fell behind; rebase rather than bursting to catch up
            next_tick = Instant::now() + period;
        }
    }

    log::info!("Processing loop stopped");
}

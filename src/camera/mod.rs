//! Camera capture module
//!
//! Provides cross-platform camera capture using the nokhwa crate.
//! Captures frames on a background thread into a single latest-frame slot
//! that the processing loop reads without blocking.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;
use parking_lot::Mutex;

/// How long `start()` waits for the capture thread to report the device open.
const OPEN_TIMEOUT: Duration = Duration::from_secs(5);

/// How long `stop()` waits for the capture thread to exit.
const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// A single captured frame: contiguous RGB8 bytes in row-major order.
///
/// Immutable once captured; stages that mutate pixels work on their own copy.
#[derive(Clone)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    frame_number: u64,
    timestamp: Instant,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, frame_number: u64) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * 3,
            "data length must equal width * height * 3"
        );
        Self {
            data,
            width,
            height,
            frame_number,
            timestamp: Instant::now(),
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    /// Create a nearest-neighbor resized copy of the frame.
    pub fn resize(&self, target_width: u32, target_height: u32) -> Frame {
        if self.width == target_width && self.height == target_height {
            return self.clone();
        }

        let mut output = vec![0u8; target_width as usize * target_height as usize * 3];
        let x_ratio = self.width as f32 / target_width as f32;
        let y_ratio = self.height as f32 / target_height as f32;

        for y in 0..target_height {
            for x in 0..target_width {
                let src_x = ((x as f32 * x_ratio) as u32).min(self.width - 1);
                let src_y = ((y as f32 * y_ratio) as u32).min(self.height - 1);
                let src_idx = ((src_y * self.width + src_x) * 3) as usize;
                let dst_idx = ((y * target_width + x) * 3) as usize;
                output[dst_idx..dst_idx + 3].copy_from_slice(&self.data[src_idx..src_idx + 3]);
            }
        }

        Frame {
            data: output,
            width: target_width,
            height: target_height,
            frame_number: self.frame_number,
            timestamp: self.timestamp,
        }
    }
}

/// Source of the freshest available camera frame.
///
/// `latest` must never block the caller and never returns a frame older than
/// one previously returned.
pub trait FrameSource: Send + Sync {
    fn start(&self) -> Result<(), String>;
    fn latest(&self) -> Option<Arc<Frame>>;
    fn stop(&self);
}

/// Single-value cell holding the most recent completed capture.
///
/// The writer replaces the whole `Arc`; readers clone it out. No queue, no
/// backpressure into the capture loop.
pub struct FrameCell {
    slot: Mutex<Option<Arc<Frame>>>,
}

impl FrameCell {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    pub fn store(&self, frame: Frame) {
        *self.slot.lock() = Some(Arc::new(frame));
    }

    pub fn latest(&self) -> Option<Arc<Frame>> {
        self.slot.lock().clone()
    }

    pub fn clear(&self) {
        *self.slot.lock() = None;
    }
}

impl Default for FrameCell {
    fn default() -> Self {
        Self::new()
    }
}

struct CaptureThread {
    handle: JoinHandle<()>,
    done_rx: Receiver<()>,
}

/// Camera capture interface backed by a background acquisition thread.
pub struct CameraCapture {
    camera_index: u32,
    cell: Arc<FrameCell>,
    running: Arc<AtomicBool>,
    frame_count: Arc<AtomicU64>,
    thread: Mutex<Option<CaptureThread>>,
}

impl CameraCapture {
    pub fn new(camera_index: u32) -> Self {
        Self {
            camera_index,
            cell: Arc::new(FrameCell::new()),
            running: Arc::new(AtomicBool::new(false)),
            frame_count: Arc::new(AtomicU64::new(0)),
            thread: Mutex::new(None),
        }
    }

    /// Total frames captured since the last successful `start`.
    pub fn frame_count(&self) -> u64 {
        self.frame_count.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Camera capture thread body. Reports the device-open result on `ack_tx`
    /// exactly once, then loops until `running` clears.
    fn capture_thread(
        camera_index: u32,
        cell: Arc<FrameCell>,
        running: Arc<AtomicBool>,
        frame_count: Arc<AtomicU64>,
        ack_tx: Sender<Result<(), String>>,
        done_tx: Sender<()>,
    ) {
        let index = CameraIndex::Index(camera_index);
        let requested =
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestResolution);

        let mut camera = match Camera::new(index, requested) {
            Ok(c) => c,
            Err(e) => {
                let _ = ack_tx.send(Err(format!("Failed to open camera {}: {}", camera_index, e)));
                let _ = done_tx.send(());
                return;
            }
        };

        if let Err(e) = camera.open_stream() {
            let _ = ack_tx.send(Err(format!("Failed to open camera stream: {}", e)));
            let _ = done_tx.send(());
            return;
        }

        log::info!(
            "Camera opened: {} ({}x{})",
            camera.info().human_name(),
            camera.resolution().width(),
            camera.resolution().height()
        );
        let _ = ack_tx.send(Ok(()));

        while running.load(Ordering::Acquire) {
            match camera.frame() {
                Ok(frame) => match frame.decode_image::<RgbFormat>() {
                    Ok(image) => {
                        let frame_num = frame_count.fetch_add(1, Ordering::Relaxed);
                        let (w, h) = (image.width(), image.height());
                        cell.store(Frame::new(image.into_raw(), w, h, frame_num));
                    }
                    Err(e) => {
                        // Stale-but-available beats blocking: keep the old frame.
                        log::warn!("Failed to decode frame: {:?}", e);
                    }
                },
                Err(e) => {
                    log::warn!("Failed to capture frame: {:?}", e);
                    std::thread::sleep(Duration::from_millis(10));
                }
            }
        }

        let _ = camera.stop_stream();
        log::info!("Camera capture thread stopped");
        let _ = done_tx.send(());
    }
}

impl FrameSource for CameraCapture {
    fn start(&self) -> Result<(), String> {
        let mut thread = self.thread.lock();
        if thread.is_some() {
            return Ok(());
        }

        self.cell.clear();
        self.frame_count.store(0, Ordering::Relaxed);
        self.running.store(true, Ordering::Release);

        let (ack_tx, ack_rx) = crossbeam_channel::bounded::<Result<(), String>>(1);
        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(1);

        let cell = self.cell.clone();
        let running = self.running.clone();
        let frame_count = self.frame_count.clone();
        let camera_index = self.camera_index;

        let handle = std::thread::Builder::new()
            .name("camera-capture".to_string())
            .spawn(move || {
                Self::capture_thread(camera_index, cell, running, frame_count, ack_tx, done_tx);
            })
            .map_err(|e| format!("Failed to spawn capture thread: {}", e))?;

        match ack_rx.recv_timeout(OPEN_TIMEOUT) {
            Ok(Ok(())) => {
                *thread = Some(CaptureThread { handle, done_rx });
                Ok(())
            }
            Ok(Err(e)) => {
                self.running.store(false, Ordering::Release);
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                self.running.store(false, Ordering::Release);
                Err("Timed out waiting for camera to open".to_string())
            }
        }
    }

    fn latest(&self) -> Option<Arc<Frame>> {
        self.cell.latest()
    }

    fn stop(&self) {
        let Some(CaptureThread { handle, done_rx }) = self.thread.lock().take() else {
            return;
        };

        self.running.store(false, Ordering::Release);
        match done_rx.recv_timeout(JOIN_TIMEOUT) {
            Ok(()) => {
                let _ = handle.join();
            }
            Err(_) => {
                // Leaving the thread detached; it holds no shared locks.
                log::error!("Camera capture thread did not exit within {:?}", JOIN_TIMEOUT);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_of(value: u8, width: u32, height: u32, number: u64) -> Frame {
        Frame::new(vec![value; (width * height * 3) as usize], width, height, number)
    }

    #[test]
    fn test_frame_cell_empty_before_first_store() {
        let cell = FrameCell::new();
        assert!(cell.latest().is_none());
    }

    #[test]
    fn test_frame_cell_returns_most_recent() {
        let cell = FrameCell::new();
        cell.store(frame_of(1, 2, 2, 0));
        cell.store(frame_of(2, 2, 2, 1));
        let latest = cell.latest().unwrap();
        assert_eq!(latest.frame_number(), 1);
        assert_eq!(latest.data()[0], 2);
    }

    #[test]
    fn test_frame_cell_never_goes_backwards_under_concurrent_writes() {
        let cell = Arc::new(FrameCell::new());
        let writer = {
            let cell = cell.clone();
            std::thread::spawn(move || {
                for n in 0..500u64 {
                    cell.store(frame_of((n % 255) as u8, 2, 2, n));
                }
            })
        };

        let mut last_seen = 0u64;
        for _ in 0..500 {
            if let Some(frame) = cell.latest() {
                assert!(frame.frame_number() >= last_seen);
                last_seen = frame.frame_number();
            }
        }
        writer.join().unwrap();
    }

    #[test]
    fn test_resize_dimensions_and_corners() {
        // 4x2 frame with distinct corner pixels
        let mut data = vec![0u8; 4 * 2 * 3];
        data[0] = 10; // top-left R
        let last = (2 - 1) * 4 * 3 + (4 - 1) * 3;
        data[last] = 20; // bottom-right R
        let frame = Frame::new(data, 4, 2, 0);

        let resized = frame.resize(2, 1);
        assert_eq!(resized.width(), 2);
        assert_eq!(resized.height(), 1);
        assert_eq!(resized.data().len(), 2 * 3);
        assert_eq!(resized.data()[0], 10);
    }

    #[test]
    fn test_resize_same_size_is_copy() {
        let frame = frame_of(7, 3, 3, 4);
        let resized = frame.resize(3, 3);
        assert_eq!(resized.data(), frame.data());
        assert_eq!(resized.frame_number(), 4);
    }
}

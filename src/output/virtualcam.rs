//! Virtual camera output via v4l2loopback.
//!
//! Configures the loopback device for RGB24 at a fixed resolution, then
//! writes resized frames with plain `write()` I/O (which v4l2loopback
//! accepts on its output side). If the device cannot be opened the sink
//! stays in no-op mode: `send` does nothing and start-up proceeds normally.

use std::fs::File;
use std::io::Write;

use parking_lot::Mutex;
use v4l::video::Output;
use v4l::{Device, Format, FourCC};

use crate::camera::Frame;
use crate::output::{DeviceSink, FrameSink};

pub struct VirtualCamera {
    path: String,
    width: u32,
    height: u32,
    fps: u32,
    device: Mutex<Option<File>>,
}

impl VirtualCamera {
    pub fn new(path: &str, width: u32, height: u32, fps: u32) -> Self {
        Self {
            path: path.to_string(),
            width,
            height,
            fps,
            device: Mutex::new(None),
        }
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    fn try_open(&self) -> Result<File, String> {
        let dev = Device::with_path(&self.path)
            .map_err(|e| format!("Failed to open {}: {}", self.path, e))?;

        let fmt = Format::new(self.width, self.height, FourCC::new(b"RGB3"));
        let applied = Output::set_format(&dev, &fmt)
            .map_err(|e| format!("Failed to set format on {}: {}", self.path, e))?;
        if applied.fourcc != fmt.fourcc {
            return Err(format!(
                "{} does not accept RGB3 output (got {})",
                self.path, applied.fourcc
            ));
        }
        drop(dev);

        // Second handle for write() I/O; the negotiated format sticks to the
        // loopback device, not the file descriptor.
        std::fs::OpenOptions::new()
            .write(true)
            .open(&self.path)
            .map_err(|e| format!("Failed to reopen {} for writing: {}", self.path, e))
    }
}

impl DeviceSink for VirtualCamera {
    fn open(&self) -> bool {
        let mut device = self.device.lock();
        if device.is_some() {
            return true;
        }
        match self.try_open() {
            Ok(file) => {
                log::info!(
                    "Virtual camera started: {} ({}x{} @ {} fps)",
                    self.path,
                    self.width,
                    self.height,
                    self.fps
                );
                *device = Some(file);
                true
            }
            Err(e) => {
                log::warn!("Virtual camera unavailable: {}", e);
                false
            }
        }
    }

    fn close(&self) {
        if self.device.lock().take().is_some() {
            log::info!("Virtual camera stopped");
        }
    }

    fn is_active(&self) -> bool {
        self.device.lock().is_some()
    }
}

impl FrameSink for VirtualCamera {
    fn send(&self, frame: &Frame) {
        let mut device = self.device.lock();
        let Some(file) = device.as_mut() else {
            return;
        };

        let resized;
        let data = if frame.width() == self.width && frame.height() == self.height {
            frame.data()
        } else {
            resized = frame.resize(self.width, self.height);
            resized.data()
        };

        if let Err(e) = file.write_all(data) {
            log::warn!("Virtual camera write failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unopened_device_send_is_noop() {
        let cam = VirtualCamera::new("/dev/null-no-such-device", 64, 48, 30);
        assert!(!cam.is_active());
        // Must not panic or error
        let frame = Frame::new(vec![0u8; 64 * 48 * 3], 64, 48, 0);
        cam.send(&frame);
    }

    #[test]
    fn test_open_missing_device_degrades() {
        let cam = VirtualCamera::new("/nonexistent/video99", 64, 48, 30);
        assert!(!cam.open());
        assert!(!cam.is_active());
    }

    #[test]
    fn test_close_when_never_opened_is_noop() {
        let cam = VirtualCamera::new("/nonexistent/video99", 64, 48, 30);
        cam.close();
        assert!(!cam.is_active());
    }
}

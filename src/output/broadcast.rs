//! WebSocket frame broadcaster.
//!
//! Owns the live subscriber set. Each processed frame is JPEG-encoded once
//! and the same bytes are fanned out to every subscriber over its own
//! unbounded channel, so the (synchronous) pipeline thread never blocks on a
//! slow viewer. A closed channel evicts its subscriber; the rest of the
//! fan-out pass is unaffected.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder};
use parking_lot::RwLock;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::camera::Frame;
use crate::output::FrameSink;

/// A message bound for one viewer connection.
#[derive(Clone, Debug)]
pub enum Outbound {
    /// JSON status payload, delivered as a text message.
    Status(String),
    /// Encoded JPEG frame, delivered as a binary message.
    Frame(Bytes),
}

pub struct Broadcaster {
    subscribers: RwLock<HashMap<u64, UnboundedSender<Outbound>>>,
    next_id: AtomicU64,
    jpeg_quality: u8,
}

impl Broadcaster {
    pub fn new(jpeg_quality: u8) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            jpeg_quality,
        }
    }

    /// Register a new viewer. Returns its id and the channel to drain.
    pub fn subscribe(&self) -> (u64, UnboundedReceiver<Outbound>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.write().insert(id, tx);
        log::info!("Viewer {} connected ({} total)", id, self.subscriber_count());
        (id, rx)
    }

    pub fn unsubscribe(&self, id: u64) {
        if self.subscribers.write().remove(&id).is_some() {
            log::info!(
                "Viewer {} disconnected ({} total)",
                id,
                self.subscriber_count()
            );
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Deliver a message to a single subscriber, evicting it on failure.
    pub fn send_to(&self, id: u64, message: Outbound) {
        let sender = self.subscribers.read().get(&id).cloned();
        if let Some(sender) = sender {
            if sender.send(message).is_err() {
                self.unsubscribe(id);
            }
        }
    }

    /// Push a status payload to every current subscriber.
    pub fn broadcast_status(&self, json: String) {
        self.fan_out(Outbound::Status(json));
    }

    /// Snapshot-then-iterate fan-out; failed sends evict their subscriber
    /// after the pass completes.
    fn fan_out(&self, message: Outbound) {
        let snapshot: Vec<(u64, UnboundedSender<Outbound>)> = self
            .subscribers
            .read()
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        let mut failed = Vec::new();
        for (id, tx) in snapshot {
            if tx.send(message.clone()).is_err() {
                failed.push(id);
            }
        }

        if !failed.is_empty() {
            let mut subscribers = self.subscribers.write();
            for id in &failed {
                subscribers.remove(id);
            }
            log::info!(
                "Evicted {} dead viewer(s), {} remaining",
                failed.len(),
                subscribers.len()
            );
        }
    }

    fn encode_jpeg(&self, frame: &Frame) -> Result<Bytes, String> {
        let mut buf = Cursor::new(Vec::new());
        let encoder = JpegEncoder::new_with_quality(&mut buf, self.jpeg_quality);
        encoder
            .write_image(
                frame.data(),
                frame.width(),
                frame.height(),
                ExtendedColorType::Rgb8,
            )
            .map_err(|e| format!("JPEG encode failed: {}", e))?;
        Ok(Bytes::from(buf.into_inner()))
    }
}

impl FrameSink for Broadcaster {
    fn send(&self, frame: &Frame) {
        // No viewers, no work: skip the encode entirely.
        if self.subscriber_count() == 0 {
            return;
        }
        match self.encode_jpeg(frame) {
            Ok(bytes) => self.fan_out(Outbound::Frame(bytes)),
            Err(e) => log::warn!("{}", e),
        }
    }
}

// SPDX-License-Identifier: GPL-3.0-only

//! Shared types for capture providers

use super::capture_loop::CaptureLoopController;
use crate::constants::camera::{FRONT_FACING_KEYWORDS, REAR_FACING_KEYWORDS, RELEASE_JOIN_WAIT};
use image::GrayImage;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

/// Which way a camera points, inferred from its label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FacingHint {
    /// Points away from the user (rear camera)
    Environment,
    /// Points at the user (front camera)
    User,
    #[default]
    Unknown,
}

impl FacingHint {
    /// Infer facing from a device label using the keyword synonym sets
    pub fn from_label(label: &str) -> Self {
        let lower = label.to_lowercase();
        if REAR_FACING_KEYWORDS.iter().any(|k| lower.contains(k)) {
            FacingHint::Environment
        } else if FRONT_FACING_KEYWORDS.iter().any(|k| lower.contains(k)) {
            FacingHint::User
        } else {
            FacingHint::Unknown
        }
    }
}

/// A capture device produced by enumeration
///
/// Not owned by any component beyond the enumeration call; sessions copy
/// the descriptor they select.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraDescriptor {
    /// Provider-scoped stable identifier (e.g. a device node path)
    pub device_id: String,
    /// Human-readable label
    pub label: String,
    /// Facing inferred from the label
    pub facing: FacingHint,
}

impl CameraDescriptor {
    pub fn new(device_id: impl Into<String>, label: impl Into<String>) -> Self {
        let label = label.into();
        let facing = FacingHint::from_label(&label);
        Self {
            device_id: device_id.into(),
            label,
            facing,
        }
    }
}

/// Pixel layout of a captured frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 8-bit grayscale, the canonical decode input
    Gray8,
    /// 32-bit RGBA
    Rgba,
    /// 24-bit RGB
    Rgb24,
    /// Packed 4:2:2 YUYV, the common raw webcam format
    Yuyv,
    /// JPEG-compressed frame, decompressed lazily
    Mjpeg,
}

/// A single frame from a capture stream
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub data: Arc<[u8]>,
    pub format: PixelFormat,
    /// Bytes per row; may include padding. Zero for compressed formats.
    pub stride: u32,
    pub captured_at: Instant,
}

impl VideoFrame {
    /// Convert to grayscale for the decode readers
    ///
    /// Returns `None` when the buffer is truncated or (for MJPEG) fails to
    /// decompress; callers treat that as "no code found in this frame".
    pub fn to_luma(&self) -> Option<GrayImage> {
        let w = self.width as usize;
        let h = self.height as usize;
        match self.format {
            PixelFormat::Gray8 => {
                let stride = self.stride.max(self.width) as usize;
                let mut out = Vec::with_capacity(w * h);
                for y in 0..h {
                    let row = self.data.get(y * stride..y * stride + w)?;
                    out.extend_from_slice(row);
                }
                GrayImage::from_raw(self.width, self.height, out)
            }
            PixelFormat::Rgba | PixelFormat::Rgb24 => {
                let bpp = if self.format == PixelFormat::Rgba { 4 } else { 3 };
                let stride = self.stride.max(self.width * bpp as u32) as usize;
                let mut out = Vec::with_capacity(w * h);
                for y in 0..h {
                    for x in 0..w {
                        let base = y * stride + x * bpp;
                        let px = self.data.get(base..base + 3)?;
                        // integer BT.601 luma
                        let luma =
                            (77 * px[0] as u32 + 150 * px[1] as u32 + 29 * px[2] as u32) >> 8;
                        out.push(luma as u8);
                    }
                }
                GrayImage::from_raw(self.width, self.height, out)
            }
            PixelFormat::Yuyv => {
                let stride = self.stride.max(self.width * 2) as usize;
                let mut out = Vec::with_capacity(w * h);
                for y in 0..h {
                    for x in 0..w {
                        out.push(*self.data.get(y * stride + x * 2)?);
                    }
                }
                GrayImage::from_raw(self.width, self.height, out)
            }
            PixelFormat::Mjpeg => {
                let img = image::load_from_memory(&self.data).ok()?;
                Some(img.to_luma8())
            }
        }
    }
}

/// Preview frame sink handed over by the host's render target
pub type PreviewSender = futures::channel::mpsc::Sender<Arc<VideoFrame>>;
/// Receiving side the host widget polls
pub type PreviewReceiver = futures::channel::mpsc::Receiver<Arc<VideoFrame>>;

/// Frame channel between a capture loop and a decode backend
pub type FrameSender = tokio::sync::mpsc::Sender<Arc<VideoFrame>>;
pub type FrameReceiver = tokio::sync::mpsc::Receiver<Arc<VideoFrame>>;

/// Opaque handle to the surface the host page renders scanning UI into
///
/// The engine never interprets the surface beyond its identifier; frames
/// are offered to the optional preview sink and silently dropped when the
/// host is not draining it.
#[derive(Clone)]
pub struct RenderTarget {
    surface_id: String,
    preview: Option<PreviewSender>,
}

impl RenderTarget {
    pub fn new(surface_id: impl Into<String>) -> Self {
        Self {
            surface_id: surface_id.into(),
            preview: None,
        }
    }

    /// Target with no identified surface (headless hosts, tests)
    pub fn headless() -> Self {
        Self::new("")
    }

    pub fn with_preview(mut self, sender: PreviewSender) -> Self {
        self.preview = Some(sender);
        self
    }

    pub fn surface_id(&self) -> &str {
        &self.surface_id
    }

    /// Best-effort preview delivery; never blocks
    pub fn offer(&mut self, frame: &Arc<VideoFrame>) {
        if let Some(sender) = &mut self.preview {
            let _ = sender.try_send(Arc::clone(frame));
        }
    }
}

impl std::fmt::Debug for RenderTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderTarget")
            .field("surface_id", &self.surface_id)
            .field("has_preview", &self.preview.is_some())
            .finish()
    }
}

/// An owned, releasable capture stream
///
/// Holds the capture loop for one device. Releasing is idempotent and is
/// the only way the underlying hardware handle is returned; a handle left
/// live after stop blocks subsequent acquisitions.
pub struct StreamHandle {
    id: Uuid,
    descriptor: CameraDescriptor,
    frames: Mutex<Option<FrameReceiver>>,
    live: Arc<AtomicBool>,
    controller: Mutex<Option<CaptureLoopController>>,
}

impl StreamHandle {
    pub fn new(
        descriptor: CameraDescriptor,
        frames: FrameReceiver,
        live: Arc<AtomicBool>,
        controller: CaptureLoopController,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            descriptor,
            frames: Mutex::new(Some(frames)),
            live,
            controller: Mutex::new(Some(controller)),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn descriptor(&self) -> &CameraDescriptor {
        &self.descriptor
    }

    /// Take the frame receiver; exactly one decode backend may consume a
    /// stream, so this yields `None` on the second call.
    pub fn take_frames(&self) -> Option<FrameReceiver> {
        self.frames.lock().unwrap().take()
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Number of live tracks: 1 while streaming, 0 after release
    pub fn active_tracks(&self) -> usize {
        if self.is_live() { 1 } else { 0 }
    }

    /// Stop the capture loop and mark the stream dead
    ///
    /// Safe to call any number of times, from any state.
    pub fn release(&self) {
        if !self.live.swap(false, Ordering::SeqCst) {
            debug!(id = %self.id, "Stream already released");
            return;
        }
        info!(id = %self.id, device = %self.descriptor.label, "Releasing capture stream");
        if let Some(mut controller) = self.controller.lock().unwrap().take() {
            controller.stop(RELEASE_JOIN_WAIT);
        }
        self.frames.lock().unwrap().take();
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandle")
            .field("id", &self.id)
            .field("device", &self.descriptor.device_id)
            .field("live", &self.is_live())
            .finish()
    }
}

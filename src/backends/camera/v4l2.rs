// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 capture provider
//!
//! Enumerates `/dev/video*` nodes and pumps frames through a memory-mapped
//! stream. The stream borrows the device, so both live on the capture
//! thread's stack; `open` negotiates the format up front on a short-lived
//! handle so constraint failures surface synchronously.

use super::capture_loop::CaptureLoopController;
use super::types::{CameraDescriptor, PixelFormat, StreamHandle, VideoFrame};
use super::CaptureProvider;
use crate::config::ScanConfiguration;
use crate::constants::camera::FRAME_CHANNEL_CAPACITY;
use crate::errors::{ScanError, ScanResult};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};
use v4l::buffer::Type;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

/// Pixel formats we can hand to the decode readers, most preferred first.
/// MJPG keeps USB bandwidth low at high resolutions; GREY skips conversion
/// entirely when a device offers it.
const FOURCC_PREFERENCE: &[(&[u8; 4], PixelFormat)] = &[
    (b"MJPG", PixelFormat::Mjpeg),
    (b"YUYV", PixelFormat::Yuyv),
    (b"GREY", PixelFormat::Gray8),
    (b"RGB3", PixelFormat::Rgb24),
];

pub struct V4l2Provider;

impl V4l2Provider {
    pub fn new() -> Self {
        Self
    }

    /// Negotiate a capture format within the configured envelope.
    ///
    /// Drivers adjust requested formats rather than rejecting them, so the
    /// result is checked against the resolution bounds afterwards.
    fn negotiate(dev: &Device, config: &ScanConfiguration) -> ScanResult<(v4l::Format, PixelFormat)> {
        let (width, height) = config.resolution.ideal;
        for (fourcc, pixel_format) in FOURCC_PREFERENCE {
            let wanted = v4l::Format::new(width, height, FourCC::new(fourcc));
            let Ok(actual) = dev.set_format(&wanted) else {
                continue;
            };
            if actual.fourcc != wanted.fourcc {
                continue;
            }
            if !config.resolution.admits(actual.width, actual.height) {
                debug!(
                    fourcc = %actual.fourcc,
                    width = actual.width,
                    height = actual.height,
                    "Negotiated size outside envelope"
                );
                continue;
            }
            return Ok((actual, *pixel_format));
        }
        Err(ScanError::ConstraintUnsatisfiable(format!(
            "no supported format within {}x{}..{}x{}",
            config.resolution.min.0,
            config.resolution.min.1,
            config.resolution.max.0,
            config.resolution.max.1
        )))
    }
}

impl Default for V4l2Provider {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureProvider for V4l2Provider {
    fn name(&self) -> &'static str {
        "v4l2"
    }

    fn is_available(&self) -> bool {
        !v4l::context::enum_devices().is_empty()
    }

    fn enumerate(&self) -> ScanResult<Vec<CameraDescriptor>> {
        let mut devices = Vec::new();
        for node in v4l::context::enum_devices() {
            let path = node.path().to_path_buf();
            // Nodes we cannot open or that cannot capture are skipped, not
            // fatal: metadata nodes share the /dev/video namespace.
            let Ok(dev) = Device::with_path(&path) else {
                debug!(path = %path.display(), "Skipping unopenable video node");
                continue;
            };
            let Ok(caps) = dev.query_caps() else {
                continue;
            };
            if !caps
                .capabilities
                .contains(v4l::capability::Flags::VIDEO_CAPTURE)
            {
                continue;
            }
            devices.push(CameraDescriptor::new(
                path.display().to_string(),
                caps.card.clone(),
            ));
        }
        Ok(devices)
    }

    fn open(
        &self,
        descriptor: &CameraDescriptor,
        config: &ScanConfiguration,
    ) -> ScanResult<StreamHandle> {
        let path = PathBuf::from(&descriptor.device_id);
        let (format, pixel_format) = {
            let dev = Device::with_path(&path).map_err(ScanError::from)?;
            Self::negotiate(&dev, config)?
        };
        info!(
            device = %descriptor.label,
            fourcc = %format.fourcc,
            width = format.width,
            height = format.height,
            "Opening V4L2 stream"
        );

        let (tx, rx) = tokio::sync::mpsc::channel(FRAME_CHANNEL_CAPACITY);
        let live = Arc::new(AtomicBool::new(true));
        let live_flag = Arc::clone(&live);
        let thread_path = path.clone();
        let thread_format = format;

        let controller = CaptureLoopController::spawn("v4l2-capture", move |stop| {
            capture_body(
                &thread_path,
                thread_format,
                pixel_format,
                tx,
                live_flag,
                stop,
            )
        });

        Ok(StreamHandle::new(descriptor.clone(), rx, live, controller))
    }
}

/// Capture thread body; owns the device and its borrowed stream
fn capture_body(
    path: &Path,
    format: v4l::Format,
    pixel_format: PixelFormat,
    tx: tokio::sync::mpsc::Sender<Arc<VideoFrame>>,
    live: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
) -> Result<(), String> {
    let mut dev = Device::with_path(path).map_err(|e| e.to_string())?;
    let format = dev.set_format(&format).map_err(|e| e.to_string())?;
    let mut stream =
        MmapStream::with_buffers(&mut dev, Type::VideoCapture, FRAME_CHANNEL_CAPACITY as u32)
            .map_err(|e| e.to_string())?;

    while !stop.load(Ordering::SeqCst) && live.load(Ordering::SeqCst) {
        let (buf, meta) = match stream.next() {
            Ok(frame) => frame,
            // Dropping the sender with `live` still set lets the decode
            // backends tell device death apart from a deliberate release
            Err(e) => return Err(format!("dequeue failed: {e}")),
        };
        let used = meta.bytesused as usize;
        let data: Arc<[u8]> = Arc::from(&buf[..used.min(buf.len())]);
        let frame = Arc::new(VideoFrame {
            width: format.width,
            height: format.height,
            data,
            format: pixel_format,
            stride: if pixel_format == PixelFormat::Mjpeg {
                0
            } else {
                format.stride
            },
            captured_at: Instant::now(),
        });
        // Decoder backpressure drops frames; a closed channel ends the loop
        if tx.try_send(frame).is_err() && tx.is_closed() {
            break;
        }
    }
    Ok(())
}

// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic capture provider
//!
//! Plays a fixed frame playlist at the configured frame rate on a real
//! capture thread, giving integration tests and headless demos the full
//! stream lifecycle without hardware.

use super::capture_loop::{CaptureLoopController, LoopAction};
use super::types::{CameraDescriptor, PixelFormat, StreamHandle, VideoFrame};
use super::CaptureProvider;
use crate::config::ScanConfiguration;
use crate::constants::camera::FRAME_CHANNEL_CAPACITY;
use crate::errors::{ScanError, ScanResult};
use image::GrayImage;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

/// Frame source backed by an in-memory playlist
pub struct SyntheticProvider {
    devices: Vec<CameraDescriptor>,
    playlist: Mutex<Vec<Arc<VideoFrame>>>,
    open_fault: Option<Box<dyn Fn() -> ScanError + Send + Sync>>,
}

impl SyntheticProvider {
    pub fn new() -> Self {
        Self::with_devices(vec![CameraDescriptor::new(
            "synthetic:0",
            "Synthetic Camera",
        )])
    }

    pub fn with_devices(devices: Vec<CameraDescriptor>) -> Self {
        Self {
            devices,
            playlist: Mutex::new(Vec::new()),
            open_fault: None,
        }
    }

    /// Replace the playlist; an empty playlist yields blank frames
    pub fn set_playlist(&self, frames: Vec<Arc<VideoFrame>>) {
        *self.playlist.lock().unwrap() = frames;
    }

    /// Make every `open` call fail with the produced error
    pub fn with_open_fault(
        mut self,
        fault: impl Fn() -> ScanError + Send + Sync + 'static,
    ) -> Self {
        self.open_fault = Some(Box::new(fault));
        self
    }

    /// Wrap a grayscale image as a playable frame
    pub fn frame_from_luma(image: &GrayImage) -> Arc<VideoFrame> {
        Arc::new(VideoFrame {
            width: image.width(),
            height: image.height(),
            data: Arc::from(image.as_raw().as_slice()),
            format: PixelFormat::Gray8,
            stride: image.width(),
            captured_at: Instant::now(),
        })
    }

    /// A featureless mid-gray frame
    pub fn blank_frame(width: u32, height: u32) -> Arc<VideoFrame> {
        Arc::new(VideoFrame {
            width,
            height,
            data: Arc::from(vec![128u8; (width * height) as usize].into_boxed_slice()),
            format: PixelFormat::Gray8,
            stride: width,
            captured_at: Instant::now(),
        })
    }
}

impl Default for SyntheticProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureProvider for SyntheticProvider {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn enumerate(&self) -> ScanResult<Vec<CameraDescriptor>> {
        Ok(self.devices.clone())
    }

    fn open(
        &self,
        descriptor: &CameraDescriptor,
        config: &ScanConfiguration,
    ) -> ScanResult<StreamHandle> {
        if let Some(fault) = &self.open_fault {
            return Err(fault());
        }
        if !self.devices.iter().any(|d| d.device_id == descriptor.device_id) {
            return Err(ScanError::DeviceNotFound);
        }

        let (width, height) = config.resolution.ideal;
        let interval = Duration::from_secs(1) / config.frame_rate.ideal.max(1);
        let playlist = {
            let frames = self.playlist.lock().unwrap();
            if frames.is_empty() {
                vec![Self::blank_frame(width, height)]
            } else {
                frames.clone()
            }
        };
        debug!(device = %descriptor.device_id, frames = playlist.len(), "Opening synthetic stream");

        let (tx, rx) = tokio::sync::mpsc::channel(FRAME_CHANNEL_CAPACITY);
        let live = Arc::new(AtomicBool::new(true));

        let mut index = 0usize;
        let controller = CaptureLoopController::start("synthetic-capture", move || {
            let frame = Arc::clone(&playlist[index % playlist.len()]);
            index += 1;
            // Drop the frame when decoding falls behind
            if tx.try_send(frame).is_err() && tx.is_closed() {
                return LoopAction::Stop;
            }
            thread::sleep(interval);
            LoopAction::Continue
        });

        Ok(StreamHandle::new(
            descriptor.clone(),
            rx,
            live,
            controller,
        ))
    }
}

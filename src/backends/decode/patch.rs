// SPDX-License-Identifier: GPL-3.0-only

//! Patch-locator decoding
//!
//! Samples the stream at a fixed frequency instead of decoding every
//! frame. Each sampled frame is scanned for high-contrast tiles, the
//! densest cluster is cropped with a margin, and only that patch is
//! decoded; a full-frame pass runs when no tile stands out. Results from
//! this path are noisier, so the session applies confusion correction.

use super::reader::FrameReader;
use super::{DecodeBackend, DecodeEvents, DecodeInput, DecodeStrategy, RawScan};
use crate::config::ScanConfiguration;
use crate::errors::{ScanError, ScanResult};
use image::GrayImage;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Margin added around the located tile cluster, in tiles
const PATCH_MARGIN_TILES: u32 = 1;

/// Minimum per-tile contrast (max - min luma) to count as a candidate
const TILE_CONTRAST_FLOOR: u8 = 60;

pub struct PatchLocatorDecoder {
    reader: FrameReader,
    tile_px: u32,
    interval: Duration,
    task: Option<JoinHandle<()>>,
}

impl PatchLocatorDecoder {
    pub fn new(config: &ScanConfiguration) -> Self {
        Self {
            reader: FrameReader::new(config.reader_set.clone()),
            tile_px: config.locator_granularity.tile_px(),
            interval: Duration::from_secs(1) / config.scan_frequency_hz.max(1),
            task: None,
        }
    }
}

impl DecodeBackend for PatchLocatorDecoder {
    fn strategy(&self) -> DecodeStrategy {
        DecodeStrategy::PatchLocator
    }

    fn start(&mut self, input: DecodeInput, events: DecodeEvents) -> ScanResult<()> {
        let mut frames = input
            .stream
            .take_frames()
            .ok_or_else(|| ScanError::BackendInit("capture stream already consumed".into()))?;
        info!(
            interval_ms = self.interval.as_millis() as u64,
            tile_px = self.tile_px,
            "Starting patch-locator decoder"
        );

        let reader = self.reader.clone();
        let tile_px = self.tile_px;
        let interval = self.interval;
        let stream = Arc::clone(&input.stream);
        let mut target = input.target.clone();

        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;

                // Drain to the freshest frame; stale frames are useless here
                let Some(mut frame) = frames.recv().await else {
                    debug!("Capture channel closed, locator exiting");
                    if stream.is_live() {
                        (events.on_error)(ScanError::BackendInit(
                            "capture stream ended unexpectedly".into(),
                        ));
                    }
                    break;
                };
                while let Ok(newer) = frames.try_recv() {
                    frame = newer;
                }
                target.offer(&frame);

                let reader = reader.clone();
                let decoded = tokio::task::spawn_blocking(move || {
                    let luma = frame.to_luma()?;
                    match locate_patch(&luma, tile_px) {
                        Some(patch) => reader.decode(&patch).or_else(|| reader.decode(&luma)),
                        None => reader.decode(&luma),
                    }
                })
                .await;
                match decoded {
                    Ok(Some(detection)) => (events.on_raw)(RawScan {
                        detection,
                        strategy: DecodeStrategy::PatchLocator,
                    }),
                    Ok(None) => {}
                    Err(_) => break,
                }
            }
        }));
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for PatchLocatorDecoder {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Crop the highest-contrast tile cluster out of a frame.
///
/// Codes are the highest-contrast content a label frame carries, so the
/// bounding box of tiles above the contrast floor is a cheap locator.
fn locate_patch(image: &GrayImage, tile_px: u32) -> Option<GrayImage> {
    let tiles_x = image.width() / tile_px;
    let tiles_y = image.height() / tile_px;
    if tiles_x == 0 || tiles_y == 0 {
        return None;
    }

    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            if tile_contrast(image, tx * tile_px, ty * tile_px, tile_px) < TILE_CONTRAST_FLOOR {
                continue;
            }
            bounds = Some(match bounds {
                None => (tx, ty, tx, ty),
                Some((x0, y0, x1, y1)) => (x0.min(tx), y0.min(ty), x1.max(tx), y1.max(ty)),
            });
        }
    }
    let (x0, y0, x1, y1) = bounds?;

    let crop_x = x0.saturating_sub(PATCH_MARGIN_TILES) * tile_px;
    let crop_y = y0.saturating_sub(PATCH_MARGIN_TILES) * tile_px;
    let crop_w = ((x1 + 1 + PATCH_MARGIN_TILES) * tile_px).min(image.width()) - crop_x;
    let crop_h = ((y1 + 1 + PATCH_MARGIN_TILES) * tile_px).min(image.height()) - crop_y;
    if crop_w == image.width() && crop_h == image.height() {
        // Whole frame qualified; cropping buys nothing
        return None;
    }
    Some(image::imageops::crop_imm(image, crop_x, crop_y, crop_w, crop_h).to_image())
}

fn tile_contrast(image: &GrayImage, x0: u32, y0: u32, tile_px: u32) -> u8 {
    let (mut min_v, mut max_v) = (u8::MAX, 0u8);
    // Sampling every fourth pixel is plenty for a contrast estimate
    for y in (y0..y0 + tile_px).step_by(4) {
        for x in (x0..x0 + tile_px).step_by(4) {
            let v = image.get_pixel(x, y).0[0];
            min_v = min_v.min(v);
            max_v = max_v.max(v);
        }
    }
    max_v.saturating_sub(min_v)
}

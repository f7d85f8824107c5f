// SPDX-License-Identifier: GPL-3.0-only

//! Per-frame code reading
//!
//! [`FrameReader`] runs the enabled readers over one grayscale image: the
//! QR grid detector first, then the 1D scanline pass over a fixed set of
//! evenly spaced rows. CPU-bound; callers run it on a blocking task.

use super::ean;
use crate::config::{CodeFamily, ReaderSet};
use crate::constants::scanning::SCANLINE_ROWS;
use image::GrayImage;
use tracing::trace;

/// A raw read off a single frame, before normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub text: String,
    pub family: CodeFamily,
}

/// Stateless decoder over a reader set
#[derive(Debug, Clone)]
pub struct FrameReader {
    readers: ReaderSet,
}

impl FrameReader {
    pub fn new(readers: ReaderSet) -> Self {
        Self { readers }
    }

    pub fn readers(&self) -> &ReaderSet {
        &self.readers
    }

    /// Decode one grayscale frame; `None` when no enabled code is present
    pub fn decode(&self, image: &GrayImage) -> Option<Detection> {
        if self.readers.contains(CodeFamily::Qr) {
            if let Some(detection) = self.decode_qr(image) {
                return Some(detection);
            }
        }
        self.decode_scanlines(image)
    }

    fn decode_qr(&self, image: &GrayImage) -> Option<Detection> {
        let width = image.width() as usize;
        let height = image.height() as usize;
        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(width, height, |x, y| {
            image.as_raw()[y * width + x]
        });
        for grid in prepared.detect_grids() {
            match grid.decode() {
                Ok((_meta, content)) => {
                    trace!(len = content.len(), "QR grid decoded");
                    return Some(Detection {
                        text: content,
                        family: CodeFamily::Qr,
                    });
                }
                Err(e) => {
                    trace!(error = ?e, "QR grid failed to decode");
                }
            }
        }
        None
    }

    /// Sample evenly spaced rows; a 1D code crossing the frame intersects
    /// several of them, so damage on one row is recovered by another.
    fn decode_scanlines(&self, image: &GrayImage) -> Option<Detection> {
        let height = image.height() as usize;
        let width = image.width() as usize;
        if height == 0 || width == 0 {
            return None;
        }
        for i in 0..SCANLINE_ROWS {
            let y = (i + 1) * height / (SCANLINE_ROWS + 1);
            let row = &image.as_raw()[y * width..(y + 1) * width];
            if let Some(linear) = ean::decode_row(row, &self.readers) {
                return Some(Detection {
                    text: linear.text,
                    family: linear.family,
                });
            }
        }
        None
    }
}

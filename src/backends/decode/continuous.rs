// SPDX-License-Identifier: GPL-3.0-only

//! Continuous full-frame decoding
//!
//! Workers pull frames off the capture channel and decode each one on the
//! blocking pool. The channel is bounded, so when every worker is busy the
//! capture loop drops frames instead of queueing stale ones.

use super::reader::FrameReader;
use super::{DecodeBackend, DecodeEvents, DecodeInput, DecodeStrategy, RawScan};
use crate::config::ScanConfiguration;
use crate::errors::{ScanError, ScanResult};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub struct ContinuousStreamDecoder {
    reader: FrameReader,
    worker_count: usize,
    workers: Vec<JoinHandle<()>>,
}

impl ContinuousStreamDecoder {
    pub fn new(config: &ScanConfiguration) -> Self {
        Self {
            reader: FrameReader::new(config.reader_set.clone()),
            worker_count: config.worker_count.max(1),
            workers: Vec::new(),
        }
    }
}

impl DecodeBackend for ContinuousStreamDecoder {
    fn strategy(&self) -> DecodeStrategy {
        DecodeStrategy::ContinuousStream
    }

    fn start(&mut self, input: DecodeInput, events: DecodeEvents) -> ScanResult<()> {
        let frames = input
            .stream
            .take_frames()
            .ok_or_else(|| ScanError::BackendInit("capture stream already consumed".into()))?;
        info!(workers = self.worker_count, "Starting continuous-stream decoder");

        let frames = Arc::new(Mutex::new(frames));
        for worker in 0..self.worker_count {
            let frames = Arc::clone(&frames);
            let reader = self.reader.clone();
            let events = events.clone();
            let stream = Arc::clone(&input.stream);
            let mut target = input.target.clone();
            self.workers.push(tokio::spawn(async move {
                loop {
                    let frame = {
                        let mut rx = frames.lock().await;
                        rx.recv().await
                    };
                    let Some(frame) = frame else {
                        debug!(worker, "Capture channel closed, worker exiting");
                        // Closing while the stream is still nominally live
                        // means the device died under us
                        if worker == 0 && stream.is_live() {
                            (events.on_error)(ScanError::BackendInit(
                                "capture stream ended unexpectedly".into(),
                            ));
                        }
                        break;
                    };
                    target.offer(&frame);

                    let reader = reader.clone();
                    let decoded = tokio::task::spawn_blocking(move || {
                        frame.to_luma().and_then(|luma| reader.decode(&luma))
                    })
                    .await;
                    match decoded {
                        Ok(Some(detection)) => (events.on_raw)(RawScan {
                            detection,
                            strategy: DecodeStrategy::ContinuousStream,
                        }),
                        Ok(None) => {}
                        Err(_) => break,
                    }
                }
            }));
        }
        Ok(())
    }

    fn stop(&mut self) {
        for worker in self.workers.drain(..) {
            worker.abort();
        }
    }
}

impl Drop for ContinuousStreamDecoder {
    fn drop(&mut self) {
        self.stop();
    }
}

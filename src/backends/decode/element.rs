// SPDX-License-Identifier: GPL-3.0-only

//! Element-bound decoding
//!
//! Binds decoding to an identified host render surface: every frame is
//! offered to the surface's preview sink before decoding, and starting
//! against a target with no surface is an initialization error rather
//! than a silent headless run.

use super::reader::FrameReader;
use super::{DecodeBackend, DecodeEvents, DecodeInput, DecodeStrategy, RawScan};
use crate::config::ScanConfiguration;
use crate::errors::{ScanError, ScanResult};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub struct ElementBoundDecoder {
    reader: FrameReader,
    task: Option<JoinHandle<()>>,
}

impl ElementBoundDecoder {
    pub fn new(config: &ScanConfiguration) -> Self {
        Self {
            reader: FrameReader::new(config.reader_set.clone()),
            task: None,
        }
    }
}

impl DecodeBackend for ElementBoundDecoder {
    fn strategy(&self) -> DecodeStrategy {
        DecodeStrategy::ElementBound
    }

    fn start(&mut self, input: DecodeInput, events: DecodeEvents) -> ScanResult<()> {
        if input.target.surface_id().is_empty() {
            return Err(ScanError::BackendInit(
                "element-bound decoding requires a render surface".into(),
            ));
        }
        let mut frames = input
            .stream
            .take_frames()
            .ok_or_else(|| ScanError::BackendInit("capture stream already consumed".into()))?;
        info!(surface = input.target.surface_id(), "Starting element-bound decoder");

        let reader = self.reader.clone();
        let stream = Arc::clone(&input.stream);
        let mut target = input.target.clone();
        self.task = Some(tokio::spawn(async move {
            while let Some(frame) = frames.recv().await {
                target.offer(&frame);

                let reader = reader.clone();
                let decoded = tokio::task::spawn_blocking(move || {
                    frame.to_luma().and_then(|luma| reader.decode(&luma))
                })
                .await;
                match decoded {
                    Ok(Some(detection)) => (events.on_raw)(RawScan {
                        detection,
                        strategy: DecodeStrategy::ElementBound,
                    }),
                    Ok(None) => {}
                    Err(_) => break,
                }
            }
            debug!("Capture channel closed, element decoder exiting");
            if stream.is_live() {
                (events.on_error)(ScanError::BackendInit(
                    "capture stream ended unexpectedly".into(),
                ));
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

impl Drop for ElementBoundDecoder {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::synthetic::SyntheticProvider;
    use crate::backends::camera::types::RenderTarget;
    use crate::backends::camera::CaptureProvider;
    use crate::capability::DeviceCapabilityProfile;
    use crate::config::build_config;
    use crate::errors::ScanErrorKind;
    use std::sync::Arc;

    #[tokio::test]
    async fn headless_target_is_rejected() {
        let config = build_config(&DeviceCapabilityProfile::default());
        let provider = SyntheticProvider::new();
        let devices = provider.enumerate().unwrap();
        let stream = Arc::new(provider.open(&devices[0], &config).unwrap());

        let mut backend = ElementBoundDecoder::new(&config);
        let err = backend
            .start(
                DecodeInput {
                    stream: Arc::clone(&stream),
                    target: RenderTarget::headless(),
                },
                DecodeEvents::new(|_| {}, |_| {}),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ScanErrorKind::BackendInitFailure);
        stream.release();
    }
}

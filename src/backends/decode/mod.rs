// SPDX-License-Identifier: GPL-3.0-only

//! Decode backends
//!
//! Three strategies consume a capture stream and emit raw detections:
//! continuous full-frame decoding, sampled patch-locator decoding, and
//! element-bound decoding tied to a host render surface. The session layer
//! picks one, wires up [`DecodeEvents`], and applies debounce and
//! normalization on top.

pub mod continuous;
pub mod ean;
pub mod element;
pub mod patch;
pub mod reader;

use crate::backends::camera::types::{RenderTarget, StreamHandle};
use crate::config::ScanConfiguration;
use crate::constants::debounce;
use crate::errors::{ScanError, ScanResult};
use crate::normalize::CorrectionProfile;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub use reader::{Detection, FrameReader};

/// Which decoding strategy a session runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeStrategy {
    /// Decode every frame the capture loop delivers
    #[default]
    ContinuousStream,
    /// Sample frames at a fixed frequency and search localized patches;
    /// cheaper but noisier, so its results get confusion correction
    PatchLocator,
    /// Decode a stream bound to an identified host render surface
    ElementBound,
}

impl DecodeStrategy {
    /// Debounce interval applied to this strategy's raw results
    pub fn debounce_interval(&self) -> Duration {
        match self {
            DecodeStrategy::ContinuousStream => debounce::CONTINUOUS_STREAM,
            DecodeStrategy::PatchLocator => debounce::PATCH_LOCATOR,
            DecodeStrategy::ElementBound => debounce::ELEMENT_BOUND,
        }
    }

    /// Normalization profile matching this strategy's noise level
    pub fn correction_profile(&self) -> CorrectionProfile {
        match self {
            DecodeStrategy::PatchLocator => CorrectionProfile::noisy(),
            _ => CorrectionProfile::clean(),
        }
    }
}

impl fmt::Display for DecodeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeStrategy::ContinuousStream => write!(f, "continuous-stream"),
            DecodeStrategy::PatchLocator => write!(f, "patch-locator"),
            DecodeStrategy::ElementBound => write!(f, "element-bound"),
        }
    }
}

/// A raw detection annotated with the strategy that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawScan {
    pub detection: Detection,
    pub strategy: DecodeStrategy,
}

/// Callbacks a backend fires from its worker tasks
#[derive(Clone)]
pub struct DecodeEvents {
    pub on_raw: Arc<dyn Fn(RawScan) + Send + Sync>,
    pub on_error: Arc<dyn Fn(ScanError) + Send + Sync>,
}

impl DecodeEvents {
    pub fn new(
        on_raw: impl Fn(RawScan) + Send + Sync + 'static,
        on_error: impl Fn(ScanError) + Send + Sync + 'static,
    ) -> Self {
        Self {
            on_raw: Arc::new(on_raw),
            on_error: Arc::new(on_error),
        }
    }
}

impl fmt::Debug for DecodeEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodeEvents").finish_non_exhaustive()
    }
}

/// Stream plus the host surface the backend may preview into
#[derive(Debug)]
pub struct DecodeInput {
    pub stream: Arc<StreamHandle>,
    pub target: RenderTarget,
}

/// A running decode pipeline over one capture stream
///
/// `start` consumes the stream's frame receiver and spawns worker tasks;
/// `stop` tears them down. Backends never touch the camera lifecycle; the
/// session releases the stream.
pub trait DecodeBackend: Send {
    fn strategy(&self) -> DecodeStrategy;

    fn start(&mut self, input: DecodeInput, events: DecodeEvents) -> ScanResult<()>;

    fn stop(&mut self);
}

/// Construct the backend for a strategy
pub fn backend_for_strategy(
    strategy: DecodeStrategy,
    config: &ScanConfiguration,
) -> Box<dyn DecodeBackend> {
    match strategy {
        DecodeStrategy::ContinuousStream => {
            Box::new(continuous::ContinuousStreamDecoder::new(config))
        }
        DecodeStrategy::PatchLocator => Box::new(patch::PatchLocatorDecoder::new(config)),
        DecodeStrategy::ElementBound => Box::new(element::ElementBoundDecoder::new(config)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_locator_is_the_noisy_strategy() {
        assert!(DecodeStrategy::PatchLocator.correction_profile().confusion_correction);
        assert!(!DecodeStrategy::ContinuousStream.correction_profile().confusion_correction);
        assert!(!DecodeStrategy::ElementBound.correction_profile().confusion_correction);
    }

    #[test]
    fn patch_locator_debounces_longest() {
        assert!(
            DecodeStrategy::PatchLocator.debounce_interval()
                > DecodeStrategy::ContinuousStream.debounce_interval()
        );
    }
}

// SPDX-License-Identifier: GPL-3.0-only

//! Scan configuration derivation
//!
//! [`build_config`] is a pure function from a capability profile to a
//! [`ScanConfiguration`]. Configurations are never mutated after creation;
//! changing anything means building a new one.

use crate::capability::DeviceCapabilityProfile;
use crate::constants::{envelopes, scanning};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Code families the decode readers can be asked to look for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CodeFamily {
    Qr,
    Ean13,
    UpcA,
    Ean8,
}

/// Set of code families enabled for a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderSet(BTreeSet<CodeFamily>);

impl ReaderSet {
    /// High-frequency subset used on constrained devices: the formats this
    /// domain actually prints on labels.
    pub fn minimal() -> Self {
        Self([CodeFamily::Qr, CodeFamily::Ean13, CodeFamily::UpcA].into())
    }

    /// Desktop superset adding secondary/rare formats
    pub fn extended() -> Self {
        let mut set = Self::minimal();
        set.0.insert(CodeFamily::Ean8);
        set
    }

    pub fn contains(&self, family: CodeFamily) -> bool {
        self.0.contains(&family)
    }

    pub fn iter(&self) -> impl Iterator<Item = CodeFamily> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Resolution envelope requested from the capture device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionBounds {
    pub min: (u32, u32),
    pub ideal: (u32, u32),
    pub max: (u32, u32),
}

impl ResolutionBounds {
    /// Whether an actual capture size fits inside the envelope
    pub fn admits(&self, width: u32, height: u32) -> bool {
        width >= self.min.0 && height >= self.min.1 && width <= self.max.0 && height <= self.max.1
    }
}

/// Frame rate bounds in frames per second
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRateBounds {
    pub ideal: u32,
    pub max: u32,
}

/// Patch-locator search granularity
///
/// Coarser patches trade localization accuracy for speed on constrained
/// devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocatorGranularity {
    SmallPatch,
    MediumPatch,
    LargePatch,
}

impl LocatorGranularity {
    /// Tile edge length in pixels used when searching for code-bearing
    /// sub-regions
    pub fn tile_px(&self) -> u32 {
        match self {
            LocatorGranularity::SmallPatch => 64,
            LocatorGranularity::MediumPatch => 96,
            LocatorGranularity::LargePatch => 128,
        }
    }
}

/// Immutable per-session capture/decode configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanConfiguration {
    pub resolution: ResolutionBounds,
    pub frame_rate: FrameRateBounds,
    pub worker_count: usize,
    pub reader_set: ReaderSet,
    pub locator_granularity: LocatorGranularity,
    pub scan_frequency_hz: u32,
}

/// Derive a configuration from the capability profile
///
/// Deterministic, no error conditions. Mobile devices get a smaller
/// resolution envelope, lower frame rates, capped parallelism, coarser
/// patch localization, and the minimal reader set.
pub fn build_config(profile: &DeviceCapabilityProfile) -> ScanConfiguration {
    if profile.is_mobile {
        let [min, ideal, max] = envelopes::MOBILE_RESOLUTION;
        let (fr_ideal, fr_max) = envelopes::MOBILE_FRAME_RATE;
        ScanConfiguration {
            resolution: ResolutionBounds { min, ideal, max },
            frame_rate: FrameRateBounds {
                ideal: fr_ideal,
                max: fr_max,
            },
            worker_count: profile
                .hardware_concurrency_hint
                .min(envelopes::MOBILE_WORKER_CAP)
                .max(1),
            reader_set: ReaderSet::minimal(),
            locator_granularity: LocatorGranularity::SmallPatch,
            scan_frequency_hz: scanning::PATCH_FREQUENCY_MOBILE_HZ,
        }
    } else {
        let [min, ideal, max] = envelopes::DESKTOP_RESOLUTION;
        let (fr_ideal, fr_max) = envelopes::DESKTOP_FRAME_RATE;
        ScanConfiguration {
            resolution: ResolutionBounds { min, ideal, max },
            frame_rate: FrameRateBounds {
                ideal: fr_ideal,
                max: fr_max,
            },
            worker_count: profile.hardware_concurrency_hint.max(1),
            reader_set: ReaderSet::extended(),
            locator_granularity: LocatorGranularity::MediumPatch,
            scan_frequency_hz: scanning::PATCH_FREQUENCY_DESKTOP_HZ,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mobile_profile() -> DeviceCapabilityProfile {
        DeviceCapabilityProfile {
            is_mobile: true,
            hardware_concurrency_hint: 8,
            ..Default::default()
        }
    }

    #[test]
    fn mobile_caps_workers_at_two() {
        let config = build_config(&mobile_profile());
        assert_eq!(config.worker_count, 2);
    }

    #[test]
    fn mobile_gets_minimal_reader_set() {
        let config = build_config(&mobile_profile());
        assert!(config.reader_set.contains(CodeFamily::Qr));
        assert!(config.reader_set.contains(CodeFamily::Ean13));
        assert!(!config.reader_set.contains(CodeFamily::Ean8));
    }

    #[test]
    fn desktop_superset_and_unconstrained_workers() {
        let profile = DeviceCapabilityProfile {
            hardware_concurrency_hint: 12,
            ..Default::default()
        };
        let config = build_config(&profile);
        assert_eq!(config.worker_count, 12);
        assert!(config.reader_set.contains(CodeFamily::Ean8));
        assert!(config.frame_rate.ideal > build_config(&mobile_profile()).frame_rate.ideal);
    }

    #[test]
    fn derivation_is_deterministic() {
        let profile = mobile_profile();
        assert_eq!(build_config(&profile), build_config(&profile));
    }

    #[test]
    fn resolution_envelope_admits_ideal() {
        let config = build_config(&mobile_profile());
        let (w, h) = config.resolution.ideal;
        assert!(config.resolution.admits(w, h));
        assert!(!config.resolution.admits(8000, 8000));
    }
}

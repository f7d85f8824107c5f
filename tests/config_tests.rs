// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for capability detection and configuration derivation

use warescan::capability::{EnvironmentHints, OsFamily, ScreenClass};
use warescan::{build_config, CodeFamily, DeviceCapabilityProfile};

const HANDHELD_UA: &str =
    "Mozilla/5.0 (Linux; Android 13; TC52ax) AppleWebKit/537.36 Chrome/118.0 Mobile Safari/537.36";

fn handheld_profile() -> DeviceCapabilityProfile {
    DeviceCapabilityProfile::detect(&EnvironmentHints {
        user_agent: Some(HANDHELD_UA.into()),
        screen: Some((480, 854)),
        hardware_concurrency: Some(8),
        ..Default::default()
    })
}

#[test]
fn test_handheld_detection() {
    let profile = handheld_profile();
    assert!(profile.is_mobile, "Android handheld should detect as mobile");
    assert_eq!(profile.os_family, OsFamily::Android);
    assert_eq!(profile.screen_class, ScreenClass::Compact);
    assert!(
        profile.has_vibration,
        "Mobile devices default to vibration support"
    );
}

#[test]
fn test_mobile_configuration_is_constrained() {
    let config = build_config(&handheld_profile());

    assert_eq!(config.worker_count, 2, "Mobile caps decode workers");
    assert!(config.resolution.ideal.0 <= 1280);
    assert!(config.frame_rate.max <= 24);
    assert!(
        !config.reader_set.contains(CodeFamily::Ean8),
        "Rare formats stay off the mobile reader set"
    );
}

#[test]
fn test_desktop_configuration_is_extended() {
    let profile = DeviceCapabilityProfile {
        hardware_concurrency_hint: 16,
        ..Default::default()
    };
    let config = build_config(&profile);

    assert_eq!(config.worker_count, 16);
    assert!(config.reader_set.contains(CodeFamily::Ean8));
    assert!(config.scan_frequency_hz > build_config(&handheld_profile()).scan_frequency_hz);
}

#[test]
fn test_derivation_is_pure() {
    let profile = handheld_profile();
    let a = build_config(&profile);
    let b = build_config(&profile);
    assert_eq!(a, b, "Same profile must derive the same configuration");
}

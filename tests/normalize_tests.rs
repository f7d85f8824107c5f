// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the shared normalization contract

use warescan::normalize::{CorrectionProfile, Rejection};
use warescan::{CodeFormat, DeviceCapabilityProfile, Normalizer, ScanEngine};

#[test]
fn test_acceptance_table() {
    let n = Normalizer::default();
    let clean = CorrectionProfile::clean();

    let accepted = [
        ("WH967843EU2ZMM", CodeFormat::DomainPrefix),
        ("  wh967843eu2zmm ", CodeFormat::DomainPrefix),
        ("4006381333931", CodeFormat::Ean13),
        ("123456789012", CodeFormat::UpcA),
        ("12345678", CodeFormat::Ean8),
        ("pallet-0001-zone9", CodeFormat::Alphanumeric),
    ];
    for (raw, format) in accepted {
        let result = n.normalize(raw, clean).unwrap();
        assert_eq!(result.format, format, "format for {:?}", raw);
    }

    let rejected = ["AB", "WH!!97", "   ", ""];
    for raw in rejected {
        assert!(
            n.normalize(raw, clean).is_err(),
            "{:?} must be rejected on every path",
            raw
        );
    }
}

#[test]
fn test_normalization_is_idempotent() {
    let n = Normalizer::default();
    for profile in [CorrectionProfile::clean(), CorrectionProfile::noisy()] {
        for raw in ["WH967843EU2ZMM", "4006381333931", "pallet-0001-zone9"] {
            let once = n.normalize(raw, profile).unwrap();
            let twice = n.normalize(&once.code, profile).unwrap();
            assert_eq!(once, twice);
        }
    }
}

#[test]
fn test_confusion_correction_is_opt_in() {
    let n = Normalizer::default();
    // Same glare-misread input, different profiles
    let raw = "O23456S8";
    let noisy = n.normalize(raw, CorrectionProfile::noisy()).unwrap();
    assert_eq!(noisy.code, "02345658");
    assert_eq!(noisy.format, CodeFormat::Ean8);

    let clean = n.normalize(raw, CorrectionProfile::clean()).unwrap();
    assert_eq!(clean.code, "O23456S8");
    assert_eq!(clean.format, CodeFormat::Alphanumeric);
}

#[test]
fn test_length_bounds() {
    let n = Normalizer::default();
    let long = "X".repeat(30);
    assert_eq!(
        n.normalize(&long, CorrectionProfile::noisy()),
        Err(Rejection::TooLong)
    );
    // Clean paths carry no upper bound
    assert!(n.normalize(&long, CorrectionProfile::clean()).is_ok());
}

#[test]
fn test_manual_entry_shares_the_contract() {
    let engine = ScanEngine::new(DeviceCapabilityProfile::default());

    let ok = engine.submit_manual_code("wh967843eu2zmm");
    assert!(ok.valid);
    assert_eq!(ok.code.as_deref(), Some("WH967843EU2ZMM"));

    let bad = engine.submit_manual_code("AB");
    assert!(!bad.valid);
    assert!(bad.message.is_some(), "Rejections carry a reason");

    // Typed input never gets confusion correction
    let typed = engine.submit_manual_code("PALLETO9X21");
    assert_eq!(typed.code.as_deref(), Some("PALLETO9X21"));
}

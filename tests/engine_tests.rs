// SPDX-License-Identifier: GPL-3.0-only

//! End-to-end engine tests over the synthetic capture provider

use image::GrayImage;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use warescan::backends::camera::synthetic::SyntheticProvider;
use warescan::backends::camera::CaptureProvider;
use warescan::backends::decode::ean;
use warescan::{
    CameraDescriptor, CodeFamily, CodeFormat, DecodeStrategy, DeviceCapabilityProfile,
    RenderTarget, ScanEngine, ScanErrorKind, ScanOutcome, SessionEvents, SessionOptions,
    SessionState,
};

/// Provider whose single camera shows one EAN-13 label
fn label_provider(digits: &str) -> Arc<SyntheticProvider> {
    let row = ean::synthesize_ean13_row(digits, 3).unwrap();
    let width = row.len() as u32;
    let height = 80u32;
    let mut data = vec![255u8; (width * height) as usize];
    for y in 0..height as usize {
        data[y * row.len()..(y + 1) * row.len()].copy_from_slice(&row);
    }
    let image = GrayImage::from_raw(width, height, data).unwrap();

    let provider = SyntheticProvider::new();
    provider.set_playlist(vec![SyntheticProvider::frame_from_luma(&image)]);
    Arc::new(provider)
}

fn collecting_events() -> (SessionEvents, Arc<Mutex<Vec<ScanOutcome>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let events = SessionEvents::new(
        move |outcome| sink.lock().unwrap().push(outcome.clone()),
        |_| {},
    );
    (events, seen)
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..300 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met in time");
}

#[tokio::test]
async fn camera_scan_delivers_a_normalized_code() {
    let engine = ScanEngine::with_provider(
        DeviceCapabilityProfile::default(),
        label_provider("4006381333931"),
    );
    let (events, seen) = collecting_events();

    let session = engine
        .start_camera_scan(
            RenderTarget::headless(),
            None,
            SessionOptions::default(),
            events,
        )
        .unwrap();

    wait_until(|| session.state() == SessionState::Stopped).await;

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1, "Single-shot delivers exactly once");
    assert_eq!(seen[0].code, "4006381333931");
    assert_eq!(seen[0].format, CodeFormat::Ean13);
    assert_eq!(seen[0].family, CodeFamily::Ean13);
    assert!(
        session.active_device().is_none(),
        "Camera must be released after the match"
    );
}

#[tokio::test]
async fn patch_locator_scans_the_same_label() {
    let engine = ScanEngine::with_provider(
        DeviceCapabilityProfile::default(),
        label_provider("4006381333931"),
    );
    let (events, seen) = collecting_events();

    let session = engine
        .start_camera_scan(
            RenderTarget::headless(),
            None,
            SessionOptions {
                strategy: DecodeStrategy::PatchLocator,
                continuous_delivery: false,
            },
            events,
        )
        .unwrap();

    wait_until(|| session.state() == SessionState::Stopped).await;
    assert_eq!(seen.lock().unwrap()[0].code, "4006381333931");
}

#[tokio::test]
async fn element_bound_needs_a_surface() {
    let engine =
        ScanEngine::with_provider(DeviceCapabilityProfile::default(), label_provider("4006381333931"));
    let (events, _) = collecting_events();

    let err = engine
        .start_camera_scan(
            RenderTarget::headless(),
            None,
            SessionOptions {
                strategy: DecodeStrategy::ElementBound,
                continuous_delivery: false,
            },
            events,
        )
        .unwrap_err();
    assert_eq!(err.kind(), ScanErrorKind::BackendInitFailure);
}

#[tokio::test]
async fn element_bound_feeds_the_preview_sink() {
    let engine =
        ScanEngine::with_provider(DeviceCapabilityProfile::default(), Arc::new(SyntheticProvider::new()));
    let (events, _) = collecting_events();

    let (tx, mut rx) = futures::channel::mpsc::channel(4);
    let target = RenderTarget::new("scanner-viewport").with_preview(tx);

    let session = engine
        .start_camera_scan(
            target,
            None,
            SessionOptions {
                strategy: DecodeStrategy::ElementBound,
                continuous_delivery: true,
            },
            events,
        )
        .unwrap();

    wait_until(|| matches!(rx.try_next(), Ok(Some(_)))).await;
    session.stop();
}

#[tokio::test]
async fn no_cameras_means_device_not_found() {
    let engine = ScanEngine::with_provider(
        DeviceCapabilityProfile::default(),
        Arc::new(SyntheticProvider::with_devices(Vec::new())),
    );
    assert!(engine.list_cameras().is_empty());

    let (events, _) = collecting_events();
    let err = engine
        .start_camera_scan(
            RenderTarget::headless(),
            None,
            SessionOptions::default(),
            events,
        )
        .unwrap_err();
    assert_eq!(err.kind(), ScanErrorKind::DeviceNotFound);
}

#[tokio::test]
async fn explicit_device_selection_is_honored() {
    let provider = Arc::new(SyntheticProvider::with_devices(vec![
        CameraDescriptor::new("synthetic:0", "Front Camera"),
        CameraDescriptor::new("synthetic:1", "Back Camera"),
    ]));
    let engine = ScanEngine::with_provider(
        DeviceCapabilityProfile::default(),
        Arc::clone(&provider) as Arc<dyn CaptureProvider>,
    );
    let (events, _) = collecting_events();

    let front = engine
        .list_cameras()
        .into_iter()
        .find(|c| c.device_id == "synthetic:0")
        .unwrap();
    let session = engine
        .start_camera_scan(
            RenderTarget::headless(),
            Some(front),
            SessionOptions {
                continuous_delivery: true,
                ..Default::default()
            },
            events,
        )
        .unwrap();
    assert_eq!(session.active_device().unwrap().device_id, "synthetic:0");
    session.stop();
}

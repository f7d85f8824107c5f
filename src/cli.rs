// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for scanning operations
//!
//! Thin wrappers over [`ScanEngine`]: listing cameras, running a scan
//! session against the local capture stack, and validating codes offline.

use clap::ValueEnum;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use warescan::{
    DecodeStrategy, DeviceCapabilityProfile, RenderTarget, ScanEngine, SessionEvents,
    SessionOptions, SessionState,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StrategyArg {
    Continuous,
    Patch,
    Element,
}

impl From<StrategyArg> for DecodeStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Continuous => DecodeStrategy::ContinuousStream,
            StrategyArg::Patch => DecodeStrategy::PatchLocator,
            StrategyArg::Element => DecodeStrategy::ElementBound,
        }
    }
}

/// List all available cameras
pub fn list_cameras(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let engine = ScanEngine::new(DeviceCapabilityProfile::detect_local());
    let cameras = engine.list_cameras();

    if json {
        println!("{}", serde_json::to_string_pretty(&cameras)?);
        return Ok(());
    }

    if cameras.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras:");
    println!();
    for camera in &cameras {
        println!("  {}  {}  ({:?})", camera.device_id, camera.label, camera.facing);
    }
    Ok(())
}

/// Run a scan session until a code is accepted, the timeout passes, or
/// (with `continuous`) the user interrupts.
pub async fn scan(
    device: Option<String>,
    strategy: StrategyArg,
    continuous: bool,
    timeout: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let engine = ScanEngine::new(DeviceCapabilityProfile::detect_local());

    let descriptor = match device {
        Some(id) => Some(
            engine
                .list_cameras()
                .into_iter()
                .find(|c| c.device_id == id)
                .ok_or_else(|| format!("no camera with id {}", id))?,
        ),
        None => None,
    };

    let matched = Arc::new(AtomicBool::new(false));
    let matched_flag = Arc::clone(&matched);
    let events = SessionEvents::new(
        move |outcome| {
            println!("{}", outcome.code);
            matched_flag.store(true, Ordering::SeqCst);
        },
        |error| eprintln!("error: {}", error),
    );

    let session = engine.start_camera_scan(
        // The CLI has no render surface; element-bound scans need a host
        RenderTarget::headless(),
        descriptor,
        SessionOptions {
            strategy: strategy.into(),
            continuous_delivery: continuous,
        },
        events,
    )?;

    let deadline = (timeout > 0).then(|| std::time::Instant::now() + Duration::from_secs(timeout));
    loop {
        if !continuous && matched.load(Ordering::SeqCst) {
            break;
        }
        if session.state() == SessionState::Stopped {
            break;
        }
        if let Some(deadline) = deadline {
            if std::time::Instant::now() >= deadline {
                eprintln!("timed out without a scan");
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    session.stop();
    Ok(())
}

/// Validate a code offline through the manual entry path
pub fn check(code: &str) -> Result<(), Box<dyn std::error::Error>> {
    let engine = ScanEngine::new(DeviceCapabilityProfile::detect_local());
    let submission = engine.submit_manual_code(code);
    println!("{}", serde_json::to_string_pretty(&submission)?);
    if !submission.valid {
        std::process::exit(1);
    }
    Ok(())
}

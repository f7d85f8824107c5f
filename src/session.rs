// SPDX-License-Identifier: GPL-3.0-only

//! Scan session lifecycle
//!
//! A [`ScanSession`] drives one camera scanning attempt: it acquires a
//! stream, runs a decode backend over it, and funnels raw detections
//! through debounce and normalization before the host sees them. Sessions
//! are single-shot by default: the first accepted code stops the session.
//!
//! Raw results race with lifecycle changes (a worker may deliver a frame
//! decoded before `stop` was called), so every delivery is tagged with the
//! generation it was started under and dropped when the counter has moved.

use crate::backends::camera::types::{CameraDescriptor, RenderTarget};
use crate::backends::camera::{CameraSource, CaptureProvider};
use crate::backends::decode::{
    backend_for_strategy, DecodeBackend, DecodeEvents, DecodeInput, DecodeStrategy, RawScan,
};
use crate::capability::DeviceCapabilityProfile;
use crate::config::{build_config, CodeFamily, ScanConfiguration};
use crate::constants::camera::SWITCH_GRACE;
use crate::constants::scanning::FORCE_SCAN_TIMEOUT;
use crate::debounce::ScanDebouncer;
use crate::errors::{ScanError, ScanResult};
use crate::normalize::{CodeFormat, Normalizer};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Lifecycle states of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SessionState {
    #[default]
    Idle,
    /// Camera acquisition in progress; may be waiting on the user
    RequestingPermission,
    Streaming,
    /// A code was accepted in single-shot mode
    Matched,
    /// Unrecoverable failure; resources are released
    Error,
    Stopped,
}

/// Per-session behavior switches
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub strategy: DecodeStrategy,
    /// Keep streaming after a match instead of stopping
    pub continuous_delivery: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            strategy: DecodeStrategy::default(),
            continuous_delivery: false,
        }
    }
}

/// An accepted, normalized scan delivered to the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanOutcome {
    pub code: String,
    pub format: CodeFormat,
    pub family: CodeFamily,
    #[serde(skip)]
    pub strategy: DecodeStrategy,
}

/// Host callbacks; both may fire from worker tasks
#[derive(Clone)]
pub struct SessionEvents {
    pub on_scan: Arc<dyn Fn(&ScanOutcome) + Send + Sync>,
    pub on_error: Arc<dyn Fn(&ScanError) + Send + Sync>,
}

impl SessionEvents {
    pub fn new(
        on_scan: impl Fn(&ScanOutcome) + Send + Sync + 'static,
        on_error: impl Fn(&ScanError) + Send + Sync + 'static,
    ) -> Self {
        Self {
            on_scan: Arc::new(on_scan),
            on_error: Arc::new(on_error),
        }
    }

    /// Events that discard everything; useful with [`ScanSession::force_scan`]
    pub fn discard() -> Self {
        Self::new(|_| {}, |_| {})
    }
}

struct SessionInner {
    profile: DeviceCapabilityProfile,
    config: ScanConfiguration,
    options: SessionOptions,
    events: SessionEvents,
    camera: CameraSource,
    backend: Mutex<Option<Box<dyn DecodeBackend>>>,
    state: Mutex<SessionState>,
    generation: AtomicU64,
    debouncer: Mutex<ScanDebouncer>,
    normalizer: Normalizer,
    target: Mutex<Option<RenderTarget>>,
    device: Mutex<Option<CameraDescriptor>>,
    results_tx: watch::Sender<Option<ScanOutcome>>,
}

/// One camera scanning attempt
pub struct ScanSession {
    inner: Arc<SessionInner>,
}

impl std::fmt::Debug for ScanSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanSession")
            .field("state", &self.state())
            .field("strategy", &self.inner.options.strategy)
            .field("device", &self.active_device().map(|d| d.device_id))
            .finish()
    }
}

impl ScanSession {
    pub fn new(
        profile: DeviceCapabilityProfile,
        options: SessionOptions,
        provider: Arc<dyn CaptureProvider>,
        events: SessionEvents,
    ) -> Self {
        let config = build_config(&profile);
        let (results_tx, _) = watch::channel(None);
        Self {
            inner: Arc::new(SessionInner {
                debouncer: Mutex::new(ScanDebouncer::new(options.strategy.debounce_interval())),
                profile,
                config,
                options,
                events,
                camera: CameraSource::new(provider),
                backend: Mutex::new(None),
                state: Mutex::new(SessionState::Idle),
                generation: AtomicU64::new(0),
                normalizer: Normalizer::default(),
                target: Mutex::new(None),
                device: Mutex::new(None),
                results_tx,
            }),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.inner.state.lock().unwrap()
    }

    pub fn config(&self) -> &ScanConfiguration {
        &self.inner.config
    }

    pub fn strategy(&self) -> DecodeStrategy {
        self.inner.options.strategy
    }

    /// Device the session is currently streaming from
    pub fn active_device(&self) -> Option<CameraDescriptor> {
        self.inner.device.lock().unwrap().clone()
    }

    /// Start streaming and decoding.
    ///
    /// `device` of `None` picks the default camera (rear-facing when the
    /// labels reveal one). Must run inside a tokio runtime; decode workers
    /// are spawned onto it.
    pub fn start(&self, target: RenderTarget, device: Option<CameraDescriptor>) -> ScanResult<()> {
        if !self.inner.profile.is_secure_context {
            return Err(self.inner.fail(ScanError::InsecureContext));
        }
        if !self.inner.profile.has_capture_api {
            return Err(self.inner.fail(ScanError::DeviceNotFound));
        }
        {
            let state = *self.inner.state.lock().unwrap();
            if matches!(state, SessionState::Streaming | SessionState::RequestingPermission) {
                debug!(?state, "Start ignored, session already active");
                return Ok(());
            }
        }
        self.inner.set_state(SessionState::RequestingPermission);

        let descriptor = match device.or_else(|| self.inner.camera.select_default()) {
            Some(d) => d,
            None => return Err(self.inner.fail(ScanError::DeviceNotFound)),
        };

        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.debouncer.lock().unwrap().reset();

        let stream = match self.inner.camera.acquire(&descriptor, &self.inner.config) {
            Ok(stream) => stream,
            Err(e) => return Err(self.inner.fail(e)),
        };

        let mut backend = backend_for_strategy(self.inner.options.strategy, &self.inner.config);
        let inner = Arc::clone(&self.inner);
        let inner_err = Arc::clone(&self.inner);
        let events = DecodeEvents::new(
            move |raw| inner.handle_raw(raw, generation),
            move |error| inner_err.handle_backend_failure(error, generation),
        );
        if let Err(e) = backend.start(
            DecodeInput {
                stream,
                target: target.clone(),
            },
            events,
        ) {
            self.inner.camera.release();
            return Err(self.inner.fail(e));
        }

        *self.inner.backend.lock().unwrap() = Some(backend);
        *self.inner.target.lock().unwrap() = Some(target);
        *self.inner.device.lock().unwrap() = Some(descriptor.clone());
        // The backend may have died before we got here; teardown bumps the
        // generation, so a moved counter means the session already failed
        if self.inner.generation.load(Ordering::SeqCst) != generation {
            self.inner.teardown();
            return Err(ScanError::BackendInit(
                "capture stream ended during start".into(),
            ));
        }
        info!(device = %descriptor.label, strategy = %self.inner.options.strategy, "Session streaming");
        self.inner.set_state(SessionState::Streaming);
        Ok(())
    }

    /// Stop streaming and release the camera; idempotent
    pub fn stop(&self) {
        self.inner.teardown();
        self.inner.set_state(SessionState::Stopped);
    }

    /// Tear down the current stream and restart on another device.
    ///
    /// A short grace period between release and reacquisition lets the
    /// hardware settle; some devices refuse to reopen immediately.
    pub async fn switch_camera(&self, device: CameraDescriptor) -> ScanResult<()> {
        let target = self
            .inner
            .target
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ScanError::BackendInit("session was never started".into()))?;
        info!(device = %device.label, "Switching camera");
        self.stop();
        tokio::time::sleep(SWITCH_GRACE).await;
        self.start(target, Some(device))
    }

    /// Wait for the next accepted scan, up to the force-scan timeout.
    ///
    /// Resolves to `None` when nothing is decoded in time; the session
    /// keeps streaming either way.
    pub async fn force_scan(&self) -> Option<ScanOutcome> {
        let mut rx = self.inner.results_tx.subscribe();
        rx.mark_unchanged();
        match tokio::time::timeout(FORCE_SCAN_TIMEOUT, rx.changed()).await {
            Ok(Ok(())) => rx.borrow().clone(),
            _ => None,
        }
    }
}

impl SessionInner {
    /// Raw detection delivery; runs on decode worker tasks
    fn handle_raw(&self, raw: RawScan, generation: u64) {
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(text = %raw.detection.text, "Dropping stale detection");
            return;
        }
        if *self.state.lock().unwrap() != SessionState::Streaming {
            return;
        }
        if !self.debouncer.lock().unwrap().admit(&raw.detection.text) {
            return;
        }

        let profile = raw.strategy.correction_profile();
        let normalized = match self.normalizer.normalize(&raw.detection.text, profile) {
            Ok(n) => n,
            Err(rejection) => {
                // Validation failures keep the session streaming
                debug!(text = %raw.detection.text, %rejection, "Detection rejected");
                return;
            }
        };

        let outcome = ScanOutcome {
            code: normalized.code,
            format: normalized.format,
            family: raw.detection.family,
            strategy: raw.strategy,
        };
        info!(code = %outcome.code, family = ?outcome.family, "Scan accepted");
        if self.profile.has_vibration {
            debug!("Requesting haptic feedback");
        }

        let _ = self.results_tx.send(Some(outcome.clone()));
        (self.events.on_scan)(&outcome);

        if !self.options.continuous_delivery {
            self.set_state(SessionState::Matched);
            self.teardown();
            self.set_state(SessionState::Stopped);
        }
    }

    /// Unrecoverable backend failure mid-stream; runs on decode worker tasks.
    ///
    /// Stale errors from a torn-down generation are dropped the same way
    /// stale detections are. A current one ends the session: resources are
    /// released and the host hears the error while the state reads `Error`.
    fn handle_backend_failure(&self, error: ScanError, generation: u64) {
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(%error, "Dropping stale backend error");
            return;
        }
        warn!(%error, "Decode backend failed");
        self.set_state(SessionState::Error);
        self.teardown();
        (self.events.on_error)(&error);
        self.set_state(SessionState::Stopped);
    }

    /// Release the backend and camera; safe to call repeatedly
    fn teardown(&self) {
        // Bump the generation first so in-flight detections go stale
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(mut backend) = self.backend.lock().unwrap().take() {
            backend.stop();
        }
        self.camera.release();
        self.debouncer.lock().unwrap().reset();
        *self.device.lock().unwrap() = None;
    }

    fn set_state(&self, next: SessionState) {
        let mut state = self.state.lock().unwrap();
        debug!(from = ?*state, to = ?next, "Session state change");
        *state = next;
    }

    /// Record an unrecoverable failure and notify the host
    fn fail(&self, error: ScanError) -> ScanError {
        warn!(%error, "Session failed");
        self.camera.release();
        self.set_state(SessionState::Error);
        (self.events.on_error)(&error);
        error
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(mut backend) = self.backend.lock().unwrap().take() {
            backend.stop();
        }
        self.camera.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::capture_loop::CaptureLoopController;
    use crate::backends::camera::synthetic::SyntheticProvider;
    use crate::backends::camera::types::StreamHandle;
    use crate::backends::decode::ean;
    use crate::errors::ScanErrorKind;
    use image::GrayImage;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::time::Duration;

    /// Capture thread dies right away, sender dropped with the handle live
    struct DyingProvider;

    impl CaptureProvider for DyingProvider {
        fn name(&self) -> &'static str {
            "dying"
        }

        fn is_available(&self) -> bool {
            true
        }

        fn enumerate(&self) -> ScanResult<Vec<CameraDescriptor>> {
            Ok(vec![CameraDescriptor::new("dying:0", "Dying Camera")])
        }

        fn open(
            &self,
            descriptor: &CameraDescriptor,
            _config: &ScanConfiguration,
        ) -> ScanResult<StreamHandle> {
            let (tx, rx) = tokio::sync::mpsc::channel(4);
            let live = Arc::new(AtomicBool::new(true));
            let controller = CaptureLoopController::spawn("dying-capture", move |_stop| {
                drop(tx);
                Err("device disappeared".to_string())
            });
            Ok(StreamHandle::new(descriptor.clone(), rx, live, controller))
        }
    }

    fn barcode_provider(digits: &str) -> Arc<SyntheticProvider> {
        let row = ean::synthesize_ean13_row(digits, 3).unwrap();
        let width = row.len() as u32;
        let mut data = vec![255u8; (width * 80) as usize];
        for y in 0..80usize {
            data[y * row.len()..(y + 1) * row.len()].copy_from_slice(&row);
        }
        let image = GrayImage::from_raw(width, 80, data).unwrap();
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
        for _ in 0..200 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not met in time");
    }

    #[tokio::test]
    async fn single_shot_delivers_once_and_stops() {
        let (events, seen) = collecting_events();
        let session = ScanSession::new(
            DeviceCapabilityProfile::default(),
            SessionOptions::default(),
            barcode_provider("4006381333931"),
            events,
        );

        session.start(RenderTarget::headless(), None).unwrap();
        wait_until(|| session.state() == SessionState::Stopped).await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].code, "4006381333931");
        assert_eq!(seen[0].format, CodeFormat::Ean13);
        assert_eq!(seen[0].family, CodeFamily::Ean13);
    }

    #[tokio::test]
    async fn insecure_context_is_rejected_before_acquisition() {
        let errors = Arc::new(AtomicUsize::new(0));
        let errors_sink = Arc::clone(&errors);
        let session = ScanSession::new(
            DeviceCapabilityProfile {
                is_secure_context: false,
                ..Default::default()
            },
            SessionOptions::default(),
            Arc::new(SyntheticProvider::new()),
            SessionEvents::new(
                |_| {},
                move |_| {
                    errors_sink.fetch_add(1, Ordering::SeqCst);
                },
            ),
        );
        let err = session.start(RenderTarget::headless(), None).unwrap_err();
        assert_eq!(err, ScanError::InsecureContext);
        assert_eq!(session.state(), SessionState::Error);
        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn permission_denial_reaches_the_host() {
        let provider =
            Arc::new(SyntheticProvider::new().with_open_fault(|| ScanError::PermissionDenied));
        let (events, _) = collecting_events();
        let session = ScanSession::new(
            DeviceCapabilityProfile::default(),
            SessionOptions::default(),
            provider,
            events,
        );
        let err = session.start(RenderTarget::headless(), None).unwrap_err();
        assert_eq!(err.kind(), ScanErrorKind::PermissionDenied);
        assert_eq!(session.state(), SessionState::Error);
    }

    #[tokio::test]
    async fn stop_is_idempotent_and_releases_the_camera() {
        let (events, _) = collecting_events();
        let provider = Arc::new(SyntheticProvider::new());
        let session = ScanSession::new(
            DeviceCapabilityProfile::default(),
            SessionOptions {
                continuous_delivery: true,
                ..Default::default()
            },
            Arc::clone(&provider) as Arc<dyn CaptureProvider>,
            events,
        );
        session.start(RenderTarget::headless(), None).unwrap();
        assert_eq!(session.state(), SessionState::Streaming);
        session.stop();
        session.stop();
        assert_eq!(session.state(), SessionState::Stopped);
        assert!(session.active_device().is_none());
    }

    #[tokio::test]
    async fn stale_detections_after_stop_are_dropped() {
        let (events, seen) = collecting_events();
        let session = ScanSession::new(
            DeviceCapabilityProfile::default(),
            SessionOptions {
                continuous_delivery: true,
                ..Default::default()
            },
            Arc::new(SyntheticProvider::new()),
            events,
        );
        session.start(RenderTarget::headless(), None).unwrap();
        let generation = session.inner.generation.load(Ordering::SeqCst);
        session.stop();

        // A worker delivering a pre-stop decode must be ignored
        session.inner.handle_raw(
            RawScan {
                detection: crate::backends::decode::Detection {
                    text: "4006381333931".into(),
                    family: CodeFamily::Ean13,
                },
                strategy: DecodeStrategy::ContinuousStream,
            },
            generation,
        );
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn continuous_delivery_debounces_repeats() {
        let (events, seen) = collecting_events();
        let session = ScanSession::new(
            DeviceCapabilityProfile::default(),
            SessionOptions {
                continuous_delivery: true,
                ..Default::default()
            },
            barcode_provider("4006381333931"),
            events,
        );
        session.start(RenderTarget::headless(), None).unwrap();
        wait_until(|| !seen.lock().unwrap().is_empty()).await;
        tokio::time::sleep(Duration::from_millis(120)).await;
        session.stop();

        // Frames arrive far faster than the debounce interval, so the
        // early burst collapses to one delivery.
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn force_scan_resolves_with_next_outcome() {
        let (events, _) = collecting_events();
        let session = ScanSession::new(
            DeviceCapabilityProfile::default(),
            SessionOptions {
                continuous_delivery: true,
                ..Default::default()
            },
            barcode_provider("4006381333931"),
            events,
        );
        session.start(RenderTarget::headless(), None).unwrap();
        let outcome = session.force_scan().await.unwrap();
        assert_eq!(outcome.code, "4006381333931");
        session.stop();
    }

    #[tokio::test]
    async fn dead_capture_stream_errors_out_and_releases() {
        let errors = Arc::new(AtomicUsize::new(0));
        let errors_sink = Arc::clone(&errors);
        let session = ScanSession::new(
            DeviceCapabilityProfile::default(),
            SessionOptions {
                continuous_delivery: true,
                ..Default::default()
            },
            Arc::new(DyingProvider),
            SessionEvents::new(
                |_| {},
                move |_| {
                    errors_sink.fetch_add(1, Ordering::SeqCst);
                },
            ),
        );
        session.start(RenderTarget::headless(), None).unwrap();

        // The capture thread is already gone; the backend must report the
        // dead stream and the session must leave Streaming behind
        wait_until(|| session.state() == SessionState::Stopped).await;
        assert_eq!(errors.load(Ordering::SeqCst), 1);
        assert!(session.active_device().is_none());
    }

    #[tokio::test]
    async fn lowercase_domain_prefix_raw_is_canonicalized() {
        let (events, seen) = collecting_events();
        let session = ScanSession::new(
            DeviceCapabilityProfile::default(),
            SessionOptions::default(),
            Arc::new(SyntheticProvider::new()),
            events,
        );
        session.start(RenderTarget::headless(), None).unwrap();
        let generation = session.inner.generation.load(Ordering::SeqCst);

        // Decoders deliver text verbatim; canonicalization happens here
        session.inner.handle_raw(
            RawScan {
                detection: crate::backends::decode::Detection {
                    text: "wh967843eu2zmm".into(),
                    family: CodeFamily::Qr,
                },
                strategy: DecodeStrategy::ContinuousStream,
            },
            generation,
        );

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].code, "WH967843EU2ZMM");
        assert_eq!(seen[0].format, CodeFormat::DomainPrefix);
        // Single-shot: the accepted code stops the session
        assert_eq!(session.state(), SessionState::Stopped);
    }

    #[tokio::test]
    async fn debug_output_names_the_state() {
        let (events, _) = collecting_events();
        let session = ScanSession::new(
            DeviceCapabilityProfile::default(),
            SessionOptions::default(),
            Arc::new(SyntheticProvider::new()),
            events,
        );
        assert!(format!("{session:?}").contains("Idle"));
    }

    #[tokio::test]
    async fn switch_camera_restarts_on_the_new_device() {
        let provider = Arc::new(SyntheticProvider::with_devices(vec![
            CameraDescriptor::new("synthetic:0", "Front Camera"),
            CameraDescriptor::new("synthetic:1", "Back Camera"),
        ]));
        let (events, _) = collecting_events();
        let session = ScanSession::new(
            DeviceCapabilityProfile::default(),
            SessionOptions {
                continuous_delivery: true,
                ..Default::default()
            },
            Arc::clone(&provider) as Arc<dyn CaptureProvider>,
            events,
        );
        session.start(RenderTarget::headless(), None).unwrap();
        assert_eq!(session.active_device().unwrap().device_id, "synthetic:1");

        let front = CameraDescriptor::new("synthetic:0", "Front Camera");
        session.switch_camera(front).await.unwrap();
        assert_eq!(session.active_device().unwrap().device_id, "synthetic:0");
        assert_eq!(session.state(), SessionState::Streaming);
        session.stop();
    }
}

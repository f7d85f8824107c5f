// SPDX-License-Identifier: GPL-3.0-only

//! Engine facade
//!
//! [`ScanEngine`] is the host-facing surface: capability detection happens
//! once at construction, the derived configuration is shared by every
//! session, and manual entry is available whether or not a camera exists.

use crate::backends::camera::types::{CameraDescriptor, RenderTarget};
use crate::backends::camera::{default_provider, CameraSource, CaptureProvider};
use crate::capability::DeviceCapabilityProfile;
use crate::config::{build_config, ScanConfiguration};
use crate::errors::ScanResult;
use crate::manual::{ManualEntryPath, ManualSubmission};
use crate::session::{ScanSession, SessionEvents, SessionOptions};
use std::sync::Arc;
use tracing::info;

pub struct ScanEngine {
    profile: DeviceCapabilityProfile,
    config: ScanConfiguration,
    provider: Arc<dyn CaptureProvider>,
    manual: ManualEntryPath,
}

impl ScanEngine {
    /// Engine over the platform capture stack
    pub fn new(profile: DeviceCapabilityProfile) -> Self {
        Self::with_provider(profile, default_provider())
    }

    /// Engine over an explicit capture stack
    pub fn with_provider(
        profile: DeviceCapabilityProfile,
        provider: Arc<dyn CaptureProvider>,
    ) -> Self {
        let config = build_config(&profile);
        info!(
            is_mobile = profile.is_mobile,
            workers = config.worker_count,
            readers = config.reader_set.len(),
            "Scan engine initialized"
        );
        Self {
            profile,
            config,
            provider,
            manual: ManualEntryPath::default(),
        }
    }

    pub fn profile(&self) -> &DeviceCapabilityProfile {
        &self.profile
    }

    pub fn configuration(&self) -> &ScanConfiguration {
        &self.config
    }

    /// Enumerate capture devices; empty when no stack is usable
    pub fn list_cameras(&self) -> Vec<CameraDescriptor> {
        CameraSource::new(Arc::clone(&self.provider)).list_devices()
    }

    /// Create and start a camera scanning session
    pub fn start_camera_scan(
        &self,
        target: RenderTarget,
        device: Option<CameraDescriptor>,
        options: SessionOptions,
        events: SessionEvents,
    ) -> ScanResult<Arc<ScanSession>> {
        let session = Arc::new(ScanSession::new(
            self.profile.clone(),
            options,
            Arc::clone(&self.provider),
            events,
        ));
        session.start(target, device)?;
        Ok(session)
    }

    /// Stop a session started by this engine; idempotent
    pub fn stop_camera_scan(&self, session: &ScanSession) {
        session.stop();
    }

    /// Validate a typed code through the shared normalization contract
    pub fn submit_manual_code(&self, text: &str) -> ManualSubmission {
        self.manual.submit(text)
    }
}

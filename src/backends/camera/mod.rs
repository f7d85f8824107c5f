// SPDX-License-Identifier: GPL-3.0-only

//! Camera acquisition
//!
//! [`CaptureProvider`] is the seam between the engine and a capture stack.
//! [`CameraSource`] sits on top of one provider and owns device selection
//! and the at-most-one-live-stream invariant.

pub mod capture_loop;
pub mod synthetic;
pub mod types;
pub mod v4l2;

use crate::config::ScanConfiguration;
use crate::errors::{ScanError, ScanResult};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use types::{CameraDescriptor, FacingHint, StreamHandle};

/// A capture stack capable of enumerating and opening devices
pub trait CaptureProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the stack can be used at all on this host
    fn is_available(&self) -> bool;

    /// List capture devices; transient per-device failures are skipped
    fn enumerate(&self) -> ScanResult<Vec<CameraDescriptor>>;

    /// Open a device and start its capture loop
    fn open(
        &self,
        descriptor: &CameraDescriptor,
        config: &ScanConfiguration,
    ) -> ScanResult<StreamHandle>;
}

/// Provider used when none is specified: the platform V4L2 stack
pub fn default_provider() -> Arc<dyn CaptureProvider> {
    Arc::new(v4l2::V4l2Provider::new())
}

/// Device selection and stream ownership over one provider
///
/// Holds at most one live stream; acquiring a new device releases the
/// previous stream first.
pub struct CameraSource {
    provider: Arc<dyn CaptureProvider>,
    active: Mutex<Option<Arc<StreamHandle>>>,
}

impl CameraSource {
    pub fn new(provider: Arc<dyn CaptureProvider>) -> Self {
        Self {
            provider,
            active: Mutex::new(None),
        }
    }

    /// Enumerate devices, fail-soft: an unavailable stack yields an empty
    /// list rather than an error, so hosts can still offer manual entry.
    pub fn list_devices(&self) -> Vec<CameraDescriptor> {
        if !self.provider.is_available() {
            warn!(provider = self.provider.name(), "Capture stack unavailable");
            return Vec::new();
        }
        match self.provider.enumerate() {
            Ok(devices) => devices,
            Err(e) => {
                warn!(provider = self.provider.name(), error = %e, "Device enumeration failed");
                Vec::new()
            }
        }
    }

    /// Pick the device a scanning session should start on.
    ///
    /// Prefers a rear-facing device by label; otherwise falls back to the
    /// last enumerated device, which on multi-camera hardware is typically
    /// the rear module. `None` when no devices exist.
    pub fn select_default(&self) -> Option<CameraDescriptor> {
        let devices = self.list_devices();
        let chosen = devices
            .iter()
            .find(|d| d.facing == FacingHint::Environment)
            .cloned()
            .or_else(|| devices.last().cloned());
        if let Some(d) = &chosen {
            debug!(device = %d.label, facing = ?d.facing, "Selected default camera");
        }
        chosen
    }

    /// Open a stream on `descriptor`, releasing any previously held stream
    pub fn acquire(
        &self,
        descriptor: &CameraDescriptor,
        config: &ScanConfiguration,
    ) -> ScanResult<Arc<StreamHandle>> {
        if !self.provider.is_available() {
            return Err(ScanError::DeviceNotFound);
        }
        self.release();

        info!(device = %descriptor.label, "Acquiring capture stream");
        let handle = Arc::new(self.provider.open(descriptor, config)?);
        *self.active.lock().unwrap() = Some(Arc::clone(&handle));
        Ok(handle)
    }

    /// Release the held stream, if any; idempotent
    pub fn release(&self) {
        if let Some(handle) = self.active.lock().unwrap().take() {
            handle.release();
        }
    }

    /// The currently held stream, if live
    pub fn active(&self) -> Option<Arc<StreamHandle>> {
        self.active.lock().unwrap().clone().filter(|h| h.is_live())
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        self.release();
    }
}

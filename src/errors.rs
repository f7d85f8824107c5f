// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the scanning engine
//!
//! Every failure that can reach a host callback is a [`ScanError`]. The
//! `Display` impl produces the plain string surfaced through `onError`;
//! [`ScanError::kind`] gives hosts a machine-readable category alongside it.

use std::fmt;

/// Result type alias using ScanError
pub type ScanResult<T> = Result<T, ScanError>;

/// Failure categories for a scanning attempt
///
/// `PermissionDenied` through `BackendInit` are unrecoverable for the
/// current session: the session transitions to `Error` and releases any
/// partially acquired resources. Validation failures never surface here;
/// they are handled by the normalizer and keep the session streaming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// User refused camera access
    PermissionDenied,
    /// No capture device present
    DeviceNotFound,
    /// Device held by another consumer
    DeviceBusy,
    /// Requested configuration not supported by any device
    ConstraintUnsatisfiable(String),
    /// Capture API unavailable outside a secure context
    InsecureContext,
    /// Decode backend failed to initialize against the stream/target
    BackendInit(String),
}

/// Machine-readable error category, stable across message wording changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanErrorKind {
    PermissionDenied,
    DeviceNotFound,
    DeviceBusy,
    ConstraintUnsatisfiable,
    InsecureContext,
    BackendInitFailure,
}

impl ScanError {
    /// Category of this error, independent of the human-readable message
    pub fn kind(&self) -> ScanErrorKind {
        match self {
            ScanError::PermissionDenied => ScanErrorKind::PermissionDenied,
            ScanError::DeviceNotFound => ScanErrorKind::DeviceNotFound,
            ScanError::DeviceBusy => ScanErrorKind::DeviceBusy,
            ScanError::ConstraintUnsatisfiable(_) => ScanErrorKind::ConstraintUnsatisfiable,
            ScanError::InsecureContext => ScanErrorKind::InsecureContext,
            ScanError::BackendInit(_) => ScanErrorKind::BackendInitFailure,
        }
    }
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::PermissionDenied => write!(f, "Camera access was denied"),
            ScanError::DeviceNotFound => write!(f, "No capture device found"),
            ScanError::DeviceBusy => write!(f, "Capture device is busy"),
            ScanError::ConstraintUnsatisfiable(msg) => {
                write!(f, "Requested capture configuration unsupported: {}", msg)
            }
            ScanError::InsecureContext => {
                write!(f, "Capture API unavailable: insecure context")
            }
            ScanError::BackendInit(msg) => {
                write!(f, "Decode backend failed to initialize: {}", msg)
            }
        }
    }
}

impl std::error::Error for ScanError {}

// Device I/O failures map onto the taxonomy by errno where the kernel
// gives us one; everything else counts as backend initialization failure.
impl From<std::io::Error> for ScanError {
    fn from(err: std::io::Error) -> Self {
        match err.raw_os_error() {
            Some(13) => ScanError::PermissionDenied,                  // EACCES
            Some(16) => ScanError::DeviceBusy,                        // EBUSY
            Some(2) | Some(19) => ScanError::DeviceNotFound,          // ENOENT/ENODEV
            _ => ScanError::BackendInit(err.to_string()),
        }
    }
}

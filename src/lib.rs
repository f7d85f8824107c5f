// SPDX-License-Identifier: GPL-3.0-only

//! warescan - barcode and QR capture engine for warehouse tooling
//!
//! This library turns a camera stream into validated warehouse codes:
//! capability detection picks a capture/decode configuration, a scan
//! session drives one of three decode strategies over the stream, and
//! every result (camera or typed) passes through the same normalization
//! contract before a host sees it.
//!
//! # Architecture
//!
//! - [`capability`]: runtime environment detection
//! - [`config`]: capability-derived scan configuration
//! - [`backends`]: capture providers and decode strategies
//! - [`session`]: the scan session state machine
//! - [`engine`]: host-facing facade
//! - [`normalize`] / [`manual`]: the shared validation contract

pub mod backends;
pub mod capability;
pub mod config;
pub mod constants;
pub mod debounce;
pub mod engine;
pub mod errors;
pub mod manual;
pub mod normalize;
pub mod session;

// Re-export commonly used types
pub use backends::camera::types::{CameraDescriptor, FacingHint, RenderTarget};
pub use backends::decode::DecodeStrategy;
pub use capability::{DeviceCapabilityProfile, EnvironmentHints};
pub use config::{build_config, CodeFamily, ReaderSet, ScanConfiguration};
pub use engine::ScanEngine;
pub use errors::{ScanError, ScanErrorKind, ScanResult};
pub use normalize::{CodeFormat, Normalizer};
pub use session::{ScanOutcome, ScanSession, SessionEvents, SessionOptions, SessionState};

// SPDX-License-Identifier: GPL-3.0-only

//! Manual code entry
//!
//! Bypasses camera and decoding entirely but funnels typed input through
//! the same [`Normalizer`] the camera paths use, so there is exactly one
//! validation contract regardless of input origin. Correction is disabled:
//! typed input is not optically noisy.

use crate::normalize::{CorrectionProfile, Normalizer, Rejection};
use serde::Serialize;
use tracing::debug;

/// Outcome of a manual submission, shaped for direct host consumption
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManualSubmission {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Camera-free entry path sharing the camera paths' validation surface
#[derive(Debug, Default)]
pub struct ManualEntryPath {
    normalizer: Normalizer,
}

impl ManualEntryPath {
    pub fn new(normalizer: Normalizer) -> Self {
        Self { normalizer }
    }

    /// Validate a typed string
    pub fn submit(&self, text: &str) -> ManualSubmission {
        match self.normalizer.normalize(text, CorrectionProfile::clean()) {
            Ok(normalized) => {
                debug!(code = %normalized.code, format = ?normalized.format, "Manual code accepted");
                ManualSubmission {
                    valid: true,
                    code: Some(normalized.code),
                    message: None,
                }
            }
            Err(rejection) => {
                debug!(input = %text, reason = %rejection, "Manual code rejected");
                ManualSubmission {
                    valid: false,
                    code: None,
                    message: Some(rejection.to_string()),
                }
            }
        }
    }

    /// Validate and deliver through the same callback contract a camera
    /// session uses; returns the rejection when invalid.
    pub fn submit_via(&self, text: &str, on_scan: &dyn Fn(&str)) -> Result<String, Rejection> {
        match self.normalizer.normalize(text, CorrectionProfile::clean()) {
            Ok(normalized) => {
                on_scan(&normalized.code);
                Ok(normalized.code)
            }
            Err(rejection) => Err(rejection),
        }
    }
}

// SPDX-License-Identifier: GPL-3.0-only

//! Raw decode text normalization and validation
//!
//! Every string entering the engine — camera decode or manual entry — goes
//! through [`Normalizer::normalize`], which yields either a canonical code
//! or a [`Rejection`]. Normalization is idempotent: feeding a canonical code
//! back through produces the same code.
//!
//! The character-confusion correction step is opt-in per backend. The
//! substitution table is kept for compatibility with existing label stock;
//! it is known to be lossy (a genuine `O` in a payload becomes `0`), so
//! low-noise backends and manual entry leave it off, and the two-letter
//! domain prefix is never corrected.

use crate::constants::normalize::{CONFUSION_MAP, DOMAIN_PREFIX, MAX_CODE_LEN, MIN_CODE_LEN};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which format pattern a canonical code matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CodeFormat {
    /// Two fixed letters + alphanumeric payload, total length >= 8.
    /// The primary business format; checked before everything else so it is
    /// never misclassified as a generic numeric code.
    DomainPrefix,
    /// Exactly 8 digits
    Ean8,
    /// Exactly 12 digits
    UpcA,
    /// Exactly 13 digits
    Ean13,
    /// Any other run of letters/digits
    Alphanumeric,
}

/// Why a raw string was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Fewer than the minimum characters survive stripping
    TooShort,
    /// Longer than the maximum bound (correction-prone backends only)
    TooLong,
    /// No format pattern matched
    NoFormatMatch,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::TooShort => write!(f, "code is too short"),
            Rejection::TooLong => write!(f, "code is too long"),
            Rejection::NoFormatMatch => write!(f, "code does not match any known format"),
        }
    }
}

/// Per-backend knobs for the lossy parts of normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CorrectionProfile {
    /// Apply the character-confusion substitution table
    pub confusion_correction: bool,
    /// Enforce the maximum length bound
    pub length_bounds: bool,
}

impl CorrectionProfile {
    /// Profile for noisy optical decoders (patch locator)
    pub fn noisy() -> Self {
        Self {
            confusion_correction: true,
            length_bounds: true,
        }
    }

    /// Profile for clean sources: stream/element decoders and manual entry
    pub fn clean() -> Self {
        Self::default()
    }
}

/// A successfully normalized code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub code: String,
    pub format: CodeFormat,
}

/// Substitution table plus ordered format patterns
///
/// The pattern list priority is fixed: domain prefix first, then the
/// fixed-length numeric retail formats, then the generic fallback.
#[derive(Debug, Clone)]
pub struct NormalizationRuleSet {
    confusion: &'static [(char, char)],
    prefix: &'static str,
    min_len: usize,
    max_len: usize,
}

impl Default for NormalizationRuleSet {
    fn default() -> Self {
        Self {
            confusion: CONFUSION_MAP,
            prefix: DOMAIN_PREFIX,
            min_len: MIN_CODE_LEN,
            max_len: MAX_CODE_LEN,
        }
    }
}

/// Turns raw decode/typed strings into canonical codes
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    rules: NormalizationRuleSet,
}

impl Normalizer {
    pub fn new(rules: NormalizationRuleSet) -> Self {
        Self { rules }
    }

    /// Normalize a raw string into a canonical code or a rejection
    ///
    /// Steps, in order: trim + uppercase; optional confusion correction;
    /// strip non-alphanumerics; length check; ordered pattern match.
    pub fn normalize(&self, raw: &str, profile: CorrectionProfile) -> Result<Normalized, Rejection> {
        let upper = raw.trim().to_uppercase();

        let corrected = if profile.confusion_correction {
            self.apply_confusion(&upper)
        } else {
            upper
        };

        let stripped: String = corrected.chars().filter(|c| c.is_ascii_alphanumeric()).collect();

        if stripped.len() < self.rules.min_len {
            return Err(Rejection::TooShort);
        }
        if profile.length_bounds && stripped.len() > self.rules.max_len {
            return Err(Rejection::TooLong);
        }

        match self.classify(&stripped) {
            Some(format) => Ok(Normalized {
                code: stripped,
                format,
            }),
            None => Err(Rejection::NoFormatMatch),
        }
    }

    /// Apply the confusion map, leaving a matching domain prefix untouched
    /// so the correction can never corrupt the prefix letters themselves.
    fn apply_confusion(&self, text: &str) -> String {
        let skip = if text.starts_with(self.rules.prefix) {
            self.rules.prefix.len()
        } else {
            0
        };

        text.chars()
            .enumerate()
            .map(|(i, c)| {
                if i < skip {
                    c
                } else {
                    self.rules
                        .confusion
                        .iter()
                        .find(|(from, _)| *from == c)
                        .map(|(_, to)| *to)
                        .unwrap_or(c)
                }
            })
            .collect()
    }

    /// Ordered pattern match; input is already uppercase alphanumeric and at
    /// least `min_len` long.
    fn classify(&self, code: &str) -> Option<CodeFormat> {
        if code.starts_with(self.rules.prefix) && code.len() >= self.rules.min_len {
            return Some(CodeFormat::DomainPrefix);
        }
        if code.chars().all(|c| c.is_ascii_digit()) {
            match code.len() {
                8 => return Some(CodeFormat::Ean8),
                12 => return Some(CodeFormat::UpcA),
                13 => return Some(CodeFormat::Ean13),
                _ => {}
            }
        }
        if !code.is_empty() {
            return Some(CodeFormat::Alphanumeric);
        }
        None
    }
}

// SPDX-License-Identifier: GPL-3.0-only

//! Engine-wide constants
//!
//! Tunables grouped by concern. Values marked "compat" mirror the behavior
//! the warehouse hosts already depend on and should not be changed casually.

use std::time::Duration;

/// Debounce intervals per decode strategy
///
/// A raw result identical to the last accepted one is suppressed when it
/// arrives within the interval. Patch-locator scanning is more aggressive
/// than the other strategies and needs a longer window.
pub mod debounce {
    use super::Duration;

    pub const CONTINUOUS_STREAM: Duration = Duration::from_millis(400);
    pub const ELEMENT_BOUND: Duration = Duration::from_millis(400);
    pub const PATCH_LOCATOR: Duration = Duration::from_millis(900);
}

/// Normalization rules (compat)
pub mod normalize {
    /// Minimum canonical code length after stripping; always enforced
    pub const MIN_CODE_LEN: usize = 8;
    /// Maximum code length, enforced only on correction-prone backends
    pub const MAX_CODE_LEN: usize = 20;
    /// Two-letter prefix of the primary warehouse code format
    pub const DOMAIN_PREFIX: &str = "WH";

    /// Character-confusion substitutions for noisy optical reads (compat).
    ///
    /// Deliberately lossy: a genuine letter O in a payload becomes a zero.
    /// Applied only on backends that opt into correction.
    pub const CONFUSION_MAP: &[(char, char)] = &[
        ('O', '0'),
        ('I', '1'),
        ('S', '5'),
        ('Z', '2'),
        ('B', '8'),
        ('G', '6'),
        ('Q', '0'),
        ('D', '0'),
    ];
}

/// Camera selection and stream lifecycle
pub mod camera {
    use super::Duration;

    /// Label substrings identifying a rear/environment-facing device,
    /// including localized variants seen on warehouse handhelds.
    pub const REAR_FACING_KEYWORDS: &[&str] = &[
        "back", "rear", "environment", "world", "trás", "trasera", "arrière", "rück", "задняя",
        "后置",
    ];

    /// Label substrings identifying a user-facing device
    pub const FRONT_FACING_KEYWORDS: &[&str] = &["front", "user", "face", "selfie", "frontal"];

    /// Bounded frame channel depth; capture loops drop frames when decoding
    /// falls behind rather than queueing stale images.
    pub const FRAME_CHANNEL_CAPACITY: usize = 4;

    /// Grace period between stop and restart when switching cameras,
    /// letting the hardware release cleanly.
    pub const SWITCH_GRACE: Duration = Duration::from_millis(300);

    /// How long release() waits for a capture thread to wind down before
    /// detaching it.
    pub const RELEASE_JOIN_WAIT: Duration = Duration::from_millis(250);
}

/// Scan scheduling
pub mod scanning {
    use super::Duration;

    /// Upper bound for a force-scan wait before resolving to "no code found"
    pub const FORCE_SCAN_TIMEOUT: Duration = Duration::from_secs(3);

    /// Patch-locator sampling frequency defaults (frames decoded per second)
    pub const PATCH_FREQUENCY_MOBILE_HZ: u32 = 8;
    pub const PATCH_FREQUENCY_DESKTOP_HZ: u32 = 15;

    /// Rows sampled per frame by the 1D scanline reader
    pub const SCANLINE_ROWS: usize = 9;
}

/// Capability-derived configuration envelopes
pub mod envelopes {
    /// (min, ideal, max) width/height pairs
    pub const MOBILE_RESOLUTION: [(u32, u32); 3] = [(640, 480), (1280, 720), (1920, 1080)];
    pub const DESKTOP_RESOLUTION: [(u32, u32); 3] = [(640, 480), (1920, 1080), (2560, 1440)];

    /// (ideal, max) frames per second
    pub const MOBILE_FRAME_RATE: (u32, u32) = (15, 24);
    pub const DESKTOP_FRAME_RATE: (u32, u32) = (30, 60);

    /// Mobile decode parallelism cap (battery)
    pub const MOBILE_WORKER_CAP: usize = 2;
}
